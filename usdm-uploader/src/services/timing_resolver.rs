//! Schedule timing resolution
//!
//! Turns free-text USDM timing descriptors into signed offsets from the anchor
//! visit.
//!
//! # Resolution rules
//! 1. A timing belongs to the encounter of the instance it is measured *from*
//!    (`relativeFromScheduledInstanceId`), not the instance it labels.
//! 2. Timings are scanned in input order. One whose description mentions
//!    "anchor" resolves to `(0, day)` and marks the anchor as seen.
//! 3. Otherwise the label is searched for `day N` then `week N`; failing that
//!    the first integer of the value label is used, in weeks if either field
//!    mentions "week", else days.
//! 4. Before the anchor has been seen every magnitude is forced negative;
//!    after it, values are used as written.
//!
//! Rule 4 normalizes sources that write pre-baseline visits without a sign.
//! It is a heuristic inherited from the source format, not a derived truth.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use usdm_common::usdm::{Encounter, ScheduleTimeline, Timing};

static DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"day\s*([-+]?\d+)").unwrap());
static WEEK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"week\s*([-+]?\d+)").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-+]?\d+").unwrap());

/// Unit of a resolved offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Day,
    Week,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            TimeUnit::Day => 1,
            TimeUnit::Week => 7,
        }
    }
}

/// Signed offset from the anchor visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedTiming {
    pub value: i64,
    pub unit: TimeUnit,
}

impl ResolvedTiming {
    pub fn new(value: i64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn days(value: i64) -> Self {
        Self::new(value, TimeUnit::Day)
    }

    pub fn weeks(value: i64) -> Self {
        Self::new(value, TimeUnit::Week)
    }

    /// `None` when the value cannot be negated or converted to days in `i64`
    pub fn checked(value: i64, unit: TimeUnit) -> Option<Self> {
        value.checked_abs()?.checked_mul(unit.days())?;
        Some(Self::new(value, unit))
    }

    pub fn is_anchor(&self) -> bool {
        self.value == 0
    }

    /// Offset converted to days, saturating at the `i64` bounds
    pub fn in_days(&self) -> i64 {
        self.value.saturating_mul(self.unit.days())
    }
}

/// Resolve `encounterId → offset` for every encounter with a usable timing
///
/// Encounters whose timing cannot be resolved are left out.
pub fn resolve_encounter_timings(
    timeline: &ScheduleTimeline,
    encounters: &[Encounter],
) -> HashMap<String, ResolvedTiming> {
    let instance_to_encounter: HashMap<&str, &str> = timeline
        .instances
        .iter()
        .filter_map(|inst| {
            inst.encounter_id
                .as_deref()
                .filter(|e| !e.is_empty())
                .map(|e| (inst.id.as_str(), e))
        })
        .collect();

    let bound: Vec<(&str, &Timing)> = timeline
        .timings
        .iter()
        .filter_map(|timing| {
            let from = timing.relative_from_scheduled_instance_id.as_deref()?;
            instance_to_encounter.get(from).map(|enc| (*enc, timing))
        })
        .collect();

    let offsets = scan_offsets(bound);

    encounters
        .iter()
        .filter_map(|enc| {
            offsets
                .get(enc.id.as_str())
                .copied()
                .flatten()
                .map(|t| (enc.id.clone(), t))
        })
        .collect()
}

/// Anchor-flag scan over `(encounterId, timing)` pairs in input order
///
/// A later timing for the same encounter replaces an earlier one.
pub fn scan_offsets<'a, I>(timings: I) -> HashMap<&'a str, Option<ResolvedTiming>>
where
    I: IntoIterator<Item = (&'a str, &'a Timing)>,
{
    let mut anchor_found = false;
    let mut results = HashMap::new();

    for (encounter_id, timing) in timings {
        if timing.description.to_lowercase().contains("anchor") {
            anchor_found = true;
            results.insert(encounter_id, Some(ResolvedTiming::days(0)));
            continue;
        }

        let resolved = parse_offset(&timing.label, &timing.value_label).and_then(|t| {
            if anchor_found {
                Some(t)
            } else {
                t.value.checked_abs().map(|v| ResolvedTiming::new(-v, t.unit))
            }
        });
        if resolved.is_none() {
            tracing::debug!(
                encounter_id = %encounter_id,
                label = %timing.label,
                value_label = %timing.value_label,
                "No offset in timing descriptor"
            );
        }
        results.insert(encounter_id, resolved);
    }

    results
}

/// Offset from a timing label, falling back to its value label
pub fn parse_offset(label: &str, value_label: &str) -> Option<ResolvedTiming> {
    let label = label.to_lowercase();
    let value_label = value_label.trim().to_lowercase();

    if let Some(value) = capture_int(&DAY_RE, &label) {
        return ResolvedTiming::checked(value, TimeUnit::Day);
    }
    if let Some(value) = capture_int(&WEEK_RE, &label) {
        return ResolvedTiming::checked(value, TimeUnit::Week);
    }

    let value = INT_RE
        .find(&value_label)
        .and_then(|m| m.as_str().parse::<i64>().ok())?;
    let unit = if label.contains("week") || value_label.contains("week") {
        TimeUnit::Week
    } else {
        TimeUnit::Day
    };
    ResolvedTiming::checked(value, unit)
}

fn capture_int(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Encounters ordered by resolved offset, unresolved last
///
/// Stable: ties and unresolved encounters keep their input order. Offsets are
/// compared as written (unit is not normalized), matching how visits are
/// sequenced for creation.
pub fn chronological_order<'a>(
    encounters: &'a [Encounter],
    timings: &HashMap<String, ResolvedTiming>,
) -> Vec<(&'a Encounter, Option<ResolvedTiming>)> {
    let mut ordered: Vec<(&Encounter, Option<ResolvedTiming>)> = encounters
        .iter()
        .map(|enc| (enc, timings.get(&enc.id).copied()))
        .collect();

    ordered.sort_by_key(|(_, timing)| match timing {
        Some(t) => (0, t.value),
        None => (1, 0),
    });

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(label: &str, description: &str, value_label: &str) -> Timing {
        Timing {
            label: label.to_string(),
            description: description.to_string(),
            value_label: value_label.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_day_and_week_labels() {
        assert_eq!(parse_offset("Day 1", ""), Some(ResolvedTiming::days(1)));
        assert_eq!(parse_offset("Day -14", ""), Some(ResolvedTiming::days(-14)));
        assert_eq!(parse_offset("DAY+3", ""), Some(ResolvedTiming::days(3)));
        assert_eq!(parse_offset("Week 4", ""), Some(ResolvedTiming::weeks(4)));
    }

    #[test]
    fn test_day_checked_before_week() {
        assert_eq!(
            parse_offset("Week 2 Day 3", ""),
            Some(ResolvedTiming::days(3))
        );
    }

    #[test]
    fn test_value_label_fallback() {
        assert_eq!(parse_offset("Visit 3", "7 days"), Some(ResolvedTiming::days(7)));
        assert_eq!(parse_offset("Visit 3", "2 weeks"), Some(ResolvedTiming::weeks(2)));
        assert_eq!(parse_offset("Week visit", "-2"), Some(ResolvedTiming::weeks(-2)));
        assert_eq!(parse_offset("Unscheduled", "ad hoc"), None);
        assert_eq!(parse_offset("", ""), None);
    }

    #[test]
    fn test_anchor_first_keeps_signs() {
        let t1 = timing("Day 1", "anchor visit", "");
        let t2 = timing("Day -14", "", "");
        let t3 = timing("Week 4", "", "");
        let offsets = scan_offsets([("enc1", &t1), ("enc2", &t2), ("enc3", &t3)]);

        assert_eq!(offsets["enc1"], Some(ResolvedTiming::days(0)));
        assert_eq!(offsets["enc2"], Some(ResolvedTiming::days(-14)));
        assert_eq!(offsets["enc3"], Some(ResolvedTiming::weeks(4)));
    }

    #[test]
    fn test_pre_anchor_values_forced_negative() {
        // Heuristic: anything before the anchor is treated as pre-baseline,
        // whether or not the source wrote a sign.
        let t1 = timing("Day -14", "", "");
        let t2 = timing("Day 7", "", "");
        let t3 = timing("Day 1", "Anchor", "");
        let t4 = timing("Day 7", "", "");
        let offsets = scan_offsets([("a", &t1), ("b", &t2), ("c", &t3), ("d", &t4)]);

        assert_eq!(offsets["a"], Some(ResolvedTiming::days(-14)));
        assert_eq!(offsets["b"], Some(ResolvedTiming::days(-7)));
        assert_eq!(offsets["c"], Some(ResolvedTiming::days(0)));
        assert_eq!(offsets["d"], Some(ResolvedTiming::days(7)));
    }

    #[test]
    fn test_unparseable_timing_recorded_as_none() {
        let t = timing("Unscheduled", "", "");
        let offsets = scan_offsets([("enc", &t)]);
        assert_eq!(offsets["enc"], None);
    }

    #[test]
    fn test_out_of_range_values_are_unresolved() {
        assert_eq!(parse_offset("Day -9223372036854775808", ""), None);
        assert_eq!(parse_offset("Week 9223372036854775807", ""), None);
        assert_eq!(parse_offset("Visit", "1317624576693539402 weeks"), None);
        assert_eq!(
            parse_offset("Week 1317624576693539401", ""),
            Some(ResolvedTiming::weeks(1_317_624_576_693_539_401))
        );

        let t1 = timing("Day -9223372036854775808", "", "");
        let t2 = timing("Day 1", "anchor", "");
        let offsets = scan_offsets([("a", &t1), ("b", &t2)]);
        assert_eq!(offsets["a"], None);
        assert_eq!(offsets["b"], Some(ResolvedTiming::days(0)));

        assert_eq!(ResolvedTiming::weeks(i64::MAX).in_days(), i64::MAX);
    }

    #[test]
    fn test_chronological_order_is_stable_with_unresolved_last() {
        let encounters: Vec<Encounter> = ["u1", "b", "a1", "u2", "a2", "c", "u3"]
            .iter()
            .map(|id| Encounter {
                id: id.to_string(),
                ..Default::default()
            })
            .collect();
        let timings: HashMap<String, ResolvedTiming> = [
            ("b", ResolvedTiming::days(7)),
            ("a1", ResolvedTiming::days(-14)),
            ("a2", ResolvedTiming::weeks(-14)),
            ("c", ResolvedTiming::days(7)),
        ]
        .into_iter()
        .map(|(id, t)| (id.to_string(), t))
        .collect();

        let ordered: Vec<&str> = chronological_order(&encounters, &timings)
            .iter()
            .map(|(enc, _)| enc.id.as_str())
            .collect();

        assert_eq!(ordered, vec!["a1", "a2", "b", "c", "u1", "u2", "u3"]);
    }

    #[test]
    fn test_in_days() {
        assert_eq!(ResolvedTiming::weeks(4).in_days(), 28);
        assert_eq!(ResolvedTiming::weeks(-2).in_days(), -14);
        assert_eq!(ResolvedTiming::days(5).in_days(), 5);
        assert!(ResolvedTiming::days(0).is_anchor());
    }
}
