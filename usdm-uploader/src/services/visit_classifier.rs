//! Visit type classification
//!
//! Maps a visit label onto the OSB "Visit Type" codelist through an ordered
//! keyword table. First match wins, so table order decides every overlap:
//! "follow-up treatment" is a follow-up visit, and "pre-screening" is caught by
//! the earlier "screening" rule.

/// OSB visit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitType {
    Screening,
    PreScreening,
    FollowUp,
    Washout,
    Treatment,
    PreTreatment,
    NoTreatment,
    Randomization,
    RunIn,
    Surgery,
    Other,
}

/// Ordered keyword rules; a label matching any keyword of a row gets that row's type
const RULES: &[(&[&str], VisitType)] = &[
    (&["screening"], VisitType::Screening),
    (&["pre-screening"], VisitType::PreScreening),
    (&["follow up", "follow-up"], VisitType::FollowUp),
    (&["washout", "wash out"], VisitType::Washout),
    (&["treatment"], VisitType::Treatment),
    (&["pre-treatment"], VisitType::PreTreatment),
    (&["no-treatment"], VisitType::NoTreatment),
    (&["randomisation", "randomization"], VisitType::Randomization),
    (&["run-in", "check in", "check-in"], VisitType::RunIn),
    (&["surgery"], VisitType::Surgery),
];

impl VisitType {
    /// Classify a visit label (case-insensitive substring match)
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();
        RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| label.contains(k)))
            .map(|(_, visit_type)| *visit_type)
            .unwrap_or(VisitType::Other)
    }

    /// OSB term uid
    pub fn term_uid(&self) -> &'static str {
        match self {
            VisitType::Screening => "CTTerm_000186",
            VisitType::PreScreening => "CTTerm_000184",
            VisitType::FollowUp => "CTTerm_000182",
            VisitType::Washout => "CTTerm_000192",
            VisitType::Treatment => "CTTerm_000191",
            VisitType::PreTreatment => "CTTerm_000181",
            VisitType::NoTreatment => "CTTerm_000194",
            VisitType::Randomization => "CTTerm_000183",
            VisitType::RunIn => "CTTerm_000188",
            VisitType::Surgery => "CTTerm_000189",
            VisitType::Other => "CTTerm_000190",
        }
    }
}

/// Fallback "Visit Contact Mode" term when a decode has no mapping
pub const DEFAULT_CONTACT_MODE_UID: &str = "CTTerm_000082";

/// Sponsor-preferred OSB contact-mode name for a USDM contact-mode decode
pub fn contact_mode_preferred_name(decode: &str) -> Option<&'static str> {
    match decode {
        "In person" => Some("On Site Visit"),
        "Telephone call" => Some("Phone Contact"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_labels() {
        assert_eq!(VisitType::classify("Screening 1"), VisitType::Screening);
        assert_eq!(VisitType::classify("Follow-up Visit"), VisitType::FollowUp);
        assert_eq!(VisitType::classify("Wash out"), VisitType::Washout);
        assert_eq!(VisitType::classify("Treatment Week 2"), VisitType::Treatment);
        assert_eq!(VisitType::classify("Randomisation"), VisitType::Randomization);
        assert_eq!(VisitType::classify("Check in"), VisitType::RunIn);
        assert_eq!(VisitType::classify("Surgery"), VisitType::Surgery);
        assert_eq!(VisitType::classify("Baseline"), VisitType::Other);
        assert_eq!(VisitType::classify(""), VisitType::Other);
    }

    #[test]
    fn test_follow_up_beats_treatment() {
        assert_eq!(
            VisitType::classify("Post-treatment follow-up"),
            VisitType::FollowUp
        );
    }

    #[test]
    fn test_earlier_rules_shadow_prefixed_variants() {
        // "pre-screening" contains "screening", "pre-treatment" and
        // "no-treatment" contain "treatment"; the earlier rows win.
        assert_eq!(VisitType::classify("Pre-screening"), VisitType::Screening);
        assert_eq!(VisitType::classify("Pre-treatment"), VisitType::Treatment);
        assert_eq!(VisitType::classify("No-treatment"), VisitType::Treatment);
    }

    #[test]
    fn test_classification_is_case_insensitive_and_stable() {
        for label in ["FOLLOW UP", "follow up", "Follow Up"] {
            assert_eq!(VisitType::classify(label), VisitType::FollowUp);
            assert_eq!(VisitType::classify(label).term_uid(), "CTTerm_000182");
        }
    }

    #[test]
    fn test_contact_mode_mapping() {
        assert_eq!(contact_mode_preferred_name("In person"), Some("On Site Visit"));
        assert_eq!(contact_mode_preferred_name("Telephone call"), Some("Phone Contact"));
        assert_eq!(contact_mode_preferred_name("Video call"), None);
        assert_eq!(contact_mode_preferred_name(""), None);
    }
}
