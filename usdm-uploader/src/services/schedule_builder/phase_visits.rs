//! Phase 2: VISITS
//!
//! Encounters are ordered by resolved offset, then created in two passes:
//! anchor visits (offset 0), then everything else. The first visit processed
//! in an epoch is that epoch's SoA milestone.

use super::{ScheduleBuilder, ScheduleContext, ScheduleStatistics};
use crate::error::OsbResult;
use crate::osb::{CtTerm, NewStudyVisit, TermQuery};
use crate::services::timing_resolver::{chronological_order, resolve_encounter_timings, ResolvedTiming, TimeUnit};
use crate::services::visit_classifier::{contact_mode_preferred_name, VisitType};
use tracing::{debug, info, warn};
use usdm_common::usdm::{Encounter, ScheduleTimeline, StudyDesign};

/// Day unit definition; visit offsets are always sent in days
pub const DAY_UNIT_UID: &str = "UnitDefinition_000364";
pub const WEEK_UNIT_UID: &str = "UnitDefinition_000368";

pub const VISIT_CONTACT_MODE_CODELIST: &str = "Visit Contact Mode";
const SINGLE_VISIT: &str = "SINGLE_VISIT";

/// Split into (anchor visits, remaining visits), each keeping its order
pub fn anchor_first<'a>(
    ordered: Vec<(&'a Encounter, Option<ResolvedTiming>)>,
) -> Vec<(&'a Encounter, Option<ResolvedTiming>)> {
    let (mut anchors, rest): (Vec<_>, Vec<_>) = ordered
        .into_iter()
        .partition(|(_, timing)| timing.map(|t| t.is_anchor()).unwrap_or(false));
    anchors.extend(rest);
    anchors
}

/// Contact-mode term uid for an encounter
pub fn contact_mode_uid(encounter: &Encounter, terms: &[CtTerm], default_uid: &str) -> String {
    encounter
        .contact_modes
        .first()
        .and_then(|mode| contact_mode_preferred_name(&mode.decode))
        .and_then(|name| terms.iter().find(|t| t.sponsor_name() == name))
        .map(|t| t.term_uid.clone())
        .unwrap_or_else(|| default_uid.to_string())
}

impl ScheduleBuilder<'_> {
    pub(super) async fn phase_visits(
        &self,
        design: &StudyDesign,
        ctx: &mut ScheduleContext,
        stats: &mut ScheduleStatistics,
    ) -> OsbResult<()> {
        let Some(timeline) = design.main_timeline() else {
            warn!(design_id = %design.id, "Design has no schedule timeline, no visits created");
            return Ok(());
        };

        info!(study_uid = %self.study_uid, encounters = design.encounters.len(), "Phase 2: VISITS");

        let timings = resolve_encounter_timings(timeline, &design.encounters);
        let ordered = chronological_order(&design.encounters, &timings);

        let window_unit_uid = match ordered.iter().find_map(|(_, t)| *t).map(|t| t.unit) {
            Some(TimeUnit::Week) => WEEK_UNIT_UID,
            _ => DAY_UNIT_UID,
        };

        let contact_terms = match self
            .api
            .list_ct_terms(&TermQuery::codelist_name(VISIT_CONTACT_MODE_CODELIST))
            .await
        {
            Ok(terms) => terms,
            Err(e) => {
                warn!(error = %e, "Contact mode lookup failed, using default contact mode");
                Vec::new()
            }
        };

        for (encounter, timing) in anchor_first(ordered) {
            self.create_visit(timeline, encounter, timing, window_unit_uid, &contact_terms, ctx, stats)
                .await;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_visit(
        &self,
        timeline: &ScheduleTimeline,
        encounter: &Encounter,
        timing: Option<ResolvedTiming>,
        window_unit_uid: &str,
        contact_terms: &[CtTerm],
        ctx: &mut ScheduleContext,
        stats: &mut ScheduleStatistics,
    ) {
        let Some(timing) = timing else {
            warn!(encounter = %encounter.display_name(), "Encounter has no resolvable timing, skipping");
            stats.visits_skipped += 1;
            return;
        };

        let Some(epoch_id) = timeline.epoch_for_encounter(&encounter.id) else {
            warn!(encounter = %encounter.display_name(), "Encounter is not scheduled in any epoch, skipping");
            stats.visits_skipped += 1;
            return;
        };

        let Some(epoch_uid) = ctx.epoch_uids.get(epoch_id).cloned() else {
            warn!(
                encounter = %encounter.display_name(),
                epoch_id = %epoch_id,
                "Epoch was not created, skipping visit"
            );
            stats.visits_skipped += 1;
            return;
        };

        let is_soa_milestone = ctx.claim_first_visit(epoch_id);
        let label = if encounter.label.is_empty() {
            &encounter.name
        } else {
            &encounter.label
        };

        let visit = NewStudyVisit {
            study_epoch_uid: epoch_uid,
            visit_type_uid: VisitType::classify(label).term_uid().to_string(),
            visit_contact_mode_uid: contact_mode_uid(encounter, contact_terms, &self.default_contact_mode_uid),
            time_value: timing.in_days(),
            time_unit_uid: DAY_UNIT_UID.to_string(),
            visit_window_unit_uid: window_unit_uid.to_string(),
            is_global_anchor_visit: timing.is_anchor(),
            is_soa_milestone,
            description: encounter.description.clone(),
            visit_class: SINGLE_VISIT.to_string(),
            visit_subclass: SINGLE_VISIT.to_string(),
            show_visit: true,
        };

        match self.api.create_study_visit(&self.study_uid, &visit).await {
            Ok(created) => {
                debug!(
                    encounter = %encounter.display_name(),
                    visit_uid = %created.uid,
                    time_value = visit.time_value,
                    milestone = is_soa_milestone,
                    "Created study visit"
                );
                ctx.visit_uids.insert(encounter.id.clone(), created.uid);
                stats.visits_created += 1;
            }
            Err(e) => {
                warn!(encounter = %encounter.display_name(), error = %e, "Failed to create study visit");
                stats.visits_failed += 1;
            }
        }
    }
}
