//! Study schedule builder
//!
//! Replicates one study design's schedule in three phases, each completing
//! before the next begins:
//!
//! EPOCHS → VISITS → SCHEDULE EDGES
//!
//! - **EPOCHS** ([`phase_epochs`]): one study epoch per design epoch, source order
//! - **VISITS** ([`phase_visits`]): one study visit per encounter with a resolved
//!   timing, anchor visits first
//! - **SCHEDULE EDGES** ([`phase_schedule`]): visit × study activity links from
//!   the timeline instances
//!
//! Uids created by earlier phases are carried in a [`ScheduleContext`] owned by
//! the caller of [`ScheduleBuilder::build`].

use crate::error::OsbResult;
use crate::osb::OsbApi;
use crate::services::visit_classifier::DEFAULT_CONTACT_MODE_UID;
use std::collections::{HashMap, HashSet};
use tracing::info;
use usdm_common::usdm::{Element, Epoch, StudyDesign};

mod phase_epochs;
mod phase_schedule;
mod phase_visits;

pub use phase_epochs::{epoch_type_code, EPOCH_TYPE_CODELIST_UID};
pub use phase_visits::{DAY_UNIT_UID, VISIT_CONTACT_MODE_CODELIST, WEEK_UNIT_UID};

/// Uids created while building one design's schedule
#[derive(Debug, Clone, Default)]
pub struct ScheduleContext {
    /// USDM epoch id → study epoch uid
    pub epoch_uids: HashMap<String, String>,
    /// USDM encounter id → study visit uid
    pub visit_uids: HashMap<String, String>,
    /// Epochs whose first visit has been processed
    milestone_epochs: HashSet<String>,
}

impl ScheduleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a visit is processed for `epoch_id`
    ///
    /// The claim stands even if that visit's creation later fails.
    pub fn claim_first_visit(&mut self, epoch_id: &str) -> bool {
        self.milestone_epochs.insert(epoch_id.to_string())
    }
}

/// Per-phase counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStatistics {
    pub epochs_created: usize,
    pub epochs_skipped: usize,
    pub visits_created: usize,
    /// No timing, or no created epoch to place the visit in
    pub visits_skipped: usize,
    pub visits_failed: usize,
    pub edges_created: usize,
    /// Activity with no matching study activity
    pub edges_unmatched: usize,
    pub edges_failed: usize,
}

/// Element tied to an epoch
///
/// Prefers an explicit study cell for the epoch (its first element). Without
/// one, falls back to pairing by the last character of the two ids.
pub fn element_for_epoch<'d>(design: &'d StudyDesign, epoch: &Epoch) -> Option<&'d Element> {
    let from_cell = design
        .study_cells
        .iter()
        .filter(|cell| cell.epoch_id == epoch.id)
        .find_map(|cell| cell.element_ids.first())
        .and_then(|element_id| design.elements.iter().find(|e| &e.id == element_id));
    if from_cell.is_some() {
        return from_cell;
    }

    let suffix = epoch.id.chars().last()?;
    design
        .elements
        .iter()
        .find(|e| e.id.chars().last() == Some(suffix))
}

/// Schedule builder for one study
pub struct ScheduleBuilder<'a> {
    api: &'a dyn OsbApi,
    study_uid: String,
    default_contact_mode_uid: String,
}

impl<'a> ScheduleBuilder<'a> {
    pub fn new(api: &'a dyn OsbApi, study_uid: impl Into<String>) -> Self {
        Self {
            api,
            study_uid: study_uid.into(),
            default_contact_mode_uid: DEFAULT_CONTACT_MODE_UID.to_string(),
        }
    }

    /// Contact-mode term used when a visit's contact mode has no mapping
    pub fn with_default_contact_mode(mut self, term_uid: impl Into<String>) -> Self {
        self.default_contact_mode_uid = term_uid.into();
        self
    }

    pub fn study_uid(&self) -> &str {
        &self.study_uid
    }

    /// Build the schedule for `design`
    ///
    /// Per-visit and per-edge failures are logged and counted. Failures of the
    /// lookups a phase depends on abort the build.
    pub async fn build(&self, design: &StudyDesign) -> OsbResult<(ScheduleContext, ScheduleStatistics)> {
        let mut ctx = ScheduleContext::new();
        let mut stats = ScheduleStatistics::default();

        info!(study_uid = %self.study_uid, design_id = %design.id, "Building study schedule");

        self.phase_epochs(design, &mut ctx, &mut stats).await?;
        self.phase_visits(design, &mut ctx, &mut stats).await?;
        self.phase_schedule(design, &ctx, &mut stats).await?;

        info!(
            study_uid = %self.study_uid,
            design_id = %design.id,
            epochs = stats.epochs_created,
            visits = stats.visits_created,
            visits_failed = stats.visits_failed,
            edges = stats.edges_created,
            edges_failed = stats.edges_failed,
            "Study schedule built"
        );

        Ok((ctx, stats))
    }
}
