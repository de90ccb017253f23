//! Phase 1: EPOCHS
//!
//! Each design epoch's type code picks an "Epoch Type" term, and the term's
//! sponsor name picks an allowed epoch configuration, which supplies the
//! concrete type/subtype pair.

use super::{element_for_epoch, ScheduleBuilder, ScheduleContext, ScheduleStatistics};
use crate::error::{OsbError, OsbResult};
use crate::osb::{CtTerm, EpochConfig, NewStudyEpoch, TermQuery};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use usdm_common::usdm::{Epoch, StudyDesign};

/// "Epoch Type" codelist
pub const EPOCH_TYPE_CODELIST_UID: &str = "C99079";

const SCREENING_EPOCH_CODE: &str = "C48262";
const FOLLOW_UP_EPOCH_CODE: &str = "C99158";

/// Type code for an epoch
///
/// An epoch named exactly "Screening" or "Follow-up" (any case) overrides the
/// source code. The label stands in for an empty name.
pub fn epoch_type_code(epoch: &Epoch) -> &str {
    let name = if epoch.name.trim().is_empty() {
        &epoch.label
    } else {
        &epoch.name
    };
    match name.trim().to_lowercase().as_str() {
        "screening" => SCREENING_EPOCH_CODE,
        "follow-up" => FOLLOW_UP_EPOCH_CODE,
        _ => &epoch.epoch_type.code,
    }
}

/// Allowed configuration for `term`
///
/// Only configurations whose subtype is itself a term of the codelist are
/// eligible.
pub fn select_epoch_config<'c>(
    term: &CtTerm,
    terms: &[CtTerm],
    configs: &'c [EpochConfig],
) -> Option<&'c EpochConfig> {
    let term_uids: HashSet<&str> = terms.iter().map(|t| t.term_uid.as_str()).collect();
    configs.iter().find(|c| {
        c.type_name.eq_ignore_ascii_case(term.sponsor_name()) && term_uids.contains(c.subtype.as_str())
    })
}

impl ScheduleBuilder<'_> {
    pub(super) async fn phase_epochs(
        &self,
        design: &StudyDesign,
        ctx: &mut ScheduleContext,
        stats: &mut ScheduleStatistics,
    ) -> OsbResult<()> {
        info!(study_uid = %self.study_uid, epochs = design.epochs.len(), "Phase 1: EPOCHS");

        let terms = self
            .api
            .list_ct_terms(&TermQuery::codelist_uid(EPOCH_TYPE_CODELIST_UID))
            .await?;
        let configs = self.api.list_allowed_epoch_configs().await?;

        for (index, epoch) in design.epochs.iter().enumerate() {
            let code = epoch_type_code(epoch);
            if code.is_empty() {
                warn!(epoch_id = %epoch.id, "Epoch has no type code, skipping");
                stats.epochs_skipped += 1;
                continue;
            }

            let Some(term) = terms.iter().find(|t| t.concept_id() == code) else {
                warn!(epoch_id = %epoch.id, code = %code, "No epoch type term for code, skipping");
                stats.epochs_skipped += 1;
                continue;
            };

            let Some(config) = select_epoch_config(term, &terms, &configs) else {
                warn!(
                    epoch_id = %epoch.id,
                    term = %term.sponsor_name(),
                    "No allowed epoch configuration for term, skipping"
                );
                stats.epochs_skipped += 1;
                continue;
            };

            let element = element_for_epoch(design, epoch);
            let payload = NewStudyEpoch {
                study_uid: self.study_uid.clone(),
                epoch_type: Some(config.epoch_type.clone()),
                epoch_subtype: config.subtype.clone(),
                start_rule: element.and_then(|e| e.start_rule()).map(str::to_string),
                end_rule: element.and_then(|e| e.end_rule()).map(str::to_string),
                order: (index + 1) as u32,
                description: epoch.description.clone(),
            };

            match self.api.create_study_epoch(&self.study_uid, &payload).await {
                Ok(created) => {
                    debug!(epoch_id = %epoch.id, epoch_uid = %created.uid, subtype = %config.subtype_name, "Created study epoch");
                    ctx.epoch_uids.insert(epoch.id.clone(), created.uid);
                    stats.epochs_created += 1;
                }
                Err(OsbError::ValidationRejected(body)) => {
                    warn!(epoch_id = %epoch.id, response = %body, "Study epoch rejected, skipping");
                    stats.epochs_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
