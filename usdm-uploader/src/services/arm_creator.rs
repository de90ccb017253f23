//! Study arm creation
//!
//! The USDM arm type decode is matched to an "Arm Type" term through a short
//! keyword list. Treatment arms are created as investigational arms.

use crate::error::{OsbError, OsbResult};
use crate::osb::{CtTerm, NewStudyArm, OsbApi, TermQuery};
use tracing::{debug, info, warn};
use usdm_common::usdm::{Arm, StudyDesign};

pub const ARM_TYPE_CODELIST: &str = "Arm Type";

const ARM_TYPE_KEYWORDS: [&str; 4] = ["placebo", "investigational", "comparator", "observational"];

/// Lower-cased arm type decode, with any treatment arm read as investigational
pub fn normalize_arm_type(decode: &str) -> String {
    let decode = decode.to_lowercase();
    if decode.contains("treatment") {
        "investigational".to_string()
    } else {
        decode
    }
}

/// First term sharing a keyword with the arm type
///
/// Keywords are tried in order; within a keyword, terms in list order.
pub fn select_arm_type<'t>(arm_type_decode: &str, terms: &'t [CtTerm]) -> Option<&'t CtTerm> {
    let decode = normalize_arm_type(arm_type_decode);
    ARM_TYPE_KEYWORDS
        .iter()
        .filter(|k| decode.contains(*k))
        .find_map(|k| {
            terms
                .iter()
                .find(|t| t.sponsor_name().to_lowercase().contains(k))
        })
}

fn new_arm(arm: &Arm, arm_type_uid: &str) -> NewStudyArm {
    NewStudyArm {
        arm_type_uid: arm_type_uid.to_string(),
        name: arm.name.clone(),
        short_name: arm.name.clone(),
        randomization_group: arm.id.clone(),
        code: arm.name.clone(),
        description: arm.description.clone(),
    }
}

/// Create the design's arms; returns how many were created
pub async fn create_study_arms(api: &dyn OsbApi, design: &StudyDesign, study_uid: &str) -> OsbResult<usize> {
    let terms = api
        .list_ct_terms(&TermQuery::codelist_name(ARM_TYPE_CODELIST))
        .await?;

    let mut created = 0;
    for arm in &design.arms {
        let Some(term) = select_arm_type(&arm.arm_type.decode, &terms) else {
            warn!(arm = %arm.name, arm_type = %arm.arm_type.decode, "No arm type term matches, skipping");
            continue;
        };

        match api.create_study_arm(study_uid, &new_arm(arm, &term.term_uid)).await {
            Ok(result) => {
                debug!(arm = %arm.name, arm_uid = %result.uid, arm_type = %term.sponsor_name(), "Created study arm");
                created += 1;
            }
            Err(OsbError::ValidationRejected(body)) => {
                warn!(arm = %arm.name, response = %body, "Study arm rejected, skipping");
            }
            Err(e) => return Err(e),
        }
    }

    info!(study_uid = %study_uid, arms = created, "Study arms created");
    Ok(created)
}
