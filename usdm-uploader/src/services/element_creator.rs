//! Study element creation

use crate::error::{OsbError, OsbResult};
use crate::osb::{NewStudyElement, OsbApi};
use tracing::{debug, info, warn};
use usdm_common::usdm::{Element, StudyDesign};

const NO_TREATMENT_TYPE_UID: &str = "CTTerm_000143";
const TREATMENT_TYPE_UID: &str = "CTTerm_000144";

/// Element (type, subtype) term uids from the element label
pub fn classify_element(label: &str) -> (&'static str, &'static str) {
    let label = label.to_lowercase();
    if label.contains("screening") {
        (NO_TREATMENT_TYPE_UID, "CTTerm_000150")
    } else if label.contains("check in") || label.contains("run-in") {
        (NO_TREATMENT_TYPE_UID, "CTTerm_000148")
    } else if label.contains("follow up") || label.contains("follow-up") {
        (NO_TREATMENT_TYPE_UID, "CTTerm_000149")
    } else if label.contains("wash out") || label.contains("wash-out") {
        (NO_TREATMENT_TYPE_UID, "CTTerm_000149")
    } else {
        (TREATMENT_TYPE_UID, "CTTerm_000147")
    }
}

/// Display name: the element name unless it is an abbreviation of three characters or fewer
pub fn element_name(element: &Element) -> &str {
    if element.name.chars().count() > 3 {
        &element.name
    } else {
        &element.label
    }
}

pub fn new_element(element: &Element) -> NewStudyElement {
    let name = element_name(element);
    let (code, subtype) = classify_element(name);
    NewStudyElement {
        name: name.to_string(),
        short_name: name.to_string(),
        code: code.to_string(),
        element_subtype_uid: subtype.to_string(),
        start_rule: element.start_rule().unwrap_or_default().to_string(),
        end_rule: element.end_rule().map(str::to_string),
        description: element.description.clone(),
    }
}

/// Create the design's elements; returns how many were created
pub async fn create_study_elements(
    api: &dyn OsbApi,
    design: &StudyDesign,
    study_uid: &str,
) -> OsbResult<usize> {
    let mut created = 0;
    for element in &design.elements {
        let payload = new_element(element);
        match api.create_study_element(study_uid, &payload).await {
            Ok(result) => {
                debug!(
                    element = %payload.name,
                    element_uid = %result.uid,
                    subtype = %payload.element_subtype_uid,
                    "Created study element"
                );
                created += 1;
            }
            Err(OsbError::ValidationRejected(body)) => {
                warn!(element = %payload.name, response = %body, "Study element rejected, skipping");
            }
            Err(e) => return Err(e),
        }
    }

    info!(study_uid = %study_uid, elements = created, "Study elements created");
    Ok(created)
}
