//! Objectives, endpoints and eligibility criteria
//!
//! Each item goes through a user-defined syntax template: create the template,
//! approve it, then instantiate it in the study. A template that is already
//! approved is used as-is.

use crate::error::{OsbError, OsbResult};
use crate::osb::{
    NewStudyCriteria, NewStudyEndpoint, NewStudyObjective, NewTemplate, OsbApi, StudyObjective,
    TemplateKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};
use usdm_common::usdm::{EligibilityCriterion, Objective, StudyDesign, StudyVersion};

/// Default library for study-specific syntax templates
pub const TEMPLATE_LIBRARY_NAME: &str = "User Defined";

pub const PRIMARY_OBJECTIVE_LEVEL_UID: &str = "C85826_OBJPRIM";
pub const SECONDARY_OBJECTIVE_LEVEL_UID: &str = "C85827_OBJSEC";
pub const PRIMARY_ENDPOINT_LEVEL_UID: &str = "C98772_OUTMSPRI";
pub const SECONDARY_ENDPOINT_LEVEL_UID: &str = "C98781_OUTMSSEC";

pub const INCLUSION_CRITERIA_TYPE_UID: &str = "CTTerm_000028";
pub const EXCLUSION_CRITERIA_TYPE_UID: &str = "CTTerm_000029";

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Square brackets are template parameter syntax in OSB
pub fn template_text(text: &str) -> String {
    text.replace('[', "(").replace(']', ")")
}

pub fn strip_html(text: &str) -> String {
    HTML_TAG_RE.replace_all(text, "").trim().to_string()
}

pub fn objective_level_uid(decode: &str) -> &'static str {
    if decode.eq_ignore_ascii_case("primary objective") {
        PRIMARY_OBJECTIVE_LEVEL_UID
    } else {
        SECONDARY_OBJECTIVE_LEVEL_UID
    }
}

pub fn endpoint_level_uid(decode: &str) -> &'static str {
    if decode.eq_ignore_ascii_case("primary endpoint") {
        PRIMARY_ENDPOINT_LEVEL_UID
    } else {
        SECONDARY_ENDPOINT_LEVEL_UID
    }
}

/// Inclusion when the category decode starts with "in", exclusion otherwise
pub fn criteria_type_uid(criterion: &EligibilityCriterion) -> &'static str {
    if criterion.category.decode.to_lowercase().starts_with("in") {
        INCLUSION_CRITERIA_TYPE_UID
    } else {
        EXCLUSION_CRITERIA_TYPE_UID
    }
}

/// Create and approve a template; returns the uid to instantiate
pub async fn create_approved_template(
    api: &dyn OsbApi,
    kind: TemplateKind,
    template: &NewTemplate,
) -> OsbResult<String> {
    let created = api.create_template(kind, template).await?;
    match api.approve_template(kind, &created.uid).await {
        Ok(approved) => Ok(approved.uid),
        Err(OsbError::AlreadyApproved(_)) => {
            debug!(template_uid = %created.uid, "Template already approved");
            Ok(created.uid)
        }
        Err(e) => Err(e),
    }
}

fn find_study_objective<'o>(existing: &'o [StudyObjective], objective: &Objective) -> Option<&'o str> {
    let templated = template_text(&objective.text);
    existing
        .iter()
        .find(|so| so.objective.name == objective.text || so.objective.name == templated)
        .map(|so| so.study_objective_uid.as_str())
}

/// Create the design's objectives and their endpoints
///
/// Returns the number of study objectives created.
pub async fn create_objectives(
    api: &dyn OsbApi,
    design: &StudyDesign,
    study_uid: &str,
    library_name: &str,
) -> OsbResult<usize> {
    let mut created = 0;

    for objective in &design.objectives {
        let template = NewTemplate {
            name: template_text(&objective.text),
            library_name: library_name.to_string(),
            study_uid: study_uid.to_string(),
            type_uid: None,
        };
        let template_uid = create_approved_template(api, TemplateKind::Objective, &template).await?;

        api.create_study_objective(
            study_uid,
            &NewStudyObjective {
                objective_template_uid: template_uid,
                objective_level_uid: objective_level_uid(&objective.level.decode).to_string(),
            },
        )
        .await?;
        created += 1;

        let existing = api.list_study_objectives(study_uid).await?;
        let Some(study_objective_uid) = find_study_objective(&existing, objective) else {
            warn!(objective = %objective.text, "Study objective not found after creation, skipping endpoints");
            continue;
        };

        for endpoint in &objective.endpoints {
            let template = NewTemplate {
                name: template_text(&endpoint.text),
                library_name: library_name.to_string(),
                study_uid: study_uid.to_string(),
                type_uid: None,
            };
            let template_uid = create_approved_template(api, TemplateKind::Endpoint, &template).await?;

            api.create_study_endpoint(
                study_uid,
                &NewStudyEndpoint {
                    endpoint_template_uid: template_uid,
                    study_objective_uid: study_objective_uid.to_string(),
                    endpoint_level_uid: endpoint_level_uid(&endpoint.level.decode).to_string(),
                    endpoint_sublevel_uid: None,
                },
            )
            .await?;
        }
    }

    info!(study_uid = %study_uid, objectives = created, "Study objectives created");
    Ok(created)
}

/// Create eligibility criteria from every design of the version
///
/// Returns the number of study criteria created.
pub async fn create_criteria(
    api: &dyn OsbApi,
    version: &StudyVersion,
    study_uid: &str,
    library_name: &str,
) -> OsbResult<usize> {
    let mut created = 0;

    for criterion in version.study_designs.iter().flat_map(|d| &d.eligibility_criteria) {
        let raw = criterion
            .criterion_item_id
            .as_deref()
            .and_then(|id| version.criterion_item(id))
            .map(|item| item.text.as_str())
            .unwrap_or_default();
        let text = strip_html(raw);
        if text.is_empty() {
            warn!(criterion_id = %criterion.id, "Criterion has no text, skipping");
            continue;
        }

        let template = NewTemplate {
            name: template_text(&text),
            library_name: library_name.to_string(),
            study_uid: study_uid.to_string(),
            type_uid: Some(criteria_type_uid(criterion).to_string()),
        };
        let template_uid = create_approved_template(api, TemplateKind::Criteria, &template).await?;

        api.create_study_criteria(
            study_uid,
            &NewStudyCriteria {
                criteria_template_uid: template_uid,
                parameter_terms: Vec::new(),
            },
        )
        .await?;
        created += 1;
    }

    info!(study_uid = %study_uid, criteria = created, "Study criteria created");
    Ok(created)
}
