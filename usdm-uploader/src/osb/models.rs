//! OSB request/response types
//!
//! Responses are deserialized leniently (`#[serde(default)]`): OSB returns
//! far more fields than the uploader needs and omits some on older servers.

use serde::{Deserialize, Serialize};

/// Identifier returned by any create or approve call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub uid: String,
}

impl Created {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Entry of the minimal study list
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StudySummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudy {
    pub study_acronym: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_number: Option<String>,
}

/// Library activity referenced by a study activity
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivityRef {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
}

/// Activity already linked into a study
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StudyActivity {
    #[serde(default)]
    pub study_activity_uid: String,
    #[serde(default)]
    pub activity: ActivityRef,
    #[serde(default)]
    pub order: i64,
}

/// Concept-library collections the uploader reconciles against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConceptKind {
    Group,
    Subgroup,
    Activity,
}

impl ConceptKind {
    /// Path segment under `/concepts/activities/`
    pub fn path(&self) -> &'static str {
        match self {
            ConceptKind::Group => "activity-groups",
            ConceptKind::Subgroup => "activity-sub-groups",
            ConceptKind::Activity => "activities",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConceptKind::Group => "group",
            ConceptKind::Subgroup => "subgroup",
            ConceptKind::Activity => "activity",
        }
    }
}

impl std::fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Group/subgroup placement of a library activity
///
/// OSB has used both `activity_group_uid` and `activity_grouping_uid` spellings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ActivityGrouping {
    #[serde(default, alias = "activity_grouping_uid")]
    pub activity_group_uid: Option<String>,
    #[serde(default, alias = "activity_subgrouping_uid")]
    pub activity_subgroup_uid: Option<String>,
}

/// Entry of a concept-library list (group, subgroup or activity)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConceptEntry {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    /// Only populated for activities
    #[serde(default)]
    pub activity_groupings: Vec<ActivityGrouping>,
}

/// Grouping reference in an activity creation payload
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupingRef {
    pub activity_group_uid: String,
    pub activity_subgroup_uid: String,
}

/// Creation payload for a concept-library entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConceptPayload {
    pub name: String,
    pub name_sentence_case: String,
    pub definition: String,
    pub abbreviation: String,
    pub library_name: String,
    /// Parent groups (subgroups only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_groups: Option<Vec<String>>,
    /// Placement (activities only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_groupings: Option<Vec<GroupingRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_rationale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_data_collected: Option<bool>,
}

/// Link of a library activity into a study
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudyActivityLink {
    pub activity_uid: String,
    pub activity_group_uid: String,
    pub activity_subgroup_uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soa_group_term_uid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CtTermName {
    #[serde(default)]
    pub sponsor_preferred_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CtTermAttributes {
    #[serde(default)]
    pub concept_id: String,
    #[serde(default)]
    pub definition: String,
}

/// Controlled-terminology term
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CtTerm {
    #[serde(default)]
    pub term_uid: String,
    #[serde(default)]
    pub name: CtTermName,
    #[serde(default)]
    pub attributes: CtTermAttributes,
}

impl CtTerm {
    pub fn sponsor_name(&self) -> &str {
        &self.name.sponsor_preferred_name
    }

    pub fn concept_id(&self) -> &str {
        &self.attributes.concept_id
    }
}

/// Selector for a controlled-terminology term list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermQuery {
    CodelistUid(String),
    CodelistName(String),
}

impl TermQuery {
    pub fn codelist_uid(uid: impl Into<String>) -> Self {
        TermQuery::CodelistUid(uid.into())
    }

    pub fn codelist_name(name: impl Into<String>) -> Self {
        TermQuery::CodelistName(name.into())
    }

    /// Query parameters for `/ct/terms`
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            TermQuery::CodelistUid(uid) => vec![("codelist_uid", uid.clone())],
            TermQuery::CodelistName(name) => vec![
                ("codelist_name", name.clone()),
                ("is_sponsor", "false".to_string()),
            ],
        }
    }
}

/// Allowed epoch type/subtype combination
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EpochConfig {
    #[serde(rename = "type", default)]
    pub epoch_type: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub subtype_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyEpoch {
    pub study_uid: String,
    pub epoch_type: Option<String>,
    pub epoch_subtype: String,
    pub start_rule: Option<String>,
    pub end_rule: Option<String>,
    /// 1-based
    pub order: u32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyVisit {
    pub study_epoch_uid: String,
    pub visit_type_uid: String,
    pub visit_contact_mode_uid: String,
    /// Offset from the anchor visit, in days
    pub time_value: i64,
    pub time_unit_uid: String,
    pub visit_window_unit_uid: String,
    pub is_global_anchor_visit: bool,
    pub is_soa_milestone: bool,
    pub description: String,
    pub visit_class: String,
    pub visit_subclass: String,
    pub show_visit: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewActivitySchedule {
    pub study_activity_uid: String,
    pub study_visit_uid: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyArm {
    pub arm_type_uid: String,
    pub name: String,
    pub short_name: String,
    pub randomization_group: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyElement {
    pub name: String,
    pub short_name: String,
    pub code: String,
    pub element_subtype_uid: String,
    pub start_rule: String,
    pub end_rule: Option<String>,
    pub description: String,
}

/// Syntax-template collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Objective,
    Endpoint,
    Criteria,
}

impl TemplateKind {
    pub fn path(&self) -> &'static str {
        match self {
            TemplateKind::Objective => "objective-templates",
            TemplateKind::Endpoint => "endpoint-templates",
            TemplateKind::Criteria => "criteria-templates",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewTemplate {
    pub name: String,
    pub library_name: String,
    pub study_uid: String,
    /// Criteria type (inclusion/exclusion), criteria templates only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyObjective {
    pub objective_template_uid: String,
    pub objective_level_uid: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyEndpoint {
    pub endpoint_template_uid: String,
    pub study_objective_uid: String,
    pub endpoint_level_uid: String,
    pub endpoint_sublevel_uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewStudyCriteria {
    pub criteria_template_uid: String,
    pub parameter_terms: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObjectiveRef {
    #[serde(default)]
    pub name: String,
}

/// Objective already attached to a study
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StudyObjective {
    #[serde(default)]
    pub study_objective_uid: String,
    #[serde(default)]
    pub objective: ObjectiveRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_grouping_accepts_both_spellings() {
        let a: ActivityGrouping = serde_json::from_value(json!({
            "activity_group_uid": "ActivityGroup_000001",
            "activity_subgroup_uid": "ActivitySubGroup_000001"
        }))
        .unwrap();
        let b: ActivityGrouping = serde_json::from_value(json!({
            "activity_grouping_uid": "ActivityGroup_000001",
            "activity_subgrouping_uid": "ActivitySubGroup_000001"
        }))
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_concept_payload_omits_unused_fields() {
        let payload = ConceptPayload {
            name: "vital signs".into(),
            name_sentence_case: "vital signs".into(),
            definition: "Auto-generated group for vital signs".into(),
            abbreviation: "VIT".into(),
            library_name: "Requested".into(),
            activity_groups: None,
            activity_groupings: None,
            request_rationale: None,
            is_data_collected: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("activity_groups").is_none());
        assert!(value.get("activity_groupings").is_none());
        assert_eq!(value["abbreviation"], "VIT");
    }

    #[test]
    fn test_epoch_config_type_rename() {
        let cfg: EpochConfig = serde_json::from_value(json!({
            "type": "C101526_TREATMENT",
            "type_name": "Treatment",
            "subtype": "C101526",
            "subtype_name": "Treatment"
        }))
        .unwrap();
        assert_eq!(cfg.epoch_type, "C101526_TREATMENT");
    }

    #[test]
    fn test_term_query_params() {
        let q = TermQuery::codelist_name("Visit Contact Mode");
        assert_eq!(
            q.params(),
            vec![
                ("codelist_name", "Visit Contact Mode".to_string()),
                ("is_sponsor", "false".to_string())
            ]
        );
        assert_eq!(
            TermQuery::codelist_uid("C99079").params(),
            vec![("codelist_uid", "C99079".to_string())]
        );
    }
}
