//! USDM study-definition document model
//!
//! Only the parts of the USDM v3 JSON consumed by the uploader are modelled.
//! USDM writers emit `null` for absent optional values as often as they omit
//! the key, so most fields go through [`null_default`].

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Deserialize `null` as the type's default value
fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level USDM document (`{"study": {...}}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsdmDocument {
    #[serde(default)]
    pub study: Study,
}

impl UsdmDocument {
    /// Parse a document from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// First study version
    ///
    /// The uploader only ever replicates the first version.
    pub fn first_version(&self) -> Result<&StudyVersion> {
        self.study
            .versions
            .first()
            .ok_or_else(|| Error::InvalidInput("USDM document has no study versions".to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub versions: Vec<StudyVersion>,
}

/// A coded value (`{"code": ..., "decode": ...}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    #[serde(default, deserialize_with = "null_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_default")]
    pub decode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyVersion {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub titles: Vec<StudyTitle>,
    #[serde(default, deserialize_with = "null_default")]
    pub study_designs: Vec<StudyDesign>,
    #[serde(default, deserialize_with = "null_default")]
    pub biomedical_concepts: Vec<BiomedicalConcept>,
    #[serde(default, deserialize_with = "null_default")]
    pub eligibility_criterion_items: Vec<EligibilityCriterionItem>,
}

impl StudyVersion {
    /// Title whose type decode equals `decode` (e.g. "Official Study Title")
    pub fn title_of_type(&self, decode: &str) -> Option<&str> {
        self.titles
            .iter()
            .find(|t| t.title_type.decode == decode)
            .map(|t| t.text.as_str())
    }

    pub fn biomedical_concept(&self, id: &str) -> Option<&BiomedicalConcept> {
        self.biomedical_concepts.iter().find(|bc| bc.id == id)
    }

    pub fn criterion_item(&self, id: &str) -> Option<&EligibilityCriterionItem> {
        self.eligibility_criterion_items.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyTitle {
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub title_type: Code,
}

/// One study design; read-only input to the pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDesign {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub arms: Vec<Arm>,
    #[serde(default, deserialize_with = "null_default")]
    pub epochs: Vec<Epoch>,
    #[serde(default, deserialize_with = "null_default")]
    pub elements: Vec<Element>,
    #[serde(default, deserialize_with = "null_default")]
    pub study_cells: Vec<StudyCell>,
    #[serde(default, deserialize_with = "null_default")]
    pub encounters: Vec<Encounter>,
    #[serde(default, deserialize_with = "null_default")]
    pub activities: Vec<Activity>,
    #[serde(default, deserialize_with = "null_default")]
    pub objectives: Vec<Objective>,
    #[serde(default, deserialize_with = "null_default")]
    pub eligibility_criteria: Vec<EligibilityCriterion>,
    #[serde(default, deserialize_with = "null_default")]
    pub schedule_timelines: Vec<ScheduleTimeline>,
}

impl StudyDesign {
    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// The design's schedule timeline (USDM allows several; the first is the main one)
    pub fn main_timeline(&self) -> Option<&ScheduleTimeline> {
        self.schedule_timelines.first()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arm {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub arm_type: Code,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Epoch {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub epoch_type: Code,
}

/// Free-text transition rule (`{"text": ...}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionRule {
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default)]
    pub transition_start_rule: Option<TransitionRule>,
    #[serde(default)]
    pub transition_end_rule: Option<TransitionRule>,
}

impl Element {
    pub fn start_rule(&self) -> Option<&str> {
        self.transition_start_rule.as_ref().map(|r| r.text.as_str())
    }

    pub fn end_rule(&self) -> Option<&str> {
        self.transition_end_rule.as_ref().map(|r| r.text.as_str())
    }
}

/// Arm × epoch cell, the explicit link between epochs and elements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyCell {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub arm_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub epoch_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub element_ids: Vec<String>,
}

/// A visit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub contact_modes: Vec<Code>,
}

impl Encounter {
    /// Label for log output, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTimeline {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub instances: Vec<ScheduledInstance>,
    #[serde(default, deserialize_with = "null_default")]
    pub timings: Vec<Timing>,
}

impl ScheduleTimeline {
    /// Epoch of the first instance that schedules `encounter_id`
    pub fn epoch_for_encounter(&self, encounter_id: &str) -> Option<&str> {
        self.instances
            .iter()
            .find(|i| i.encounter_id.as_deref() == Some(encounter_id))
            .and_then(|i| i.epoch_id.as_deref())
    }
}

/// Binds an encounter to an epoch and the activities performed there
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledInstance {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default)]
    pub encounter_id: Option<String>,
    #[serde(default)]
    pub epoch_id: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub activity_ids: Vec<String>,
}

/// Timing descriptor
///
/// The instance a timing describes is the one it is measured *from*
/// (`relativeFromScheduledInstanceId`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub value_label: String,
    #[serde(default)]
    pub relative_from_scheduled_instance_id: Option<String>,
    #[serde(default)]
    pub relative_to_scheduled_instance_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub child_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub biomedical_concept_ids: Vec<String>,
}

impl Activity {
    /// Label, else name, else description
    pub fn display_label(&self) -> &str {
        [&self.label, &self.name, &self.description]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiomedicalConcept {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_default")]
    pub level: Code,
    #[serde(default, deserialize_with = "null_default")]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_default")]
    pub level: Code,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCriterion {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub category: Code,
    #[serde(default)]
    pub criterion_item_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCriterionItem {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
}
