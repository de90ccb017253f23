//! In-memory OSB
//!
//! Implements `OsbApi` over plain collections, records every mutating call and
//! lets tests inject failures per entity.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde_json::Value;
use usdm_uploader::error::{OsbError, OsbResult};
use usdm_uploader::osb::*;

/// A mutating call as seen by the fake
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateStudy(NewStudy),
    CreateConcept { kind: ConceptKind, payload: ConceptPayload },
    ApproveConcept { kind: ConceptKind, uid: String },
    LinkActivity(StudyActivityLink),
    CreateEpoch(NewStudyEpoch),
    CreateVisit(NewStudyVisit),
    CreateSchedule(NewActivitySchedule),
    CreateArm(NewStudyArm),
    CreateElement(NewStudyElement),
    CreateTemplate { kind: TemplateKind, template: NewTemplate },
    ApproveTemplate { kind: TemplateKind, uid: String },
    CreateObjective(NewStudyObjective),
    CreateEndpoint(NewStudyEndpoint),
    CreateCriteria(NewStudyCriteria),
}

/// Backing data and failure switches
#[derive(Debug, Default)]
pub struct FakeState {
    pub studies: Vec<StudySummary>,
    pub usdm: HashMap<String, Value>,
    pub concepts: HashMap<ConceptKind, Vec<ConceptEntry>>,
    pub ct_terms: HashMap<TermQuery, Vec<CtTerm>>,
    pub epoch_configs: Vec<EpochConfig>,
    pub study_activities: Vec<StudyActivity>,
    pub study_objectives: Vec<StudyObjective>,
    pub templates: HashMap<String, String>,
    pub calls: Vec<Call>,

    /// Concept names whose creation is rejected with a validation error
    pub reject_concepts: HashSet<String>,
    /// Every concept approval fails with a 500
    pub fail_concept_approvals: bool,
    /// Activity uids whose study link is rejected with a validation error
    pub reject_links: HashSet<String>,
    /// Listing study activities fails with a 500
    pub fail_study_activity_list: bool,
    /// Visit descriptions whose creation fails with a 500
    pub fail_visits: HashSet<String>,
    /// Study activity uids whose schedule creation fails with a 500
    pub fail_schedules: HashSet<String>,
    /// Template approvals answer "already approved"
    pub templates_already_approved: bool,

    next_id: u32,
}

impl FakeState {
    fn next_uid(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{:06}", prefix, self.next_id)
    }
}

fn server_error(what: &str) -> OsbError {
    OsbError::Remote {
        status: 500,
        body: format!("injected failure: {}", what),
    }
}

#[derive(Debug, Default)]
pub struct FakeOsb {
    state: Mutex<FakeState>,
}

impl FakeOsb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the backing state
    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_study(&self, id: &str, uid: &str) {
        self.with_state(|s| {
            s.studies.push(StudySummary {
                id: id.to_string(),
                uid: uid.to_string(),
            })
        });
    }

    pub fn add_concept(&self, kind: ConceptKind, entry: ConceptEntry) {
        self.with_state(|s| s.concepts.entry(kind).or_default().push(entry));
    }

    pub fn add_study_activity(&self, study_activity_uid: &str, activity_uid: &str, name: &str) {
        self.with_state(|s| {
            let order = s.study_activities.len() as i64 + 1;
            s.study_activities.push(StudyActivity {
                study_activity_uid: study_activity_uid.to_string(),
                activity: ActivityRef {
                    uid: activity_uid.to_string(),
                    name: name.to_string(),
                },
                order,
            })
        });
    }

    pub fn set_terms(&self, query: TermQuery, terms: Vec<CtTerm>) {
        self.with_state(|s| s.ct_terms.insert(query, terms));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| pred(c)).count())
    }

    pub fn concept_creates(&self, kind: ConceptKind) -> Vec<ConceptPayload> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    Call::CreateConcept { kind: k, payload } if *k == kind => Some(payload.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn links(&self) -> Vec<StudyActivityLink> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    Call::LinkActivity(link) => Some(link.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn visits(&self) -> Vec<NewStudyVisit> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    Call::CreateVisit(visit) => Some(visit.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn epochs(&self) -> Vec<NewStudyEpoch> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    Call::CreateEpoch(epoch) => Some(epoch.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn schedules(&self) -> Vec<NewActivitySchedule> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    Call::CreateSchedule(schedule) => Some(schedule.clone()),
                    _ => None,
                })
                .collect()
        })
    }
}

fn concept_prefix(kind: ConceptKind) -> &'static str {
    match kind {
        ConceptKind::Group => "ActivityGroup",
        ConceptKind::Subgroup => "ActivitySubGroup",
        ConceptKind::Activity => "Activity",
    }
}

#[async_trait::async_trait]
impl OsbApi for FakeOsb {
    async fn list_studies(&self) -> OsbResult<Vec<StudySummary>> {
        Ok(self.with_state(|s| s.studies.clone()))
    }

    async fn create_study(&self, study: &NewStudy) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateStudy(study.clone()));
            let uid = s.next_uid("Study");
            s.studies.push(StudySummary {
                id: study.study_acronym.clone(),
                uid: uid.clone(),
            });
            Ok(Created::new(uid))
        })
    }

    async fn fetch_usdm(&self, study_uid: &str) -> OsbResult<Value> {
        self.with_state(|s| {
            s.usdm
                .get(study_uid)
                .cloned()
                .ok_or_else(|| OsbError::NotFound(study_uid.to_string()))
        })
    }

    async fn list_concepts(&self, kind: ConceptKind) -> OsbResult<Vec<ConceptEntry>> {
        Ok(self.with_state(|s| s.concepts.get(&kind).cloned().unwrap_or_default()))
    }

    async fn create_concept(&self, kind: ConceptKind, payload: &ConceptPayload) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateConcept {
                kind,
                payload: payload.clone(),
            });
            if s.reject_concepts.contains(&payload.name) {
                return Err(OsbError::ValidationRejected(format!("{} rejected", payload.name)));
            }
            let uid = s.next_uid(concept_prefix(kind));
            let activity_groupings = payload
                .activity_groupings
                .iter()
                .flatten()
                .map(|g| ActivityGrouping {
                    activity_group_uid: Some(g.activity_group_uid.clone()),
                    activity_subgroup_uid: Some(g.activity_subgroup_uid.clone()),
                })
                .collect();
            s.concepts.entry(kind).or_default().push(ConceptEntry {
                uid: uid.clone(),
                name: payload.name.clone(),
                activity_groupings,
            });
            Ok(Created::new(uid))
        })
    }

    async fn approve_concept(&self, kind: ConceptKind, uid: &str) -> OsbResult<()> {
        self.with_state(|s| {
            s.calls.push(Call::ApproveConcept {
                kind,
                uid: uid.to_string(),
            });
            if s.fail_concept_approvals {
                Err(server_error("approval"))
            } else {
                Ok(())
            }
        })
    }

    async fn list_ct_terms(&self, query: &TermQuery) -> OsbResult<Vec<CtTerm>> {
        Ok(self.with_state(|s| s.ct_terms.get(query).cloned().unwrap_or_default()))
    }

    async fn list_allowed_epoch_configs(&self) -> OsbResult<Vec<EpochConfig>> {
        Ok(self.with_state(|s| s.epoch_configs.clone()))
    }

    async fn list_study_activities(&self, _study_uid: &str) -> OsbResult<Vec<StudyActivity>> {
        self.with_state(|s| {
            if s.fail_study_activity_list {
                Err(server_error("study activity list"))
            } else {
                Ok(s.study_activities.clone())
            }
        })
    }

    async fn create_study_activity(
        &self,
        _study_uid: &str,
        link: &StudyActivityLink,
    ) -> OsbResult<StudyActivity> {
        self.with_state(|s| {
            s.calls.push(Call::LinkActivity(link.clone()));
            if s.reject_links.contains(&link.activity_uid) {
                return Err(OsbError::ValidationRejected("link rejected".to_string()));
            }
            let name = s
                .concepts
                .get(&ConceptKind::Activity)
                .and_then(|items| items.iter().find(|i| i.uid == link.activity_uid))
                .map(|i| i.name.clone())
                .unwrap_or_default();
            let created = StudyActivity {
                study_activity_uid: s.next_uid("StudyActivity"),
                activity: ActivityRef {
                    uid: link.activity_uid.clone(),
                    name,
                },
                order: s.study_activities.len() as i64 + 1,
            };
            s.study_activities.push(created.clone());
            Ok(created)
        })
    }

    async fn create_study_epoch(&self, _study_uid: &str, epoch: &NewStudyEpoch) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateEpoch(epoch.clone()));
            Ok(Created::new(s.next_uid("StudyEpoch")))
        })
    }

    async fn create_study_visit(&self, _study_uid: &str, visit: &NewStudyVisit) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateVisit(visit.clone()));
            if s.fail_visits.contains(&visit.description) {
                return Err(server_error("visit"));
            }
            Ok(Created::new(s.next_uid("StudyVisit")))
        })
    }

    async fn create_activity_schedule(
        &self,
        _study_uid: &str,
        schedule: &NewActivitySchedule,
    ) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateSchedule(schedule.clone()));
            if s.fail_schedules.contains(&schedule.study_activity_uid) {
                return Err(server_error("schedule"));
            }
            Ok(Created::new(s.next_uid("StudyActivitySchedule")))
        })
    }

    async fn create_study_arm(&self, _study_uid: &str, arm: &NewStudyArm) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateArm(arm.clone()));
            Ok(Created::new(s.next_uid("StudyArm")))
        })
    }

    async fn create_study_element(
        &self,
        _study_uid: &str,
        element: &NewStudyElement,
    ) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateElement(element.clone()));
            Ok(Created::new(s.next_uid("StudyElement")))
        })
    }

    async fn create_template(&self, kind: TemplateKind, template: &NewTemplate) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateTemplate {
                kind,
                template: template.clone(),
            });
            let uid = s.next_uid("Template");
            s.templates.insert(uid.clone(), template.name.clone());
            Ok(Created::new(uid))
        })
    }

    async fn approve_template(&self, kind: TemplateKind, uid: &str) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::ApproveTemplate {
                kind,
                uid: uid.to_string(),
            });
            if s.templates_already_approved {
                Err(OsbError::AlreadyApproved(uid.to_string()))
            } else {
                Ok(Created::new(uid))
            }
        })
    }

    async fn create_study_objective(
        &self,
        _study_uid: &str,
        objective: &NewStudyObjective,
    ) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateObjective(objective.clone()));
            let uid = s.next_uid("StudyObjective");
            let name = s
                .templates
                .get(&objective.objective_template_uid)
                .cloned()
                .unwrap_or_default();
            s.study_objectives.push(StudyObjective {
                study_objective_uid: uid.clone(),
                objective: ObjectiveRef { name },
            });
            Ok(Created::new(uid))
        })
    }

    async fn list_study_objectives(&self, _study_uid: &str) -> OsbResult<Vec<StudyObjective>> {
        Ok(self.with_state(|s| s.study_objectives.clone()))
    }

    async fn create_study_endpoint(
        &self,
        _study_uid: &str,
        endpoint: &NewStudyEndpoint,
    ) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateEndpoint(endpoint.clone()));
            Ok(Created::new(s.next_uid("StudyEndpoint")))
        })
    }

    async fn create_study_criteria(
        &self,
        _study_uid: &str,
        criteria: &NewStudyCriteria,
    ) -> OsbResult<Created> {
        self.with_state(|s| {
            s.calls.push(Call::CreateCriteria(criteria.clone()));
            Ok(Created::new(s.next_uid("StudyCriteria")))
        })
    }
}
