//! OpenStudyBuilder (OSB) API
//!
//! [`OsbApi`] is the seam between the upload engine and the remote system.
//! [`OsbClient`] is the HTTP implementation; tests substitute an in-memory fake.
//!
//! List endpoints are read as one bulk page. Create endpoints return the new uid.

pub mod client;
pub mod models;

pub use client::OsbClient;
pub use models::*;

use crate::error::OsbResult;

/// Remote study-management API
///
/// Every mutating method issues exactly one remote write. No method retries.
#[async_trait::async_trait]
pub trait OsbApi: Send + Sync {
    // ------------------------------------------------------------------
    // Studies
    // ------------------------------------------------------------------

    /// Minimal list of all studies (`id` ↔ `uid`)
    async fn list_studies(&self) -> OsbResult<Vec<StudySummary>>;

    async fn create_study(&self, study: &NewStudy) -> OsbResult<Created>;

    /// USDM study definition as exported by OSB
    async fn fetch_usdm(&self, study_uid: &str) -> OsbResult<serde_json::Value>;

    // ------------------------------------------------------------------
    // Concept library
    // ------------------------------------------------------------------

    async fn list_concepts(&self, kind: ConceptKind) -> OsbResult<Vec<ConceptEntry>>;

    /// Create a draft entry; 422 surfaces as `ValidationRejected`
    async fn create_concept(&self, kind: ConceptKind, payload: &ConceptPayload) -> OsbResult<Created>;

    /// Draft → approved
    async fn approve_concept(&self, kind: ConceptKind, uid: &str) -> OsbResult<()>;

    // ------------------------------------------------------------------
    // Controlled terminology
    // ------------------------------------------------------------------

    async fn list_ct_terms(&self, query: &TermQuery) -> OsbResult<Vec<CtTerm>>;

    async fn list_allowed_epoch_configs(&self) -> OsbResult<Vec<EpochConfig>>;

    // ------------------------------------------------------------------
    // Study structure
    // ------------------------------------------------------------------

    async fn list_study_activities(&self, study_uid: &str) -> OsbResult<Vec<StudyActivity>>;

    async fn create_study_activity(
        &self,
        study_uid: &str,
        link: &StudyActivityLink,
    ) -> OsbResult<StudyActivity>;

    async fn create_study_epoch(&self, study_uid: &str, epoch: &NewStudyEpoch) -> OsbResult<Created>;

    async fn create_study_visit(&self, study_uid: &str, visit: &NewStudyVisit) -> OsbResult<Created>;

    async fn create_activity_schedule(
        &self,
        study_uid: &str,
        schedule: &NewActivitySchedule,
    ) -> OsbResult<Created>;

    async fn create_study_arm(&self, study_uid: &str, arm: &NewStudyArm) -> OsbResult<Created>;

    async fn create_study_element(
        &self,
        study_uid: &str,
        element: &NewStudyElement,
    ) -> OsbResult<Created>;

    // ------------------------------------------------------------------
    // Syntax templates and study purpose
    // ------------------------------------------------------------------

    async fn create_template(&self, kind: TemplateKind, template: &NewTemplate) -> OsbResult<Created>;

    /// Draft → approved; a template no longer in draft surfaces as `AlreadyApproved`
    async fn approve_template(&self, kind: TemplateKind, uid: &str) -> OsbResult<Created>;

    async fn create_study_objective(
        &self,
        study_uid: &str,
        objective: &NewStudyObjective,
    ) -> OsbResult<Created>;

    async fn list_study_objectives(&self, study_uid: &str) -> OsbResult<Vec<StudyObjective>>;

    async fn create_study_endpoint(
        &self,
        study_uid: &str,
        endpoint: &NewStudyEndpoint,
    ) -> OsbResult<Created>;

    async fn create_study_criteria(
        &self,
        study_uid: &str,
        criteria: &NewStudyCriteria,
    ) -> OsbResult<Created>;
}

/// Resolve a study uid from its study id
///
/// An unknown id is fatal: nothing downstream can run without the uid.
pub async fn lookup_study_uid(api: &dyn OsbApi, study_id: &str) -> OsbResult<String> {
    let studies = api.list_studies().await?;
    match studies.into_iter().find(|s| s.id == study_id) {
        Some(study) => {
            tracing::debug!(study_id = %study_id, study_uid = %study.uid, "Resolved study uid");
            Ok(study.uid)
        }
        None => Err(crate::error::OsbError::NotFound(format!(
            "Study ID not found: {}",
            study_id
        ))),
    }
}
