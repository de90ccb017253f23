//! OSB HTTP client
//!
//! Thin `reqwest` wrapper. All status-code interpretation happens in
//! [`classify_failure`] so callers only ever see [`OsbError`] variants.

use super::models::*;
use super::OsbApi;
use crate::error::{OsbError, OsbResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("usdm-uploader/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/json, text/plain, */*";

/// Page size for list endpoints; the uploader reads one bulk page
pub const PAGE_SIZE: u32 = 1000;

/// Body fragment OSB returns when approving a non-draft entity
const NOT_IN_DRAFT: &str = "isn't in draft status";

/// Keys under which OSB create responses carry the new identifier
const UID_KEYS: &[&str] = &[
    "uid",
    "study_activity_schedule_uid",
    "study_objective_uid",
    "study_endpoint_uid",
    "study_criteria_uid",
    "arm_uid",
    "element_uid",
];

/// Paginated list envelope
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// OSB API client
pub struct OsbClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OsbClient {
    /// Create a client for `base_url` (e.g. `http://localhost:5005/api`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> OsbResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| OsbError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> OsbResult<T> {
        let url = self.url(path);
        tracing::debug!(url = %url, "GET");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .query(query)
            .send()
            .await?;
        let response = check_status(response, &url).await?;

        response
            .json()
            .await
            .map_err(|e| OsbError::Parse(format!("{}: {}", url, e)))
    }

    async fn get_items<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> OsbResult<Vec<T>> {
        let mut query = vec![
            ("page_number", "1".to_string()),
            ("page_size", PAGE_SIZE.to_string()),
        ];
        query.extend(extra.iter().cloned());

        let page: Page<T> = self.get_json(path, &query).await?;
        Ok(page.items)
    }

    async fn post_value<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> OsbResult<serde_json::Value> {
        let url = self.url(path);
        tracing::debug!(url = %url, "POST");

        let mut request = self
            .http_client
            .post(&url)
            .header(reqwest::header::ACCEPT, ACCEPT);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = check_status(request.send().await?, &url).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| OsbError::Parse(format!("{}: {}", url, e)))
    }

    async fn post_created<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> OsbResult<Created> {
        let value = self.post_value(path, Some(body)).await?;
        extract_uid(&value)
            .map(Created::new)
            .ok_or_else(|| OsbError::Parse(format!("No uid in response from {}", path)))
    }
}

/// Pass successful responses through, classify everything else
async fn check_status(response: reqwest::Response, url: &str) -> OsbResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(url = %url, status = status.as_u16(), body = %body, "OSB request failed");
    Err(classify_failure(status.as_u16(), body))
}

/// Map a non-2xx status and body onto the error taxonomy
pub fn classify_failure(status: u16, body: String) -> OsbError {
    match status {
        404 => OsbError::NotFound(body),
        422 => OsbError::ValidationRejected(body),
        400 | 409 if body.contains(NOT_IN_DRAFT) => OsbError::AlreadyApproved(body),
        _ => OsbError::Remote { status, body },
    }
}

/// First identifier key present in a create response
fn extract_uid(value: &serde_json::Value) -> Option<String> {
    UID_KEYS
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .find(|uid| !uid.is_empty())
        .map(str::to_string)
}

#[async_trait::async_trait]
impl OsbApi for OsbClient {
    async fn list_studies(&self) -> OsbResult<Vec<StudySummary>> {
        self.get_json("studies/list", &[("minimal", "true".to_string())])
            .await
    }

    async fn create_study(&self, study: &NewStudy) -> OsbResult<Created> {
        self.post_created("studies", study).await
    }

    async fn fetch_usdm(&self, study_uid: &str) -> OsbResult<serde_json::Value> {
        self.get_json(&format!("usdm/v3/studyDefinitions/{}", study_uid), &[])
            .await
    }

    async fn list_concepts(&self, kind: ConceptKind) -> OsbResult<Vec<ConceptEntry>> {
        self.get_items(&format!("concepts/activities/{}", kind.path()), &[])
            .await
    }

    async fn create_concept(&self, kind: ConceptKind, payload: &ConceptPayload) -> OsbResult<Created> {
        self.post_created(&format!("concepts/activities/{}", kind.path()), payload)
            .await
    }

    async fn approve_concept(&self, kind: ConceptKind, uid: &str) -> OsbResult<()> {
        self.post_value::<()>(
            &format!(
                "concepts/activities/{}/{}/approvals?cascade=false",
                kind.path(),
                uid
            ),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_ct_terms(&self, query: &TermQuery) -> OsbResult<Vec<CtTerm>> {
        self.get_items("ct/terms", &query.params()).await
    }

    async fn list_allowed_epoch_configs(&self) -> OsbResult<Vec<EpochConfig>> {
        self.get_json("epochs/allowed-configs", &[]).await
    }

    async fn list_study_activities(&self, study_uid: &str) -> OsbResult<Vec<StudyActivity>> {
        self.get_items(&format!("studies/{}/study-activities", study_uid), &[])
            .await
    }

    async fn create_study_activity(
        &self,
        study_uid: &str,
        link: &StudyActivityLink,
    ) -> OsbResult<StudyActivity> {
        let path = format!("studies/{}/study-activities", study_uid);
        let value = self.post_value(&path, Some(link)).await?;
        serde_json::from_value(value).map_err(|e| OsbError::Parse(format!("{}: {}", path, e)))
    }

    async fn create_study_epoch(&self, study_uid: &str, epoch: &NewStudyEpoch) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-epochs", study_uid), epoch)
            .await
    }

    async fn create_study_visit(&self, study_uid: &str, visit: &NewStudyVisit) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-visits", study_uid), visit)
            .await
    }

    async fn create_activity_schedule(
        &self,
        study_uid: &str,
        schedule: &NewActivitySchedule,
    ) -> OsbResult<Created> {
        self.post_created(
            &format!("studies/{}/study-activity-schedules", study_uid),
            schedule,
        )
        .await
    }

    async fn create_study_arm(&self, study_uid: &str, arm: &NewStudyArm) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-arms", study_uid), arm)
            .await
    }

    async fn create_study_element(
        &self,
        study_uid: &str,
        element: &NewStudyElement,
    ) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-elements", study_uid), element)
            .await
    }

    async fn create_template(&self, kind: TemplateKind, template: &NewTemplate) -> OsbResult<Created> {
        self.post_created(kind.path(), template).await
    }

    async fn approve_template(&self, kind: TemplateKind, uid: &str) -> OsbResult<Created> {
        let value = self
            .post_value::<()>(&format!("{}/{}/approvals", kind.path(), uid), None)
            .await?;
        Ok(Created::new(extract_uid(&value).unwrap_or_else(|| uid.to_string())))
    }

    async fn create_study_objective(
        &self,
        study_uid: &str,
        objective: &NewStudyObjective,
    ) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-objectives", study_uid), objective)
            .await
    }

    async fn list_study_objectives(&self, study_uid: &str) -> OsbResult<Vec<StudyObjective>> {
        self.get_items(&format!("studies/{}/study-objectives", study_uid), &[])
            .await
    }

    async fn create_study_endpoint(
        &self,
        study_uid: &str,
        endpoint: &NewStudyEndpoint,
    ) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-endpoints", study_uid), endpoint)
            .await
    }

    async fn create_study_criteria(
        &self,
        study_uid: &str,
        criteria: &NewStudyCriteria,
    ) -> OsbResult<Created> {
        self.post_created(&format!("studies/{}/study-criteria", study_uid), criteria)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = OsbClient::new("http://localhost:5005/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5005/api");
        assert_eq!(
            client.url("/ct/terms"),
            "http://localhost:5005/api/ct/terms"
        );
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(classify_failure(404, String::new()), OsbError::NotFound(_)));
        assert!(classify_failure(422, "name exists".into()).is_validation_rejected());
        assert!(classify_failure(
            400,
            "The object with UID 'ObjectiveTemplate_000012' isn't in draft status.".into()
        )
        .is_already_approved());
        assert!(matches!(
            classify_failure(400, "bad payload".into()),
            OsbError::Remote { status: 400, .. }
        ));
        assert!(matches!(
            classify_failure(500, String::new()),
            OsbError::Remote { status: 500, .. }
        ));
    }

    #[test]
    fn test_extract_uid_prefers_uid() {
        assert_eq!(
            extract_uid(&json!({"uid": "StudyEpoch_000001", "study_uid": "Study_000001"})),
            Some("StudyEpoch_000001".to_string())
        );
        assert_eq!(
            extract_uid(&json!({"study_objective_uid": "StudyObjective_000003"})),
            Some("StudyObjective_000003".to_string())
        );
        assert_eq!(extract_uid(&json!({"uid": ""})), None);
        assert_eq!(extract_uid(&serde_json::Value::Null), None);
    }
}
