//! Study creation and lookup

use crate::error::UploadResult;
use crate::osb::{NewStudy, OsbApi};
use tracing::{info, warn};
use usdm_common::UsdmDocument;

pub const OFFICIAL_TITLE_TYPE: &str = "Official Study Title";

/// Creation payload for the document's study
pub fn new_study(doc: &UsdmDocument) -> UploadResult<NewStudy> {
    let version = doc.first_version()?;
    let title = version.title_of_type(OFFICIAL_TITLE_TYPE).map(str::to_string);
    if title.is_none() {
        warn!(study = %doc.study.name, "No official study title in document");
    }
    Ok(NewStudy {
        study_acronym: doc.study.name.clone(),
        description: title,
        project_number: None,
    })
}

/// Create the document's study, returning the new study uid
pub async fn create_study(api: &dyn OsbApi, doc: &UsdmDocument) -> UploadResult<String> {
    let study = new_study(doc)?;
    let created = api.create_study(&study).await?;
    info!(study = %study.study_acronym, study_uid = %created.uid, "Created study");
    Ok(created.uid)
}
