//! Export of a study's USDM definition from OSB

use crate::error::UploadResult;
use crate::osb::{lookup_study_uid, OsbApi};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default file name for a downloaded definition
pub fn default_output_path(study_uid: &str) -> PathBuf {
    PathBuf::from(format!("{}_usdm.json", study_uid))
}

/// Download the USDM definition of `study_id` and write it pretty-printed
///
/// Writes to `output`, or `<study uid>_usdm.json` in the working directory.
pub async fn download_usdm(api: &dyn OsbApi, study_id: &str, output: Option<&Path>) -> UploadResult<PathBuf> {
    let study_uid = lookup_study_uid(api, study_id).await?;
    let definition = api.fetch_usdm(&study_uid).await?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(&study_uid));
    let json = serde_json::to_string_pretty(&definition).map_err(usdm_common::Error::from)?;
    std::fs::write(&path, json).map_err(usdm_common::Error::from)?;

    info!(study_id = %study_id, study_uid = %study_uid, path = %path.display(), "Downloaded USDM definition");
    Ok(path)
}
