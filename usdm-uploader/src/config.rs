//! Configuration resolution for usdm-uploader
//!
//! The OSB base URL resolves with priority CLI flag → `OSB_BASE_URL`
//! environment variable → TOML config → compiled default.

use crate::services::entity_reconciler::DEFAULT_LIBRARY_NAME;
use crate::services::fuzzy_matcher::DEFAULT_CUTOFF;
use crate::services::study_purpose::TEMPLATE_LIBRARY_NAME;
use crate::services::visit_classifier::DEFAULT_CONTACT_MODE_UID;
use std::time::Duration;
use tracing::{info, warn};
use usdm_common::config::TomlConfig;

/// Environment variable holding the OSB base URL
pub const BASE_URL_ENV: &str = "OSB_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5005/api";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the OSB base URL; trailing slashes are trimmed
pub fn resolve_base_url(cli: Option<&str>, toml_config: &TomlConfig) -> String {
    let env_value = std::env::var(BASE_URL_ENV).ok();

    let candidates = [
        ("command line", non_empty(cli)),
        ("environment", non_empty(env_value.as_deref())),
        ("TOML", non_empty(toml_config.osb_base_url.as_deref())),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(source, _)| *source)
        .collect();
    if sources.len() > 1 {
        warn!(
            "OSB base URL found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let (source, url) = candidates
        .iter()
        .find_map(|(source, value)| value.map(|v| (*source, v)))
        .unwrap_or(("default", DEFAULT_BASE_URL));

    info!("OSB base URL loaded from {}", source);
    url.trim_end_matches('/').to_string()
}

/// Runtime settings for one upload run
#[derive(Debug, Clone, PartialEq)]
pub struct UploaderSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub fuzzy_cutoff: f64,
    /// Library for requested concept entries
    pub library_name: String,
    /// Library for study-specific syntax templates
    pub template_library_name: String,
    pub default_contact_mode_uid: String,
    /// SoA group term for study activity links; OSB's default when unset
    pub soa_group_term_uid: Option<String>,
}

impl Default for UploaderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            fuzzy_cutoff: DEFAULT_CUTOFF,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            template_library_name: TEMPLATE_LIBRARY_NAME.to_string(),
            default_contact_mode_uid: DEFAULT_CONTACT_MODE_UID.to_string(),
            soa_group_term_uid: None,
        }
    }
}

impl UploaderSettings {
    /// Settings from the TOML config plus an optional CLI base URL
    pub fn resolve(cli_base_url: Option<&str>, toml_config: &TomlConfig) -> Self {
        let defaults = Self::default();

        let fuzzy_cutoff = match toml_config.fuzzy_cutoff {
            Some(cutoff) if (0.0..=1.0).contains(&cutoff) => cutoff,
            Some(cutoff) => {
                warn!(
                    "fuzzy_cutoff {} is outside 0.0-1.0, using default {}",
                    cutoff, defaults.fuzzy_cutoff
                );
                defaults.fuzzy_cutoff
            }
            None => defaults.fuzzy_cutoff,
        };

        Self {
            base_url: resolve_base_url(cli_base_url, toml_config),
            request_timeout: toml_config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            fuzzy_cutoff,
            library_name: non_empty(toml_config.library_name.as_deref())
                .map(str::to_string)
                .unwrap_or(defaults.library_name),
            soa_group_term_uid: non_empty(toml_config.soa_group_term_uid.as_deref()).map(str::to_string),
            ..defaults
        }
    }
}
