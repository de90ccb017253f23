//! Tests for OSB base URL and settings resolution
//!
//! Tests that touch OSB_BASE_URL are marked #[serial] so they do not race.

use serial_test::serial;
use std::time::Duration;
use usdm_common::config::{LoggingConfig, TomlConfig};
use usdm_uploader::config::{resolve_base_url, UploaderSettings, BASE_URL_ENV, DEFAULT_BASE_URL};

fn toml_with_url(url: Option<&str>) -> TomlConfig {
    TomlConfig {
        osb_base_url: url.map(str::to_string),
        request_timeout_secs: None,
        fuzzy_cutoff: None,
        library_name: None,
        soa_group_term_uid: None,
        logging: LoggingConfig::default(),
    }
}

#[test]
#[serial]
fn test_cli_overrides_env_and_toml() {
    std::env::set_var(BASE_URL_ENV, "http://env:5005/api");
    let url = resolve_base_url(Some("http://cli:5005/api/"), &toml_with_url(Some("http://toml/api")));
    assert_eq!(url, "http://cli:5005/api");
    std::env::remove_var(BASE_URL_ENV);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    std::env::set_var(BASE_URL_ENV, "http://env:5005/api");
    let url = resolve_base_url(None, &toml_with_url(Some("http://toml/api")));
    assert_eq!(url, "http://env:5005/api");
    std::env::remove_var(BASE_URL_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    std::env::remove_var(BASE_URL_ENV);
    let url = resolve_base_url(None, &toml_with_url(Some("http://toml/api//")));
    assert_eq!(url, "http://toml/api");
}

#[test]
#[serial]
fn test_default_when_nothing_set() {
    std::env::remove_var(BASE_URL_ENV);
    assert_eq!(resolve_base_url(None, &toml_with_url(None)), DEFAULT_BASE_URL);
}

#[test]
#[serial]
fn test_blank_values_are_ignored() {
    std::env::set_var(BASE_URL_ENV, "   ");
    let url = resolve_base_url(Some(""), &toml_with_url(Some("http://toml/api")));
    assert_eq!(url, "http://toml/api");
    std::env::remove_var(BASE_URL_ENV);
}

#[test]
#[serial]
fn test_settings_from_toml() {
    std::env::remove_var(BASE_URL_ENV);
    let toml = TomlConfig {
        osb_base_url: Some("http://osb.example/api".to_string()),
        request_timeout_secs: Some(90),
        fuzzy_cutoff: Some(0.8),
        library_name: Some("Sponsor".to_string()),
        soa_group_term_uid: Some("CTTerm_000066".to_string()),
        logging: LoggingConfig::default(),
    };
    let settings = UploaderSettings::resolve(None, &toml);
    assert_eq!(settings.base_url, "http://osb.example/api");
    assert_eq!(settings.request_timeout, Duration::from_secs(90));
    assert_eq!(settings.fuzzy_cutoff, 0.8);
    assert_eq!(settings.library_name, "Sponsor");
    assert_eq!(settings.template_library_name, "User Defined");
    assert_eq!(settings.soa_group_term_uid.as_deref(), Some("CTTerm_000066"));
}

#[test]
#[serial]
fn test_out_of_range_cutoff_uses_default() {
    std::env::remove_var(BASE_URL_ENV);
    let mut toml = toml_with_url(None);
    toml.fuzzy_cutoff = Some(1.5);
    let settings = UploaderSettings::resolve(None, &toml);
    assert_eq!(settings, UploaderSettings::default());
}
