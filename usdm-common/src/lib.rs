//! # USDM Common Library
//!
//! Shared code for the USDM → OSB uploader:
//! - USDM study-definition document model
//! - Configuration file loading
//! - Common error type

pub mod config;
pub mod error;
pub mod usdm;

pub use error::{Error, Result};
pub use usdm::UsdmDocument;
