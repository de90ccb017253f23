//! usdm-uploader library interface
//!
//! Replicates a USDM study definition into OpenStudyBuilder. Exposed as a
//! library for the binary and for integration tests.

pub mod config;
pub mod error;
pub mod osb;
pub mod pipeline;
pub mod services;

pub use crate::error::{OsbError, OsbResult, UploadError, UploadResult};
pub use crate::pipeline::{StudyUploader, UploadReport};
