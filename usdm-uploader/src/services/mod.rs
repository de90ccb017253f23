//! Upload engine
//!
//! Core resolution logic (timings, visit types, fuzzy matching, library
//! reconciliation, activities, schedule) plus the one-shot creators for study
//! structure and purpose.

pub mod activity_resolver;
pub mod arm_creator;
pub mod element_creator;
pub mod entity_reconciler;
pub mod fuzzy_matcher;
pub mod schedule_builder;
pub mod study_creator;
pub mod study_purpose;
pub mod timing_resolver;
pub mod usdm_downloader;
pub mod visit_classifier;

pub use activity_resolver::{ActivityResolution, ActivityResolver, PostedActivitySet};
pub use entity_reconciler::{ConceptSpec, EntityReconciler};
pub use fuzzy_matcher::{FuzzyMatcher, Similarity, TieBreak};
pub use schedule_builder::{ScheduleBuilder, ScheduleContext, ScheduleStatistics};
pub use timing_resolver::{ResolvedTiming, TimeUnit};
pub use visit_classifier::VisitType;
