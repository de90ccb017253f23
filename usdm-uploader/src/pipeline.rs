//! Study upload pipeline
//!
//! # Stage Progression
//! ARMS → ELEMENTS → ACTIVITIES → SCHEDULE → OBJECTIVES → CRITERIA
//!
//! Stages run strictly in sequence: the schedule needs the study activities
//! linked by the activity stage, and every stage after it references uids
//! created before it. Arms, elements and objectives come from the first study
//! design; activities, schedules and criteria cover every design.

use crate::config::UploaderSettings;
use crate::error::{UploadError, UploadResult};
use crate::osb::OsbApi;
use crate::services::{
    arm_creator, element_creator, study_purpose, ActivityResolution, ActivityResolver,
    EntityReconciler, FuzzyMatcher, ScheduleBuilder, ScheduleStatistics,
};
use tracing::info;
use usdm_common::UsdmDocument;

/// What one upload created
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub arms: usize,
    pub elements: usize,
    pub activities: ActivityResolution,
    /// One entry per study design
    pub schedules: Vec<ScheduleStatistics>,
    pub objectives: usize,
    pub criteria: usize,
}

/// Replicates a USDM study definition into an existing OSB study
pub struct StudyUploader<'a> {
    api: &'a dyn OsbApi,
    settings: UploaderSettings,
}

impl<'a> StudyUploader<'a> {
    pub fn new(api: &'a dyn OsbApi, settings: UploaderSettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &UploaderSettings {
        &self.settings
    }

    /// Upload `doc` into the study `study_uid`
    ///
    /// `study_number` names the placeholder group for activities with no
    /// library match.
    pub async fn upload(&self, doc: &UsdmDocument, study_uid: &str, study_number: &str) -> UploadResult<UploadReport> {
        let version = doc.first_version()?;
        let design = version
            .study_designs
            .first()
            .ok_or_else(|| UploadError::InvalidInput("study version has no study designs".to_string()))?;

        info!(study_uid = %study_uid, study = %doc.study.name, designs = version.study_designs.len(), "Starting upload");

        let mut report = UploadReport {
            arms: arm_creator::create_study_arms(self.api, design, study_uid).await?,
            ..Default::default()
        };
        report.elements = element_creator::create_study_elements(self.api, design, study_uid).await?;

        let reconciler = EntityReconciler::with_library(self.api, self.settings.library_name.clone());
        let resolver = ActivityResolver::new(self.api, reconciler, FuzzyMatcher::new(self.settings.fuzzy_cutoff))
            .with_soa_group_term(self.settings.soa_group_term_uid.clone());
        report.activities = resolver.resolve(version, study_uid, study_number).await?;

        let builder = ScheduleBuilder::new(self.api, study_uid)
            .with_default_contact_mode(self.settings.default_contact_mode_uid.clone());
        for design in &version.study_designs {
            let (_, stats) = builder.build(design).await?;
            report.schedules.push(stats);
        }

        let library = &self.settings.template_library_name;
        report.objectives = study_purpose::create_objectives(self.api, design, study_uid, library).await?;
        report.criteria = study_purpose::create_criteria(self.api, version, study_uid, library).await?;

        info!(
            study_uid = %study_uid,
            arms = report.arms,
            elements = report.elements,
            activities_linked = report.activities.linked,
            objectives = report.objectives,
            criteria = report.criteria,
            "Upload complete"
        );

        Ok(report)
    }
}
