//! Phase 3: SCHEDULE EDGES
//!
//! For every timeline instance with a created visit, link each of its
//! activities to that visit. Design activities are paired with study
//! activities by case-insensitive name.

use super::{ScheduleBuilder, ScheduleContext, ScheduleStatistics};
use crate::error::OsbResult;
use crate::osb::{NewActivitySchedule, StudyActivity};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use usdm_common::usdm::StudyDesign;

/// Lower-cased activity name → study activity uid; the first study activity wins
pub fn study_activities_by_name(items: &[StudyActivity]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for item in items {
        map.entry(item.activity.name.to_lowercase())
            .or_insert_with(|| item.study_activity_uid.clone());
    }
    map
}

impl ScheduleBuilder<'_> {
    pub(super) async fn phase_schedule(
        &self,
        design: &StudyDesign,
        ctx: &ScheduleContext,
        stats: &mut ScheduleStatistics,
    ) -> OsbResult<()> {
        let Some(timeline) = design.main_timeline() else {
            return Ok(());
        };

        info!(study_uid = %self.study_uid, instances = timeline.instances.len(), "Phase 3: SCHEDULE EDGES");

        let study_activities = self.api.list_study_activities(&self.study_uid).await?;
        let by_name = study_activities_by_name(&study_activities);

        for instance in &timeline.instances {
            let Some(visit_uid) = instance
                .encounter_id
                .as_deref()
                .and_then(|enc| ctx.visit_uids.get(enc))
            else {
                debug!(instance_id = %instance.id, "No visit created for instance");
                continue;
            };

            for activity_id in &instance.activity_ids {
                let Some(activity) = design.activity(activity_id) else {
                    debug!(activity_id = %activity_id, "Activity not in design");
                    continue;
                };

                let Some(study_activity_uid) = by_name.get(&activity.name.to_lowercase()) else {
                    debug!(activity = %activity.name, "No study activity with this name");
                    stats.edges_unmatched += 1;
                    continue;
                };

                let schedule = NewActivitySchedule {
                    study_activity_uid: study_activity_uid.clone(),
                    study_visit_uid: visit_uid.clone(),
                };

                match self.api.create_activity_schedule(&self.study_uid, &schedule).await {
                    Ok(created) => {
                        debug!(
                            activity = %activity.name,
                            visit_uid = %visit_uid,
                            schedule_uid = %created.uid,
                            "Created activity schedule"
                        );
                        stats.edges_created += 1;
                    }
                    Err(e) => {
                        warn!(
                            activity = %activity.name,
                            visit_uid = %visit_uid,
                            error = %e,
                            "Failed to create activity schedule"
                        );
                        stats.edges_failed += 1;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osb::ActivityRef;

    #[test]
    fn test_name_map_is_case_insensitive_first_wins() {
        let items = vec![
            StudyActivity {
                study_activity_uid: "StudyActivity_000001".to_string(),
                activity: ActivityRef {
                    uid: "Activity_1".to_string(),
                    name: "Vital Signs".to_string(),
                },
                order: 1,
            },
            StudyActivity {
                study_activity_uid: "StudyActivity_000002".to_string(),
                activity: ActivityRef {
                    uid: "Activity_2".to_string(),
                    name: "vital signs".to_string(),
                },
                order: 2,
            },
        ];
        let map = study_activities_by_name(&items);
        assert_eq!(map.len(), 1);
        assert_eq!(map["vital signs"], "StudyActivity_000001");
    }
}
