//! Study activity resolution
//!
//! Walks every activity of every design and links a library activity into the
//! study for it.
//!
//! # Decision tree
//! - **Grouping activity** (description contains "grouping activity"): each child
//!   - without biomedical concepts: fuzzy search the library by the child's label;
//!     link the hit, or reconcile a group/subgroup named after the parent's
//!     description, create the activity under it and link that
//!   - with biomedical concepts: for each concept, match its synonyms against the
//!     library and link every hit; concepts without a hit are skipped
//! - **Other activities**
//!   - without biomedical concepts: fuzzy search by name; link the hit, or create
//!     under the `TBD_<study number>` group/subgroup and link
//!   - with biomedical concepts: as for grouping children
//!
//! Links are checked against the study activities present when the run
//! started, plus everything linked during the run.

use crate::error::{OsbError, OsbResult};
use crate::osb::{ConceptEntry, ConceptKind, OsbApi, StudyActivity, StudyActivityLink};
use crate::services::entity_reconciler::{ConceptSpec, EntityReconciler, GROUPING_MARKER};
use crate::services::fuzzy_matcher::FuzzyMatcher;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use usdm_common::usdm::{Activity, StudyDesign, StudyVersion};

/// Prefix of the fallback group/subgroup for unmatched activities
pub const PLACEHOLDER_GROUP_PREFIX: &str = "TBD_";

/// Whether an activity is a composite whose schedulable content is its children
pub fn is_grouping_activity(activity: &Activity) -> bool {
    activity.description.to_lowercase().contains(GROUPING_MARKER)
}

/// Activities already linked into the target study
#[derive(Debug, Clone, Default)]
pub struct PostedActivitySet {
    study_activity_uids: HashSet<String>,
    by_activity: HashMap<String, String>,
}

impl PostedActivitySet {
    pub fn from_study_activities(items: &[StudyActivity]) -> Self {
        let mut set = Self::default();
        for item in items {
            set.record(item);
        }
        set
    }

    pub fn record(&mut self, item: &StudyActivity) {
        if item.study_activity_uid.is_empty() {
            return;
        }
        self.study_activity_uids
            .insert(item.study_activity_uid.clone());
        if !item.activity.uid.is_empty() {
            self.by_activity
                .insert(item.activity.uid.clone(), item.study_activity_uid.clone());
        }
    }

    pub fn contains(&self, study_activity_uid: &str) -> bool {
        self.study_activity_uids.contains(study_activity_uid)
    }

    /// Study activity already linking `activity_uid`, if any
    pub fn linked_study_activity(&self, activity_uid: &str) -> Option<&str> {
        self.by_activity
            .get(activity_uid)
            .filter(|uid| self.contains(uid))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.study_activity_uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.study_activity_uids.is_empty()
    }
}

/// Library activity plus the group/subgroup it is linked under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub activity_uid: String,
    pub group_uid: String,
    pub subgroup_uid: String,
}

impl LinkTarget {
    /// Target from a library entry's first grouping
    pub fn from_library(entry: &ConceptEntry) -> Option<Self> {
        let grouping = entry.activity_groupings.first()?;
        Some(Self {
            activity_uid: entry.uid.clone(),
            group_uid: grouping.activity_group_uid.clone()?,
            subgroup_uid: grouping.activity_subgroup_uid.clone()?,
        })
    }
}

/// Link target of a library hit; a hit without a grouping counts as unmatched
fn library_target(entry: &ConceptEntry, summary: &mut ActivityResolution) -> Option<LinkTarget> {
    let target = LinkTarget::from_library(entry);
    if target.is_none() {
        warn!(activity_uid = %entry.uid, "Library activity has no grouping, cannot link");
        summary.unmatched += 1;
    }
    target
}

/// Counters for one resolution run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityResolution {
    /// New study activities created
    pub linked: usize,
    /// Link skipped because the activity was already in the study
    pub already_linked: usize,
    /// Concepts with no library match, or library hits without a grouping
    pub unmatched: usize,
    /// Items skipped because OSB rejected a payload
    pub rejected: usize,
}

/// Resolves and links study activities
pub struct ActivityResolver<'a> {
    api: &'a dyn OsbApi,
    reconciler: EntityReconciler<'a>,
    matcher: FuzzyMatcher,
    soa_group_term_uid: Option<String>,
}

impl<'a> ActivityResolver<'a> {
    pub fn new(api: &'a dyn OsbApi, reconciler: EntityReconciler<'a>, matcher: FuzzyMatcher) -> Self {
        Self {
            api,
            reconciler,
            matcher,
            soa_group_term_uid: None,
        }
    }

    /// SoA group term attached to every new study activity
    pub fn with_soa_group_term(mut self, term_uid: Option<String>) -> Self {
        self.soa_group_term_uid = term_uid;
        self
    }

    /// Link every activity of every design into `study_uid`
    pub async fn resolve(
        &self,
        version: &StudyVersion,
        study_uid: &str,
        study_number: &str,
    ) -> OsbResult<ActivityResolution> {
        let mut posted = self.fetch_posted(study_uid).await;
        let mut summary = ActivityResolution::default();

        info!(
            study_uid = %study_uid,
            already_posted = posted.len(),
            "Resolving study activities"
        );

        for design in &version.study_designs {
            for activity in &design.activities {
                if is_grouping_activity(activity) {
                    self.resolve_grouping(version, design, activity, study_uid, &mut posted, &mut summary)
                        .await?;
                } else {
                    self.resolve_standalone(version, activity, study_uid, study_number, &mut posted, &mut summary)
                        .await?;
                }
            }
        }

        info!(
            study_uid = %study_uid,
            linked = summary.linked,
            already_linked = summary.already_linked,
            unmatched = summary.unmatched,
            rejected = summary.rejected,
            "Study activities resolved"
        );

        Ok(summary)
    }

    /// Study activities present before this run; empty if the list call fails
    pub async fn fetch_posted(&self, study_uid: &str) -> PostedActivitySet {
        match self.api.list_study_activities(study_uid).await {
            Ok(items) => PostedActivitySet::from_study_activities(&items),
            Err(e) => {
                warn!(study_uid = %study_uid, error = %e, "Could not fetch posted study activities");
                PostedActivitySet::default()
            }
        }
    }

    async fn resolve_grouping(
        &self,
        version: &StudyVersion,
        design: &StudyDesign,
        parent: &Activity,
        study_uid: &str,
        posted: &mut PostedActivitySet,
        summary: &mut ActivityResolution,
    ) -> OsbResult<()> {
        for child_id in &parent.child_ids {
            let Some(child) = design.activity(child_id) else {
                debug!(parent = %parent.id, child_id = %child_id, "Child activity not in design");
                continue;
            };

            if !child.biomedical_concept_ids.is_empty() {
                self.link_concept_matches(version, child, study_uid, posted, summary)
                    .await?;
                continue;
            }

            let label = child.display_label();
            let target = match self.search_library(label).await {
                Some(entry) => library_target(&entry, summary),
                None => {
                    let name = if child.name.is_empty() { label } else { &child.name };
                    self.create_under_group(&parent.description, name, summary).await?
                }
            };

            if let Some(target) = target {
                self.link(study_uid, &target, posted, summary).await?;
            }
        }
        Ok(())
    }

    async fn resolve_standalone(
        &self,
        version: &StudyVersion,
        activity: &Activity,
        study_uid: &str,
        study_number: &str,
        posted: &mut PostedActivitySet,
        summary: &mut ActivityResolution,
    ) -> OsbResult<()> {
        if !activity.biomedical_concept_ids.is_empty() {
            return self
                .link_concept_matches(version, activity, study_uid, posted, summary)
                .await;
        }

        let target = match self.search_library(&activity.name).await {
            Some(entry) => library_target(&entry, summary),
            None => {
                let placeholder = format!("{}{}", PLACEHOLDER_GROUP_PREFIX, study_number);
                self.create_under_group(&placeholder, &activity.name, summary).await?
            }
        };

        match target {
            Some(target) => self.link(study_uid, &target, posted, summary).await,
            None => Ok(()),
        }
    }

    /// Link a library match for each of the activity's biomedical concepts
    ///
    /// No creation fallback on this branch: unmatched concepts are skipped.
    async fn link_concept_matches(
        &self,
        version: &StudyVersion,
        activity: &Activity,
        study_uid: &str,
        posted: &mut PostedActivitySet,
        summary: &mut ActivityResolution,
    ) -> OsbResult<()> {
        for bc_id in &activity.biomedical_concept_ids {
            let Some(concept) = version.biomedical_concept(bc_id) else {
                debug!(activity = %activity.id, bc_id = %bc_id, "Biomedical concept not in version");
                continue;
            };

            let Some(entry) = self.match_synonyms(&concept.synonyms).await else {
                debug!(activity = %activity.id, bc_id = %bc_id, "No library activity matches concept synonyms");
                summary.unmatched += 1;
                continue;
            };

            if let Some(target) = library_target(&entry, summary) {
                self.link(study_uid, &target, posted, summary).await?;
            }
        }
        Ok(())
    }

    /// Best fuzzy match for `name` in the activity library
    ///
    /// A failed library fetch is treated as a miss.
    pub async fn search_library(&self, name: &str) -> Option<ConceptEntry> {
        let items = match self.api.list_concepts(ConceptKind::Activity).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Activity library search failed");
                return None;
            }
        };

        let index = self
            .matcher
            .best_index(name, items.iter().map(|i| i.name.as_str()))?;
        let entry = items.into_iter().nth(index)?;
        debug!(query = %name, matched = %entry.name, "Library activity matched");
        Some(entry)
    }

    /// First library activity whose name fuzzy-matches any synonym
    pub async fn match_synonyms(&self, synonyms: &[String]) -> Option<ConceptEntry> {
        if synonyms.is_empty() {
            return None;
        }
        let pool: HashSet<String> = synonyms.iter().map(|s| s.to_lowercase()).collect();

        let items = match self.api.list_concepts(ConceptKind::Activity).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Activity library fetch for synonym matching failed");
                return None;
            }
        };

        items
            .into_iter()
            .find(|item| self.matcher.matches_any(&item.name, pool.iter().map(String::as_str)))
    }

    /// Reconcile group and subgroup named `seed`, then the activity under them
    ///
    /// `None`, counted as rejected, when any of the three was rejected by
    /// validation.
    async fn create_under_group(
        &self,
        seed: &str,
        activity_name: &str,
        summary: &mut ActivityResolution,
    ) -> OsbResult<Option<LinkTarget>> {
        let target = self.reconcile_chain(seed, activity_name).await?;
        if target.is_none() {
            warn!(group = %seed, activity = %activity_name, "Library entry rejected, activity not linked");
            summary.rejected += 1;
        }
        Ok(target)
    }

    async fn reconcile_chain(&self, seed: &str, activity_name: &str) -> OsbResult<Option<LinkTarget>> {
        let Some(group_uid) = self.reconciler.reconcile(ConceptSpec::Group, seed).await? else {
            return Ok(None);
        };
        let Some(subgroup_uid) = self
            .reconciler
            .reconcile(ConceptSpec::Subgroup { group_uid: &group_uid }, seed)
            .await?
        else {
            return Ok(None);
        };
        let Some(activity_uid) = self
            .reconciler
            .reconcile(
                ConceptSpec::Activity {
                    group_uid: &group_uid,
                    subgroup_uid: &subgroup_uid,
                },
                activity_name,
            )
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(LinkTarget {
            activity_uid,
            group_uid,
            subgroup_uid,
        }))
    }

    async fn link(
        &self,
        study_uid: &str,
        target: &LinkTarget,
        posted: &mut PostedActivitySet,
        summary: &mut ActivityResolution,
    ) -> OsbResult<()> {
        if let Some(existing) = posted.linked_study_activity(&target.activity_uid) {
            debug!(
                activity_uid = %target.activity_uid,
                study_activity_uid = %existing,
                "Activity already linked to study"
            );
            summary.already_linked += 1;
            return Ok(());
        }

        let link = StudyActivityLink {
            activity_uid: target.activity_uid.clone(),
            activity_group_uid: target.group_uid.clone(),
            activity_subgroup_uid: target.subgroup_uid.clone(),
            soa_group_term_uid: self.soa_group_term_uid.clone(),
        };

        match self.api.create_study_activity(study_uid, &link).await {
            Ok(mut created) => {
                if created.activity.uid.is_empty() {
                    created.activity.uid = target.activity_uid.clone();
                }
                info!(
                    activity_uid = %target.activity_uid,
                    study_activity_uid = %created.study_activity_uid,
                    "Linked activity to study"
                );
                posted.record(&created);
                summary.linked += 1;
                Ok(())
            }
            Err(OsbError::ValidationRejected(body)) => {
                warn!(activity_uid = %target.activity_uid, response = %body, "Study activity link rejected");
                summary.rejected += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
