//! Find-or-create-and-approve for concept-library entries
//!
//! Used for activity groups, subgroups and activities. Lookup is an exact
//! case-insensitive, trimmed name match, so reconciling a name that already
//! exists never writes to OSB.
//!
//! Outcomes of [`EntityReconciler::reconcile`]:
//! - `Ok(Some(uid))`: found, or created (approval attempted)
//! - `Ok(None)`: OSB rejected the payload with a validation error; caller skips the item
//! - `Err(_)`: any other failure; caller aborts

use crate::error::{OsbError, OsbResult};
use crate::osb::{ConceptKind, ConceptPayload, GroupingRef, OsbApi};
use tracing::{debug, info, warn};

/// Boilerplate stripped from names before lookup
pub const GROUPING_MARKER: &str = "grouping activity";

/// Placeholder prefix; placeholders are created upper-case for visibility
pub const PLACEHOLDER_PREFIX: &str = "tbd";

/// Library name for requested concept entries
pub const DEFAULT_LIBRARY_NAME: &str = "Requested";

/// Name prepared for lookup and creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedName {
    /// Lower-cased, marker stripped, trimmed
    pub clean: String,
    /// Name looked up and created: `clean`, or the upper-cased raw name for placeholders
    pub target: String,
}

/// Normalize a raw entity name
pub fn normalize_name(raw: &str) -> NormalizedName {
    let clean = raw
        .to_lowercase()
        .replace(GROUPING_MARKER, "")
        .trim()
        .to_string();
    let target = if clean.starts_with(PLACEHOLDER_PREFIX) {
        raw.to_uppercase()
    } else {
        clean.clone()
    };
    NormalizedName { clean, target }
}

/// Key used to compare names with library entries
fn match_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// What to reconcile, with the parents a new entry is created under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptSpec<'a> {
    Group,
    Subgroup {
        group_uid: &'a str,
    },
    Activity {
        group_uid: &'a str,
        subgroup_uid: &'a str,
    },
}

impl ConceptSpec<'_> {
    pub fn kind(&self) -> ConceptKind {
        match self {
            ConceptSpec::Group => ConceptKind::Group,
            ConceptSpec::Subgroup { .. } => ConceptKind::Subgroup,
            ConceptSpec::Activity { .. } => ConceptKind::Activity,
        }
    }
}

/// Concept-library reconciler
pub struct EntityReconciler<'a> {
    api: &'a dyn OsbApi,
    library_name: String,
}

impl<'a> EntityReconciler<'a> {
    pub fn new(api: &'a dyn OsbApi) -> Self {
        Self::with_library(api, DEFAULT_LIBRARY_NAME)
    }

    pub fn with_library(api: &'a dyn OsbApi, library_name: impl Into<String>) -> Self {
        Self {
            api,
            library_name: library_name.into(),
        }
    }

    /// Find an entry by name, creating and approving it on a miss
    pub async fn reconcile(&self, spec: ConceptSpec<'_>, raw_name: &str) -> OsbResult<Option<String>> {
        let kind = spec.kind();
        let name = normalize_name(raw_name);

        if let Some(uid) = self.find_existing(kind, &name.target).await? {
            debug!(kind = %kind, name = %name.target, uid = %uid, "Reconciled with existing entry");
            return Ok(Some(uid));
        }

        let payload = self.build_payload(spec, &name);
        let created = match self.api.create_concept(kind, &payload).await {
            Ok(created) => created,
            Err(OsbError::ValidationRejected(body)) => {
                warn!(kind = %kind, name = %name.target, response = %body, "Creation rejected by validation");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        info!(kind = %kind, name = %name.target, uid = %created.uid, "Created library entry");

        // Unapproved entries stay usable by uid
        if let Err(e) = self.api.approve_concept(kind, &created.uid).await {
            warn!(kind = %kind, uid = %created.uid, error = %e, "Failed to approve library entry");
        }

        Ok(Some(created.uid))
    }

    /// Uid of the entry whose name equals `target` (case-insensitive, trimmed)
    pub async fn find_existing(&self, kind: ConceptKind, target: &str) -> OsbResult<Option<String>> {
        let key = match_key(target);
        let entries = self.api.list_concepts(kind).await?;
        Ok(entries
            .into_iter()
            .find(|e| match_key(&e.name) == key)
            .map(|e| e.uid))
    }

    /// Creation payload for `spec`
    pub fn build_payload(&self, spec: ConceptSpec<'_>, name: &NormalizedName) -> ConceptPayload {
        let kind = spec.kind();
        let mut payload = ConceptPayload {
            name: name.target.clone(),
            name_sentence_case: name.clean.clone(),
            definition: format!("Auto-generated {} for {}", kind.label(), name.clean),
            abbreviation: name.clean.chars().take(3).collect::<String>().to_uppercase(),
            library_name: self.library_name.clone(),
            activity_groups: None,
            activity_groupings: None,
            request_rationale: None,
            is_data_collected: None,
        };

        match spec {
            ConceptSpec::Group => {}
            ConceptSpec::Subgroup { group_uid } => {
                payload.activity_groups = Some(vec![group_uid.to_string()]);
            }
            ConceptSpec::Activity {
                group_uid,
                subgroup_uid,
            } => {
                payload.activity_groupings = Some(vec![GroupingRef {
                    activity_group_uid: group_uid.to_string(),
                    activity_subgroup_uid: subgroup_uid.to_string(),
                }]);
                payload.request_rationale = Some(String::new());
                payload.is_data_collected = Some(false);
            }
        }

        payload
    }
}
