//! Shared integration test helpers
#![allow(dead_code)]

pub mod fake_osb;

pub use fake_osb::{Call, FakeOsb};

use usdm_uploader::osb::{ActivityGrouping, ConceptEntry, CtTerm, CtTermAttributes, CtTermName, EpochConfig};

/// Library entry without groupings (groups and subgroups)
pub fn concept(uid: &str, name: &str) -> ConceptEntry {
    ConceptEntry {
        uid: uid.to_string(),
        name: name.to_string(),
        activity_groupings: Vec::new(),
    }
}

/// Library activity placed under one group/subgroup
pub fn library_activity(uid: &str, name: &str, group_uid: &str, subgroup_uid: &str) -> ConceptEntry {
    ConceptEntry {
        uid: uid.to_string(),
        name: name.to_string(),
        activity_groupings: vec![ActivityGrouping {
            activity_group_uid: Some(group_uid.to_string()),
            activity_subgroup_uid: Some(subgroup_uid.to_string()),
        }],
    }
}

pub fn ct_term(uid: &str, sponsor_name: &str, concept_id: &str) -> CtTerm {
    CtTerm {
        term_uid: uid.to_string(),
        name: CtTermName {
            sponsor_preferred_name: sponsor_name.to_string(),
        },
        attributes: CtTermAttributes {
            concept_id: concept_id.to_string(),
            definition: String::new(),
        },
    }
}

pub fn epoch_config(epoch_type: &str, type_name: &str, subtype: &str, subtype_name: &str) -> EpochConfig {
    EpochConfig {
        epoch_type: epoch_type.to_string(),
        type_name: type_name.to_string(),
        subtype: subtype.to_string(),
        subtype_name: subtype_name.to_string(),
    }
}
