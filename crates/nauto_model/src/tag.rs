use serde::{Deserialize, Serialize};

use crate::device::TagId;

pub const DEFAULT_TAG: &str = "default";

/// Sole purpose: drives Device↔Credential and Device↔Job association.
/// A reserved "default" tag is guaranteed to exist (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub tag_type: Option<String>,
}

pub fn shares_tag(a: &[String], b: &[String]) -> bool {
    a.iter().any(|t| b.iter().any(|u| u == t))
}
