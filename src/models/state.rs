// src/models/state.rs

//! Persisted per-target state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Signature, Target, TargetKind};

/// Last known signature of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Unknown or missing kinds read back as the default kind
    #[serde(default, deserialize_with = "lenient_kind")]
    pub kind: TargetKind,
    pub name: String,

    #[serde(flatten)]
    pub signature: Signature,

    /// When the signature last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    pub fn new(target: &Target, signature: Signature, updated_at: DateTime<Utc>) -> Self {
        Self {
            kind: target.kind,
            name: target.name.clone(),
            signature,
            updated_at: Some(updated_at),
        }
    }
}

fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<TargetKind, D::Error>
where
    D: Deserializer<'de>,
{
    let tag = Option::<String>::deserialize(deserializer)?;
    Ok(TargetKind::parse_lenient(tag.as_deref()))
}

/// Map from target URL to its last known record.
///
/// Ordered so that a rewritten state file is stable between runs.
pub type State = BTreeMap<String, StateRecord>;
