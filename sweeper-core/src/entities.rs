//! Entity references owned by the remote orchestrator.
//!
//! The sweeper never owns these records. It reads them as facts (checksum,
//! attributes, timestamps) and asks the orchestrator to mutate or delete them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute set on a build once its output checksum has been verified.
pub const BUILD_OUTPUT_OK_KEY: &str = "BUILD_OUTPUT_OK";

/// Attribute marking a build whose artifacts were archived and may be deleted.
pub const BUILD_ARCHIVED_KEY: &str = "BUILD_ARCHIVED";

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Kind of entity a deletion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Build,
    GroupBuild,
}

impl EntityKind {
    /// Path segment used in REST and callback URLs.
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::Build => "builds",
            EntityKind::GroupBuild => "group-builds",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Build => write!(f, "build"),
            EntityKind::GroupBuild => write!(f, "group build"),
        }
    }
}

// ============================================================================
// BUILDS
// ============================================================================

/// A build as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    #[serde(default)]
    pub build_output_checksum: Option<String>,
    #[serde(default)]
    pub temporary_build: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Group build this build ran in, if any.
    #[serde(default)]
    pub group_build: Option<GroupBuildRef>,
}

/// Reference to the group build a build belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBuildRef {
    pub id: String,
}

impl Build {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            build_output_checksum: None,
            temporary_build: false,
            attributes: BTreeMap::new(),
            end_time: None,
            group_build: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.build_output_checksum = Some(checksum.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn temporary(mut self, end_time: DateTime<Utc>) -> Self {
        self.temporary_build = true;
        self.end_time = Some(end_time);
        self
    }

    pub fn in_group_build(mut self, group_build_id: impl Into<String>) -> Self {
        self.group_build = Some(GroupBuildRef {
            id: group_build_id.into(),
        });
        self
    }

    /// Whether the build ran outside any group build. Grouped builds are
    /// deleted together with their group build.
    pub fn is_independent(&self) -> bool {
        self.group_build.is_none()
    }

    /// Whether the build's artifacts were archived, which makes it deletable.
    pub fn is_archived(&self) -> bool {
        self.attributes.contains_key(BUILD_ARCHIVED_KEY)
    }

    /// Whether the verification flag has already been set either way.
    pub fn is_output_flagged(&self) -> bool {
        self.attributes.contains_key(BUILD_OUTPUT_OK_KEY)
    }
}

/// A group build as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBuild {
    pub id: String,
    #[serde(default)]
    pub temporary_build: bool,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl GroupBuild {
    pub fn temporary(id: impl Into<String>, end_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            temporary_build: true,
            end_time: Some(end_time),
        }
    }
}

// ============================================================================
// DELETE RESULTS
// ============================================================================

/// Status carried by a delete callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Success,
    Failed,
    TimedOut,
    SystemError,
}

impl ResultStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Success)
    }
}

/// Result the orchestrator POSTs to the callback URL once a deletion finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOperationResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<ResultStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeleteOperationResult {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: Some(ResultStatus::Success),
            message: None,
        }
    }

    pub fn failure(id: impl Into<String>, status: ResultStatus, message: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: Some(status),
            message: Some(message.into()),
        }
    }

    /// A result without a status counts as a failure.
    pub fn is_success(&self) -> bool {
        self.status.map(|s| s.is_success()).unwrap_or(false)
    }
}

/// Format a cutoff for orchestrator RSQL filters (ISO-8601, UTC).
pub fn format_timestamp_for_rsql(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
