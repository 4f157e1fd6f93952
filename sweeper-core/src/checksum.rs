//! Build output checksum comparison.

use serde::{Deserialize, Serialize};

/// Outcome of comparing a locally known checksum against the remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecksumOutcome {
    Match,
    Mismatch,
}

/// Compare the checksum held by the orchestrator with the digest recomputed by
/// the log store. A missing remote digest never matches.
pub fn compare_checksums(local: &str, remote: Option<&str>) -> ChecksumOutcome {
    match remote {
        Some(remote) if remote == local => ChecksumOutcome::Match,
        _ => ChecksumOutcome::Mismatch,
    }
}

/// Result of verifying one build during a single pass. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub build_id: String,
    pub local_checksum: String,
    pub remote_checksum: Option<String>,
    pub outcome: ChecksumOutcome,
}

impl VerificationRecord {
    pub fn new(
        build_id: impl Into<String>,
        local_checksum: impl Into<String>,
        remote_checksum: Option<String>,
    ) -> Self {
        let local_checksum = local_checksum.into();
        let outcome = compare_checksums(&local_checksum, remote_checksum.as_deref());
        Self {
            build_id: build_id.into(),
            local_checksum,
            remote_checksum,
            outcome,
        }
    }

    pub fn is_match(&self) -> bool {
        self.outcome == ChecksumOutcome::Match
    }
}
