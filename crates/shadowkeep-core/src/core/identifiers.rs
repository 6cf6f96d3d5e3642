// crates/shadowkeep-core/src/core/identifiers.rs
// ============================================================================
// Module: Shadowkeep Identifiers
// Description: Opaque identifiers for resources, records, runs, and scan segments.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers serialize as plain strings. Resource and field name rules are
//! enforced by the schema loader; these wrappers stay permissive so records
//! read back from storage can always be represented. [`Segment`] is the one
//! exception: it validates its bounds on construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Logical resource name; also the partition key of its records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    /// Creates a new resource name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ResourceName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Primary record identifier (the part of the sort key after `id#`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new record identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Maintenance run identifier shared by every segment of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a new run identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Scan Segments
// ============================================================================

/// Largest segment count accepted by partitioned scans.
pub const MAX_TOTAL_SEGMENTS: u32 = 1_000_000;

/// Segment bound violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Total segment count is zero or above the supported maximum.
    #[error("total segments must be between 1 and {max}, got {total}")]
    InvalidTotal {
        /// Requested total.
        total: u32,
        /// Supported maximum.
        max: u32,
    },
    /// Segment index is not below the total.
    #[error("segment {index} is out of range for {total} total segments")]
    OutOfRange {
        /// Requested index.
        index: u32,
        /// Total segment count.
        total: u32,
    },
}

/// One disjoint partition of a parallel scan.
///
/// # Invariants
/// - `total` is in `1..=MAX_TOTAL_SEGMENTS`.
/// - `index < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Zero-based segment index.
    index: u32,
    /// Total number of segments in the scan.
    total: u32,
}

impl Segment {
    /// Creates a validated segment.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError`] when the bounds are invalid.
    pub const fn new(index: u32, total: u32) -> Result<Self, SegmentError> {
        if total == 0 || total > MAX_TOTAL_SEGMENTS {
            return Err(SegmentError::InvalidTotal {
                total,
                max: MAX_TOTAL_SEGMENTS,
            });
        }
        if index >= total {
            return Err(SegmentError::OutOfRange {
                index,
                total,
            });
        }
        Ok(Self {
            index,
            total,
        })
    }

    /// Returns the zero-based segment index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Returns the total segment count.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Returns true when the bucket value falls into this segment.
    #[must_use]
    pub fn contains_bucket(&self, bucket: u64) -> bool {
        bucket % u64::from(self.total) == u64::from(self.index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}
