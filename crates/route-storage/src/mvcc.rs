//! Multi-Version Concurrency Control (MVCC) core types.
//!
//! Route network topology is never overwritten in place. Every element keeps a
//! chain of versions, so a reader pinned to version N sees exactly the graph
//! that was committed as N, forever.

use route_core::Version;
use serde::{Deserialize, Serialize};

/// A single version of a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionEntry<T> {
    /// The commit that created this version.
    pub version: Version,
    /// The value (None indicates deletion/tombstone).
    pub value: Option<T>,
}

/// An append-only version chain.
///
/// Ordered by version (descending): the most recent version is first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedValue<T> {
    versions: Vec<VersionEntry<T>>,
}

impl<T> Default for VersionedValue<T> {
    fn default() -> Self {
        Self { versions: Vec::new() }
    }
}

impl<T> VersionedValue<T> {
    /// Creates a chain with an initial value.
    pub fn new(version: Version, value: T) -> Self {
        Self {
            versions: vec![VersionEntry {
                version,
                value: Some(value),
            }],
        }
    }

    /// Adds a new version (update).
    pub fn update(&mut self, version: Version, value: T) {
        self.push(version, Some(value));
    }

    /// Adds a tombstone (deletion).
    pub fn delete(&mut self, version: Version) {
        self.push(version, None);
    }

    fn push(&mut self, version: Version, value: Option<T>) {
        // A second write within the same commit replaces the first.
        if let Some(head) = self.versions.first_mut() {
            if head.version == version {
                head.value = value;
                return;
            }
        }
        self.versions.insert(0, VersionEntry { version, value });
    }

    /// Gets the value visible at `version`.
    ///
    /// The newest entry with `entry.version <= version` wins. Returns `None`
    /// if that entry is a tombstone or nothing existed yet.
    pub fn get(&self, version: Version) -> Option<&T> {
        self.versions
            .iter()
            .find(|entry| entry.version <= version)
            .and_then(|entry| entry.value.as_ref())
    }

    /// Version of the newest entry, if any.
    pub fn latest_version(&self) -> Option<Version> {
        self.versions.first().map(|e| e.version)
    }

    /// Number of recorded versions (tombstones included).
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
