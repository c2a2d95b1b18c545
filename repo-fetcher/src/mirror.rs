//! In-process mirror of fetched repository content

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredObject {
    pub encoded: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// Objects retrieved by prefetches and single-object fetches, plus the
/// time each repository was last visited
#[derive(Default)]
pub struct RepositoryMirror {
    objects: RwLock<HashMap<String, MirroredObject>>,
    visits: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl RepositoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, encoded: Vec<u8>, fetched_at: DateTime<Utc>) {
        self.objects
            .write()
            .insert(uri.into(), MirroredObject { encoded, fetched_at });
    }

    pub fn get(&self, uri: &str) -> Option<MirroredObject> {
        self.objects.read().get(uri).cloned()
    }

    /// Objects whose URI falls under the repository `prefix`
    pub fn objects_under(&self, prefix: &str) -> Vec<(String, MirroredObject)> {
        let mut found: Vec<_> = self
            .objects
            .read()
            .iter()
            .filter(|(uri, _)| uri.starts_with(prefix))
            .map(|(uri, object)| (uri.clone(), object.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    /// Replace the content of a repository with a fresh listing
    pub fn replace_repository(&self, prefix: &str, objects: Vec<(String, Vec<u8>)>, fetched_at: DateTime<Utc>) {
        let mut mirrored = self.objects.write();
        mirrored.retain(|uri, _| !uri.starts_with(prefix));
        for (uri, encoded) in objects {
            mirrored.insert(uri, MirroredObject { encoded, fetched_at });
        }
    }

    pub fn record_visit(&self, repository: &str, at: DateTime<Utc>) {
        self.visits.write().insert(repository.to_string(), at);
    }

    pub fn last_visit(&self, repository: &str) -> Option<DateTime<Utc>> {
        self.visits.read().get(repository).copied()
    }

    /// True when the repository was visited at or after `since`
    pub fn visited_since(&self, repository: &str, since: DateTime<Utc>) -> bool {
        self.last_visit(repository).is_some_and(|at| at >= since)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}
