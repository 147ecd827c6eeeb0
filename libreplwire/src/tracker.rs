//! Table of in-flight requests
use std::collections::HashMap;

use crate::request::RequestId;
use crate::{Error, Result};

/// Maps request ids to metadata of requests awaiting a terminal response.
///
/// An entry leaves the table exactly once, through [Tracker::complete] or [Tracker::drain].
#[derive(Debug)]
pub struct Tracker<T> {
    entries: HashMap<RequestId, T>,
}

impl<T> Tracker<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Track a new request
    pub fn register(&mut self, id: RequestId, meta: T) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateRequestId(id));
        }
        self.entries.insert(id, meta);
        Ok(())
    }

    pub fn lookup(&self, id: &RequestId) -> Option<&T> {
        self.entries.get(id)
    }

    /// Stop tracking request, returning its metadata if it was still in flight
    pub fn complete(&mut self, id: &RequestId) -> Option<T> {
        self.entries.remove(id)
    }

    /// Remove every tracked request
    pub fn drain(&mut self) -> Vec<(RequestId, T)> {
        self.entries.drain().collect()
    }

    /// Ids of tracked requests
    pub fn ids(&self) -> Vec<RequestId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Tracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
