//! In-flight preload tracking

use std::collections::HashSet;

/// Entry ids whose sources are currently being fetched ahead of playback
#[derive(Debug, Default, Clone)]
pub struct PreloadTracker {
    in_flight: HashSet<String>,
}

impl PreloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an entry as preloading. Returns false if it already is.
    pub fn try_begin(&mut self, entry_id: &str) -> bool {
        if self.in_flight.contains(entry_id) {
            return false;
        }
        self.in_flight.insert(entry_id.to_string())
    }

    /// Mark a preload as done
    pub fn finish(&mut self, entry_id: &str) -> bool {
        self.in_flight.remove(entry_id)
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.in_flight.contains(entry_id)
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Sorted snapshot of in-flight ids
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.in_flight.iter().cloned().collect();
        ids.sort();
        ids
    }
}
