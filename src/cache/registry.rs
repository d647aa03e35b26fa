use crate::git::handle::TaskHandle;
use std::collections::HashMap;
use std::hash::Hash;

/// In-flight task table that collapses identical requests
///
/// Redraws can request the same query many times per second; only the
/// first request for a key spawns work until its result has been taken.
#[derive(Debug)]
pub struct TaskRegistry<K, T> {
    in_flight: HashMap<K, TaskHandle<T>>,
}

impl<K, T> Default for TaskRegistry<K, T> {
    fn default() -> Self {
        Self {
            in_flight: HashMap::new(),
        }
    }
}

impl<K, T> TaskRegistry<K, T>
where
    K: Eq + Hash + Copy,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle registered for `key`, creating it with `factory`
    /// only when nothing is registered
    pub fn dedupe<F>(&mut self, key: K, factory: F) -> TaskHandle<T>
    where
        F: FnOnce() -> TaskHandle<T>,
    {
        self.in_flight.entry(key).or_insert_with(factory).clone()
    }

    /// Remove and return every finished task with its result
    pub fn take_completed(&mut self) -> Vec<(K, TaskHandle<T>)> {
        let done: Vec<K> = self
            .in_flight
            .iter()
            .filter(|(_, handle)| handle.is_completed())
            .map(|(key, _)| *key)
            .collect();

        done.into_iter()
            .filter_map(|key| self.in_flight.remove(&key).map(|handle| (key, handle)))
            .collect()
    }

    /// Handles of everything still registered
    pub fn handles(&self) -> Vec<TaskHandle<T>> {
        self.in_flight.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}
