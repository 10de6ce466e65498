//! Correlation-indexed result store
//!
//! Results are retained until explicitly deleted; there is no TTL sweep
//! here. A production deployment should layer one symmetric to the
//! registry sweeper.

use dashmap::DashMap;

use cr_protocol::{CorrelationId, TaskResult};

/// Map of completed results keyed by correlation id
pub struct ResultStore {
    results: DashMap<CorrelationId, TaskResult>,
}

impl ResultStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            results: DashMap::new(),
        }
    }

    /// Store a result. Last write wins; an existing entry means the task
    /// was already resolved, so an overwrite is logged.
    pub fn post(&self, correlation_id: CorrelationId, result: TaskResult) {
        if let Some(previous) = self.results.insert(correlation_id, result) {
            tracing::warn!(
                "Result for {} overwritten (previous success={})",
                correlation_id,
                previous.success
            );
        }
    }

    /// Fetch a result. `None` means pending, never an error.
    pub fn get(&self, correlation_id: &CorrelationId) -> Option<TaskResult> {
        self.results.get(correlation_id).map(|r| r.clone())
    }

    /// Consumer-driven cleanup. Returns whether an entry existed.
    pub fn delete(&self, correlation_id: &CorrelationId) -> bool {
        self.results.remove(correlation_id).is_some()
    }

    /// Number of stored results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, code: i32) -> TaskResult {
        TaskResult::completed(stdout.to_string(), String::new(), code, 1_700_000_000_000)
    }

    #[test]
    fn test_post_then_get_returns_exact_result() {
        let store = ResultStore::new();
        let id = CorrelationId::generate();
        let r = result("hi\n", 0);

        store.post(id, r.clone());
        assert_eq!(store.get(&id), Some(r));
    }

    #[test]
    fn test_unknown_id_is_pending() {
        let store = ResultStore::new();
        assert_eq!(store.get(&CorrelationId::generate()), None);
    }

    #[test]
    fn test_last_write_wins() {
        let store = ResultStore::new();
        let id = CorrelationId::generate();

        store.post(id, result("first", 0));
        store.post(id, result("second", 1));

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.stdout, "second");
    }

    #[test]
    fn test_delete_removes_entry() {
        let store = ResultStore::new();
        let id = CorrelationId::generate();
        store.post(id, result("hi", 0));

        assert!(store.delete(&id));
        assert!(!store.delete(&id));
        assert_eq!(store.get(&id), None);
    }
}
