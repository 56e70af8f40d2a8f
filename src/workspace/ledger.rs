use crate::models::ChallengeRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

/// A fresh solve seen by this client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolveRecord {
    pub id: Uuid,
    pub challenge: ChallengeRef,
    pub solved_at: DateTime<Utc>,
}

/// Solves recorded locally so progress shows up before the server is
/// asked again
#[derive(Debug, Default)]
pub struct SolveLedger {
    records: Mutex<Vec<SolveRecord>>,
}

impl SolveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a solve. Solving the same challenge twice keeps the first record.
    pub fn record(&self, challenge: &ChallengeRef) -> SolveRecord {
        let mut records = self.lock();
        if let Some(existing) = records.iter().find(|r| &r.challenge == challenge) {
            return existing.clone();
        }
        let record = SolveRecord {
            id: Uuid::new_v4(),
            challenge: challenge.clone(),
            solved_at: Utc::now(),
        };
        records.push(record.clone());
        record
    }

    pub fn is_solved(&self, challenge: &ChallengeRef) -> bool {
        self.lock().iter().any(|r| &r.challenge == challenge)
    }

    /// Solves within one module, for progress badges
    pub fn solved_in_module(&self, dojo_id: &str, module_id: &str) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.challenge.dojo_id == dojo_id && r.challenge.module_id == module_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn records(&self) -> Vec<SolveRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SolveRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_solve_keeps_first_record() {
        let ledger = SolveLedger::new();
        let hello = ChallengeRef::new("intro", "basics", "hello");

        let first = ledger.record(&hello);
        let second = ledger.record(&hello);
        assert_eq!(first, second);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_solved(&hello));
    }

    #[test]
    fn test_solved_in_module_counts_only_that_module() {
        let ledger = SolveLedger::new();
        ledger.record(&ChallengeRef::new("intro", "basics", "a"));
        ledger.record(&ChallengeRef::new("intro", "basics", "b"));
        ledger.record(&ChallengeRef::new("intro", "shell", "a"));

        assert_eq!(ledger.solved_in_module("intro", "basics"), 2);
        assert_eq!(ledger.solved_in_module("intro", "shell"), 1);
        assert!(!ledger.is_solved(&ChallengeRef::new("intro", "shell", "b")));
    }
}
