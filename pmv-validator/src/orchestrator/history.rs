//! Bounded per-session validation history

use crate::types::ValidationResult;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// One page of a session's history, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub session_id: String,
    pub entries: Vec<ValidationResult>,
    /// Entries held for the session
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Default)]
struct SessionLog {
    entries: VecDeque<ValidationResult>,
    last_used: u64,
}

#[derive(Debug)]
pub struct ValidationHistory {
    per_session: usize,
    max_sessions: usize,
    sessions: HashMap<String, SessionLog>,
    /// Bumped on every push; orders sessions by recency
    tick: u64,
}

impl ValidationHistory {
    pub fn new(per_session: usize, max_sessions: usize) -> Self {
        Self {
            per_session: per_session.max(1),
            max_sessions: max_sessions.max(1),
            sessions: HashMap::new(),
            tick: 0,
        }
    }

    /// Append, dropping the session's oldest entry when full
    ///
    /// A new session beyond `max_sessions` evicts the least recently used one.
    pub fn push(&mut self, result: ValidationResult) {
        let session_id = &result.metadata.session_id;
        if !self.sessions.contains_key(session_id) && self.sessions.len() >= self.max_sessions {
            self.evict_idle();
        }
        self.tick += 1;
        let log = self.sessions.entry(session_id.clone()).or_default();
        log.last_used = self.tick;
        if log.entries.len() >= self.per_session {
            log.entries.pop_front();
        }
        log.entries.push_back(result);
    }

    fn evict_idle(&mut self) {
        let idle = self
            .sessions
            .iter()
            .min_by_key(|(_, log)| log.last_used)
            .map(|(id, _)| id.clone());
        if let Some(id) = idle {
            debug!(session_id = %id, "Evicting idle session history");
            self.sessions.remove(&id);
        }
    }

    pub fn page(&self, session_id: &str, limit: usize, offset: usize) -> HistoryPage {
        let entries = self.sessions.get(session_id).map(|log| &log.entries);
        let total = entries.map(VecDeque::len).unwrap_or(0);
        let page = entries
            .map(|e| e.iter().rev().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default();
        HistoryPage {
            session_id: session_id.to_string(),
            entries: page,
            total,
            limit,
            offset,
        }
    }

    /// Most recent result recorded for a request id
    pub fn find_by_request(&self, request_id: &str) -> Option<ValidationResult> {
        self.sessions
            .values()
            .flat_map(|log| log.entries.iter())
            .filter(|r| r.metadata.request_id == request_id)
            .max_by_key(|r| r.metadata.timestamp)
            .cloned()
    }

    pub fn session_len(&self, session_id: &str) -> usize {
        self.sessions.get(session_id).map(|log| log.entries.len()).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationMetadata;
    use chrono::Utc;

    fn result(session: &str, request: &str) -> ValidationResult {
        ValidationResult {
            is_valid: true,
            confidence: 0.9,
            errors: Vec::new(),
            warnings: Vec::new(),
            corrections: Vec::new(),
            metadata: ValidationMetadata {
                request_id: request.to_string(),
                session_id: session.to_string(),
                timestamp: Utc::now(),
                processing_time_ms: 1.0,
                layers_run: Vec::new(),
                sources_consulted: Vec::new(),
                rule_count: 0,
                confidence: 0.9,
            },
            audit_trail: Vec::new(),
        }
    }

    #[test]
    fn test_oldest_entry_evicted() {
        let mut history = ValidationHistory::new(3, 10);
        for i in 0..5 {
            history.push(result("s", &format!("r{}", i)));
        }
        assert_eq!(history.session_len("s"), 3);
        assert!(history.find_by_request("r0").is_none());
        assert!(history.find_by_request("r4").is_some());
    }

    #[test]
    fn test_paging_is_newest_first() {
        let mut history = ValidationHistory::new(50, 10);
        for i in 0..5 {
            history.push(result("s", &format!("r{}", i)));
        }
        let page = history.page("s", 2, 1);
        let ids: Vec<_> = page.entries.iter().map(|r| r.metadata.request_id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r2"]);
        assert_eq!(page.total, 5);
        assert!(history.page("other", 10, 0).entries.is_empty());
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let mut history = ValidationHistory::new(5, 2);
        history.push(result("a", "a1"));
        history.push(result("b", "b1"));
        // Touch "a" so "b" becomes the idle one
        history.push(result("a", "a2"));
        history.push(result("c", "c1"));

        assert_eq!(history.session_count(), 2);
        assert_eq!(history.session_len("a"), 2);
        assert_eq!(history.session_len("b"), 0);
        assert!(history.find_by_request("b1").is_none());
        assert!(history.find_by_request("c1").is_some());
    }
}
