//! Mock audit sink for testing.

use crate::providers::audit::{redact, AuditRecord};
use crate::providers::AuditSink;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory audit sink for testing: records into a bounded ring buffer,
/// identical redaction behavior to the production sink.
#[derive(Debug, Clone)]
pub struct MockAuditSink {
    records: Arc<Mutex<VecDeque<AuditRecord>>>,
    capacity: usize,
}

impl MockAuditSink {
    /// Create a sink retaining up to `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }
}

impl Default for MockAuditSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl AuditSink for MockAuditSink {
    async fn record(&self, mut record: AuditRecord) {
        if let Some(body) = record.body.take() {
            record.body = Some(redact(&body));
        }
        let mut records = self.records.lock().unwrap();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    async fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let records = self.records.lock().unwrap();
        records.iter().rev().take(limit).cloned().collect()
    }
}
