use std::collections::{HashMap, HashSet};

use super::record::{EmailRecord, EmailStatus};

/// Owned store of every email record the service has seen, plus the set of
/// record ids with an external call currently in flight. The in-flight set
/// is the per-record mutual exclusion of the workflow: a second action on a
/// busy id is rejected locally before any network call.
///
/// Rejected records are retained as tombstones for the audit trail; they are
/// excluded from pending views but never deleted.
#[derive(Default)]
pub struct RecordStore {
    records: HashMap<String, EmailRecord>,
    in_flight: HashSet<String>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: EmailRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<&EmailRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut EmailRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Moves a record to a new id (the approval store may assign its own).
    pub fn rekey(&mut self, old_id: &str, new_id: &str) {
        if old_id == new_id {
            return;
        }
        if let Some(mut record) = self.records.remove(old_id) {
            record.id = new_id.to_string();
            self.records.insert(new_id.to_string(), record);
        }
    }

    /// Marks an id busy. Returns false if an action is already in flight.
    pub fn begin(&mut self, id: &str) -> bool {
        self.in_flight.insert(id.to_string())
    }

    pub fn finish(&mut self, id: &str) {
        self.in_flight.remove(id);
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    pub fn by_status(&self, status: EmailStatus) -> Vec<EmailRecord> {
        let mut records: Vec<EmailRecord> = self
            .records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
