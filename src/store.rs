//! Record lookup behind the `Lookup` operation.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

/// Read-only lookup capability injected into the lookup handler so tests
/// can substitute their own fixtures.
pub trait RecordStore: Send + Sync {
    fn find(&self, id: &str) -> Option<Record>;
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: BTreeMap<String, Record>,
}

impl InMemoryRecordStore {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
        }
    }

    /// Fixture data matching the records the service ships with.
    pub fn seeded() -> Self {
        Self::new([
            Record {
                id: "1".into(),
                name: "Hong Gildong".into(),
                email: "hong@example.com".into(),
                created_at: "2024-01-01".into(),
            },
            Record {
                id: "2".into(),
                name: "Kim Cheolsu".into(),
                email: "kim@example.com".into(),
                created_at: "2024-01-15".into(),
            },
            Record {
                id: "3".into(),
                name: "Lee Younghee".into(),
                email: "lee@example.com".into(),
                created_at: "2024-02-01".into(),
            },
        ])
    }
}

impl RecordStore for InMemoryRecordStore {
    fn find(&self, id: &str) -> Option<Record> {
        self.records.get(id).cloned()
    }
}
