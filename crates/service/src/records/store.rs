use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use models::{record, PhotoSlot, Record, RecordFields};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::errors::ServiceError;
use crate::photos::{self, PhotoUpload, UploadPolicy, UploadReport};
use crate::storage::{KvProvider, StorageError};

use super::search;

/// Key the whole collection is stored under.
pub const RECORDS_KEY: &str = "vk_work_entries";

/// User-facing notice raised when a mutation could not be written through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageNotice {
    StorageFull,
    WriteFailed(String),
}

impl StorageNotice {
    pub fn message(&self) -> String {
        match self {
            StorageNotice::StorageFull => {
                "Storage full! Please delete some old entries with photos.".to_string()
            }
            StorageNotice::WriteFailed(reason) => format!("Could not save changes: {reason}"),
        }
    }
}

impl fmt::Display for StorageNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<&StorageError> for StorageNotice {
    fn from(err: &StorageError) -> Self {
        if err.is_quota() {
            StorageNotice::StorageFull
        } else {
            StorageNotice::WriteFailed(err.to_string())
        }
    }
}

/// Result of a mutation: the in-memory effect always stands, `notice` says
/// whether it also reached the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    pub value: T,
    pub notice: Option<StorageNotice>,
}

impl<T> Committed<T> {
    fn clean(value: T) -> Self {
        Self { value, notice: None }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed { value: f(self.value), notice: self.notice }
    }
}

/// Most-recent-first collection of records persisted as one JSON array.
///
/// The in-memory collection is authoritative for the session. Each mutation
/// holds the write lock until its full re-serialisation has been written, so
/// writes land in mutation order.
pub struct RecordStore {
    records: RwLock<Vec<Record>>,
    provider: Arc<dyn KvProvider>,
    key: String,
}

impl RecordStore {
    pub async fn open(provider: Arc<dyn KvProvider>) -> Arc<Self> {
        Self::open_with_key(provider, RECORDS_KEY).await
    }

    pub async fn open_with_key(provider: Arc<dyn KvProvider>, key: &str) -> Arc<Self> {
        let records = load_from(provider.as_ref(), key).await;
        info!(count = records.len(), %key, "record store opened");
        Arc::new(Self { records: RwLock::new(records), provider, key: key.to_string() })
    }

    /// Read the persisted collection. Missing or unreadable data yields an empty list.
    pub async fn load(&self) -> Vec<Record> {
        load_from(self.provider.as_ref(), &self.key).await
    }

    /// Write the current in-memory collection, e.g. after space was freed elsewhere.
    pub async fn save(&self) -> Option<StorageNotice> {
        let records = self.records.read().await;
        self.persist(&records).await
    }

    pub async fn list(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Assign identity, prepend, persist.
    pub async fn create(&self, fields: RecordFields) -> Committed<Record> {
        let mut records = self.records.write().await;
        let mut rec = Record::new(fields);
        while records.iter().any(|r| r.id == rec.id) {
            rec.id = record::new_record_id();
        }
        records.insert(0, rec.clone());
        debug!(record_id = %rec.id, "record created");
        let notice = self.persist(&records).await;
        Committed { value: rec, notice }
    }

    /// Replace the fields of record `id`; `None` when no record matches.
    pub async fn update(&self, id: &str, fields: RecordFields) -> Committed<Option<Record>> {
        let mut records = self.records.write().await;
        let Some(existing) = records.iter_mut().find(|r| r.id == id) else {
            return Committed::clean(None);
        };
        existing.fields = fields;
        let updated = existing.clone();
        debug!(record_id = %id, "record updated");
        let notice = self.persist(&records).await;
        Committed { value: Some(updated), notice }
    }

    /// Remove record `id`; `false` when no record matches.
    pub async fn delete(&self, id: &str) -> Committed<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Committed::clean(false);
        }
        debug!(record_id = %id, "record deleted");
        let notice = self.persist(&records).await;
        Committed { value: true, notice }
    }

    pub async fn search(&self, term: &str) -> Vec<Record> {
        let records = self.records.read().await;
        search::filter(&records, term)
    }

    /// Attach uploads to a saved record and persist when anything was accepted.
    pub async fn attach_photos(
        &self,
        id: &str,
        slot: PhotoSlot,
        uploads: Vec<PhotoUpload>,
        policy: UploadPolicy,
    ) -> Result<Committed<UploadReport>, ServiceError> {
        let mut records = self.records.write().await;
        let rec = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ServiceError::not_found("record"))?;
        let report = photos::attach_photos(rec, slot, uploads, policy);
        if report.accepted == 0 {
            return Ok(Committed::clean(report));
        }
        let notice = self.persist(&records).await;
        Ok(Committed { value: report, notice })
    }

    pub async fn remove_photo(
        &self,
        id: &str,
        slot: PhotoSlot,
        index: Option<usize>,
    ) -> Result<Committed<bool>, ServiceError> {
        let mut records = self.records.write().await;
        let rec = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ServiceError::not_found("record"))?;
        if !photos::remove_photo(rec, slot, index) {
            return Ok(Committed::clean(false));
        }
        let notice = self.persist(&records).await;
        Ok(Committed { value: true, notice })
    }

    async fn persist(&self, records: &[Record]) -> Option<StorageNotice> {
        let text = match serde_json::to_string(records) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "record collection failed to serialize");
                return Some(StorageNotice::WriteFailed(e.to_string()));
            }
        };
        match self.provider.set(&self.key, text).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, count = records.len(), "record collection not persisted; keeping session copy");
                Some(StorageNotice::from(&e))
            }
        }
    }
}

async fn load_from(provider: &dyn KvProvider, key: &str) -> Vec<Record> {
    let text = match provider.get(key).await {
        Ok(Some(text)) => text,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, %key, "record collection unreadable; starting empty");
            return Vec::new();
        }
    };
    let entries = match serde_json::from_str::<Vec<serde_json::Value>>(&text) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, %key, "record collection failed to parse; starting empty");
            return Vec::new();
        }
    };
    let total = entries.len();
    let records: Vec<Record> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| match serde_json::from_value::<Record>(entry) {
            Ok(rec) => Some(rec),
            Err(e) => {
                warn!(error = %e, %key, position, "stored record unreadable; skipped");
                None
            }
        })
        .collect();
    if records.len() < total {
        warn!(%key, kept = records.len(), total, "some stored records were skipped");
    }
    repair(records)
}

/// Give every record an identity and make identifiers unique.
fn repair(mut records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    for rec in records.iter_mut() {
        if rec.id.is_empty() || seen.contains(&rec.id) {
            let fresh = record::new_record_id();
            warn!(old_id = %rec.id, new_id = %fresh, "stored record had missing or duplicate id");
            rec.id = fresh;
        }
        if rec.date.is_empty() {
            rec.date = record::today();
        }
        seen.insert(rec.id.clone());
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKv;
    use models::TextField;

    fn fields(name: &str, bike: &str) -> RecordFields {
        let mut f = RecordFields::default();
        f.set_text(TextField::CustomerName, name);
        f.set_text(TextField::BikeNumber, bike);
        f
    }

    async fn store() -> (Arc<MemoryKv>, Arc<RecordStore>) {
        let kv = Arc::new(MemoryKv::new());
        let store = RecordStore::open(kv.clone()).await;
        (kv, store)
    }

    #[tokio::test]
    async fn create_is_most_recent_first() {
        let (_, store) = store().await;
        let a = store.create(fields("A", "1")).await.value;
        let b = store.create(fields("B", "2")).await.value;
        let ids: Vec<_> = store.load().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (kv, store) = store().await;
        let a = store.create(fields("Asha", "MH12AB1234")).await.value;
        store.create(fields("Ravi", "KA01")).await;
        let mut changed = a.fields.clone();
        changed.set_text(TextField::FatherName, "Suresh");
        changed.photos.attach(PhotoSlot::KycPhotos, "data:image/png;base64,AA==".into());
        store.update(&a.id, changed).await;
        store.create(fields("Meena", "GJ05")).await;

        let in_memory = store.list().await;
        assert_eq!(store.load().await, in_memory);

        let reopened = RecordStore::open(kv).await;
        assert_eq!(reopened.list().await, in_memory);
    }

    #[tokio::test]
    async fn identifiers_are_unique() {
        let (_, store) = store().await;
        for i in 0..50 {
            store.create(fields(&format!("n{i}"), "x")).await;
        }
        let ids: HashSet<_> = store.list().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn update_keeps_identity_and_ignores_unknown_id() {
        let (_, store) = store().await;
        let a = store.create(fields("A", "1")).await.value;
        let updated = store.update(&a.id, fields("A2", "9")).await.value.expect("updated");
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.date, a.date);
        assert_eq!(updated.fields.text(TextField::CustomerName), Some("A2"));

        let missing = store.update("nope", fields("X", "X")).await;
        assert_eq!(missing.value, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_first_created_leaves_second() {
        let (_, store) = store().await;
        let first = store.create(fields("First", "1")).await.value;
        let second = store.create(fields("Second", "2")).await.value;
        assert!(store.delete(&first.id).await.value);
        assert!(!store.delete(&first.id).await.value);
        let loaded = store.load().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, second.id);
    }

    #[tokio::test]
    async fn search_scenario() {
        let (_, store) = store().await;
        let asha = store.create(fields("Asha", "MH12AB1234")).await.value;
        store.create(fields("Ravi", "KA01")).await;
        let hits = store.search("asha").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, asha.id);
        assert!(store.search("zz").await.is_empty());
        assert_eq!(store.search("").await.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_persistence_recovers_empty() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(RECORDS_KEY, "{definitely not json".into()).await.expect("seed");
        let store = RecordStore::open(kv.clone()).await;
        assert!(store.is_empty().await);

        kv.set(RECORDS_KEY, r#"{"id":"1"}"#.into()).await.expect("seed");
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn stored_records_are_repaired() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(RECORDS_KEY, r#"[{"id":"7","date":"1/1/2024"},{"id":"7"},{"customerName":"x"}]"#.into())
            .await
            .expect("seed");
        let store = RecordStore::open(kv).await;
        let ids: HashSet<_> = store.list().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(store.list().await.iter().all(|r| !r.date.is_empty()));
        assert!(store.get("7").await.is_some());
    }

    #[tokio::test]
    async fn storage_full_keeps_session_copy() {
        let kv = Arc::new(MemoryKv::with_quota(400));
        let store = RecordStore::open(kv.clone()).await;
        let small = store.create(fields("A", "1")).await;
        assert_eq!(small.notice, None);

        let mut big = fields("B", "2");
        big.set_text(TextField::PermanentAddress, "x".repeat(1024));
        let rejected = store.create(big).await;
        assert_eq!(rejected.notice, Some(StorageNotice::StorageFull));
        assert_eq!(store.len().await, 2);
        assert_eq!(store.load().await.len(), 1);

        // freeing space lets the next write carry the whole session through
        assert_eq!(store.delete(&rejected.value.id).await.notice, None);
        assert_eq!(store.load().await.len(), 1);
        assert_eq!(store.save().await, None);
    }

    #[tokio::test]
    async fn photo_attach_and_remove_on_saved_record() -> Result<(), ServiceError> {
        let (_, store) = store().await;
        let rec = store.create(fields("A", "1")).await.value;
        let policy = UploadPolicy { max_file_bytes: 8 };
        let uploads = vec![
            PhotoUpload::new("p0", Some("image/png"), b"0".to_vec()),
            PhotoUpload::new("big", Some("image/png"), vec![0; 9]),
            PhotoUpload::new("p1", Some("image/png"), b"1".to_vec()),
            PhotoUpload::new("p2", Some("image/png"), b"2".to_vec()),
        ];
        let report = store.attach_photos(&rec.id, PhotoSlot::PermanentPhotos, uploads, policy).await?.value;
        assert_eq!(report.accepted, 3);
        assert_eq!(report.rejected.len(), 1);

        assert!(store.remove_photo(&rec.id, PhotoSlot::PermanentPhotos, Some(1)).await?.value);
        let saved = store.load().await.into_iter().next().expect("record");
        assert_eq!(
            saved.fields.photos.images(PhotoSlot::PermanentPhotos),
            vec!["data:image/png;base64,MA==", "data:image/png;base64,Mg=="]
        );

        let missing = store.attach_photos("nope", PhotoSlot::KycPhotos, vec![], policy).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn null_lists_and_bad_entries_do_not_empty_the_collection() {
        let kv = Arc::new(MemoryKv::new());
        let seeded = r#"[
            {"id":"1","date":"1/1/2024","customerName":"Asha","kycPhotos":null,"permanentPhotos":null},
            42,
            {"id":"2","date":"2/1/2024","customerName":"Ravi","amount":"not a number"},
            {"id":"3","date":null,"customerName":"Meena"}
        ]"#;
        kv.set(RECORDS_KEY, seeded.to_string()).await.expect("seed");

        let store = RecordStore::open(kv.clone()).await;
        let names: Vec<_> = store
            .list()
            .await
            .into_iter()
            .map(|r| r.fields.customer_name.unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["Asha", "Meena"]);
        assert!(!store.get("3").await.expect("meena").date.is_empty());

        store.create(fields("Kiran", "KA05")).await;
        let persisted = store.load().await;
        assert_eq!(persisted.len(), 3);
        assert!(persisted.iter().any(|r| r.id == "1"));
    }
}
