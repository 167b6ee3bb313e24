//! In-memory document store
//!
//! Implements the full [`DocumentStore`] contract over a single ordered map
//! keyed by `(partition, storage key)`:
//!
//! - every write stamps a fresh ETag, `_ts` and a change-feed sequence number
//! - documents whose `_ts + ttl` has passed are invisible to every read
//! - batches are validated against a staged view and only then applied, so a
//!   failing step leaves the map untouched
//!
//! Fixture loading follows the on-disk layout used by integration suites:
//! one JSON document per `.json` file, found recursively.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::arm::{PartitionKey, ResourceId, StorageKey};
use crate::clock::{system_clock, SharedClock};
use crate::concurrency::{check_delete, check_write, DeleteCondition, ETag, WriteCondition};

use super::batch::{BatchItemResult, BatchOperation};
use super::errors::{StoreError, StoreResult};
use super::feed::{
    decode_position, encode_position, ChangeFeedPage, ChangeFeedRequest, ChangeFeedStart,
};
use super::query::{
    decode_continuation, encode_continuation, PageRequest, QueryFilter, QueryPage, QueryScope,
};
use super::{document_key, DocumentStore, StoredItem, ETAG_FIELD, TIMESTAMP_FIELD, TTL_FIELD};

type DocKey = (String, String);

#[derive(Debug, Clone)]
struct Entry {
    body: Value,
    etag: ETag,
    ts: i64,
    lsn: u64,
}

impl Entry {
    fn to_item(&self) -> StoredItem {
        StoredItem {
            body: self.body.clone(),
            etag: self.etag.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    docs: BTreeMap<DocKey, Entry>,
    lsn: u64,
}

impl State {
    fn put(
        &mut self,
        partition: &str,
        key: &StorageKey,
        mut body: Value,
        etag: ETag,
        now: i64,
    ) -> StoredItem {
        self.lsn += 1;
        if let Some(obj) = body.as_object_mut() {
            obj.insert(ETAG_FIELD.into(), Value::String(etag.as_str().to_string()));
            obj.insert(TIMESTAMP_FIELD.into(), Value::from(now));
        }
        let entry = Entry {
            body,
            etag,
            ts: now,
            lsn: self.lsn,
        };
        let item = entry.to_item();
        self.docs
            .insert((partition.to_string(), key.as_str().to_string()), entry);
        item
    }
}

/// Thread-safe in-memory [`DocumentStore`]
pub struct MemoryStore {
    state: RwLock<State>,
    clock: SharedClock,
    default_ttl: Option<i64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// A store whose TTL expiry and `_ts` follow `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
            default_ttl: None,
        }
    }

    /// Container-level TTL in seconds, applied to documents without a `ttl`.
    pub fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = Some(seconds);
        self
    }

    pub fn default_ttl(&self) -> Option<i64> {
        self.default_ttl
    }

    /// Load every `.json` file under `dir`. Files whose document has no
    /// `id` are skipped. Returns the number of documents loaded.
    pub fn load_from_directory(&self, dir: impl AsRef<Path>) -> StoreResult<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                StoreError::Unavailable(format!("failed to walk {}: {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if !is_json {
                continue;
            }

            let data = std::fs::read(path).map_err(|e| {
                StoreError::Unavailable(format!("failed to read file {}: {}", path.display(), e))
            })?;
            let body: Value = serde_json::from_slice(&data).map_err(|e| {
                StoreError::Serialization(format!("failed to parse file {}: {}", path.display(), e))
            })?;
            if body.get("id").and_then(Value::as_str).map_or(true, str::is_empty) {
                continue;
            }
            self.insert_fixture(body)?;
            loaded += 1;
        }

        debug!(dir = %dir.display(), documents = loaded, "loaded fixtures");
        Ok(loaded)
    }

    /// Load a single JSON document.
    pub fn load_content(&self, content: &[u8]) -> StoreResult<()> {
        let body: Value = serde_json::from_slice(content)?;
        if body.get("id").and_then(Value::as_str).map_or(true, str::is_empty) {
            return Err(StoreError::InvalidRequest("document is missing id field".into()));
        }
        self.insert_fixture(body)
    }

    /// Every visible document, in storage order.
    pub fn documents(&self) -> Vec<Value> {
        let now = self.now();
        self.state
            .read()
            .docs
            .values()
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.body.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.docs.clear();
    }

    fn insert_fixture(&self, mut body: Value) -> StoreResult<()> {
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let key = StorageKey::parse(&id).map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        let partition = fixture_partition(&body)?;
        let etag = body
            .get(ETAG_FIELD)
            .and_then(Value::as_str)
            .map(ETag::new)
            .unwrap_or_else(ETag::generate);
        if let Some(obj) = body.as_object_mut() {
            obj.insert("id".into(), Value::String(id));
        }

        let now = self.now();
        self.state.write().put(partition.as_str(), &key, body, etag, now);
        Ok(())
    }

    fn now(&self) -> i64 {
        self.clock.now().timestamp()
    }

    fn is_expired(&self, entry: &Entry, now: i64) -> bool {
        let ttl = entry
            .body
            .get(TTL_FIELD)
            .and_then(Value::as_i64)
            .or(self.default_ttl);
        match ttl {
            Some(ttl) if ttl > 0 => entry.ts.saturating_add(ttl) <= now,
            _ => false,
        }
    }

    fn visible<'a>(
        &self,
        state: &'a State,
        partition: &str,
        key: &str,
        now: i64,
    ) -> Option<&'a Entry> {
        state
            .docs
            .get(&(partition.to_string(), key.to_string()))
            .filter(|e| !self.is_expired(e, now))
    }
}

fn fixture_partition(body: &Value) -> StoreResult<PartitionKey> {
    if let Some(pk) = body.get("partitionKey").and_then(Value::as_str) {
        return PartitionKey::new(pk).map_err(|e| StoreError::InvalidRequest(e.to_string()));
    }
    let resource_id = body
        .get("resourceId")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            StoreError::InvalidRequest("document has neither partitionKey nor resourceId".into())
        })?;
    let resource_id =
        ResourceId::parse(resource_id).map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
    Ok(PartitionKey::from_resource_id(&resource_id))
}

fn check_partition(partition: &PartitionKey, body: &Value) -> StoreResult<()> {
    match body.get("partitionKey").and_then(Value::as_str) {
        Some(pk) if pk != partition.as_str() => Err(StoreError::InvalidRequest(format!(
            "document partition key '{}' does not match request partition '{}'",
            pk, partition
        ))),
        _ => Ok(()),
    }
}

enum Staged {
    Put {
        key: StorageKey,
        body: Value,
        etag: ETag,
    },
    Remove {
        key: StorageKey,
    },
}

impl DocumentStore for MemoryStore {
    fn read(&self, partition: &PartitionKey, key: &StorageKey) -> StoreResult<StoredItem> {
        let now = self.now();
        let state = self.state.read();
        self.visible(&state, partition.as_str(), key.as_str(), now)
            .map(Entry::to_item)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn write(
        &self,
        partition: &PartitionKey,
        body: Value,
        condition: WriteCondition,
    ) -> StoreResult<StoredItem> {
        let key = document_key(&body)?;
        check_partition(partition, &body)?;

        let now = self.now();
        let mut state = self.state.write();
        let current = self
            .visible(&state, partition.as_str(), key.as_str(), now)
            .map(|e| e.etag.clone());
        check_write(key.as_str(), current.as_ref(), &condition)?;

        Ok(state.put(partition.as_str(), &key, body, ETag::generate(), now))
    }

    fn delete(
        &self,
        partition: &PartitionKey,
        key: &StorageKey,
        condition: DeleteCondition,
    ) -> StoreResult<()> {
        let now = self.now();
        let mut state = self.state.write();
        let current = self
            .visible(&state, partition.as_str(), key.as_str(), now)
            .map(|e| e.etag.clone());
        check_delete(key.as_str(), current.as_ref(), &condition)?;

        state
            .docs
            .remove(&(partition.to_string(), key.to_string()));
        Ok(())
    }

    fn query(
        &self,
        scope: QueryScope,
        filter: &QueryFilter,
        page: &PageRequest,
    ) -> StoreResult<QueryPage> {
        let only = match &scope {
            QueryScope::Partition(pk) => Some(pk.as_str().to_string()),
            QueryScope::CrossPartition => None,
        };
        let lower = match &page.continuation {
            Some(token) => Bound::Excluded(decode_continuation(token)?),
            None => match &only {
                Some(pk) => Bound::Included((pk.clone(), String::new())),
                None => Bound::Unbounded,
            },
        };
        let limit = page.max_items.filter(|n| *n > 0);

        let now = self.now();
        let state = self.state.read();
        let mut items = Vec::new();
        let mut last: Option<&DocKey> = None;
        let mut more = false;

        for (doc_key, entry) in state.docs.range((lower, Bound::Unbounded)) {
            if let Some(pk) = &only {
                match doc_key.0.as_str().cmp(pk.as_str()) {
                    std::cmp::Ordering::Less => continue,
                    std::cmp::Ordering::Greater => break,
                    std::cmp::Ordering::Equal => {}
                }
            }
            if self.is_expired(entry, now) || !filter.matches(&entry.body) {
                continue;
            }
            if limit.map_or(false, |max| items.len() >= max) {
                more = true;
                break;
            }
            items.push(entry.to_item());
            last = Some(doc_key);
        }

        let continuation = match (more, last) {
            (true, Some((pk, key))) => Some(encode_continuation(pk, key)),
            _ => None,
        };
        Ok(QueryPage {
            items,
            continuation,
        })
    }

    fn execute_batch(
        &self,
        partition: &PartitionKey,
        operations: Vec<BatchOperation>,
    ) -> StoreResult<Vec<BatchItemResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let total = operations.len();
        let now = self.now();
        let mut state = self.state.write();

        // Validate every step against the view left by the steps before it.
        let mut view: HashMap<String, Option<ETag>> = HashMap::new();
        let mut staged = Vec::with_capacity(total);
        for (index, operation) in operations.into_iter().enumerate() {
            let fail = |source: StoreError| StoreError::BatchStepFailed {
                step: index + 1,
                total,
                source: Box::new(source),
            };

            let key = operation.key().map_err(fail)?;
            let current = match view.get(key.as_str()) {
                Some(etag) => etag.clone(),
                None => self
                    .visible(&state, partition.as_str(), key.as_str(), now)
                    .map(|e| e.etag.clone()),
            };

            if let Some(condition) = operation.delete_condition() {
                check_delete(key.as_str(), current.as_ref(), &condition).map_err(fail)?;
                view.insert(key.as_str().to_string(), None);
                staged.push(Staged::Remove { key });
                continue;
            }

            let condition = operation.write_condition().unwrap_or(WriteCondition::Upsert);
            let body = match operation {
                BatchOperation::Create { body }
                | BatchOperation::Replace { body, .. }
                | BatchOperation::Upsert { body } => body,
                BatchOperation::Delete { .. } => continue,
            };
            check_partition(partition, &body).map_err(fail)?;
            check_write(key.as_str(), current.as_ref(), &condition).map_err(fail)?;

            let etag = ETag::generate();
            view.insert(key.as_str().to_string(), Some(etag.clone()));
            staged.push(Staged::Put { key, body, etag });
        }

        let mut results = Vec::with_capacity(staged.len());
        for step in staged {
            match step {
                Staged::Put { key, body, etag } => {
                    let item = state.put(partition.as_str(), &key, body, etag, now);
                    results.push(BatchItemResult {
                        key,
                        status_code: 200,
                        item: Some(item),
                    });
                }
                Staged::Remove { key } => {
                    state
                        .docs
                        .remove(&(partition.to_string(), key.to_string()));
                    results.push(BatchItemResult {
                        key,
                        status_code: 204,
                        item: None,
                    });
                }
            }
        }
        Ok(results)
    }

    fn change_feed(&self, request: &ChangeFeedRequest) -> StoreResult<ChangeFeedPage> {
        let now = self.now();
        let state = self.state.read();
        let start = match &request.start {
            ChangeFeedStart::Beginning => 0,
            ChangeFeedStart::Now => state.lsn,
            ChangeFeedStart::Continuation(token) => decode_position(token)?,
        };

        let mut changed: Vec<&Entry> = state
            .docs
            .iter()
            .filter(|((pk, _), entry)| {
                entry.lsn > start
                    && request
                        .partition
                        .as_ref()
                        .map_or(true, |p| p.as_str() == pk.as_str())
                    && !self.is_expired(entry, now)
            })
            .map(|(_, entry)| entry)
            .collect();
        changed.sort_by_key(|e| e.lsn);
        if let Some(max) = request.max_items.filter(|n| *n > 0) {
            changed.truncate(max);
        }

        let position = changed.last().map_or(start, |e| e.lsn);
        Ok(ChangeFeedPage {
            documents: changed.into_iter().map(|e| e.body.clone()).collect(),
            continuation: encode_position(position),
        })
    }
}
