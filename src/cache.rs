//! # Compiled Cache
//!
//! Stores the most recent block array per content id, so the DOM walk runs once per edit
//! instead of once per client request.
//!
//! ## Write path
//!
//! Whenever content is saved, the content store calls [`CompiledCache::refresh`] with the
//! rendered markup (or [`CompiledCache::remove_content`] on delete) as part of the save. Reads
//! are therefore never staler than the last successful save.
//!
//! ## Read path
//!
//! [`CompiledCache::get_or_compile`] serves the stored blocks, and on a miss compiles from the
//! [`ContentSource`], stores the result and returns it. Misses come from content that predates
//! the cache, from cross-reference invalidation, and from corrupt payloads: a payload that no
//! longer deserializes is treated exactly like a missing one.
//!
//! ## Storage
//!
//! Entries live behind the [`CacheStore`] port as one opaque JSON payload plus a unix timestamp.
//! Every write replaces a whole entry, so readers never see half of one. Concurrent `put` and
//! `invalidate` on the same id are last-write-wins; at worst the next read recompiles.

use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    future::Future,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    blocks::{Block, ContentId},
    codec::DomCompiler,
    error::PressNativeError,
    event::{emit, CacheEvent},
    source::ContentSource,
};

/// Seconds since the unix epoch.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// One persisted cache record. `payload` is the serialized `Vec<Block>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub content_id: ContentId,
    pub payload: String,
    pub compiled_at: i64,
}

/// A compiled entry as handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEntry {
    pub content_id: ContentId,
    pub blocks: Vec<Block>,
    pub compiled_at: i64,
}

impl TryFrom<&StoredEntry> for CompiledEntry {
    type Error = PressNativeError;

    fn try_from(entry: &StoredEntry) -> Result<Self, Self::Error> {
        Ok(CompiledEntry {
            content_id: entry.content_id,
            blocks: serde_json::from_str(&entry.payload)?,
            compiled_at: entry.compiled_at,
        })
    }
}

/// Persistence port for compiled entries. Implementations must replace entries atomically.
pub trait CacheStore: Sync {
    fn load(
        &self,
        content_id: ContentId,
    ) -> impl Future<Output = Result<Option<StoredEntry>, PressNativeError>> + Send;

    fn store(&self, entry: StoredEntry)
        -> impl Future<Output = Result<(), PressNativeError>> + Send;

    /// Removes the entry; returns whether one existed.
    fn remove(
        &self,
        content_id: ContentId,
    ) -> impl Future<Output = Result<bool, PressNativeError>> + Send;

    /// Every entry whose payload contains `needle` as a substring. May over-report, must not
    /// under-report.
    fn scan(
        &self,
        needle: &str,
    ) -> impl Future<Output = Result<Vec<StoredEntry>, PressNativeError>> + Send;

    /// Ids of all stored entries, ascending.
    fn content_ids(&self) -> impl Future<Output = Result<Vec<ContentId>, PressNativeError>> + Send;
}

/// Process-local [`CacheStore`]. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<RwLock<BTreeMap<ContentId, StoredEntry>>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the raw payload of an entry, bypassing serialization. Lets embedders import
    /// payloads from elsewhere; tests use it to simulate corruption.
    pub fn insert_raw(&self, content_id: ContentId, payload: impl Into<String>) {
        self.0.write().insert(
            content_id,
            StoredEntry {
                content_id,
                payload: payload.into(),
                compiled_at: now_unix(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }
}

impl CacheStore for MemoryStore {
    async fn load(&self, content_id: ContentId) -> Result<Option<StoredEntry>, PressNativeError> {
        Ok(self.0.read().get(&content_id).cloned())
    }

    async fn store(&self, entry: StoredEntry) -> Result<(), PressNativeError> {
        self.0.write().insert(entry.content_id, entry);
        Ok(())
    }

    async fn remove(&self, content_id: ContentId) -> Result<bool, PressNativeError> {
        Ok(self.0.write().remove(&content_id).is_some())
    }

    async fn scan(&self, needle: &str) -> Result<Vec<StoredEntry>, PressNativeError> {
        Ok(self
            .0
            .read()
            .values()
            .filter(|entry| entry.payload.contains(needle))
            .cloned()
            .collect())
    }

    async fn content_ids(&self) -> Result<Vec<ContentId>, PressNativeError> {
        Ok(self.0.read().keys().copied().collect())
    }
}

/// The compiled-artifact cache. Cheap to clone when the store is (both built-in stores are).
#[derive(Debug, Clone)]
pub struct CompiledCache<S> {
    store: S,
    compiler: DomCompiler,
    tx: Option<UnboundedSender<CacheEvent>>,
}

impl<S: CacheStore> CompiledCache<S> {
    pub fn new(store: S) -> Self {
        CompiledCache {
            store,
            compiler: DomCompiler::default(),
            tx: None,
        }
    }

    pub fn with_compiler(mut self, compiler: DomCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Streams [`CacheEvent`]s for every stored or removed entry.
    pub fn with_events(mut self, tx: UnboundedSender<CacheEvent>) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn compiler(&self) -> &DomCompiler {
        &self.compiler
    }

    pub(crate) fn events(&self) -> &Option<UnboundedSender<CacheEvent>> {
        &self.tx
    }

    /// The full stored entry, or `None` when absent or undecodable.
    pub async fn entry(
        &self,
        content_id: ContentId,
    ) -> Result<Option<CompiledEntry>, PressNativeError> {
        let Some(stored) = self.store.load(content_id).await? else {
            return Ok(None);
        };
        match CompiledEntry::try_from(&stored) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(
                    "[CompiledCache] discarding undecodable entry for {}: {}",
                    content_id,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Stored blocks for `content_id`. A corrupt payload reads as `None`; only storage
    /// failures are errors.
    pub async fn get(&self, content_id: ContentId) -> Result<Option<Vec<Block>>, PressNativeError> {
        Ok(self.entry(content_id).await?.map(|entry| entry.blocks))
    }

    /// Replaces the entry for `content_id` and stamps it with the current time.
    pub async fn put(&self, content_id: ContentId, blocks: &[Block]) -> Result<(), PressNativeError> {
        let payload = serde_json::to_string(blocks)?;
        self.store
            .store(StoredEntry {
                content_id,
                payload,
                compiled_at: now_unix(),
            })
            .await?;
        tracing::debug!(
            "[CompiledCache] stored {} blocks for {}",
            blocks.len(),
            content_id
        );
        emit(&self.tx, CacheEvent::Compiled(content_id, blocks.len()));
        Ok(())
    }

    pub async fn invalidate(&self, content_id: ContentId) -> Result<(), PressNativeError> {
        if self.store.remove(content_id).await? {
            tracing::debug!("[CompiledCache] invalidated {}", content_id);
            emit(&self.tx, CacheEvent::Invalidated(content_id));
        }
        Ok(())
    }

    /// Unix timestamp of the last store, or `None` when there is no (decodable) entry.
    pub async fn compiled_at(&self, content_id: ContentId) -> Result<Option<i64>, PressNativeError> {
        Ok(self.entry(content_id).await?.map(|entry| entry.compiled_at))
    }

    /// Write-path hook: compiles `rendered` and stores it, or drops the entry when the markup is
    /// blank. Returns the compiled blocks.
    pub async fn refresh(
        &self,
        content_id: ContentId,
        rendered: &str,
    ) -> Result<Vec<Block>, PressNativeError> {
        if rendered.trim().is_empty() {
            self.invalidate(content_id).await?;
            return Ok(Vec::new());
        }
        let blocks = self.compiler.compile(rendered);
        self.put(content_id, &blocks).await?;
        Ok(blocks)
    }

    /// Write-path hook for deleted content.
    pub async fn remove_content(&self, content_id: ContentId) -> Result<(), PressNativeError> {
        self.invalidate(content_id).await
    }

    /// Serves the cached blocks, compiling and storing them on a miss. Content the source does
    /// not know, or whose body is blank, yields an empty document and is not stored.
    #[tracing::instrument(skip(self, source))]
    pub async fn get_or_compile<C: ContentSource>(
        &self,
        content_id: ContentId,
        source: &C,
    ) -> Result<Vec<Block>, PressNativeError> {
        if let Some(blocks) = self.get(content_id).await? {
            return Ok(blocks);
        }
        tracing::debug!("[CompiledCache] miss for {}, compiling on demand", content_id);
        match source.rendered_content(content_id).await? {
            Some(rendered) => self.refresh(content_id, &rendered).await,
            None => {
                tracing::debug!("[CompiledCache] no content for {}", content_id);
                Ok(Vec::new())
            }
        }
    }
}
