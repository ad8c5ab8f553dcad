//! Cross-reference invalidation.
//!
//! When a catalog item changes, every compiled document that embeds it through a
//! `ForeignReference` block is stale. There is no reverse index: the store is scanned for
//! payloads containing the id's digits (a superset of the referencing entries under any JSON
//! formatting), and each candidate is then checked structurally. Matches are invalidated, not
//! recompiled; the next read recompiles lazily.
//!
//! Unlike compilation, a failed scan is a hard error. Swallowing it would leave stale documents
//! in the cache indefinitely.

use crate::{
    blocks::{Block, ContentId, EntityId},
    cache::{CacheStore, CompiledCache, StoredEntry},
    error::PressNativeError,
};

#[derive(Debug, Clone)]
pub struct ReferenceInvalidator<S> {
    cache: CompiledCache<S>,
}

impl<S: CacheStore> ReferenceInvalidator<S> {
    pub fn new(cache: CompiledCache<S>) -> Self {
        ReferenceInvalidator { cache }
    }

    pub fn cache(&self) -> &CompiledCache<S> {
        &self.cache
    }

    /// Ids of cached documents that reference `entity_id`, ascending.
    pub async fn find_referencing(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<ContentId>, PressNativeError> {
        let needle = entity_id.to_string();
        let candidates = self.cache.store().scan(&needle).await.map_err(|e| {
            tracing::error!(
                "[ReferenceInvalidator] scan for entity {} failed: {}",
                entity_id,
                e
            );
            e
        })?;
        let mut matches: Vec<ContentId> = candidates
            .iter()
            .filter(|entry| entry_references(entry, entity_id))
            .map(|entry| entry.content_id)
            .collect();
        matches.sort_unstable();
        tracing::debug!(
            "[ReferenceInvalidator] {} candidates, {} reference entity {}",
            candidates.len(),
            matches.len(),
            entity_id
        );
        Ok(matches)
    }

    /// Invalidates every cached document referencing `entity_id` and returns their ids.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate_referencing(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<ContentId>, PressNativeError> {
        let matches = self.find_referencing(entity_id).await?;
        for content_id in matches.iter() {
            self.cache.invalidate(*content_id).await?;
        }
        if !matches.is_empty() {
            tracing::info!(
                "[ReferenceInvalidator] invalidated {} entries referencing entity {}",
                matches.len(),
                entity_id
            );
        }
        Ok(matches)
    }
}

/// Undecodable payloads count as references: they already read as missing, so dropping them
/// loses nothing and never leaves a stale reference behind.
fn entry_references(entry: &StoredEntry, entity_id: EntityId) -> bool {
    match serde_json::from_str::<Vec<Block>>(&entry.payload) {
        Ok(blocks) => blocks.iter().any(|block| block.entity_id() == Some(entity_id)),
        Err(_) => true,
    }
}
