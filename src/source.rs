//! The content store, seen from the compiler's side.
//!
//! The content-management system owns raw bodies, shortcode expansion and ids. The compiled
//! cache and batch recompiler only need three things from it, expressed by [`ContentSource`].

use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    fs::{read_dir, read_to_string},
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{blocks::ContentId, codec::MarkerCodec, error::PressNativeError};

pub trait ContentSource: Sync {
    /// Fully rendered markup for `content_id` (markers encoded, shortcodes and embeds expanded),
    /// or `None` if the content does not exist.
    fn rendered_content(
        &self,
        content_id: ContentId,
    ) -> impl Future<Output = Result<Option<String>, PressNativeError>> + Send;

    /// Number of content items the batch recompiler should cover.
    fn count_eligible(&self) -> impl Future<Output = Result<usize, PressNativeError>> + Send;

    /// Up to `limit` eligible ids in ascending order, skipping the first `offset`.
    fn eligible_ids(
        &self,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ContentId>, PressNativeError>> + Send;
}

/// In-memory content store keyed by id. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentSource(Arc<RwLock<BTreeMap<ContentId, String>>>);

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, content_id: ContentId, rendered: impl Into<String>) {
        self.0.write().insert(content_id, rendered.into());
    }

    pub fn remove(&self, content_id: ContentId) -> Option<String> {
        self.0.write().remove(&content_id)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }
}

impl FromIterator<(ContentId, String)> for MemoryContentSource {
    fn from_iter<T: IntoIterator<Item = (ContentId, String)>>(iter: T) -> Self {
        MemoryContentSource(Arc::new(RwLock::new(iter.into_iter().collect())))
    }
}

impl ContentSource for MemoryContentSource {
    async fn rendered_content(
        &self,
        content_id: ContentId,
    ) -> Result<Option<String>, PressNativeError> {
        Ok(self.0.read().get(&content_id).cloned())
    }

    async fn count_eligible(&self) -> Result<usize, PressNativeError> {
        Ok(self.0.read().len())
    }

    async fn eligible_ids(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentId>, PressNativeError> {
        Ok(self
            .0
            .read()
            .keys()
            .skip(offset)
            .take(limit)
            .copied()
            .collect())
    }
}

/// A directory of `<id>.html` files. Files are treated as raw bodies: markers are encoded on
/// read, and since there is no upstream renderer the result is compiled as-is.
#[derive(Debug, Clone)]
pub struct DirContentSource {
    root: PathBuf,
    markers: MarkerCodec,
}

impl DirContentSource {
    pub fn new(root: impl AsRef<Path>, markers: MarkerCodec) -> Result<Self, PressNativeError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PressNativeError::NotFound(format!(
                "content directory {root:?} does not exist"
            )));
        }
        Ok(DirContentSource { root, markers })
    }

    fn path_for(&self, content_id: ContentId) -> PathBuf {
        self.root.join(format!("{content_id}.html"))
    }

    /// Ids of every `<id>.html` file, ascending.
    fn ids(&self) -> Result<Vec<ContentId>, PressNativeError> {
        let mut ids = Vec::new();
        for entry in read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<ContentId>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

impl ContentSource for DirContentSource {
    async fn rendered_content(
        &self,
        content_id: ContentId,
    ) -> Result<Option<String>, PressNativeError> {
        let path = self.path_for(content_id);
        if !path.exists() {
            return Ok(None);
        }
        tracing::debug!("Reading {:?}", path);
        let raw = read_to_string(&path)?;
        Ok(Some(self.markers.encode(&raw).into_owned()))
    }

    async fn count_eligible(&self) -> Result<usize, PressNativeError> {
        Ok(self.ids()?.len())
    }

    async fn eligible_ids(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentId>, PressNativeError> {
        Ok(self.ids()?.into_iter().skip(offset).take(limit).collect())
    }
}
