//! # pressnative-core
//!
//! Compiles editor-authored, already-rendered HTML into a flat, ordered list of typed UI blocks
//! that a thin native client can render without an HTML engine, and keeps the compiled output
//! cached per content item.
//!
//! ## Overview
//!
//! Content arrives as arbitrary markup: page-builder output, embeds, expanded shortcodes.
//! The [`codec::DomCompiler`] walks it once and decides, node by node, what can be rendered
//! natively (paragraphs, headings, images, lists, quotes) and what must be shipped verbatim to
//! an embedded web view (`table`, `form`, `iframe`, page-builder wrappers, ...). Catalog items
//! are carried through the upstream shortcode pass as marker comments and come out as
//! [`blocks::Block::ForeignReference`] placeholders.
//!
//! The result is kept in a [`cache::CompiledCache`], refreshed on every save and invalidated
//! when a referenced catalog item changes ([`invalidate::ReferenceInvalidator`]). A resumable
//! [`batch::BatchRecompiler`] warms the whole cache in small chunks.
//!
//! ## Quick Start
//!
//! ```rust
//! use pressnative_core::{blocks::Block, codec::{compile, encode_markers}};
//!
//! let rendered = encode_markers(r#"<h2>Deal of the day</h2>[product id="76"]"#);
//! let blocks = compile(&rendered);
//! assert_eq!(blocks.len(), 2);
//! assert_eq!(blocks[1], Block::foreign_reference(76));
//! ```
//!
//! Caching and warm-up run on tokio:
//!
//! ```rust,no_run
//! use pressnative_core::{
//!     batch::{BatchRecompiler, MemoryProgressStore},
//!     cache::{CompiledCache, MemoryStore},
//!     source::MemoryContentSource,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), pressnative_core::PressNativeError> {
//! let source: MemoryContentSource = [(1, "<p>Hello</p>".to_string())].into_iter().collect();
//! let cache = CompiledCache::new(MemoryStore::new());
//! let recompiler = BatchRecompiler::new(cache.clone(), source.clone(), MemoryProgressStore::new());
//!
//! recompiler.schedule().await?;
//! let progress = recompiler.run_to_completion().await?;
//! assert_eq!(progress.compiled, 1);
//!
//! let blocks = cache.get_or_compile(1, &source).await?;
//! assert_eq!(blocks.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: compiler, in-memory cache and batch recompiler
//! - **service**: SQLite persistence ([`db`]) through `sqlx`
//! - **bin**: the `pressnative` command line tool

pub mod batch;
pub mod blocks;
pub mod cache;
pub mod codec;
pub mod config;
#[cfg(feature = "service")]
pub mod db;
pub mod error;
pub mod event;
pub mod invalidate;
pub mod source;
#[cfg(test)]
mod tests;

pub use error::*;
