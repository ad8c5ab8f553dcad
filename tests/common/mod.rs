//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use pressnative_core::{codec::marker_comment, source::MemoryContentSource};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Rendered post body for `content_id`; posts whose id is a multiple of `every` embed a
/// reference to `product`.
#[allow(dead_code)]
pub fn post_body(content_id: i64, product: u64, every: i64) -> String {
    let mut body = format!("<h2>Post {content_id}</h2><p>Body of post {content_id}.</p>");
    if content_id % every == 0 {
        body.push_str(&marker_comment(product));
    }
    body
}

/// A content store with ids `1..=count`.
#[allow(dead_code)]
pub fn content_store(count: i64, product: u64, every: i64) -> MemoryContentSource {
    (1..=count)
        .map(|id| (id, post_body(id, product, every)))
        .collect()
}
