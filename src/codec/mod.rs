//! Markup-facing transforms: from rendered HTML to [`Block`](crate::blocks::Block)s.
//!
//! ## Key Components
//!
//! - [`DomCompiler`] - the recursive DOM-to-block walk and its bailout rules
//! - [`MarkerCodec`] - encodes catalog shortcodes into sentinel comments before upstream
//!   rendering, and decodes them back into `ForeignReference` blocks
//! - [`BailoutPolicy`] - the tunable class heuristic for page-builder markup
//! - [`dom`] - the lenient fragment parser and serializer the compiler walks
//!
//! ## Pipeline
//!
//! ```rust
//! use pressnative_core::{blocks::Block, codec::{compile, encode_markers}};
//!
//! // Before the content store expands shortcodes:
//! let raw = "<h2>Pick of the week</h2>\n[product id=\"76\"]";
//! let encoded = encode_markers(raw);
//!
//! // ...upstream rendering runs on `encoded`, markers survive as comments...
//! let blocks = compile(&encoded);
//! assert_eq!(blocks.len(), 2);
//! assert_eq!(blocks[1], Block::ForeignReference { entity_id: 76 });
//! ```

pub mod compiler;
pub mod dom;
pub mod marker;
pub mod policy;

pub use compiler::{compile, DomCompiler, NodeClass, SpecialKind};
pub use marker::{decode_marker, encode_markers, marker_comment, MarkerCodec};
pub use policy::BailoutPolicy;
