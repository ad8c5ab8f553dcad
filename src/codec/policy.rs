//! Which subtrees are handed to the client verbatim instead of being decomposed.

use serde::{Deserialize, Serialize};

/// Tags that always become a single `Html` block. These carry executable or interactive
/// semantics, or structure (tabular data, forms) that flat blocks cannot express.
pub const BAILOUT_TAGS: [&str; 6] = ["table", "form", "iframe", "script", "style", "video"];

/// Class fragments left behind by page builders and the block editor. A `div` whose `class`
/// attribute contains any of them is almost always deeply nested presentational markup.
pub const DEFAULT_CLASS_PATTERNS: [&str; 9] = [
    "elementor",
    "et_pb_",
    "vc_",
    "fl-builder",
    "fusion-",
    "brxe-",
    "wp-block-",
    "woocommerce",
    "wc-block",
];

pub fn is_bailout_tag(name: &str) -> bool {
    BAILOUT_TAGS.contains(&name)
}

/// Class-based bailout for `div` elements.
///
/// Matching is a plain substring test against the whole attribute value, so an author-written
/// `my-woocommerce-note` bails out too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BailoutPolicy {
    pub class_patterns: Vec<String>,
}

impl Default for BailoutPolicy {
    fn default() -> Self {
        BailoutPolicy {
            class_patterns: DEFAULT_CLASS_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl BailoutPolicy {
    pub fn new<I, S>(class_patterns: I) -> BailoutPolicy
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BailoutPolicy {
            class_patterns: class_patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches_class(&self, class_attr: &str) -> bool {
        self.class_patterns
            .iter()
            .any(|pattern| class_attr.contains(pattern.as_str()))
    }
}
