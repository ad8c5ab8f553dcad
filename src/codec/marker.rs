//! Sentinel markers for references to entities outside the document.
//!
//! Catalog shortcodes such as `[product id="76"]` expand upstream into heavy widget markup that
//! would otherwise be bailed out or fragmented by the compiler. [`MarkerCodec::encode`] swaps each
//! shortcode for `<!--PRESSNATIVE_PRODUCT:76-->` *before* the upstream expansion pass runs, and
//! [`decode_marker`] recognizes the comment again when the compiler walks the rendered markup.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

use crate::{blocks::EntityId, error::PressNativeError};

pub const MARKER_PREFIX: &str = "PRESSNATIVE_PRODUCT";

/// Shortcode tags that are treated as catalog embeds when no other list is configured.
pub const DEFAULT_SHORTCODES: [&str; 2] = ["product_page", "product"];

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*{MARKER_PREFIX}:(\d+)\s*$")).expect("marker grammar is valid")
});

static ID_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bid\s*=\s*(?:"(\d+)"|'(\d+)'|(\d+)\b)"#).expect("id grammar"));

static DEFAULT_CODEC: Lazy<MarkerCodec> = Lazy::new(MarkerCodec::default);

/// The comment body (without `<!--`/`-->`) that stands in for `entity_id`.
pub fn marker_text(entity_id: EntityId) -> String {
    format!("{MARKER_PREFIX}:{entity_id}")
}

/// The full HTML comment that stands in for `entity_id`.
pub fn marker_comment(entity_id: EntityId) -> String {
    format!("<!--{}-->", marker_text(entity_id))
}

/// Returns the entity id carried by an HTML comment's text, or `None` when the comment is anything
/// other than a marker. Surrounding whitespace inside the comment is tolerated.
pub fn decode_marker(comment_text: &str) -> Option<EntityId> {
    MARKER_RE
        .captures(comment_text)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<EntityId>().ok())
}

/// Encodes markers with the default shortcode list.
pub fn encode_markers(raw_markup: &str) -> String {
    DEFAULT_CODEC.encode(raw_markup).into_owned()
}

#[derive(Debug, Clone)]
pub struct MarkerCodec {
    shortcode_re: Regex,
}

impl Default for MarkerCodec {
    fn default() -> Self {
        MarkerCodec::new(DEFAULT_SHORTCODES).expect("default shortcode names are valid")
    }
}

impl MarkerCodec {
    /// Builds a codec recognizing `[name ... id="N" ...]` for each shortcode name.
    pub fn new<I, S>(shortcodes: I) -> Result<MarkerCodec, PressNativeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = shortcodes
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Err(PressNativeError::Config(
                "at least one marker shortcode name is required".to_string(),
            ));
        }
        // Longest first so `product_page` is never shadowed by `product`.
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        let alternation = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<String>>()
            .join("|");
        let shortcode_re = Regex::new(&format!(r"\[(?:{alternation})(\s[^\[\]]*)?\]"))?;
        Ok(MarkerCodec { shortcode_re })
    }

    /// Replaces every recognized shortcode carrying a numeric `id` with a marker comment. Only the
    /// shortcode's own span is rewritten; shortcodes without a numeric id are left alone, and the
    /// input is borrowed back untouched when nothing matched.
    pub fn encode<'a>(&self, raw_markup: &'a str) -> Cow<'a, str> {
        self.shortcode_re.replace_all(raw_markup, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match shortcode_entity_id(attrs) {
                Some(entity_id) => {
                    tracing::debug!("[MarkerCodec] encoding shortcode {whole:?} as {entity_id}");
                    marker_comment(entity_id)
                }
                None => whole.to_string(),
            }
        })
    }
}

fn shortcode_entity_id(attrs: &str) -> Option<EntityId> {
    let caps = ID_ATTR_RE.captures(attrs)?;
    let digits = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
    digits.as_str().parse().ok()
}
