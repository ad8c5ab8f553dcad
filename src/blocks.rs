//! The flat block model handed to native clients.
//!
//! A compiled document is an ordered `Vec<Block>` in document order. Blocks never nest, and each
//! variant has a drop rule: the checked constructors return `None` instead of building a block
//! the client would have to render as nothing. The compiler only creates blocks through them.
//!
//! Blocks serialize as internally tagged JSON (`{"type": "text", ...}`), which is also the
//! payload format of the compiled cache. The cross-reference invalidator relies on
//! `ForeignReference` serializing its id as a bare integer field named `entity_id`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage key of a piece of content in the upstream content store.
pub type ContentId = i64;

/// Identifier of an entity outside the document, e.g. a catalog item.
pub type EntityId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    #[default]
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Heading5,
    Heading6,
}

impl TextStyle {
    /// Maps a lower-cased tag name to its text style, `None` for anything but `p` and `h1`..`h6`.
    pub fn from_tag(tag: &str) -> Option<TextStyle> {
        match tag {
            "p" => Some(TextStyle::Paragraph),
            "h1" => Some(TextStyle::Heading1),
            "h2" => Some(TextStyle::Heading2),
            "h3" => Some(TextStyle::Heading3),
            "h4" => Some(TextStyle::Heading4),
            "h5" => Some(TextStyle::Heading5),
            "h6" => Some(TextStyle::Heading6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        html_content: String,
        text: String,
        style: TextStyle,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
        #[serde(default)]
        alt: String,
    },
    List {
        items: Vec<String>,
    },
    Quote {
        text: String,
        #[serde(default)]
        author: String,
    },
    /// Verbatim markup the client renders in an isolated web view.
    Html {
        html: String,
    },
    /// Placeholder for an external entity; the client resolves `entity_id` on its own.
    ForeignReference {
        entity_id: EntityId,
    },
}

impl Block {
    /// Builds a text block, trimming both fields. Dropped when either is blank.
    pub fn text(html_content: &str, text: &str, style: TextStyle) -> Option<Block> {
        let html_content = html_content.trim();
        let text = text.trim();
        if html_content.is_empty() || text.is_empty() {
            return None;
        }
        Some(Block::Text {
            html_content: html_content.to_string(),
            text: text.to_string(),
            style,
        })
    }

    pub fn image(
        url: &str,
        width: Option<u32>,
        height: Option<u32>,
        alt: Option<&str>,
    ) -> Option<Block> {
        if url.is_empty() {
            return None;
        }
        Some(Block::Image {
            url: url.to_string(),
            width,
            height,
            alt: alt.unwrap_or_default().to_string(),
        })
    }

    /// Keeps the non-blank items, trimmed, in their original order.
    pub fn list<I, S>(items: I) -> Option<Block>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .filter_map(|item| {
                let item = item.as_ref().trim();
                (!item.is_empty()).then(|| item.to_string())
            })
            .collect();
        if items.is_empty() {
            return None;
        }
        Some(Block::List { items })
    }

    /// Removes the first occurrence of `author` from `text` before trimming. Dropped when nothing
    /// but the attribution remains.
    pub fn quote(text: &str, author: Option<&str>) -> Option<Block> {
        let author = author.map(str::trim).unwrap_or_default();
        let text = if author.is_empty() {
            text.trim().to_string()
        } else {
            text.replacen(author, "", 1).trim().to_string()
        };
        if text.is_empty() {
            return None;
        }
        Some(Block::Quote {
            text,
            author: author.to_string(),
        })
    }

    pub fn html(html: String) -> Block {
        Block::Html { html }
    }

    pub fn foreign_reference(entity_id: EntityId) -> Block {
        Block::ForeignReference { entity_id }
    }

    /// The external entity this block stands in for, if any.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Block::ForeignReference { entity_id } => Some(*entity_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Block::Text { .. } => "text",
            Block::Image { .. } => "image",
            Block::List { .. } => "list",
            Block::Quote { .. } => "quote",
            Block::Html { .. } => "html",
            Block::ForeignReference { .. } => "foreign_reference",
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Block::Text { text, style, .. } => write!(f, "Text({style:?}, {} chars)", text.len()),
            Block::Image { url, .. } => write!(f, "Image({url})"),
            Block::List { items } => write!(f, "List({} items)", items.len()),
            Block::Quote { author, .. } => write!(f, "Quote(author: {author:?})"),
            Block::Html { html } => write!(f, "Html({} bytes)", html.len()),
            Block::ForeignReference { entity_id } => write!(f, "ForeignReference({entity_id})"),
        }
    }
}

/// Every entity id referenced by `blocks`, in document order, duplicates included.
pub fn referenced_entities(blocks: &[Block]) -> Vec<EntityId> {
    blocks.iter().filter_map(Block::entity_id).collect()
}
