use once_cell::sync::Lazy;

use crate::{
    blocks::{Block, TextStyle},
    codec::{
        dom::{parse_fragment, DomNode, Element},
        marker::decode_marker,
        policy::{is_bailout_tag, BailoutPolicy},
    },
};

static DEFAULT_COMPILER: Lazy<DomCompiler> = Lazy::new(DomCompiler::default);

/// Compiles rendered markup into blocks with the default bailout policy.
pub fn compile(html: &str) -> Vec<Block> {
    DEFAULT_COMPILER.compile(html)
}

/// How a node is handled, decided once before anything is emitted. Variants are listed in
/// precedence order: a `table` is `Bailout` and is never checked for classes or content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeClass<'a> {
    Text(&'a str),
    Comment(&'a str),
    Bailout(&'a Element),
    Special(SpecialKind, &'a Element),
    Container(&'a Element),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKind {
    Text(TextStyle),
    Image,
    List,
    Quote,
}

/// Turns editor-authored HTML into a flat, ordered list of [`Block`]s.
///
/// ## Walk
///
/// The fragment is walked in pre-order. Each node is classified ([`DomCompiler::classify`]) and
/// then either emits its blocks and stops, or (for containers) yields the concatenated blocks
/// of its children:
///
/// | Node | Emits |
/// |---|---|
/// | text | trimmed `Text` paragraph, nothing if blank |
/// | marker comment | `ForeignReference`; other comments emit nothing |
/// | `table form iframe script style video` | one `Html` block of the outer markup |
/// | `div` with a bailout class | one `Html` block of the outer markup |
/// | `p`, `h1`..`h6` | one `Text` block, inline markup kept in `html_content` |
/// | `img` | one `Image` block when `src` is non-empty |
/// | `ul`, `ol` | one `List` block of the direct `li` children's markup |
/// | `blockquote` | one `Quote` block, `cite` text moved to `author` |
/// | anything else | its children's blocks |
///
/// Handlers for special elements consume the whole subtree, so `<p><img src="a"></p>` is a
/// single text block (dropped here, since it has no text), never an `Image`.
///
/// The compiler holds no mutable state and does no I/O; a shared instance can compile from any
/// number of threads.
#[derive(Debug, Clone, Default)]
pub struct DomCompiler {
    policy: BailoutPolicy,
}

impl DomCompiler {
    pub fn new(policy: BailoutPolicy) -> Self {
        DomCompiler { policy }
    }

    pub fn policy(&self) -> &BailoutPolicy {
        &self.policy
    }

    /// Compiles `html` into blocks in document order. Blank input yields no blocks. Parsing is
    /// lenient and never fails, so malformed markup degrades to fewer blocks, never an error.
    #[tracing::instrument(skip_all, fields(len = html.len()))]
    pub fn compile(&self, html: &str) -> Vec<Block> {
        if html.trim().is_empty() {
            return Vec::new();
        }
        let fragment = parse_fragment(html);
        let blocks = self.compile_nodes(&fragment.children);
        tracing::debug!("[DomCompiler] compiled {} blocks", blocks.len());
        blocks
    }

    fn compile_nodes(&self, nodes: &[DomNode]) -> Vec<Block> {
        nodes
            .iter()
            .flat_map(|node| self.compile_node(node))
            .collect()
    }

    pub fn compile_node(&self, node: &DomNode) -> Vec<Block> {
        match self.classify(node) {
            NodeClass::Text(text) => Block::text(text, text, TextStyle::Paragraph)
                .into_iter()
                .collect(),
            NodeClass::Comment(comment) => decode_marker(comment)
                .map(Block::foreign_reference)
                .into_iter()
                .collect(),
            NodeClass::Bailout(el) => vec![Block::html(el.outer_html())],
            NodeClass::Special(kind, el) => special_block(kind, el).into_iter().collect(),
            NodeClass::Container(el) => self.compile_nodes(&el.children),
        }
    }

    pub fn classify<'a>(&self, node: &'a DomNode) -> NodeClass<'a> {
        let el = match node {
            DomNode::Text(text) => return NodeClass::Text(text),
            DomNode::Comment(comment) => return NodeClass::Comment(comment),
            DomNode::Element(el) => el,
        };
        let name = el.name.as_str();
        if is_bailout_tag(name) {
            return NodeClass::Bailout(el);
        }
        if name == "div"
            && el
                .attr("class")
                .is_some_and(|class| self.policy.matches_class(class))
        {
            return NodeClass::Bailout(el);
        }
        if let Some(style) = TextStyle::from_tag(name) {
            return NodeClass::Special(SpecialKind::Text(style), el);
        }
        match name {
            "img" => NodeClass::Special(SpecialKind::Image, el),
            "ul" | "ol" => NodeClass::Special(SpecialKind::List, el),
            "blockquote" => NodeClass::Special(SpecialKind::Quote, el),
            _ => NodeClass::Container(el),
        }
    }
}

fn special_block(kind: SpecialKind, el: &Element) -> Option<Block> {
    match kind {
        SpecialKind::Text(style) => Block::text(&el.inner_html(), &el.text_content(), style),
        SpecialKind::Image => Block::image(
            el.attr("src").unwrap_or_default(),
            el.attr("width").and_then(parse_dimension),
            el.attr("height").and_then(parse_dimension),
            el.attr("alt"),
        ),
        SpecialKind::List => Block::list(
            el.child_elements()
                .filter(|child| child.name == "li")
                .map(Element::inner_html),
        ),
        SpecialKind::Quote => {
            let author = el.find_descendant("cite").map(Element::text_content);
            Block::quote(&el.text_content(), author.as_deref())
        }
    }
}

/// Leading integer of a dimension attribute (`"300"`, `" 300px"`); `None` if there is none.
fn parse_dimension(value: &str) -> Option<u32> {
    let value = value.trim();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}
