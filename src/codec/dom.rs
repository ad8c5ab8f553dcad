//! A small, forgiving DOM for editor-authored fragments.
//!
//! Tokenization is html5ever's: entities are decoded, attributes parsed, and `script`/`style`
//! style elements switch the tokenizer into its raw-text states. Tree construction is *not* the
//! HTML5 algorithm. That algorithm foster-parents misplaced content out of tables (so
//! `<table><p>x</p></table>` would become `<p>x</p><table></table>`), which would defeat bailout
//! by tag. Instead a plain open-element stack is used:
//!
//! - void elements never take children, and a self-closing flag closes any element immediately;
//! - an end tag closes the nearest open element with that name and everything opened after it;
//!   end tags with no open match are dropped;
//! - a block-level start tag closes a `p` that is the current node, and `li` closes the open `li`
//!   of the same list;
//! - start tags nested deeper than [`MAX_DEPTH`] are dropped, their text is kept. Bailout and
//!   raw-text tags still open one level past the cap so they keep their own subtree, and end
//!   tags of dropped elements are swallowed.
//!
//! Tokenization never fails, so every input yields a tree.

use crate::codec::policy::is_bailout_tag;
use html5ever::{
    tendril::StrTendril,
    tokenizer::{
        states::RawKind, BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer,
        TokenizerOpts, TokenizerResult,
    },
};

/// Elements deeper than this are flattened into their ancestor.
pub const MAX_DEPTH: usize = 256;

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: [&str; 7] = [
    "script",
    "style",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "plaintext",
];

/// Start tags that implicitly close an open `p`.
const CLOSES_PARAGRAPH: [&str; 29] = [
    "address",
    "article",
    "aside",
    "blockquote",
    "details",
    "div",
    "dl",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

/// The synthetic name of the fragment root.
const ROOT: &str = "body";

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

/// The tokenizer state a start tag named `name` switches into, if any.
fn raw_data_switch(name: &str) -> Option<TokenSinkResult<()>> {
    match name {
        "script" => Some(TokenSinkResult::RawData(RawKind::ScriptData)),
        "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
            Some(TokenSinkResult::RawData(RawKind::Rawtext))
        }
        "textarea" | "title" => Some(TokenSinkResult::RawData(RawKind::Rcdata)),
        "plaintext" => Some(TokenSinkResult::Plaintext),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-cased tag name.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl Element {
    pub fn new(name: &str) -> Element {
        Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn from_tag(tag: &Tag) -> Element {
        Element {
            name: tag.name.to_string(),
            attrs: tag
                .attrs
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect(),
            children: Vec::new(),
        }
    }

    /// The first value of attribute `name`, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            DomNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First descendant element named `name`, in document order.
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenation of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        push_text(&self.children, &mut out);
        out
    }

    /// The element's own tags plus its serialized children.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }

    /// The serialized children, without the element's own tags.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        let raw = is_raw_text(&self.name);
        for child in self.children.iter() {
            write_node(child, raw, &mut out);
        }
        out
    }
}

fn push_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(text) => out.push_str(text),
            DomNode::Element(el) => push_text(&el.children, out),
            DomNode::Comment(_) => {}
        }
    }
}

fn write_node(node: &DomNode, raw: bool, out: &mut String) {
    match node {
        DomNode::Element(el) => write_element(el, out),
        DomNode::Text(text) if raw => out.push_str(text),
        DomNode::Text(text) => escape_into(text, false, out),
        DomNode::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in el.attrs.iter() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_into(value, true, out);
        out.push('"');
    }
    out.push('>');
    if is_void(&el.name) {
        return;
    }
    let raw = is_raw_text(&el.name);
    for child in el.children.iter() {
        write_node(child, raw, out);
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn escape_into(text: &str, attr_mode: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// A parsed fragment: the children of the synthetic body wrapper, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub children: Vec<DomNode>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children.iter() {
            write_node(child, false, &mut out);
        }
        out
    }
}

/// Parses `html` as a body fragment.
pub fn parse_fragment(html: &str) -> Fragment {
    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(html));
    let mut tokenizer = Tokenizer::new(TreeSink::default(), TokenizerOpts::default());
    loop {
        match tokenizer.feed(&mut input) {
            TokenizerResult::Done => break,
            // The sink never asks for a script pause; resume where the tokenizer stopped.
            TokenizerResult::Script(()) => continue,
        }
    }
    tokenizer.end();
    tokenizer.sink.finish()
}

/// Open-element stack. Index 0 is the synthetic root and is never popped before `finish`.
struct TreeSink {
    stack: Vec<Element>,
    /// Names of elements dropped at the depth cap that are still awaiting their end tag.
    dropped: Vec<String>,
}

impl Default for TreeSink {
    fn default() -> Self {
        TreeSink {
            stack: vec![Element::new(ROOT)],
            dropped: Vec::new(),
        }
    }
}

impl TreeSink {
    fn current_name(&self) -> &str {
        self.stack.last().map(|el| el.name.as_str()).unwrap_or(ROOT)
    }

    fn append(&mut self, node: DomNode) {
        if let Some(current) = self.stack.last_mut() {
            current.children.push(node);
        }
    }

    fn append_text(&mut self, text: &str) {
        let Some(current) = self.stack.last_mut() else {
            return;
        };
        if let Some(DomNode::Text(existing)) = current.children.last_mut() {
            existing.push_str(text);
        } else {
            current.children.push(DomNode::Text(text.to_string()));
        }
    }

    /// Pops the current element into its parent's children.
    fn close_current(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(el) = self.stack.pop() {
            self.append(DomNode::Element(el));
        }
    }

    /// Closes open elements down to and including the one at `index`.
    fn close_to(&mut self, index: usize) {
        while self.stack.len() > index.max(1) {
            self.close_current();
        }
    }

    fn open_list_item_index(&self) -> Option<usize> {
        for (index, el) in self.stack.iter().enumerate().skip(1).rev() {
            match el.name.as_str() {
                "li" => return Some(index),
                "ul" | "ol" => return None,
                _ => {}
            }
        }
        None
    }

    fn start_tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        let name: &str = &tag.name;
        if CLOSES_PARAGRAPH.contains(&name) && self.current_name() == "p" {
            self.close_current();
        }
        if name == "li" {
            if let Some(index) = self.open_list_item_index() {
                self.close_to(index);
            }
        }
        let self_closing = is_void(name) || tag.self_closing;
        if self.stack.len() > MAX_DEPTH {
            let keeps_subtree = is_bailout_tag(name) || raw_data_switch(name).is_some();
            if !(keeps_subtree && self.stack.len() == MAX_DEPTH + 1) {
                tracing::trace!("[dom] dropping <{}> beyond max depth", name);
                if self_closing {
                    return TokenSinkResult::Continue;
                }
                self.dropped.push(name.to_string());
                // Raw text still has to be consumed raw, or it would turn into markup.
                return raw_data_switch(name).unwrap_or(TokenSinkResult::Continue);
            }
        }

        let element = Element::from_tag(&tag);
        if self_closing {
            self.append(DomNode::Element(element));
            return TokenSinkResult::Continue;
        }

        let result = raw_data_switch(&element.name).unwrap_or(TokenSinkResult::Continue);
        self.stack.push(element);
        result
    }

    fn end_tag(&mut self, tag: Tag) {
        let name: &str = &tag.name;
        if let Some(pos) = self.dropped.iter().rposition(|dropped| dropped == name) {
            self.dropped.remove(pos);
            return;
        }
        let open = self
            .stack
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .find(|(_, el)| el.name == name)
            .map(|(index, _)| index);
        match open {
            Some(index) => {
                self.close_to(index);
                self.dropped.clear();
            }
            None => tracing::trace!("[dom] ignoring stray </{}>", name),
        }
    }

    fn finish(mut self) -> Fragment {
        self.close_to(1);
        let root = self.stack.pop().unwrap_or_else(|| Element::new(ROOT));
        Fragment {
            children: root.children,
        }
    }
}

impl TokenSink for TreeSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(tag),
                TagKind::EndTag => self.end_tag(tag),
            },
            Token::CharacterTokens(text) => self.append_text(&text),
            Token::CommentToken(text) => self.append(DomNode::Comment(text.to_string())),
            Token::DoctypeToken(_)
            | Token::NullCharacterToken
            | Token::EOFToken
            | Token::ParseError(_) => {}
        }
        TokenSinkResult::Continue
    }
}
