//! Behavioural tests for the DOM compiler

use super::helpers::*;
use crate::{
    blocks::{Block, TextStyle},
    codec::{compile, encode_markers, marker_comment, BailoutPolicy, DomCompiler},
};
use test_log::test;

#[test]
fn test_sample_document() {
    let blocks = compile(&sample_document());
    assert_eq!(
        blocks,
        vec![
            styled(
                "Spring <em>collection</em>",
                "Spring collection",
                TextStyle::Heading1
            ),
            styled(
                "New arrivals, picked by <a href=\"/team\">our team</a>.",
                "New arrivals, picked by our team.",
                TextStyle::Paragraph
            ),
            Block::html(
                "<div class=\"elementor-section\"><div class=\"elementor-widget\">Slider</div></div>"
                    .to_string()
            ),
            Block::Image {
                url: "/spring.jpg".to_string(),
                width: Some(1200),
                height: Some(800),
                alt: "Spring".to_string(),
            },
            Block::foreign_reference(76),
            Block::List {
                items: vec!["Linen".to_string(), "<strong>Cotton</strong>".to_string()],
            },
            Block::Quote {
                text: "Best shop in town.".to_string(),
                author: "Ana".to_string(),
            },
            Block::html("<table><tr><td>Size</td><td>M</td></tr></table>".to_string()),
        ]
    );
}

#[test]
fn test_compile_is_deterministic() {
    init_logging();
    let doc = sample_document();
    assert_eq!(compile(&doc), compile(&doc));
    let compiler = DomCompiler::default();
    assert_eq!(compiler.compile(&doc), compile(&doc));
}

#[test]
fn test_blank_input() {
    assert!(compile("").is_empty());
    assert!(compile(" \n\t ").is_empty());
    assert!(compile("<!-- just a note -->").is_empty());
    assert!(compile("<div>   </div><p> </p>").is_empty());
}

#[test]
fn test_sibling_order_is_preserved() {
    let blocks = compile("<p>A</p><p>B</p><p>C</p>");
    assert_eq!(blocks, vec![para("A"), para("B"), para("C")]);

    let nested = compile("<section><div><p>A</p></div><p>B</p></section><p>C</p>");
    assert_eq!(nested, vec![para("A"), para("B"), para("C")]);
}

#[test]
fn test_table_is_never_decomposed() {
    let blocks = compile("<table><p>x</p></table>");
    assert_eq!(
        blocks,
        vec![Block::html("<table><p>x</p></table>".to_string())]
    );

    // Even a page-builder class on a table does not change the outcome.
    let classed = compile("<table class=\"plain\"><tr><td><img src=\"a.png\"></td></tr></table>");
    assert_eq!(classed.len(), 1);
    assert!(matches!(&classed[0], Block::Html { html } if html.starts_with("<table")));
}

#[test]
fn test_bailout_tags() {
    for src in [
        "<form action=\"/s\"><input name=\"q\"></form>",
        "<iframe src=\"https://video.example/1\"></iframe>",
        "<script>var a = 1 < 2;</script>",
        "<style>p > a { color: red }</style>",
        "<video src=\"clip.mp4\" preload=\"none\"></video>",
    ] {
        assert_eq!(compile(src), vec![Block::html(src.to_string())], "{src}");
    }
}

#[test]
fn test_div_class_bailout() {
    let builder = "<div class=\"wp-block-columns\"><p>Left</p><p>Right</p></div>";
    assert_eq!(compile(builder), vec![Block::html(builder.to_string())]);

    let plain = "<div class=\"content\"><p>Left</p><p>Right</p></div>";
    assert_eq!(compile(plain), vec![para("Left"), para("Right")]);

    // The heuristic only applies to div.
    let span = "<span class=\"elementor-icon\">Hi</span>";
    assert_eq!(compile(span), vec![para("Hi")]);
}

#[test]
fn test_configured_class_patterns() {
    let compiler = DomCompiler::new(BailoutPolicy::new(["legacy-"]));
    let legacy = "<div class=\"legacy-grid\"><p>x</p></div>";
    assert_eq!(compiler.compile(legacy), vec![Block::html(legacy.to_string())]);
    assert_eq!(
        compiler.compile("<div class=\"elementor\"><p>x</p></div>"),
        vec![para("x")]
    );
}

#[test]
fn test_headings() {
    let blocks = compile("<h2>Two</h2><h6><a href=\"#\">Six</a></h6><h3>  </h3>");
    assert_eq!(
        blocks,
        vec![
            styled("Two", "Two", TextStyle::Heading2),
            styled("<a href=\"#\">Six</a>", "Six", TextStyle::Heading6),
        ]
    );
}

#[test]
fn test_image_rules() {
    assert!(compile("<img alt=\"no source\">").is_empty());
    assert!(compile("<img src=\"\" alt=\"empty\">").is_empty());
    assert_eq!(
        compile("<img src=\"/a.png\" width=\"300\" height=\"auto\">"),
        vec![Block::Image {
            url: "/a.png".to_string(),
            width: Some(300),
            height: None,
            alt: String::new(),
        }]
    );
}

#[test]
fn test_paragraph_consumes_its_image() {
    // Handled as a text block with no text, so nothing is emitted.
    assert!(compile("<p><img src=\"a.png\"></p>").is_empty());
    assert_eq!(
        compile("<p>Look: <img src=\"a.png\"></p>"),
        vec![styled("Look: <img src=\"a.png\">", "Look:", TextStyle::Paragraph)]
    );
}

#[test]
fn test_list_rules() {
    assert!(compile("<ul></ul>").is_empty());
    assert!(compile("<ol><li> </li></ol>").is_empty());
    assert_eq!(
        compile("<ol><li>A</li><li>B</li></ol>"),
        vec![Block::List {
            items: vec!["A".to_string(), "B".to_string()],
        }]
    );
    // Only direct items count; nested lists stay inside their parent item.
    assert_eq!(
        compile("<ul><li>A<ul><li>A.1</li></ul></li><li>B</ul>"),
        vec![Block::List {
            items: vec!["A<ul><li>A.1</li></ul>".to_string(), "B".to_string()],
        }]
    );
}

#[test]
fn test_quote_rules() {
    assert_eq!(
        compile("<blockquote><p>Stay hungry.</p><cite>Steve</cite></blockquote>"),
        vec![Block::Quote {
            text: "Stay hungry.".to_string(),
            author: "Steve".to_string(),
        }]
    );
    assert_eq!(
        compile("<blockquote>Anonymous words</blockquote>"),
        vec![Block::Quote {
            text: "Anonymous words".to_string(),
            author: String::new(),
        }]
    );
    assert!(compile("<blockquote><cite>Nobody</cite></blockquote>").is_empty());
}

#[test]
fn test_markers() {
    let html = format!("<p>Before</p>{}<p>After</p>", marker_comment(12));
    assert_eq!(
        compile(&html),
        vec![para("Before"), Block::foreign_reference(12), para("After")]
    );

    // Markers inside containers are still found; ordinary comments are dropped.
    let nested = format!("<div><!-- layout -->{}</div>", marker_comment(5));
    assert_eq!(compile(&nested), vec![Block::foreign_reference(5)]);

    let encoded = encode_markers("<p>Featured</p>[product_page id=\"30\"][product id=31]");
    assert_eq!(
        compile(&encoded),
        vec![
            para("Featured"),
            Block::foreign_reference(30),
            Block::foreign_reference(31)
        ]
    );
}

#[test]
fn test_bare_text_and_transparent_containers() {
    assert_eq!(compile("  hello  "), vec![para("hello")]);
    // Loose text carries the same decoded string in both fields.
    assert_eq!(compile("Tom &amp; Jerry"), vec![para("Tom & Jerry")]);
    assert_eq!(compile("a &lt; b"), vec![para("a < b")]);
    assert_eq!(
        compile("<article><section><span>inline</span></section></article>"),
        vec![para("inline")]
    );
}

#[test]
fn test_malformed_markup_degrades() {
    assert_eq!(
        compile("<p>unclosed <b>bold"),
        vec![styled(
            "unclosed <b>bold</b>",
            "unclosed bold",
            TextStyle::Paragraph
        )]
    );
    assert_eq!(compile("</div></p>text"), vec![para("text")]);
    assert_eq!(compile("<p>one<p>two"), vec![para("one"), para("two")]);
    assert!(compile("<<<>>>").len() <= 1);
}

#[test]
fn test_deep_nesting_does_not_overflow() {
    let depth = 5_000;
    let html = format!("{}<p>deep</p>{}", "<div>".repeat(depth), "</div>".repeat(depth));
    assert_eq!(compile(&html), vec![para("deep")]);
}

#[test]
fn test_bailout_survives_depth_cap() {
    let html = format!(
        "{}<table><tr><td>secret</td></tr></table><script>var s = '<b>x</b>';</script>",
        "<div>".repeat(300)
    );
    let blocks = compile(&html);
    assert_eq!(blocks.len(), 2, "{blocks:?}");
    assert!(
        matches!(&blocks[0], Block::Html { html } if html.starts_with("<table") && html.contains("secret")),
        "{:?}",
        blocks[0]
    );
    assert_eq!(
        blocks[1],
        Block::html("<script>var s = '<b>x</b>';</script>".to_string())
    );
}
