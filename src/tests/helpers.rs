//! Shared test utilities for compiler tests

use crate::blocks::{Block, TextStyle};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn para(text: &str) -> Block {
    styled(text, text, TextStyle::Paragraph)
}

pub fn styled(html_content: &str, text: &str, style: TextStyle) -> Block {
    Block::Text {
        html_content: html_content.to_string(),
        text: text.to_string(),
        style,
    }
}

/// A realistic post body mixing native content, page-builder output and a product marker.
pub fn sample_document() -> String {
    [
        "<h1>Spring <em>collection</em></h1>",
        "<p>New arrivals, picked by <a href=\"/team\">our team</a>.</p>",
        "<div class=\"elementor-section\"><div class=\"elementor-widget\">Slider</div></div>",
        "<figure><img src=\"/spring.jpg\" width=\"1200\" height=\"800px\" alt=\"Spring\"></figure>",
        "<!--PRESSNATIVE_PRODUCT:76-->",
        "<ul><li>Linen</li><li><strong>Cotton</strong></li></ul>",
        "<blockquote>Best shop in town. <cite>Ana</cite></blockquote>",
        "<table><tr><td>Size</td><td>M</td></tr></table>",
    ]
    .concat()
}
