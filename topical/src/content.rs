//! Message body rendering.
//!
//! Message text is treated as Markdown and converted to HTML with
//! pulldown-cmark. pulldown-cmark passes raw inline HTML through untouched, so
//! the result is then run through ammonia's allowlist cleaner before it is
//! ever embedded in a page.

use ammonia::Builder;
use once_cell::sync::Lazy;
use pulldown_cmark::{html as md_html, Options, Parser};

static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder.link_rel(Some("noopener noreferrer nofollow"));
    builder
});

/// Render user supplied Markdown into HTML that is safe to embed unescaped.
pub fn render(raw: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(raw, options);
    let mut unsafe_html = String::with_capacity(raw.len() * 2);
    md_html::push_html(&mut unsafe_html, parser);
    CLEANER.clean(&unsafe_html).to_string()
}
