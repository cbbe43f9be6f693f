//! Markdown: The text-to-safe-HTML collaborator.
//!
//! The core never interprets HTML it did not get from a
//! [`MarkdownSanitizer`]. [`PulldownSanitizer`] is the stock implementation.

use pulldown_cmark::{html, Event, Options, Parser};

/// Converts markdown text into HTML that is safe to insert.
pub trait MarkdownSanitizer: Send + Sync {
    /// Render `text` to sanitized HTML.
    fn render(&self, text: &str) -> String;
}

impl<F> MarkdownSanitizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn render(&self, text: &str) -> String {
        self(text)
    }
}

/// CommonMark renderer that escapes any raw HTML in the source.
#[derive(Debug, Clone, Copy)]
pub struct PulldownSanitizer {
    options: Options,
}

impl Default for PulldownSanitizer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
        }
    }
}

impl PulldownSanitizer {
    /// Create a sanitizer with tables and strikethrough enabled.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkdownSanitizer for PulldownSanitizer {
    fn render(&self, text: &str) -> String {
        // Raw HTML is demoted to text so the writer escapes it.
        let events = Parser::new_ext(text, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, events);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulldown_paragraph() {
        let sanitizer = PulldownSanitizer::new();
        assert_eq!(sanitizer.render("Hello"), "<p>Hello</p>\n");
    }

    #[test]
    fn test_pulldown_escapes_raw_html() {
        let sanitizer = PulldownSanitizer::new();
        let html = sanitizer.render("hi <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_pulldown_code_block() {
        let sanitizer = PulldownSanitizer::new();
        let html = sanitizer.render("```\nlet x = 1;\n```");
        assert_eq!(html, "<pre><code>let x = 1;\n</code></pre>\n");
    }

    #[test]
    fn test_closure_sanitizer() {
        let upper = |text: &str| text.to_uppercase();
        assert_eq!(MarkdownSanitizer::render(&upper, "ab"), "AB");
    }
}
