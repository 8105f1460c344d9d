//! Turns author-supplied Markdown into HTML that is safe to embed in a
//! page unescaped. Conversion, sanitization and auto-linking run on
//! every read; nothing is cached or precomputed.

use std::collections::{HashMap, HashSet};

use linkify::{LinkFinder, LinkKind};
use pulldown_cmark::{Event, Options, Parser, html};

/// Tags that survive sanitization. Everything else is stripped, and
/// `script`/`style` lose their contents as well.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "blockquote", "br", "code", "del", "em", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "i", "img", "li", "ol", "p", "pre", "strong", "table", "tbody", "td", "th",
    "thead", "tr", "ul",
];

/// Elements whose text content must not be auto-linked.
const AUTOLINK_SKIP: &[&str] = &["a", "code", "pre"];

pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    // Single newlines become hard breaks, the way authors writing in a
    // web form expect them to.
    let parser = Parser::new_ext(markdown, options).map(|ev| match ev {
        Event::SoftBreak => Event::HardBreak,
        ev => ev,
    });

    let mut rendered = String::new();
    html::push_html(&mut rendered, parser);

    autolink(&sanitize(&rendered))
}

fn sanitize(html: &str) -> String {
    let mut anchor_attributes = HashSet::new();
    anchor_attributes.extend(["href", "title", "rel", "target"]);

    let mut image_attributes = HashSet::new();
    image_attributes.extend(["src", "alt", "title"]);

    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", anchor_attributes);
    tag_attributes.insert("img", image_attributes);

    ammonia::Builder::default()
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .generic_attributes(HashSet::new())
        .tag_attributes(tag_attributes)
        // `rel` is an author-controlled attribute here, so ammonia must
        // not try to manage it on its own.
        .link_rel(None)
        .clean(html)
        .to_string()
}

/// Wraps bare URLs and email addresses in anchors, leaving alone any
/// text that already sits inside an anchor or a code block. Operates on
/// sanitized output, so the text segments contain only entity-escaped
/// character data.
fn autolink(html: &str) -> String {
    let finder = LinkFinder::new();
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut skip_depth = 0usize;

    while let Some(lt) = rest.find('<') {
        let (text, tail) = rest.split_at(lt);
        push_text(&mut out, text, &finder, skip_depth);

        let Some(gt) = tail.find('>') else {
            // An unclosed `<` cannot come out of the sanitizer, but
            // degrade to passing the remainder through untouched.
            out.push_str(tail);
            return out;
        };

        let tag = &tail[..=gt];
        if let Some(name) = tag_name(tag) {
            if AUTOLINK_SKIP.contains(&name) {
                if tag.starts_with("</") {
                    skip_depth = skip_depth.saturating_sub(1);
                } else {
                    skip_depth += 1;
                }
            }
        }
        out.push_str(tag);
        rest = &tail[gt + 1..];
    }

    push_text(&mut out, rest, &finder, skip_depth);
    out
}

fn push_text(out: &mut String, text: &str, finder: &LinkFinder, skip_depth: usize) {
    if text.is_empty() {
        return;
    }
    if skip_depth > 0 {
        out.push_str(text);
        return;
    }
    for span in finder.spans(text) {
        match span.kind() {
            Some(LinkKind::Url) => {
                let url = span.as_str();
                out.push_str(&format!("<a href=\"{url}\" rel=\"nofollow\">{url}</a>"));
            }
            Some(LinkKind::Email) => {
                let email = span.as_str();
                out.push_str(&format!(
                    "<a href=\"mailto:{email}\" rel=\"nofollow\">{email}</a>"
                ));
            }
            _ => out.push_str(span.as_str()),
        }
    }
}

/// The element name of a raw `<...>` fragment, or None for comments and
/// other non-element markup.
fn tag_name(tag: &str) -> Option<&str> {
    let inner = tag.strip_prefix('<')?.strip_suffix('>')?;
    let inner = inner.strip_prefix('/').unwrap_or(inner);
    let end = inner
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(inner.len());
    let name = &inner[..end];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_script_is_stripped_heading_survives() {
        let html = render_markdown("# T\n\n<script>alert(1)</script>");
        assert!(html.contains("<h1>"), "heading should render: {html}");
        assert!(html.contains('T'), "heading text should survive: {html}");
        assert!(!html.contains("script"), "script element must be gone: {html}");
        assert!(!html.contains("alert(1)"), "script body must be gone: {html}");
    }

    #[test]
    fn test_disallowed_inline_tag_keeps_its_text() {
        let html = render_markdown("a <span class=\"x\">styled</span> word");
        assert!(!html.contains("<span"), "span is not on the allow-list: {html}");
        assert!(html.contains("styled"), "inner text should be kept: {html}");
    }

    #[test]
    fn test_newline_becomes_hard_break() {
        let html = render_markdown("first\nsecond");
        assert!(html.contains("<br"), "single newline should break the line: {html}");
    }

    #[test]
    fn test_fenced_code_block() {
        let html = render_markdown("```\nlet x = 1;\n```");
        assert!(html.contains("<pre>"), "fence should produce pre: {html}");
        assert!(html.contains("<code>"), "fence should produce code: {html}");
        assert!(html.contains("let x = 1;"), "code text should survive: {html}");
    }

    #[test]
    fn test_table_and_strikethrough() {
        let html = render_markdown("| a | b |\n| --- | --- |\n| 1 | 2 |\n\nand ~~gone~~");
        assert!(html.contains("<table>"), "table extension should be on: {html}");
        assert!(html.contains("<del>"), "strikethrough should render: {html}");
    }

    #[test]
    fn test_task_list_checkbox_is_stripped() {
        let html = render_markdown("- [x] done\n- [ ] open");
        assert!(html.contains("<li>"), "task items are list items: {html}");
        assert!(html.contains("done"), "item text should survive: {html}");
        assert!(!html.contains("<input"), "form controls are not allowed: {html}");
    }

    #[test]
    fn test_bare_url_is_autolinked() {
        let html = render_markdown("go to https://example.com for more");
        assert!(
            html.contains("<a href=\"https://example.com\" rel=\"nofollow\">"),
            "bare URL should become an anchor: {html}"
        );
    }

    #[test]
    fn test_bare_email_is_autolinked() {
        let html = render_markdown("mail me at user@example.com please");
        assert!(
            html.contains("href=\"mailto:user@example.com\""),
            "bare email should become a mailto anchor: {html}"
        );
    }

    #[test]
    fn test_url_inside_code_is_left_alone() {
        let html = render_markdown("`https://example.com`");
        assert!(
            !html.contains("<a href"),
            "code spans must not be auto-linked: {html}"
        );
    }

    #[test]
    fn test_markdown_link_is_not_double_linked() {
        let html = render_markdown("[site](https://example.com)");
        assert_eq!(
            html.matches("<a ").count(),
            1,
            "existing anchors must not be wrapped again: {html}"
        );
    }

    #[test]
    fn test_empty_input_renders_empty() {
        assert_eq!(render_markdown(""), "");
    }

    #[test]
    fn test_malformed_markdown_degrades_to_text() {
        let html = render_markdown("*unclosed [emphasis](");
        assert!(
            html.contains("unclosed"),
            "unrecognized syntax should pass through as text: {html}"
        );
    }
}
