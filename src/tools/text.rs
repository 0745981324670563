/// Maximum characters any tool may hand back to an agent.
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 5000;

/// Cut `text` to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Reduce an HTML document to readable plain text.
///
/// Script and style bodies are dropped, tags are removed, the common entities
/// are decoded and blank lines collapsed. Extraction stops once enough text
/// has been collected to fill `max_chars`.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut out_chars = 0usize;
    let mut rest = html;
    let mut skip_until: Option<&'static str> = None;

    while !rest.is_empty() && out_chars < max_chars.saturating_mul(2) {
        if let Some(closing) = skip_until {
            match find_ci(rest, closing) {
                Some(pos) => {
                    rest = &rest[pos..];
                    skip_until = None;
                }
                None => break,
            }
            continue;
        }

        match rest.find('<') {
            Some(0) if !starts_tag(rest) => {
                out.push('<');
                out_chars += 1;
                rest = &rest[1..];
            }
            Some(0) => {
                let end = match rest.find('>') {
                    Some(end) => end,
                    None => break,
                };
                let tag = &rest[1..end];
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if !tag.starts_with('/') {
                    if name == "script" {
                        skip_until = Some("</script");
                    } else if name == "style" {
                        skip_until = Some("</style");
                    }
                }
                if is_block_tag(&name) {
                    out.push('\n');
                }
                rest = &rest[end + 1..];
            }
            Some(pos) => {
                let chunk = decode_entities(&rest[..pos]);
                out_chars += chunk.chars().count();
                out.push_str(&chunk);
                rest = &rest[pos..];
            }
            None => {
                out.push_str(&decode_entities(rest));
                break;
            }
        }
    }

    let text = out
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&text, max_chars)
}

/// A `<` only opens markup when followed by a name, `/`, `!` or `?`
fn starts_tag(text: &str) -> bool {
    matches!(text[1..].chars().next(), Some(c) if c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'))
}

fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "br" | "li" | "ul" | "ol" | "tr" | "table" | "section" | "article"
            | "header" | "footer" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "title"
    )
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_multibyte_chars() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn strips_tags_scripts_and_styles() {
        let html = r#"<html><head><title>Listing</title><style>body { color: red; }</style>
            <script type="text/javascript">var x = "<p>not text</p>";</script></head>
            <body><h1>3 bed &amp; 2 bath</h1><p>Asking&nbsp;$450,000</p></body></html>"#;
        let text = html_to_text(html, DEFAULT_MAX_OUTPUT_CHARS);
        assert_eq!(text, "Listing\n3 bed & 2 bath\nAsking $450,000");
    }

    #[test]
    fn output_never_exceeds_cap_for_large_pages() {
        let paragraph = "<p>Median home price rose 4% year over year in this neighbourhood.</p>";
        let page = paragraph.repeat(10 * 1024 * 1024 / paragraph.len() + 1);
        assert!(page.len() >= 10 * 1024 * 1024);

        let text = html_to_text(&page, DEFAULT_MAX_OUTPUT_CHARS);
        assert!(text.chars().count() <= DEFAULT_MAX_OUTPUT_CHARS);
        assert!(text.starts_with("Median home price"));
    }

    #[test]
    fn bare_angle_brackets_are_text() {
        let html = "<p>Price < $500k and rising</p><p>Next para</p>";
        assert_eq!(html_to_text(html, 100), "Price < $500k and rising\nNext para");
        assert_eq!(html_to_text("2 <3 beds <!-- note --> left", 100), "2 <3 beds left");
        assert_eq!(html_to_text("ends with <", 100), "ends with <");
    }

    #[test]
    fn unterminated_markup_is_tolerated() {
        assert_eq!(html_to_text("plain <b>bold", 100), "plain bold");
        assert_eq!(html_to_text("<script>never closed", 100), "");
        assert_eq!(html_to_text("text <unclosed", 100), "text");
    }
}
