//! Extraction of `<meta name=… content=…>` values from server-rendered pages.
//!
//! Overleaf pages embed their bootstrap data (CSRF token, project list,
//! tags) as HTML-escaped strings in meta tags.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("meta tag regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex")
});

/// Return the unescaped `content` of the first `<meta>` tag with the given name.
pub fn meta_content(html: &str, name: &str) -> Option<String> {
    META_TAG.find_iter(html).find_map(|tag| {
        let attrs = parse_attributes(tag.as_str());
        if attrs.get("name").map(String::as_str) == Some(name) {
            attrs
                .get("content")
                .map(|content| html_escape::decode_html_entities(content).into_owned())
        } else {
            None
        }
    })
}

fn parse_attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_content_csrf() {
        let html = r#"<html><head>
            <meta name="viewport" content="width=device-width">
            <meta name="ol-csrfToken" content="abc-123">
        </head></html>"#;
        assert_eq!(meta_content(html, "ol-csrfToken").as_deref(), Some("abc-123"));
        assert_eq!(meta_content(html, "ol-missing"), None);
    }

    #[test]
    fn test_meta_content_json_blob() {
        let html = r#"<meta name="ol-tags" data-type="json" content="[{&quot;_id&quot;:&quot;t1&quot;,&quot;name&quot;:&quot;A &amp; B&quot;}]"/>"#;
        assert_eq!(
            meta_content(html, "ol-tags").as_deref(),
            Some(r#"[{"_id":"t1","name":"A & B"}]"#)
        );
    }

    #[test]
    fn test_meta_attribute_order_and_quotes() {
        let html = "<META content='x1' NAME='ol-csrfToken'>";
        assert_eq!(meta_content(html, "ol-csrfToken").as_deref(), Some("x1"));
    }

    #[test]
    fn test_meta_content_character_references() {
        let html = r#"<meta name="ol-x" content="Th&egrave;se &mdash; v2">"#;
        assert_eq!(meta_content(html, "ol-x").as_deref(), Some("Thèse — v2"));

        let html = r#"<meta name="ol-x" content="caf&eacute; a&hellip;b &lt;b&gt; &#39;c&#x27; &amp;amp; fish & chips">"#;
        assert_eq!(
            meta_content(html, "ol-x").as_deref(),
            Some("café a…b <b> 'c' &amp; fish & chips")
        );
    }
}
