//! Structured header codec for review documents.
//!
//! A review document is a fenced block of `key: value` pairs followed by a
//! free-text markdown body:
//!
//! ```text
//! ---
//! status: review
//! trace_id: "550e8400-e29b-41d4-a716-446655440000"
//! ---
//!
//! # Plan body
//! ```
//!
//! Parsing is tolerant by design: an absent header, an empty header block,
//! an unterminated fence, already-quoted values, and malformed lines all
//! parse without error (malformed lines are skipped). Serialization is
//! canonical: `---` fences, sorted keys, one blank line before the body,
//! and quoting for values that would otherwise be ambiguous.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Canonical header fence, always used on write.
pub const FENCE: &str = "---";

/// Alternate fence accepted on read for blueprint-style metadata blocks.
pub const ALT_FENCE: &str = "+++";

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("UUID regex must compile")
});

/// Whether `value` has the textual shape of a UUID.
pub fn is_uuid(value: &str) -> bool {
    UUID_RE.is_match(value)
}

/// Split a document into its metadata map and body.
///
/// Never fails: content without a recognizable, terminated header is
/// returned whole as the body with empty metadata. Line endings are
/// normalized to `\n`.
pub fn split_document(content: &str) -> (BTreeMap<String, String>, String) {
    let lines: Vec<&str> = content.lines().collect();

    let Some(&first) = lines.first() else {
        return (BTreeMap::new(), String::new());
    };

    let fence = if first == FENCE {
        FENCE
    } else if first == ALT_FENCE {
        ALT_FENCE
    } else {
        return (BTreeMap::new(), normalize_body(&lines));
    };

    let Some(close) = lines[1..].iter().position(|&line| line == fence) else {
        // Unterminated header: treat the whole document as body.
        return (BTreeMap::new(), normalize_body(&lines));
    };
    let close = close + 1;

    let mut meta = BTreeMap::new();
    for line in &lines[1..close] {
        if line.trim().is_empty() {
            continue;
        }
        // Lines without a colon are tolerated and dropped.
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            meta.insert(key.to_string(), unquote(value.trim()));
        }
    }

    (meta, normalize_body(&lines[close + 1..]))
}

/// Render a metadata map and body into canonical document form.
pub fn render_document(meta: &BTreeMap<String, String>, body: &str) -> String {
    let mut out = String::new();
    out.push_str(FENCE);
    out.push('\n');
    for (key, value) in meta {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&quote_if_needed(value));
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');

    let body = body.trim_start_matches('\n');
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Strip leading blank lines, join, and end with a single newline.
fn normalize_body(lines: &[&str]) -> String {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let trimmed = &lines[start..];
    if trimmed.is_empty() {
        return String::new();
    }
    let mut body = trimmed.join("\n");
    body.push('\n');
    body
}

/// Quote a value when leaving it bare would be ambiguous on re-read:
/// colons (the key separator), double quotes, boundary whitespace, empty
/// strings, and UUID-shaped values.
fn quote_if_needed(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value.contains(':')
        || value.contains('"')
        || value != value.trim()
        || is_uuid(value);

    if needs_quoting {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

/// Remove surrounding double quotes and unescape, if present.
fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn splits_header_and_body() {
        let content = "---\nstatus: review\ntitle: Add caching\n---\n\n# Plan\n\nDetails.\n";
        let (parsed, body) = split_document(content);

        assert_eq!(parsed.get("status").map(String::as_str), Some("review"));
        assert_eq!(parsed.get("title").map(String::as_str), Some("Add caching"));
        assert_eq!(body, "# Plan\n\nDetails.\n");
    }

    #[test]
    fn round_trips_metadata_through_render() {
        let original = meta(&[
            ("status", "review"),
            ("title", "Fix: flaky retries"),
            ("trace_id", "550e8400-e29b-41d4-a716-446655440000"),
            ("created_at", "2026-02-14T09:30:15Z"),
        ]);

        let rendered = render_document(&original, "Body text.\n");
        let (parsed, body) = split_document(&rendered);

        assert_eq!(parsed, original);
        assert_eq!(body, "Body text.\n");
    }

    #[test]
    fn colon_and_uuid_values_are_quoted_on_write() {
        let rendered = render_document(
            &meta(&[
                ("created_at", "2026-02-14T09:30:15Z"),
                ("trace_id", "550e8400-e29b-41d4-a716-446655440000"),
            ]),
            "",
        );

        assert!(rendered.contains("created_at: \"2026-02-14T09:30:15Z\""));
        assert!(rendered.contains("trace_id: \"550e8400-e29b-41d4-a716-446655440000\""));
    }

    #[test]
    fn plain_values_stay_bare() {
        let rendered = render_document(&meta(&[("status", "needs_revision")]), "");
        assert!(rendered.contains("status: needs_revision\n"));
    }

    #[test]
    fn absent_header_is_all_body() {
        let (parsed, body) = split_document("# Just a document\n\nNo header here.\n");
        assert!(parsed.is_empty());
        assert_eq!(body, "# Just a document\n\nNo header here.\n");
    }

    #[test]
    fn empty_header_block_is_tolerated() {
        let (parsed, body) = split_document("---\n---\n\nBody.\n");
        assert!(parsed.is_empty());
        assert_eq!(body, "Body.\n");
    }

    #[test]
    fn unterminated_header_is_treated_as_body() {
        let content = "---\nstatus: review\nno closing fence\n";
        let (parsed, body) = split_document(content);
        assert!(parsed.is_empty());
        assert_eq!(body, content);
    }

    #[test]
    fn alternate_fence_is_accepted_on_read() {
        let (parsed, body) = split_document("+++\nkind: blueprint\n+++\n\nTemplate body.\n");
        assert_eq!(parsed.get("kind").map(String::as_str), Some("blueprint"));
        assert_eq!(body, "Template body.\n");
    }

    #[test]
    fn mismatched_fences_do_not_terminate() {
        let content = "+++\nkind: blueprint\n---\nstill header\n";
        let (parsed, _) = split_document(content);
        assert!(parsed.is_empty());
    }

    #[test]
    fn malformed_header_lines_are_skipped() {
        let (parsed, _) = split_document("---\nstatus: review\nthis line has no separator\n---\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("status").map(String::as_str), Some("review"));
    }

    #[test]
    fn quoted_values_are_unquoted_on_read() {
        let (parsed, _) =
            split_document("---\ntitle: \"Deploy: phase 2\"\nnote: \"says \\\"done\\\"\"\n---\n");
        assert_eq!(parsed.get("title").map(String::as_str), Some("Deploy: phase 2"));
        assert_eq!(parsed.get("note").map(String::as_str), Some("says \"done\""));
    }

    #[test]
    fn value_with_colon_survives_a_round_trip_quoted() {
        let original = meta(&[("summary", "before: after")]);
        let rendered = render_document(&original, "");
        let (parsed, _) = split_document(&rendered);
        assert_eq!(parsed, original);
    }

    #[test]
    fn crlf_input_parses() {
        let (parsed, body) = split_document("---\r\nstatus: review\r\n---\r\n\r\nBody.\r\n");
        assert_eq!(parsed.get("status").map(String::as_str), Some("review"));
        assert_eq!(body, "Body.\n");
    }

    #[test]
    fn empty_input_is_empty() {
        let (parsed, body) = split_document("");
        assert!(parsed.is_empty());
        assert!(body.is_empty());
    }

    #[test]
    fn uuid_shape_detection() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_uuid("550E8400-E29B-41D4-A716-446655440000"));
        assert!(!is_uuid("550e8400"));
        assert!(!is_uuid("not-a-uuid-at-all"));
    }
}
