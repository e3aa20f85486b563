//! Join-page parser
//!
//! Extracts the beta status, display name and app icon from the HTML of a
//! TestFlight join page. Scanning is local to the known blocks and
//! case-insensitive; anything missing degrades to a structure error so a
//! redesigned page never takes down a polling cycle.

use std::sync::LazyLock;

use regex::Regex;

const TITLE_PREFIX: &str = "Join the ";
const TITLE_SUFFIX: &str = " - TestFlight - Apple";
const FULL_PHRASE: &str = "is full";

static STATUS_DIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<div[^>]*\bid="status"[^>]*>"#).unwrap());
static SPAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<span[^>]*>(.*?)</span>").unwrap());
static ICON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class="[^"]*\bapp-icon\b[^"]*"[^>]*style="[^"]*url\(([^)]+)\)"#).unwrap()
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static DIV_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</?div\b").unwrap());

/// The page fields the poller cares about, before the app id is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAppPage {
    pub is_full: bool,
    pub name: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("page structure mismatch: missing {0}")]
pub struct PageStructureError(pub &'static str);

/// Parse a join page body.
///
/// Fails with the first missing piece rather than panicking; remote markup
/// drift is expected to show up here.
pub fn parse_app_page(html: &str) -> Result<ParsedAppPage, PageStructureError> {
    let status_start = STATUS_DIV_RE
        .find(html)
        .ok_or(PageStructureError("status element"))?;
    let status_block = status_block(&html[status_start.start()..]);

    let status_text = SPAN_RE
        .captures(status_block)
        .map(|caps| text_content(&caps[1]))
        .ok_or(PageStructureError("status text"))?;
    let is_full = status_text.to_lowercase().contains(FULL_PHRASE);

    let icon_url = ICON_RE
        .captures(status_block)
        .map(|caps| caps[1].trim().trim_matches(['\'', '"']).to_string())
        .filter(|url| !url.is_empty())
        .ok_or(PageStructureError("app icon"))?;

    let title = TITLE_RE
        .captures(html)
        .map(|caps| text_content(&caps[1]))
        .ok_or(PageStructureError("page title"))?;
    let name = strip_title_template(&title);

    Ok(ParsedAppPage {
        is_full,
        name,
        icon_url,
    })
}

/// Cut the slice that starts at the status `<div>` down to that element,
/// counting nested div open/close tokens. Spans and icons elsewhere on the
/// page must not be mistaken for the status block's. An unclosed block
/// falls back to the full remainder.
fn status_block(from_status: &str) -> &str {
    let mut depth = 0usize;
    for token in DIV_TOKEN_RE.find_iter(from_status) {
        if token.as_str().starts_with("</") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return &from_status[..token.start()];
            }
        } else {
            depth += 1;
        }
    }
    from_status
}

/// Drop nested markup and decode the handful of entities Apple emits in app
/// names.
fn text_content(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, "");
    decode_entities(text.trim())
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// `Join the <name> beta - TestFlight - Apple`, with both ends optional so a
/// reworded title still yields something displayable.
fn strip_title_template(title: &str) -> String {
    let name = title.strip_prefix(TITLE_PREFIX).unwrap_or(title);
    let name = name.strip_suffix(TITLE_SUFFIX).unwrap_or(name);
    name.to_string()
}
