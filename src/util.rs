use chrono::{NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::RawStr;
use slugify::slugify;

/// Longest slug the `pages.slug` column holds.
pub const SLUG_MAX_LENGTH: usize = 75;

/// Longest meta description, ellipsis included.
pub const DESC_MAX_LENGTH: usize = 160;

const ELLIPSIS: &str = "...";
const TEASER_BREAK: &str = "<hr";

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Lower-cases `title` and collapses every non-alphanumeric run into a single
/// hyphen, trimming hyphens at both ends.
pub fn slug_for(title: &str) -> String {
    slugify(title, "", "-", Some(SLUG_MAX_LENGTH))
}

/// Everything in `body` before the first horizontal rule.
pub fn teaser(body: &str) -> &str {
    body.split(TEASER_BREAK).next().unwrap_or(body)
}

pub fn absolute_url(parent_slug: Option<&str>, slug: &str) -> String {
    match parent_slug {
        Some(parent_slug) => format!("/{}/{}", parent_slug, slug),
        None => format!("/{}", slug),
    }
}

/// Request paths arrive percent-encoded; legacy paths are stored and matched
/// decoded.
pub fn decoded_path(path: &str) -> String {
    RawStr::new(path).percent_decode_lossy().into_owned()
}

/// Timestamps are stored as naive UTC.
pub fn rfc2822(timestamp: &NaiveDateTime) -> String {
    Utc.from_utc_datetime(timestamp).to_rfc2822()
}

/// Plain-text description of `body` for `<meta name="description">`.
///
/// Markup is stripped and whitespace collapsed. Text longer than
/// [`DESC_MAX_LENGTH`] is cut at the last word that fits and suffixed with an
/// ellipsis. A body without any text falls back to `title`.
pub fn meta_desc(body: &str, title: &str) -> String {
    let text = TAG.replace_all(body, " ");
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return title.trim().to_owned();
    }

    let full = words.join(" ");
    if full.chars().count() <= DESC_MAX_LENGTH {
        return full;
    }

    let budget = DESC_MAX_LENGTH - ELLIPSIS.len();
    let mut desc = String::new();
    let mut length = 0;
    for word in words {
        let word_length = word.chars().count();
        let needed = if desc.is_empty() { word_length } else { word_length + 1 };
        if length + needed > budget {
            break;
        }
        if !desc.is_empty() {
            desc.push(' ');
        }
        desc.push_str(word);
        length += needed;
    }
    if desc.is_empty() {
        // a single word longer than the budget
        desc = full.chars().take(budget).collect();
    }
    desc.push_str(ELLIPSIS);
    desc
}
