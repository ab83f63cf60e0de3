//! Cleaning of raw model replies into a bare HTML document

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:html)?[ \t]*\r?\n?").unwrap());

static DOC_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>|<html[^>]*>").unwrap());

static DOC_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</html\s*>").unwrap());

/// Strip markdown fences and surrounding chatter, and make sure the result
/// starts with a doctype.
#[must_use]
pub fn clean_reply(raw: &str) -> String {
    let unfenced = FENCE.replace_all(raw, "");
    let mut html: &str = unfenced.as_ref();

    if let Some(start) = DOC_START.find(html) {
        html = &html[start.start()..];
    }
    if let Some(end) = DOC_END.find_iter(html).last() {
        html = &html[..end.end()];
    }

    let html = html.trim();
    if html.is_empty() {
        return String::new();
    }
    if html
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
    {
        html.to_string()
    } else {
        format!("<!DOCTYPE html>\n{html}")
    }
}
