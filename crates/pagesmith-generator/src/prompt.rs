//! Prompt construction for the LLM generator

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::GenerationRequest;
use crate::attachments::{AttachmentKind, DecodedAttachment};

pub const BOOTSTRAP_CSS: &str =
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css";

pub const SYSTEM_PROMPT: &str = "You are a front-end developer. Reply with one complete, \
self-contained HTML document and nothing else: no explanations, no markdown fences.";

/// Characters of each attachment shown inline in the prompt
const ATTACHMENT_PREVIEW_CHARS: usize = 300;

static CHECK_IDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"#([A-Za-z0-9_-]+)|getElementById\(\s*["']([A-Za-z0-9_-]+)"#).unwrap()
});

static BRIEF_IDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([A-Za-z][A-Za-z0-9_-]*)").unwrap());

/// Human-readable text of a check: the `js` field of an object, the string
/// itself, or the JSON rendering of anything else.
#[must_use]
pub fn check_text(check: &Value) -> String {
    match check {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("js") {
            Some(Value::String(js)) => js.clone(),
            _ => check.to_string(),
        },
        other => other.to_string(),
    }
}

/// Element ids the page must contain, sorted and de-duplicated.
///
/// Collected from `#id` selectors and `getElementById('id')` calls in the
/// checks, plus `#id` mentions in the brief.
#[must_use]
pub fn required_element_ids(brief: &str, checks: &[Value]) -> Vec<String> {
    let mut ids = BTreeSet::new();

    for check in checks {
        let text = check_text(check);
        for caps in CHECK_IDS.captures_iter(&text) {
            if let Some(id) = caps.get(1).or_else(|| caps.get(2)) {
                ids.insert(id.as_str().to_string());
            }
        }
    }
    for caps in BRIEF_IDS.captures_iter(brief) {
        ids.insert(caps[1].to_string());
    }

    ids.into_iter().collect()
}

/// Element ids in the order they appear in the brief.
#[must_use]
pub fn brief_element_ids(brief: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    BRIEF_IDS
        .captures_iter(brief)
        .map(|caps| caps[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn preview(content: &str) -> String {
    let mut shown: String = content.chars().take(ATTACHMENT_PREVIEW_CHARS).collect();
    if content.chars().count() > ATTACHMENT_PREVIEW_CHARS {
        shown.push_str("...");
    }
    shown
}

fn data_instructions(attachments: &[DecodedAttachment]) -> String {
    if attachments.is_empty() {
        return "- No attachments provided".to_string();
    }

    attachments
        .iter()
        .map(|att| match att.kind {
            AttachmentKind::Csv => format!(
                "CSV data ({}):\n{}\n- Embed the data in the page\n- First line is headers\n\
                 - Parse numeric columns with parseFloat() and sum them where asked\n\
                 - Display results in the specified element",
                att.name,
                preview(&att.content)
            ),
            AttachmentKind::Markdown => format!(
                "Markdown data ({}):\n{}\n- Convert with marked.parse()\n\
                 - Highlight code blocks with highlight.js",
                att.name,
                preview(&att.content)
            ),
            AttachmentKind::Json => format!(
                "JSON data ({}):\n{}\n- Parse with JSON.parse()\n- Use the values as instructed",
                att.name,
                preview(&att.content)
            ),
            AttachmentKind::Other => format!(
                "Text data ({}):\n{}",
                att.name,
                preview(&att.content)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn element_instructions(ids: &[String]) -> String {
    if ids.is_empty() {
        return "Check the brief for required elements".to_string();
    }
    ids.iter()
        .map(|id| format!("- #{id}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Behaviour hints keyed on words in the brief.
fn functionality_hints(brief: &str) -> String {
    let lower = brief.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut hints = Vec::new();
    if has(&["button"]) {
        hints.push("- Add click event listeners to all buttons");
    }
    if has(&["form"]) {
        hints.push("- Add a submit event listener that calls preventDefault()");
    }
    if has(&["filter", "select"]) {
        hints.push("- Add change event listeners to filters and selects");
    }
    if has(&["sum", "total", "calculate"]) {
        hints.push("- Calculate sums by iterating the data with parseFloat()");
    }
    if has(&["table"]) {
        hints.push("- Populate table rows dynamically from the data");
    }
    if has(&["api", "fetch"]) {
        hints.push("- Use fetch() with error handling and show failures to the user");
    }
    if has(&["localstorage", "cache"]) {
        hints.push("- Persist state with localStorage.setItem() and getItem()");
    }

    if hints.is_empty() {
        "Make all interactive elements work".to_string()
    } else {
        hints.join("\n")
    }
}

/// Build the user prompt for one generation request.
#[must_use]
pub fn build_prompt(request: &GenerationRequest) -> String {
    let ids = required_element_ids(&request.brief, &request.checks);
    let checks = request
        .checks
        .iter()
        .filter(|c| !c.is_null())
        .map(|c| format!("- {}", check_text(c)))
        .collect::<Vec<_>>();
    let checks = if checks.is_empty() {
        "- None provided".to_string()
    } else {
        checks.join("\n")
    };

    format!(
        "Create a COMPLETE, WORKING HTML page. Return ONLY HTML code.\n\
         \n\
         TASK ({task}, round {round}):\n\
         {brief}\n\
         \n\
         REQUIREMENTS:\n\
         1. Single HTML file with embedded CSS and JavaScript\n\
         2. Use Bootstrap 5 from {css}\n\
         3. All JavaScript in <script> tags before </body>\n\
         4. Wrap code in document.addEventListener('DOMContentLoaded', function() {{ ... }})\n\
         \n\
         DATA HANDLING:\n\
         {data}\n\
         \n\
         ELEMENT IDs REQUIRED:\n\
         {elements}\n\
         \n\
         FUNCTIONALITY:\n\
         {functionality}\n\
         \n\
         CHECKS THAT MUST PASS:\n\
         {checks}\n\
         \n\
         Return complete HTML starting with <!DOCTYPE html>.",
        task = request.task_id,
        round = request.round,
        brief = request.brief,
        css = BOOTSTRAP_CSS,
        data = data_instructions(&request.attachments),
        elements = element_instructions(&ids),
        functionality = functionality_hints(&request.brief),
        checks = checks,
    )
}
