//! Deterministic repository names
//!
//! A task's repository name depends only on the prefix, the task id with
//! any round marker removed, and the local part of the submitter's email.
//! Round 2 therefore always resolves to the repository round 1 created.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest repository name produced, suffix included.
pub const MAX_REPO_NAME_CHARS: usize = 100;

/// Trailing `-round-2`, `_round1`, `-r2` and the like.
static ROUND_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[-_. ]+(?:round|r)[-_ ]?\d+$").unwrap());

const SEPARATORS: &[char] = &['-', '_', '.', ' '];

static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Name of the repository holding `task_id` for `email`.
#[must_use]
pub fn repository_name(prefix: &str, task_id: &str, email: &str) -> String {
    let mut task = task_id.trim().trim_end_matches(SEPARATORS);
    while let Some(marker) = ROUND_MARKER.find(task) {
        task = task[..marker.start()].trim_end_matches(SEPARATORS);
    }
    let local = email.split('@').next().unwrap_or_default();
    let raw = [prefix, task, local]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-");
    cap(&sanitize(&raw), MAX_REPO_NAME_CHARS)
}

/// Name tried on the given creation attempt (1-based).
///
/// Attempt 1 is the base name; later attempts append `-{attempt}` while
/// staying within [`MAX_REPO_NAME_CHARS`].
#[must_use]
pub fn candidate_name(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return base.to_string();
    }
    let suffix = format!("-{attempt}");
    let room = MAX_REPO_NAME_CHARS.saturating_sub(suffix.len());
    format!("{}{suffix}", cap(base, room))
}

/// Map to `[A-Za-z0-9-]`: `.` and `_` become `-`, anything else is dropped.
fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .filter_map(|c| match c {
            '.' | '_' | ' ' => Some('-'),
            c if c.is_ascii_alphanumeric() || c == '-' => Some(c),
            _ => None,
        })
        .collect();
    DASH_RUNS
        .replace_all(&mapped, "-")
        .trim_matches('-')
        .to_string()
}

fn cap(name: &str, max: usize) -> String {
    let truncated: String = name.chars().take(max).collect();
    truncated.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn builds_prefix_task_and_local_part() {
        assert_eq!(repository_name("tds", "demo", "alice@x.com"), "tds-demo-alice");
    }

    #[test]
    fn sanitizes_dots_and_underscores() {
        assert_eq!(
            repository_name("tds", "sales_summary.v2", "first.last+tag@example.com"),
            "tds-sales-summary-v2-first-lasttag"
        );
    }

    #[test]
    fn strips_round_markers() {
        let base = repository_name("tds", "captcha", "bob@x.com");
        assert_eq!(repository_name("tds", "captcha-round-2", "bob@x.com"), base);
        assert_eq!(repository_name("tds", "captcha_round1", "bob@x.com"), base);
        assert_eq!(repository_name("tds", "captcha-r2", "bob@x.com"), base);
        assert_eq!(
            repository_name("tds", "around-town", "bob@x.com"),
            "tds-around-town-bob",
            "only whole round markers are removed"
        );
    }

    #[test]
    fn trailing_separators_do_not_expose_a_second_marker() {
        let plain = repository_name("tds", "r0_", "a@example.com");
        assert_eq!(plain, "tds-r0-a");
        assert_eq!(repository_name("tds", "r0_-round-1", "a@example.com"), plain);
        assert_eq!(repository_name("tds", "demo-.", "a@example.com"), "tds-demo-a");
        assert_eq!(repository_name("tds", "demo_-r2", "a@example.com"), "tds-demo-a");
    }

    #[test]
    fn caps_length() {
        let name = repository_name("tds", &"t".repeat(300), "a@b.c");
        assert_eq!(name.len(), MAX_REPO_NAME_CHARS);
    }

    #[test]
    fn candidates_append_attempt_number() {
        assert_eq!(candidate_name("tds-demo-alice", 1), "tds-demo-alice");
        assert_eq!(candidate_name("tds-demo-alice", 2), "tds-demo-alice-2");
        assert_eq!(candidate_name("tds-demo-alice", 3), "tds-demo-alice-3");

        let long = "x".repeat(MAX_REPO_NAME_CHARS);
        let candidate = candidate_name(&long, 3);
        assert_eq!(candidate.len(), MAX_REPO_NAME_CHARS);
        assert!(candidate.ends_with("-3"));
    }

    proptest! {
        #[test]
        fn round_marker_never_changes_the_name(
            task in "[a-z][a-z0-9_.-]{0,30}",
            local in "[a-z0-9._]{1,20}",
            round in 1u32..=2,
        ) {
            let email = format!("{local}@example.com");
            let plain = repository_name("tds", &task, &email);
            let marked = repository_name("tds", &format!("{task}-round-{round}"), &email);
            prop_assert_eq!(plain, marked);
        }

        #[test]
        fn names_stay_within_charset_and_cap(task in ".{0,200}", email in ".{0,60}") {
            let name = repository_name("tds", &task, &email);
            prop_assert!(name.len() <= MAX_REPO_NAME_CHARS);
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            prop_assert!(!name.starts_with('-') && !name.ends_with('-'));
        }
    }
}
