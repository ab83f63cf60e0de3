//! Deterministic template artifacts
//!
//! Used when the model fails or replies with too little. The layout is
//! picked from keywords in the brief and element ids are taken from the
//! brief and checks so the page has a fair chance of passing them.

use async_trait::async_trait;
use minijinja::{Environment, context};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::attachments::AttachmentKind;
use crate::prompt::{BOOTSTRAP_CSS, brief_element_ids, required_element_ids};
use crate::templates::{self, CSV, GENERIC, GITHUB, MARKDOWN};
use crate::{ContentGenerator, GeneratedArtifact, GenerationRequest, GeneratorError};

pub const DEFAULT_SEED: &str = "TDS";

/// Placeholder elements rendered by the generic layout
const MAX_GENERIC_IDS: usize = 5;

const BRIEF_EXCERPT_CHARS: usize = 500;

const SAMPLE_MARKDOWN: &str = "# Sample Markdown\n\nThis is sample content.";

static SEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)seed["']?\s*[:=]\s*["']?(\w+)"#).unwrap());

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)title.*?["']([^"']+)["']"#).unwrap());

/// Page layout chosen from the brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Layout {
    /// Embedded CSV with a computed total, optional table and region filter
    CsvSummary,
    /// marked.js rendering of a markdown attachment with a word count
    MarkdownViewer,
    /// Form that looks up a GitHub user's account age
    GitHubLookup,
    Generic,
}

impl Layout {
    #[must_use]
    pub fn choose(brief: &str) -> Self {
        let lower = brief.to_lowercase();
        let csv_total =
            lower.contains("csv") && ["sum", "total", "sales"].iter().any(|w| lower.contains(w));

        if csv_total {
            Self::CsvSummary
        } else if lower.contains("markdown") || lower.contains(".md") {
            Self::MarkdownViewer
        } else if lower.contains("github") && lower.contains("form") {
            Self::GitHubLookup
        } else {
            Self::Generic
        }
    }
}

/// Value of a `seed: X` / `seed=X` mention in the brief, else `TDS`.
#[must_use]
pub fn extract_seed(brief: &str) -> String {
    SEED.captures(brief)
        .map_or_else(|| DEFAULT_SEED.to_string(), |caps| caps[1].to_string())
}

/// First id matching any of `needles`, else `default`.
fn pick_id(ids: &[String], needles: &[&str], default: &str) -> String {
    ids.iter()
        .find(|id| needles.iter().any(|n| id.contains(n)))
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// Renders template artifacts.
pub struct FallbackRenderer {
    env: Environment<'static>,
}

impl FallbackRenderer {
    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if an embedded template is invalid.
    pub fn new() -> Result<Self, GeneratorError> {
        Ok(Self {
            env: templates::environment()?,
        })
    }

    /// Render the artifact for `request`.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::Template` if rendering fails.
    pub fn render(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let layout = Layout::choose(&request.brief);
        let seed = extract_seed(&request.brief);
        let lower = request.brief.to_lowercase();
        let brief_ids = brief_element_ids(&request.brief);

        info!(task = %request.task_id, layout = %layout, seed = %seed, "Rendering fallback artifact");

        match layout {
            Layout::CsvSummary => {
                let total = pick_id(&brief_ids, &["total", "sales"], "total-sales");
                let table = pick_id(&brief_ids, &["product", "table"], "product-sales");
                let filter = pick_id(&brief_ids, &["region", "filter"], "region-filter");
                let needs_table = lower.contains("table") || brief_ids.contains(&table);
                let needs_filter = lower.contains("filter") || lower.contains("region");
                let title = TITLE.captures(&request.brief).map_or_else(
                    || format!("Sales Summary {seed}"),
                    |caps| caps[1].replace("${seed}", &seed),
                );
                let csv_data = request
                    .attachment_of(AttachmentKind::Csv)
                    .map(|a| a.content.as_str())
                    .unwrap_or_default();

                templates::render(
                    &self.env,
                    CSV,
                    context! {
                        seed => &seed,
                        task_id => &request.task_id,
                        bootstrap_css => BOOTSTRAP_CSS,
                        title => title,
                        ids => context! { total => total, table => table, filter => filter },
                        needs_table => needs_table,
                        needs_filter => needs_filter,
                        csv_data => csv_data,
                    },
                )
            }
            Layout::MarkdownViewer => {
                let attachment = request.attachment_of(AttachmentKind::Markdown);
                templates::render(
                    &self.env,
                    MARKDOWN,
                    context! {
                        seed => &seed,
                        task_id => &request.task_id,
                        bootstrap_css => BOOTSTRAP_CSS,
                        markdown => attachment.map_or(SAMPLE_MARKDOWN, |a| a.content.as_str()),
                        source_name => attachment.map_or("embedded sample", |a| a.name.as_str()),
                    },
                )
            }
            Layout::GitHubLookup => {
                let form_id = pick_id(&brief_ids, &["github-user"], &format!("github-user-{seed}"));
                templates::render(
                    &self.env,
                    GITHUB,
                    context! {
                        seed => &seed,
                        task_id => &request.task_id,
                        bootstrap_css => BOOTSTRAP_CSS,
                        cache_key => format!("{form_id}-cache"),
                        form_id => form_id,
                    },
                )
            }
            Layout::Generic => {
                let mut ids = required_element_ids(&request.brief, &request.checks);
                ids.truncate(MAX_GENERIC_IDS);
                if ids.is_empty() {
                    ids.push("output".to_string());
                }
                let excerpt: String = request.brief.chars().take(BRIEF_EXCERPT_CHARS).collect();
                templates::render(
                    &self.env,
                    GENERIC,
                    context! {
                        seed => &seed,
                        task_id => &request.task_id,
                        bootstrap_css => BOOTSTRAP_CSS,
                        ids => ids,
                        brief_excerpt => excerpt,
                    },
                )
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for FallbackRenderer {
    async fn generate_solution(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GeneratorError> {
        self.render(request).map(GeneratedArtifact::from_fallback)
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::DecodedAttachment;
    use serde_json::json;

    fn request(brief: &str) -> GenerationRequest {
        GenerationRequest {
            task_id: "demo".to_string(),
            round: 1,
            brief: brief.to_string(),
            attachments: Vec::new(),
            checks: Vec::new(),
        }
    }

    fn with_attachment(mut req: GenerationRequest, name: &str, kind: AttachmentKind, content: &str) -> GenerationRequest {
        req.attachments.push(DecodedAttachment {
            name: name.to_string(),
            mime: None,
            kind,
            content: content.to_string(),
        });
        req
    }

    #[test]
    fn layout_follows_brief_keywords() {
        assert_eq!(Layout::choose("Sum the sales in data.csv"), Layout::CsvSummary);
        assert_eq!(Layout::choose("Render input.md with Markdown"), Layout::MarkdownViewer);
        assert_eq!(Layout::choose("A form that queries GitHub users"), Layout::GitHubLookup);
        assert_eq!(Layout::choose("Show a captcha solver"), Layout::Generic);
        assert_eq!(Layout::choose("Just a csv viewer"), Layout::Generic, "csv alone is not a summary");
    }

    #[test]
    fn seed_defaults_to_tds() {
        assert_eq!(extract_seed("seed: abc123"), "abc123");
        assert_eq!(extract_seed("use \"seed\"='x9'"), "x9");
        assert_eq!(extract_seed("no seed here"), "TDS");
    }

    #[test]
    fn csv_summary_embeds_data_and_ids() {
        let req = with_attachment(
            request("Sum sales from data.csv into #total-sales, add a #product-sales table and a region filter"),
            "data.csv",
            AttachmentKind::Csv,
            "product,sales,region\nA,10,East\n</script>,5,West\n",
        );
        let renderer = FallbackRenderer::new().unwrap();
        let html = renderer.render(&req).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"id="total-sales""#));
        assert!(html.contains(r#"<table id="product-sales""#));
        assert!(html.contains(r#"<select id="region-filter""#));
        assert!(html.contains("Sales Summary TDS"));
        assert!(
            !html.contains("</script>,5"),
            "attachment text cannot close the script block"
        );
    }

    #[test]
    fn markdown_viewer_uses_attachment() {
        let req = with_attachment(
            request("Render the markdown attachment"),
            "input.md",
            AttachmentKind::Markdown,
            "# Title",
        );
        let html = FallbackRenderer::new().unwrap().render(&req).unwrap();
        assert!(html.contains("marked.min.js"));
        assert!(html.contains("markdown-word-count"));
        assert!(html.contains("# Title"));
        assert!(html.contains("Source: input.md"));
    }

    #[test]
    fn github_lookup_uses_seeded_form_id() {
        let html = FallbackRenderer::new()
            .unwrap()
            .render(&request("Build a form that fetches a GitHub user. seed: s42"))
            .unwrap();
        assert!(html.contains(r#"<form id="github-user-s42">"#));
        assert!(html.contains("localStorage"));
        assert!(html.contains("token"));
    }

    #[test]
    fn generic_layout_caps_placeholders() {
        let mut req = request("Elements #a1 #a2 #a3 #a4 #a5 #a6 please");
        req.checks = vec![json!({"js": "document.querySelector('#a0')"})];
        let html = FallbackRenderer::new().unwrap().render(&req).unwrap();

        assert_eq!(html.matches(r#"class="element""#).count(), 5);
        assert!(html.contains(r#"id="a0""#));
        assert!(!html.contains(r#"id="a6""#));
    }

    #[test]
    fn generic_layout_without_ids_has_output_element() {
        let html = FallbackRenderer::new()
            .unwrap()
            .render(&request("Say hello"))
            .unwrap();
        assert!(html.contains(r#"id="output""#));
        assert!(html.len() > 100);
    }
}
