//! Embedded minijinja templates
//!
//! `.html` templates are auto-escaped; the markdown and licence templates
//! are not. Data embedded in `<script>` blocks goes through `tojson`.

use minijinja::Environment;
use serde::Serialize;

use crate::GeneratorError;

pub(crate) const CSV: &str = "csv.html";
pub(crate) const MARKDOWN: &str = "markdown.html";
pub(crate) const GITHUB: &str = "github.html";
pub(crate) const GENERIC: &str = "generic.html";
pub(crate) const README: &str = "readme.md";
pub(crate) const ROUND2: &str = "round2-updates.md";
pub(crate) const LICENSE: &str = "LICENSE.txt";

const SOURCES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    (CSV, include_str!("../templates/csv.html")),
    (MARKDOWN, include_str!("../templates/markdown.html")),
    (GITHUB, include_str!("../templates/github.html")),
    (GENERIC, include_str!("../templates/generic.html")),
    (README, include_str!("../templates/readme.md")),
    (ROUND2, include_str!("../templates/round2-updates.md")),
    (LICENSE, include_str!("../templates/LICENSE.txt")),
];

fn template_error(err: minijinja::Error) -> GeneratorError {
    GeneratorError::Template(err.to_string())
}

/// Build an environment with every template registered.
pub(crate) fn environment() -> Result<Environment<'static>, GeneratorError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    for &(name, source) in SOURCES {
        env.add_template(name, source).map_err(template_error)?;
    }
    Ok(env)
}

pub(crate) fn render<S: Serialize>(
    env: &Environment<'_>,
    name: &str,
    ctx: S,
) -> Result<String, GeneratorError> {
    env.get_template(name)
        .and_then(|tmpl| tmpl.render(ctx))
        .map_err(template_error)
}
