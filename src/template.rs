//! Prompt template rendering.
//!
//! Templates are plain text containing `{{name}}` placeholders. Rendering
//! merges a set of named string variables into the template. There is no
//! control flow and no recursive expansion: a substituted value is inserted
//! verbatim, even if it itself contains `{{..}}`.
//!
//! Two policies exist for a placeholder with no matching variable:
//! - [`RenderMode::Lenient`] (default): the placeholder renders as the empty
//!   string. A misspelled placeholder produces no diagnostic.
//! - [`RenderMode::Strict`]: rendering fails with the first unresolved
//!   placeholder name, useful for catching template typos at load time.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Placeholder syntax: `{{name}}`, optional inner whitespace, word characters.
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"))
}

/// Policy for placeholders that have no matching variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Unresolved placeholders render as the empty string.
    #[default]
    Lenient,
    /// Rendering fails on the first unresolved placeholder.
    Strict,
}

/// Errors from template rendering.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder had no matching variable in strict mode.
    #[error("unresolved placeholder: {{{{{name}}}}}")]
    UnresolvedPlaceholder {
        /// The placeholder name as written in the template.
        name: String,
    },
}

/// Render a template in [`RenderMode::Lenient`] mode.
///
/// Every `{{name}}` occurrence is replaced by the matching variable, or by
/// the empty string when the variable is absent. Repeated placeholders are
/// substituted at every occurrence.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Render a template under the given mode.
///
/// # Errors
///
/// Returns [`TemplateError::UnresolvedPlaceholder`] in strict mode when a
/// placeholder has no matching variable. Lenient mode never fails.
pub fn render_with_mode(
    template: &str,
    vars: &HashMap<&str, String>,
    mode: RenderMode,
) -> Result<String, TemplateError> {
    if mode == RenderMode::Strict {
        for caps in placeholder_regex().captures_iter(template) {
            let name = &caps[1];
            if !vars.contains_key(name) {
                return Err(TemplateError::UnresolvedPlaceholder {
                    name: name.to_owned(),
                });
            }
        }
    }
    Ok(render(template, vars))
}
