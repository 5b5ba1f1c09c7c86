//! Output path patterns for `allow_multiple` roles.
//!
//! A declared output path may contain an index placeholder: `{}`, `{index}`,
//! `{:02d}` or `{index:03}`. `{{` and `}}` stand for literal braces inside a
//! pattern. Anything else, `%` included, is taken literally.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<escape>\{\{|\}\})|\{(?:index)?(?::(?P<zero>0)?(?P<width>\d+)?d?)?\}")
        .expect("placeholder pattern compiles")
});

/// Returns `true` when `pattern` contains an index placeholder.
pub fn has_placeholder(pattern: &str) -> bool {
    PLACEHOLDER
        .captures_iter(pattern)
        .any(|caps| caps.name("escape").is_none())
}

/// Substitutes `index` into every placeholder of `pattern` and unescapes
/// doubled braces.
///
/// Paths without placeholders are returned unchanged.
pub fn format_indexed(pattern: &str, index: usize) -> String {
    if !has_placeholder(pattern) {
        return pattern.to_string();
    }
    PLACEHOLDER
        .replace_all(pattern, |caps: &Captures| {
            if let Some(escape) = caps.name("escape") {
                return escape.as_str()[..1].to_string();
            }
            let width = caps
                .name("width")
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            if caps.name("zero").is_some() {
                format!("{index:0width$}")
            } else {
                format!("{index:width$}")
            }
        })
        .into_owned()
}
