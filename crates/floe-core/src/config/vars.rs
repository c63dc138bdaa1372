//! Environment variable interpolation for config files.
//!
//! Supported forms:
//! - `$VAR` or `${VAR}` - value of VAR, error if unset
//! - `${VAR:-fallback}` - fallback when VAR is unset or empty
//! - `${VAR-fallback}` - fallback only when VAR is unset
//! - `$$` - a literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<escape>\$\$)
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?:(?P<op>:?-)(?P<fallback>[^}]*))?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("placeholder pattern is valid")
});

/// Output of [`interpolate`]: the substituted text plus every problem found.
#[derive(Debug)]
pub struct InterpolationResult {
    pub text: String,
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Substitute environment variables in `input`.
///
/// Errors are collected rather than returned early so a config with several
/// missing variables reports all of them at once. Placeholders that fail are
/// left verbatim in the output text.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();
    let text = PLACEHOLDER
        .replace_all(input, |caps: &Captures| resolve(caps, &mut errors))
        .into_owned();
    InterpolationResult { text, errors }
}

fn resolve(caps: &Captures, errors: &mut Vec<String>) -> String {
    let matched = &caps[0];
    if caps.name("escape").is_some() {
        return "$".to_string();
    }

    let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
        return matched.to_string();
    };
    let name = name.as_str();
    let empty_means_unset = caps.name("op").is_some_and(|op| op.as_str() == ":-");
    let fallback = caps.name("fallback").map(|m| m.as_str());

    match env::var(name) {
        Ok(value) if value.contains(['\n', '\r']) => {
            errors.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            matched.to_string()
        }
        Ok(value) if value.is_empty() && empty_means_unset => {
            fallback.unwrap_or_default().to_string()
        }
        Ok(value) => value,
        Err(_) => match fallback {
            Some(fallback) => fallback.to_string(),
            None => {
                errors.push(format!("environment variable '{name}' is not set"));
                matched.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names so they can run in parallel.
    fn set(key: &str, value: Option<&str>) {
        // SAFETY: variable names are unique per test.
        match value {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    #[test]
    fn test_bare_and_braced() {
        set("FLOE_TEST_PROJECT", Some("acme"));
        let result = interpolate("a: $FLOE_TEST_PROJECT, b: ${FLOE_TEST_PROJECT}");
        assert!(result.is_ok());
        assert_eq!(result.text, "a: acme, b: acme");
    }

    #[test]
    fn test_missing_variable_reports_name() {
        set("FLOE_TEST_ABSENT", None);
        let result = interpolate("path: ${FLOE_TEST_ABSENT}");
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("FLOE_TEST_ABSENT"));
        assert_eq!(result.text, "path: ${FLOE_TEST_ABSENT}");
    }

    #[test]
    fn test_all_missing_variables_collected() {
        set("FLOE_TEST_MISSING_A", None);
        set("FLOE_TEST_MISSING_B", None);
        let result = interpolate("$FLOE_TEST_MISSING_A $FLOE_TEST_MISSING_B");
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_colon_dash_fallback_on_empty() {
        set("FLOE_TEST_EMPTY_COLON", Some(""));
        let result = interpolate("${FLOE_TEST_EMPTY_COLON:-stdout}");
        assert_eq!(result.text, "stdout");
    }

    #[test]
    fn test_dash_fallback_keeps_empty() {
        set("FLOE_TEST_EMPTY_DASH", Some(""));
        let result = interpolate("[${FLOE_TEST_EMPTY_DASH-stdout}]");
        assert!(result.is_ok());
        assert_eq!(result.text, "[]");
    }

    #[test]
    fn test_fallback_when_unset() {
        set("FLOE_TEST_UNSET", None);
        let result = interpolate("${FLOE_TEST_UNSET-600}");
        assert_eq!(result.text, "600");
    }

    #[test]
    fn test_newline_rejected() {
        set("FLOE_TEST_NEWLINE", Some("a\nb"));
        let result = interpolate("$FLOE_TEST_NEWLINE");
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("newlines"));
    }

    #[test]
    fn test_escape() {
        let result = interpolate("cost: $$5");
        assert!(result.is_ok());
        assert_eq!(result.text, "cost: $5");
    }
}
