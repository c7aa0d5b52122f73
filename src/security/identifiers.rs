//! KQL identifier and literal escaping.
//!
//! Entity names are quoted with KQL bracket notation `['name']`, which accepts
//! any character once backslashes and single quotes are escaped.

use crate::error::KustoError;

/// Maximum length of a Kusto entity name.
pub const MAX_IDENTIFIER_LENGTH: usize = 1024;

/// Quote an entity name using bracket notation.
///
/// # Examples
///
/// ```
/// use kusto_mcp_server::security::escape_identifier;
///
/// assert_eq!(escape_identifier("StormEvents").unwrap(), "['StormEvents']");
/// assert_eq!(escape_identifier("My Table").unwrap(), "['My Table']");
/// assert_eq!(escape_identifier("it's").unwrap(), r"['it\'s']");
/// ```
pub fn escape_identifier(identifier: &str) -> Result<String, KustoError> {
    validate_identifier(identifier)?;
    let trimmed = identifier.trim();

    // Already bracket-quoted names pass through unchanged.
    if is_bracket_quoted(trimmed) {
        return Ok(trimmed.to_string());
    }

    Ok(format!("['{}']", escape_string_content(trimmed)))
}

/// Check that a name can be used as an entity name.
pub fn validate_identifier(identifier: &str) -> Result<(), KustoError> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(KustoError::invalid_input("Table name cannot be empty"));
    }

    if trimmed.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(KustoError::invalid_input(format!(
            "Table name exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(KustoError::invalid_input(
            "Table name cannot contain control characters",
        ));
    }

    Ok(())
}

/// Quote a value as a KQL string literal.
pub fn quote_string_literal(value: &str) -> String {
    format!("'{}'", escape_string_content(value))
}

fn escape_string_content(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn is_bracket_quoted(s: &str) -> bool {
    let Some(inner) = s
        .strip_prefix("['")
        .and_then(|rest| rest.strip_suffix("']"))
    else {
        return false;
    };

    // Every quote inside must be escaped.
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.next().is_none() {
                    return false;
                }
            }
            '\'' => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_simple_identifier() {
        assert_eq!(escape_identifier("StormEvents").unwrap(), "['StormEvents']");
        assert_eq!(escape_identifier("  Logs ").unwrap(), "['Logs']");
    }

    #[test]
    fn test_escape_with_special_characters() {
        assert_eq!(escape_identifier("My-Table").unwrap(), "['My-Table']");
        assert_eq!(escape_identifier("a'b").unwrap(), r"['a\'b']");
        assert_eq!(escape_identifier(r"a\b").unwrap(), r"['a\\b']");
    }

    #[test]
    fn test_escape_already_escaped() {
        assert_eq!(escape_identifier("['Users']").unwrap(), "['Users']");
        // An unescaped quote inside means it is not really quoted.
        assert_eq!(
            escape_identifier("['x'] | take 1 | ['y']").unwrap(),
            r"['[\'x\'] | take 1 | [\'y\']']"
        );
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(escape_identifier("").is_err());
        assert!(escape_identifier("   ").is_err());
        assert!(escape_identifier("bad\nname").is_err());
        assert!(escape_identifier(&"x".repeat(MAX_IDENTIFIER_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_quote_string_literal() {
        assert_eq!(quote_string_literal("O'Brien"), r"'O\'Brien'");
    }
}
