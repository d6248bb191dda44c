//! Access-string grammar
//!
//! The host hands creation statements over as JSON arrays of rule fragments,
//! e.g. `["~cache:*", "+@read"]`. They are flattened into a single ElastiCache
//! access string of the form `on <rule> <rule> ...`.

use std::fmt;

use serde::Serialize;

use crate::core::GrammarError;

/// Access string used when no statements are supplied: enabled, every key, read-only
pub const DEFAULT_ACCESS_STRING: &str = "on ~* +@read";

const ENABLED: &str = "on";
const DISABLED: &str = "off";

/// A validated access string, always describing an enabled user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccessString(String);

impl AccessString {
    /// The read-only default
    pub fn read_only() -> Self {
        Self(DEFAULT_ACCESS_STRING.to_string())
    }

    /// Borrow the access string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AccessString {
    fn default() -> Self {
        Self::read_only()
    }
}

impl fmt::Display for AccessString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse creation statements into an access string.
///
/// Every statement must be a JSON array of strings; the rules of all
/// statements are joined in order. A standalone `off` anywhere is forbidden.
/// `on` is prepended only if no standalone `on` is present already.
///
/// ```
/// use elasticache_rbac::access::parse_access_string;
///
/// let access = parse_access_string(&[r#"["~test*", "-@all", "+@read"]"#]).unwrap();
/// assert_eq!(access.as_str(), "on ~test* -@all +@read");
/// ```
pub fn parse_access_string<S: AsRef<str>>(commands: &[S]) -> Result<AccessString, GrammarError> {
    if commands.is_empty() {
        return Ok(AccessString::read_only());
    }

    let statements = commands
        .iter()
        .enumerate()
        .map(|(index, command)| {
            serde_json::from_str::<Vec<String>>(command.as_ref())
                .map_err(|source| GrammarError::Malformed { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut tokens: Vec<&str> = statements
        .iter()
        .flatten()
        .flat_map(|rule| rule.split_whitespace())
        .collect();

    if tokens.contains(&DISABLED) {
        return Err(GrammarError::Forbidden);
    }
    if !tokens.contains(&ENABLED) {
        tokens.insert(0, ENABLED);
    }

    Ok(AccessString(tokens.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_empty_input_is_read_only() {
        let access = parse_access_string::<&str>(&[]).unwrap();
        assert_eq!(access.as_str(), "on ~* +@read");
        assert_eq!(access, AccessString::default());
    }

    #[rstest]
    #[case(&[r#"["~test*","-@all","+@read"]"#], "on ~test* -@all +@read")]
    #[case(&[r#"["~test*", "on"]"#], "~test* on")]
    #[case(&[r#"["on", "~a*"]"#, r#"["+get"]"#], "on ~a* +get")]
    #[case(&[r#"["~a*"]"#, "[]", r#"["+@write"]"#], "on ~a* +@write")]
    #[case(&["[]"], "on")]
    #[case(&[r#"["  ~padded*  "]"#], "on ~padded*")]
    #[case(&[r#"["~online:*"]"#], "on ~online:*")]
    #[case(&[r#"["on ~k*"]"#], "on ~k*")]
    fn test_parse_access_string(#[case] commands: &[&str], #[case] expected: &str) {
        assert_eq!(parse_access_string(commands).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case(&[r#"["~test*", "off"]"#, r#"["+@read"]"#])]
    #[case(&[r#"["off"]"#])]
    #[case(&[r#"["~a*"]"#, r#"["off", "+@read"]"#])]
    #[case(&[r#"["on ~a* off"]"#])]
    fn test_off_is_forbidden(#[case] commands: &[&str]) {
        assert!(matches!(
            parse_access_string(commands),
            Err(GrammarError::Forbidden)
        ));
    }

    #[test]
    fn test_off_as_part_of_a_rule_is_allowed() {
        let access = parse_access_string(&[r#"["~offline:*", "+@read"]"#]).unwrap();
        assert_eq!(access.as_str(), "on ~offline:* +@read");
    }

    #[rstest]
    #[case(&["{not: valid json array}"], 0)]
    #[case(&[r#"["~a*"]"#, r#"{"rules": ["+@read"]}"#], 1)]
    #[case(&[r#"[1, 2]"#], 0)]
    fn test_malformed_statement(#[case] commands: &[&str], #[case] expected_index: usize) {
        match parse_access_string(commands) {
            Err(GrammarError::Malformed { index, .. }) => assert_eq!(index, expected_index),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }
}
