//! Directory identifiers
//!
//! Every ElastiCache identifier (user ids, user group ids, replication group
//! ids) is derived through [`normalize`]. Identifiers:
//!
//! - have at most 40 characters
//! - start with a letter
//! - contain only `A-Z`, `a-z`, `0-9` and `-`
//! - never contain `--` and never end with `-`

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Maximum identifier length accepted by ElastiCache
pub const MAX_ID_LEN: usize = 40;

/// Identifier of the user every user group must contain
pub const DEFAULT_USER_ID: &str = "default";

static INVALID_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9-]+").expect("static pattern compiles"));

static HYPHEN_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("static pattern compiles"));

/// A directory-legal identifier, produced only by [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Normalize an arbitrary string into an identifier
    pub fn normalize(raw: &str) -> Self {
        normalize(raw)
    }

    /// Identifier of the mandatory `default` user
    pub fn default_user() -> Self {
        Self(DEFAULT_USER_ID.to_string())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ResourceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ResourceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Map an arbitrary display string to a directory-legal identifier.
///
/// Total: never fails and never panics.
///
/// 1. Drop every character outside `[A-Za-z0-9-]`.
/// 2. Delete every run of two or more hyphens entirely.
/// 3. Keep the last 40 characters; generated usernames carry their random
///    and timestamp parts at the end.
/// 4. Drop leading hyphens, then replace a leading digit with a letter.
/// 5. Replace a trailing hyphen with `x`.
///
/// ```
/// use elasticache_rbac::core::normalize;
///
/// assert_eq!(normalize("v_token_redis-role!/$}").as_str(), "vtokenredis-role");
/// assert_eq!(normalize("1bcd").as_str(), "abcd");
/// ```
pub fn normalize(raw: &str) -> ResourceId {
    let stripped = INVALID_CHARACTERS.replace_all(raw, "");
    let collapsed = HYPHEN_RUNS.replace_all(&stripped, "");

    // Only ASCII survives step 1, so byte offsets are character offsets.
    let mut id: &str = &collapsed;
    if id.len() > MAX_ID_LEN {
        id = &id[id.len() - MAX_ID_LEN..];
    }
    let id = id.trim_start_matches('-');

    let mut chars = id.chars();
    let mut normalized = String::with_capacity(id.len());
    match chars.next() {
        None => return ResourceId("x".to_string()),
        Some(first) if first.is_ascii_digit() => normalized.push(digit_to_letter(first)),
        Some(first) => normalized.push(first),
    }
    normalized.push_str(chars.as_str());

    if normalized.ends_with('-') {
        normalized.pop();
        normalized.push('x');
    }

    ResourceId(normalized)
}

/// `1..=9` map to `a..=i`; `0` maps to `j`.
fn digit_to_letter(digit: char) -> char {
    match digit.to_digit(10) {
        Some(0) | None => 'j',
        Some(d) => char::from(b'a' + (d as u8) - 1),
    }
}
