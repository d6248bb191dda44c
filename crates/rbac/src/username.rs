//! Host-visible usernames
//!
//! Format: `v_{display}_{role}_{random}_{epoch}`, with the display name cut
//! to 5 characters, the role name to 39, a 20 character alphanumeric random
//! part and the Unix timestamp in seconds. The whole name is capped at 80
//! characters. Empty display or role segments are left out.
//!
//! The directory identifier is derived from this name by
//! [`normalize`](crate::core::normalize), which keeps the last 40 characters,
//! so the random part and the timestamp always survive.

use chrono::Utc;

use crate::core::{ElastiCacheError, Result};
use crate::database::UsernameMetadata;

const PREFIX: &str = "v";
const SEPARATOR: &str = "_";
const RANDOM_LEN: usize = 20;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates unique, time-suffixed usernames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsernameGenerator {
    display_len: usize,
    role_len: usize,
    max_len: usize,
}

impl Default for UsernameGenerator {
    fn default() -> Self {
        Self {
            display_len: 5,
            role_len: 39,
            max_len: 80,
        }
    }
}

impl UsernameGenerator {
    /// Override the overall length cap
    pub fn with_max_length(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Generate a username for the given metadata
    pub fn generate(&self, metadata: &UsernameMetadata) -> Result<String> {
        self.generate_at(metadata, Utc::now().timestamp())
    }

    fn generate_at(&self, metadata: &UsernameMetadata, epoch: i64) -> Result<String> {
        if self.max_len < PREFIX.len() + 1 + RANDOM_LEN {
            return Err(ElastiCacheError::UsernameGeneration {
                reason: format!(
                    "maximum length {} leaves no room for the random suffix",
                    self.max_len
                ),
            });
        }

        let display: String = metadata.display_name.chars().take(self.display_len).collect();
        let role: String = metadata.role_name.chars().take(self.role_len).collect();
        let random = random_alphanumeric(RANDOM_LEN);
        let epoch = epoch.to_string();

        let username = [PREFIX, display.as_str(), role.as_str(), random.as_str(), epoch.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(SEPARATOR);

        Ok(username.chars().take(self.max_len).collect())
    }
}

fn random_alphanumeric(len: usize) -> String {
    (0..len)
        .map(|_| char::from(CHARSET[rand::random_range(0..CHARSET.len())]))
        .collect()
}
