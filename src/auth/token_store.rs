use tracing::{debug, warn};

use super::AuthError;

static SERVICE: &str = "my-unicorn";
static USERNAME: &str = "github-token";

/// Wraps the OS secret service (Linux keyring via D-Bus Secret Service) to
/// persist a GitHub personal access token.
///
/// A missing keyring is non-fatal throughout this module: callers fall back
/// to unauthenticated requests and log a warning, per spec §4.2.
pub struct TokenStore;

impl TokenStore {
    fn entry() -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(SERVICE, USERNAME).map_err(AuthError::KeyringUnavailable)
    }

    /// Validates and persists `token` in the OS keyring.
    pub fn set(token: &str) -> Result<(), AuthError> {
        if !is_valid_token_format(token) {
            return Err(AuthError::InvalidTokenFormat);
        }

        let entry = Self::entry()?;
        entry.set_password(token).map_err(AuthError::KeyringUnavailable)?;
        debug!("token stored in OS keyring");
        Ok(())
    }

    /// Reads the stored token, if any. Returns `None` (not an error) when no
    /// keyring session is available, so the caller can proceed unauthenticated.
    pub fn get() -> Option<String> {
        match Self::entry() {
            Ok(entry) => match entry.get_password() {
                Ok(token) => Some(token),
                Err(keyring::Error::NoEntry) => None,
                Err(err) => {
                    warn!(error = %err, "keyring unavailable, proceeding unauthenticated");
                    None
                }
            },
            Err(_) => {
                warn!("no D-Bus session available, proceeding unauthenticated");
                None
            }
        }
    }

    pub fn delete() -> Result<(), AuthError> {
        let entry = Self::entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(AuthError::KeyringUnavailable(err)),
        }
    }
}

/// Validates the `^gh[a-z]_[A-Za-z0-9_]{20,}$` shape spec §4.2 names, without
/// pulling in a regex engine for one fixed pattern.
fn is_valid_token_format(token: &str) -> bool {
    let Some(rest) = token.strip_prefix("gh") else {
        return false;
    };
    let Some((kind, rest)) = rest.split_at_checked(1) else {
        return false;
    };
    if !kind.chars().all(|c| c.is_ascii_lowercase()) {
        return false;
    }
    let Some(body) = rest.strip_prefix('_') else {
        return false;
    };

    body.len() >= 20 && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::is_valid_token_format;

    #[test]
    fn accepts_well_formed_tokens() {
        assert!(is_valid_token_format("ghp_abcdefghijklmnopqrstuvwxyz01"));
        assert!(is_valid_token_format("gho_ABCDEFGHIJKLMNOPQRSTUVWXYZ01"));
    }

    #[test]
    fn rejects_short_or_malformed_tokens() {
        assert!(!is_valid_token_format("ghp_tooshort"));
        assert!(!is_valid_token_format("not-a-token"));
        assert!(!is_valid_token_format(""));
    }
}
