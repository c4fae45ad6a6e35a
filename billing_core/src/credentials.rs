use crate::error::{BillingError, Result};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::path::PathBuf;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";
pub const PROFILE_VAR: &str = "AWS_PROFILE";
pub const SHARED_CREDENTIALS_FILE_VAR: &str = "AWS_SHARED_CREDENTIALS_FILE";

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    /// Set for temporary credentials handed out by a metadata endpoint.
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|token| !token.is_empty()),
            expiration: None,
        }
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// True when the credentials expire before `now + margin`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expiration
            .map(|expiration| expiration <= now + margin)
            .unwrap_or(false)
    }

    /// Reads the standard AWS environment variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let access_key_id = read(ACCESS_KEY_ID_VAR).ok_or_else(|| {
            BillingError::MissingCredentials(format!("{} is not set", ACCESS_KEY_ID_VAR))
        })?;
        let secret_access_key = read(SECRET_ACCESS_KEY_VAR).ok_or_else(|| {
            BillingError::MissingCredentials(format!("{} is not set", SECRET_ACCESS_KEY_VAR))
        })?;

        Ok(Self::new(access_key_id, secret_access_key, read(SESSION_TOKEN_VAR)))
    }

    /// Reads one profile out of a shared credentials file.
    ///
    /// Returns `Ok(None)` when the profile has no section in the file and
    /// `MissingCredentials` when the section lacks a key pair.
    pub fn from_profile(contents: &str, profile: &str) -> Result<Option<Self>> {
        let mut in_profile = false;
        let mut found = false;
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut session_token = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(section) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                in_profile = section.trim() == profile;
                found |= in_profile;
                continue;
            }
            if !in_profile {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }

        if !found {
            return Ok(None);
        }

        match (access_key_id, secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok(Some(Self::new(id, secret, session_token)))
            }
            _ => Err(BillingError::MissingCredentials(format!(
                "profile '{}' has no aws_access_key_id/aws_secret_access_key pair",
                profile
            ))),
        }
    }
}

/// `AWS_PROFILE`, falling back to `default`.
pub fn profile_name<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(PROFILE_VAR)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

/// `AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`.
pub fn shared_credentials_path<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(SHARED_CREDENTIALS_FILE_VAR).filter(|path| !path.is_empty()) {
        return Some(PathBuf::from(path));
    }

    lookup("HOME")
        .or_else(|| lookup("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".aws").join("credentials"))
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}
