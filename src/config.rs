//! Application configuration loaded from environment variables.
//!
//! The OAuth configuration is validated exactly once, at startup. A missing
//! credential is a fatal configuration error, never a runtime failure.

use std::env;
use std::time::Duration;

/// Google's OAuth 2.0 authorization endpoint.
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's OAuth 2.0 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://accounts.google.com/o/oauth2/token";
/// Google user-info endpoint.
pub const DEFAULT_USERINFO_URI: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
/// Root of the Mirror REST API.
pub const DEFAULT_MIRROR_BASE_URI: &str = "https://www.googleapis.com/mirror/v1";

/// Scope every Glassware must request.
pub const TIMELINE_SCOPE: &str = "https://www.googleapis.com/auth/glass.timeline";
/// Scope needed to read the user's profile after the code exchange.
pub const PROFILE_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.profile";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Raw, unvalidated OAuth settings as supplied by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct OAuthSettings {
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub callback_uri: Option<String>,
    pub scopes: Vec<String>,
    pub auth_uri: Option<String>,
    pub token_uri: Option<String>,
    pub userinfo_uri: Option<String>,
    pub mirror_base_uri: Option<String>,
}

/// Validated provider configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    api_key: String,
    client_id: String,
    client_secret: String,
    callback_uri: String,
    scopes: Vec<String>,
    auth_uri: String,
    token_uri: String,
    userinfo_uri: String,
    mirror_base_uri: String,
}

impl OAuthConfig {
    /// Validate settings and build the configuration.
    ///
    /// `api_key`, `client_id`, `client_secret` and `callback_uri` are
    /// mandatory. Blank values count as missing.
    pub fn from_settings(settings: OAuthSettings) -> Result<Self, ConfigError> {
        let api_key = required(settings.api_key, "GLASS_API_KEY")?;
        let client_id = required(settings.client_id, "GLASS_CLIENT_ID")?;
        let client_secret = required(settings.client_secret, "GLASS_CLIENT_SECRET")?;
        let callback_uri = required(settings.callback_uri, "GLASS_CALLBACK_URI")?;

        if !callback_uri.starts_with("http://") && !callback_uri.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "callback URI must be absolute: {}",
                callback_uri
            )));
        }

        Ok(Self {
            api_key,
            client_id,
            client_secret,
            callback_uri,
            scopes: merge_scopes(&settings.scopes),
            auth_uri: settings
                .auth_uri
                .unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: settings
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            userinfo_uri: settings
                .userinfo_uri
                .unwrap_or_else(|| DEFAULT_USERINFO_URI.to_string()),
            mirror_base_uri: settings
                .mirror_base_uri
                .map(|uri| uri.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_MIRROR_BASE_URI.to_string()),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn callback_uri(&self) -> &str {
        &self.callback_uri
    }

    /// Requested scopes: defaults first, then caller scopes, de-duplicated.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn auth_uri(&self) -> &str {
        &self.auth_uri
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    pub fn userinfo_uri(&self) -> &str {
        &self.userinfo_uri
    }

    pub fn mirror_base_uri(&self) -> &str {
        &self.mirror_base_uri
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Combine the default scopes with caller-supplied ones.
///
/// The timeline scope is always present exactly once; caller entries that
/// name it are ignored.
fn merge_scopes(extra: &[String]) -> Vec<String> {
    let mut scopes = vec![PROFILE_SCOPE.to_string(), TIMELINE_SCOPE.to_string()];

    for scope in extra {
        let scope = scope.trim();
        if scope.is_empty() || scope.contains("glass.timeline") {
            continue;
        }
        if !scopes.iter().any(|s| s == scope) {
            scopes.push(scope.to_string());
        }
    }

    scopes
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub oauth: OAuthConfig,
    /// Timeout applied to every outbound HTTP call.
    pub http_timeout: Duration,
    /// Server port
    pub port: u16,
    /// GCP project for the Firestore token store. In-memory store when unset.
    pub gcp_project_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let settings = OAuthSettings {
            api_key: env::var("GLASS_API_KEY").ok(),
            client_id: env::var("GLASS_CLIENT_ID").ok(),
            client_secret: env::var("GLASS_CLIENT_SECRET").ok(),
            callback_uri: env::var("GLASS_CALLBACK_URI").ok(),
            scopes: env::var("GLASS_SCOPES")
                .map(|s| {
                    s.split(|c: char| c == ',' || c.is_whitespace())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            auth_uri: env::var("GLASS_AUTH_URI").ok(),
            token_uri: env::var("GLASS_TOKEN_URI").ok(),
            userinfo_uri: env::var("GLASS_USERINFO_URI").ok(),
            mirror_base_uri: env::var("GLASS_MIRROR_BASE_URI").ok(),
        };

        let http_timeout = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("HTTP_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid(
                        "HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            oauth: OAuthConfig::from_settings(settings)?,
            http_timeout,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            gcp_project_id: env::var("GCP_PROJECT_ID").ok().filter(|p| !p.is_empty()),
        })
    }

    /// Configuration for tests, pointing every endpoint at `base_uri`.
    pub fn test_default_with_base(base_uri: &str) -> Self {
        let settings = OAuthSettings {
            api_key: Some("test_api_key".to_string()),
            client_id: Some("test_client_id".to_string()),
            client_secret: Some("test_secret".to_string()),
            callback_uri: Some("http://localhost:8080/auth/glass/callback".to_string()),
            scopes: Vec::new(),
            auth_uri: Some(format!("{}/o/oauth2/auth", base_uri)),
            token_uri: Some(format!("{}/o/oauth2/token", base_uri)),
            userinfo_uri: Some(format!("{}/oauth2/v1/userinfo", base_uri)),
            mirror_base_uri: Some(format!("{}/mirror/v1", base_uri)),
        };

        Self {
            // Settings above satisfy every required field.
            oauth: match OAuthConfig::from_settings(settings) {
                Ok(oauth) => oauth,
                Err(e) => panic!("test configuration is invalid: {}", e),
            },
            http_timeout: Duration::from_secs(5),
            port: 8080,
            gcp_project_id: None,
        }
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self::test_default_with_base("http://127.0.0.1:9")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OAuthSettings {
        OAuthSettings {
            api_key: Some("k".to_string()),
            client_id: Some("c".to_string()),
            client_secret: Some("s".to_string()),
            callback_uri: Some("https://a/cb".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_minimal_settings_use_google_endpoints() {
        let config = OAuthConfig::from_settings(settings()).expect("valid config");

        assert_eq!(config.client_id(), "c");
        assert_eq!(config.auth_uri(), DEFAULT_AUTH_URI);
        assert_eq!(config.token_uri(), DEFAULT_TOKEN_URI);
        assert_eq!(config.scopes(), &[PROFILE_SCOPE, TIMELINE_SCOPE]);
    }

    #[test]
    fn test_missing_required_fields_are_fatal() {
        let mut s = settings();
        s.client_secret = None;
        assert!(matches!(
            OAuthConfig::from_settings(s),
            Err(ConfigError::Missing("GLASS_CLIENT_SECRET"))
        ));

        let mut s = settings();
        s.api_key = Some("   ".to_string());
        assert!(matches!(
            OAuthConfig::from_settings(s),
            Err(ConfigError::Missing("GLASS_API_KEY"))
        ));

        let mut s = settings();
        s.callback_uri = None;
        assert!(matches!(
            OAuthConfig::from_settings(s),
            Err(ConfigError::Missing("GLASS_CALLBACK_URI"))
        ));
    }

    #[test]
    fn test_relative_callback_rejected() {
        let mut s = settings();
        s.callback_uri = Some("/cb".to_string());
        assert!(matches!(
            OAuthConfig::from_settings(s),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_scopes_are_merged_without_duplicates() {
        let mut s = settings();
        s.scopes = vec![
            "https://www.googleapis.com/auth/glass.location".to_string(),
            PROFILE_SCOPE.to_string(),
            "https://www.googleapis.com/auth/glass.timeline".to_string(),
            "".to_string(),
            "https://www.googleapis.com/auth/glass.location".to_string(),
        ];

        let config = OAuthConfig::from_settings(s).expect("valid config");
        assert_eq!(
            config.scopes(),
            &[
                PROFILE_SCOPE,
                TIMELINE_SCOPE,
                "https://www.googleapis.com/auth/glass.location",
            ]
        );
    }

    #[test]
    fn test_mirror_base_trailing_slash_trimmed() {
        let mut s = settings();
        s.mirror_base_uri = Some("http://localhost:1234/mirror/v1/".to_string());
        let config = OAuthConfig::from_settings(s).expect("valid config");
        assert_eq!(config.mirror_base_uri(), "http://localhost:1234/mirror/v1");
    }
}
