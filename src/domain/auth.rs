//! Authentication domain types
//!
//! These types are used for authentication requests and responses,
//! acting as a proxy to Supabase Auth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

pub const MIN_PASSWORD_CHARS: usize = 6;

/// Sign up request
#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            errors.add("email", "a valid email address is required");
        }
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            errors.add(
                "password",
                format!("password must be at least {} characters", MIN_PASSWORD_CHARS),
            );
        }
        errors.into_result(())
    }

    /// `user_metadata` sent to Supabase, mirrored into the profile row.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "first_name": self.first_name.as_deref().map(str::trim),
            "last_name": self.last_name.as_deref().map(str::trim),
        })
    }
}

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Identity providers accepted for OAuth sign-in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Facebook,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            "facebook" => Some(Self::Facebook),
            "apple" => Some(Self::Apple),
            _ => None,
        }
    }
}

/// Optional override of the post-login redirect, plus the PKCE challenge
/// the client will later prove with its code verifier
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OAuthQuery {
    #[serde(default)]
    pub redirect_to: Option<String>,
    #[serde(default)]
    pub code_challenge: Option<String>,
    #[serde(default)]
    pub code_challenge_method: Option<String>,
}

/// PKCE challenge forwarded to the authorize endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge {
    pub challenge: String,
    /// `s256` or `plain`
    pub method: &'static str,
}

impl OAuthQuery {
    /// The PKCE challenge, if the client sent one. The method defaults to
    /// `s256`; a challenge must be 43 to 128 unreserved URL characters.
    pub fn pkce(&self) -> Result<Option<PkceChallenge>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let challenge = self
            .code_challenge
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let method = self
            .code_challenge_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let Some(challenge) = challenge else {
            if method.is_some() {
                errors.add("code_challenge", "code_challenge_method requires a code_challenge");
            }
            return errors.into_result(None);
        };

        let method = match method.map(str::to_ascii_lowercase).as_deref() {
            None | Some("s256") => "s256",
            Some("plain") => "plain",
            Some(other) => {
                errors.add(
                    "code_challenge_method",
                    format!("unsupported code challenge method '{}'", other),
                );
                "s256"
            }
        };

        let well_formed = (43..=128).contains(&challenge.len())
            && challenge
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'));
        if !well_formed {
            errors.add("code_challenge", "code challenge is malformed");
        }

        errors.into_result(Some(PkceChallenge {
            challenge: challenge.to_string(),
            method,
        }))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthUrlResponse {
    pub provider: OAuthProvider,
    pub url: String,
}

/// Authorization code returned to the redirect URL
#[derive(Debug, Clone, Deserialize)]
pub struct CodeExchangeRequest {
    pub auth_code: String,
    pub code_verifier: String,
}

/// Email confirmation link parameters
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub token_hash: String,
    #[serde(default = "default_verify_type", rename = "type")]
    pub verify_type: String,
}

fn default_verify_type() -> String {
    "email".to_string()
}

/// User info from Supabase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Auth response with tokens (for signin or auto-confirmed signup)
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: User,
}

/// Signup response when email confirmation is required
#[derive(Debug, Clone, Serialize)]
pub struct SignupPendingResponse {
    pub user_id: String,
    pub email: String,
    pub confirmation_required: bool,
    pub message: String,
}

/// Session response
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub access_token: String,
    pub expires_at: i64,
    pub is_admin: bool,
}

// Supabase Auth API response types

/// Response when signup returns tokens (email confirmation disabled or auto-confirmed)
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseAuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user: SupabaseUser,
}

/// Response when signup requires email confirmation; just the user, no tokens
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseSignupResponse {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<String>,
    pub confirmation_sent_at: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseUser {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub app_metadata: Option<serde_json::Value>,
}

impl SupabaseUser {
    fn metadata_str(&self, key: &str) -> Option<String> {
        self.user_metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// First and last name, falling back to splitting the OAuth `full_name`.
    pub fn names(&self) -> (Option<String>, Option<String>) {
        let first = self.metadata_str("first_name");
        let last = self.metadata_str("last_name");
        if first.is_some() || last.is_some() {
            return (first, last);
        }
        match self
            .metadata_str("full_name")
            .or_else(|| self.metadata_str("name"))
        {
            Some(full) => match full.split_once(' ') {
                Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
                None => (Some(full), None),
            },
            None => (None, None),
        }
    }

    pub fn avatar_url(&self) -> Option<String> {
        self.metadata_str("avatar_url")
            .or_else(|| self.metadata_str("picture"))
    }
}

/// Supabase error body; newer responses use `code`/`msg`, older ones
/// `error`/`error_description`
#[derive(Debug, Clone, Deserialize)]
pub struct SupabaseErrorResponse {
    pub code: Option<i32>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub message: Option<String>,
}

impl SupabaseErrorResponse {
    pub fn get_message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown authentication error".to_string())
    }
}

impl From<SupabaseUser> for User {
    fn from(su: SupabaseUser) -> Self {
        let (first_name, last_name) = su.names();
        let avatar_url = su.avatar_url();

        Self {
            id: su.id,
            email: su.email,
            first_name,
            last_name,
            avatar_url,
            created_at: su.created_at.and_then(|s| s.parse().ok()),
        }
    }
}

impl From<SupabaseSignupResponse> for SignupPendingResponse {
    fn from(sr: SupabaseSignupResponse) -> Self {
        Self {
            user_id: sr.id,
            email: sr.email.unwrap_or_default(),
            confirmation_required: sr.confirmation_sent_at.is_some(),
            message: "Please check your email to confirm your account.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn oauth_query(challenge: Option<&str>, method: Option<&str>) -> OAuthQuery {
        OAuthQuery {
            redirect_to: None,
            code_challenge: challenge.map(str::to_string),
            code_challenge_method: method.map(str::to_string),
        }
    }

    #[rstest]
    #[case(None, "s256")]
    #[case(Some("S256"), "s256")]
    #[case(Some("plain"), "plain")]
    fn challenge_method_defaults_to_s256(#[case] method: Option<&str>, #[case] expected: &str) {
        let pkce = oauth_query(Some(CHALLENGE), method).pkce().unwrap().unwrap();
        assert_eq!(pkce.challenge, CHALLENGE);
        assert_eq!(pkce.method, expected);
    }

    #[rstest]
    #[case(None, Some("s256"), "code_challenge")]
    #[case(Some("short"), None, "code_challenge")]
    #[case(Some(CHALLENGE), Some("md5"), "code_challenge_method")]
    fn rejects_bad_challenges(
        #[case] challenge: Option<&str>,
        #[case] method: Option<&str>,
        #[case] field: &str,
    ) {
        assert!(oauth_query(challenge, method).pkce().unwrap_err().has(field));
    }

    #[test]
    fn challenge_is_optional() {
        assert_eq!(oauth_query(None, None).pkce().unwrap(), None);
    }

    fn supabase_user(metadata: serde_json::Value) -> SupabaseUser {
        SupabaseUser {
            id: "6f1c".to_string(),
            email: Some("ada@example.com".to_string()),
            created_at: Some("2025-01-02T03:04:05Z".to_string()),
            user_metadata: Some(metadata),
            app_metadata: None,
        }
    }

    #[test]
    fn names_come_from_signup_metadata() {
        let user: User = supabase_user(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Obi"
        }))
        .into();
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name.as_deref(), Some("Obi"));
        assert!(user.created_at.is_some());
    }

    #[test]
    fn oauth_full_name_is_split() {
        let su = supabase_user(serde_json::json!({
            "full_name": "Ngozi Ada Eze",
            "picture": "https://lh3.test/a.png"
        }));
        assert_eq!(
            su.names(),
            (Some("Ngozi".to_string()), Some("Ada Eze".to_string()))
        );
        assert_eq!(su.avatar_url().as_deref(), Some("https://lh3.test/a.png"));
    }

    #[rstest]
    #[case("google", Some(OAuthProvider::Google))]
    #[case("GitHub", Some(OAuthProvider::Github))]
    #[case("apple", Some(OAuthProvider::Apple))]
    #[case("myspace", None)]
    fn parses_providers(#[case] raw: &str, #[case] expected: Option<OAuthProvider>) {
        assert_eq!(OAuthProvider::parse(raw), expected);
    }

    #[rstest]
    #[case("ada@example.com", "secret1", true)]
    #[case("ada.example.com", "secret1", false)]
    #[case("ada@example.com", "123", false)]
    fn signup_validation(#[case] email: &str, #[case] password: &str, #[case] ok: bool) {
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: None,
            last_name: None,
        };
        assert_eq!(request.validate().is_ok(), ok);
    }

    #[test]
    fn error_message_prefers_newest_fields() {
        let err: SupabaseErrorResponse =
            serde_json::from_str(r#"{"code":400,"msg":"Invalid login credentials","error":"invalid_grant"}"#)
                .unwrap();
        assert_eq!(err.get_message(), "Invalid login credentials");
    }
}
