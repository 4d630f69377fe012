use serde::{Deserialize, Serialize};

/// JWT claims structure for Supabase tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    pub aud: String,

    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    /// Postgres role the token maps to, `authenticated` for signed-in users
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,

    /// Sign-up metadata (first/last name, OAuth profile fields)
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
}

impl Claims {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .as_ref()?
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Identity provider used to sign in, `email` for password accounts.
    pub fn provider(&self) -> Option<&str> {
        self.app_metadata.as_ref()?.provider.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supabase_access_token_claims() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": "2b7f3c1e-1f0e-4a57-9b39-5a0d6c7e8f90",
            "aud": "authenticated",
            "iss": "https://abc.supabase.co/auth/v1",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "email": "ada@example.com",
            "role": "authenticated",
            "app_metadata": { "provider": "google", "providers": ["google"] },
            "user_metadata": { "first_name": "Ada", "last_name": " " }
        }))
        .unwrap();

        assert_eq!(claims.provider(), Some("google"));
        assert_eq!(claims.metadata_str("first_name"), Some("Ada"));
        assert_eq!(claims.metadata_str("last_name"), None);
        assert_eq!(claims.nbf, None);
    }
}
