use super::Claims;
use uuid::Uuid;

/// Authenticated user context extracted from a verified JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    pub email: Option<String>,

    pub role: Option<String>,

    /// Raw JWT, forwarded when calling Supabase on the user's behalf
    token: String,

    claims: Claims,
}

impl AuthContext {
    pub fn from_claims_with_token(claims: &Claims, token: &str) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role: claims.role.clone(),
            token: token.to_string(),
            claims: claims.clone(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn first_name(&self) -> Option<&str> {
        self.claims.metadata_str("first_name")
    }

    pub fn last_name(&self) -> Option<&str> {
        self.claims.metadata_str("last_name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str) -> Claims {
        serde_json::from_value(serde_json::json!({
            "sub": sub,
            "aud": "authenticated",
            "iss": "issuer",
            "iat": 0,
            "exp": 1,
            "user_metadata": { "first_name": "Tunde" }
        }))
        .unwrap()
    }

    #[test]
    fn keeps_token_and_identity() {
        let id = Uuid::new_v4();
        let ctx = AuthContext::from_claims_with_token(&claims(&id.to_string()), "jwt").unwrap();
        assert_eq!(ctx.user_id, id);
        assert_eq!(ctx.token(), "jwt");
        assert_eq!(ctx.first_name(), Some("Tunde"));
        assert_eq!(ctx.last_name(), None);
    }

    #[test]
    fn rejects_non_uuid_subject() {
        assert!(AuthContext::from_claims_with_token(&claims("service"), "jwt").is_err());
    }
}
