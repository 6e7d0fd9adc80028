use serde::{Deserialize, Serialize};

/// Opaque user record handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserIdentity {
    pub fn new(uid: &str, email: &str) -> Self {
        UserIdentity {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: None,
            avatar_url: None,
        }
    }

    /// Display name, falling back to the local part of the email address.
    pub fn name(&self) -> String {
        match &self.display_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// Claims carried by the identity provider's ID token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

impl From<IdentityClaims> for UserIdentity {
    fn from(claims: IdentityClaims) -> Self {
        UserIdentity {
            uid: claims.sub,
            email: claims.email,
            display_name: claims.name,
            avatar_url: claims.picture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_falls_back_to_email_local_part() {
        let identity = UserIdentity::new("u1", "magnus@example.com");
        assert_eq!(identity.name(), "magnus");
    }

    #[test]
    fn test_name_prefers_display_name() {
        let mut identity = UserIdentity::new("u1", "magnus@example.com");
        identity.display_name = Some("Magnus".to_string());
        assert_eq!(identity.name(), "Magnus");

        identity.display_name = Some(String::new());
        assert_eq!(identity.name(), "magnus");
    }

    #[test]
    fn test_claims_conversion() {
        let claims = IdentityClaims {
            sub: "uid-1".to_string(),
            email: "judit@example.com".to_string(),
            name: None,
            picture: Some("https://example.com/a.png".to_string()),
            exp: 0,
            iat: 0,
        };

        let identity = UserIdentity::from(claims);
        assert_eq!(identity.uid, "uid-1");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(identity.name(), "judit");
    }
}
