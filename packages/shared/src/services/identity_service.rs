use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tokio::sync::watch;
use tracing::info;

use crate::config::IdentityConfig;
use crate::models::identity::{IdentityClaims, UserIdentity};
use crate::services::errors::identity_service_errors::IdentityServiceError;

#[cfg(test)]
use mockall::automock;

/// Source of "who is calling". Room operations fail with `NotAuthenticated`
/// when this returns `None`.
#[cfg_attr(test, automock)]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
}

/// Client-side auth state. Sign-in is either a trusted identity handed over
/// by the host app or an HS256 ID token.
pub struct IdentityService {
    state: watch::Sender<Option<UserIdentity>>,
    jwt_secret: String,
}

impl IdentityService {
    pub fn new(jwt_secret: String) -> Self {
        let (state, _) = watch::channel(None);
        IdentityService { state, jwt_secret }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(config.jwt_secret.clone())
    }

    pub fn sign_in(&self, identity: UserIdentity) {
        info!("Signed in as {}", identity.uid);
        self.state.send_replace(Some(identity));
    }

    pub fn sign_in_with_token(&self, token: &str) -> Result<UserIdentity, IdentityServiceError> {
        let identity = UserIdentity::from(self.verify_token(token)?);
        self.sign_in(identity.clone());
        Ok(identity)
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.state.send_replace(None) {
            info!("Signed out {}", previous.uid);
        }
    }

    /// Auth state changes, including sign-out.
    pub fn watch(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.state.subscribe()
    }

    pub fn generate_token(&self, identity: &UserIdentity) -> Result<String, IdentityServiceError> {
        let now = Utc::now();
        let claims = IdentityClaims {
            sub: identity.uid.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            picture: identity.avatar_url.clone(),
            exp: (now + Duration::hours(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| IdentityServiceError::JwtError(e.to_string()))
    }

    pub fn verify_token(&self, token: &str) -> Result<IdentityClaims, IdentityServiceError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());

        match decode::<IdentityClaims>(token, &decoding_key, &Validation::default()) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(IdentityServiceError::ExpiredToken)
                }
                _ => Err(IdentityServiceError::InvalidToken),
            },
        }
    }
}

impl IdentityProvider for IdentityService {
    fn current_user(&self) -> Option<UserIdentity> {
        self.state.borrow().clone()
    }
}
