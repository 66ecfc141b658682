//! Identity resolution: bearer token (or legacy query id) to principal.
//!
//! In production a [`TokenVerifier`] checks RS256 ID tokens issued by the
//! identity provider. Without a verifier the resolver can only hand out the
//! fixed development admin, and only when explicitly allowed to.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use base64::{Engine as _, prelude::BASE64_STANDARD};
use engine::{Engine, EngineError, NewPrincipal, Principal, PrincipalStatus, Role};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ServerError;

pub const DEV_ADMIN_ID: &str = "dev-admin";

/// Public keys for the provider's secure-token service.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

const KEYS_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("missing credentials")]
    Missing,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
    #[error("invalid service account: {0}")]
    ServiceAccount(String),
}

/// Who the caller is, attached to every authenticated request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub principal_id: String,
    pub role: Role,
    pub status: PrincipalStatus,
}

impl From<Principal> for AuthContext {
    fn from(value: Principal) -> Self {
        Self {
            principal_id: value.id,
            role: value.role,
            status: value.status,
        }
    }
}

/// Claims extracted from a verified token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// The subset of a service-account credential we need.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
}

impl ServiceAccount {
    pub fn from_json(raw: &str) -> Result<Self, IdentityError> {
        let account: ServiceAccount =
            serde_json::from_str(raw).map_err(|err| IdentityError::ServiceAccount(err.to_string()))?;
        if account.project_id.trim().is_empty() {
            return Err(IdentityError::ServiceAccount(
                "project_id is empty".to_string(),
            ));
        }
        Ok(account)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, IdentityError> {
        let raw = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|err| IdentityError::ServiceAccount(err.to_string()))?;
        let raw =
            String::from_utf8(raw).map_err(|err| IdentityError::ServiceAccount(err.to_string()))?;
        Self::from_json(&raw)
    }

    pub fn from_file(path: &str) -> Result<Self, IdentityError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| IdentityError::ServiceAccount(format!("{path}: {err}")))?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// RS256 verifier backed by the provider's JWKS endpoint.
pub struct JwtVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    keys: RwLock<Option<CachedKeys>>,
}

impl JwtVerifier {
    pub fn new(account: &ServiceAccount, jwks_url: Option<&str>) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| IdentityError::KeyFetch(err.to_string()))?;
        Ok(Self {
            project_id: account.project_id.clone(),
            jwks_url: jwks_url.unwrap_or(DEFAULT_JWKS_URL).to_string(),
            http,
            keys: RwLock::new(None),
        })
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>, IdentityError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|err| IdentityError::KeyFetch(err.to_string()))?;
        if !response.status().is_success() {
            return Err(IdentityError::KeyFetch(format!(
                "HTTP {} from {}",
                response.status(),
                self.jwks_url
            )));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|err| IdentityError::KeyFetch(err.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => tracing::warn!(kid = %kid, "skipping unusable signing key: {err}"),
            }
        }
        Ok(keys)
    }

    /// Key for `kid`, refreshing the cache when stale or when the key is new.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cached = self.keys.read().await;
            if let Some(cached) = cached.as_ref()
                && cached.fetched_at.elapsed() < KEYS_TTL
                && let Some(key) = cached.keys.get(kid)
            {
                return Ok(key.clone());
            }
        }

        let keys = self.fetch_keys().await?;
        let key = keys.get(kid).cloned();
        *self.keys.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.ok_or_else(|| IdentityError::InvalidToken(format!("unknown key id {kid}")))
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header =
            decode_header(token).map_err(|err| IdentityError::InvalidToken(err.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("missing key id".to_string()))?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);
        let data = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|err| IdentityError::InvalidToken(err.to_string()))?;

        if data.claims.sub.trim().is_empty() {
            return Err(IdentityError::InvalidToken("empty subject".to_string()));
        }
        Ok(VerifiedIdentity {
            subject: data.claims.sub,
            email: data.claims.email,
            display_name: data.claims.name,
        })
    }
}

pub struct IdentityResolver {
    verifier: Option<Arc<dyn TokenVerifier>>,
    allow_dev_identity: bool,
    legacy_query_auth: bool,
}

impl IdentityResolver {
    pub fn new(verifier: Option<Arc<dyn TokenVerifier>>) -> Self {
        Self {
            verifier,
            allow_dev_identity: false,
            legacy_query_auth: false,
        }
    }

    /// Lets the resolver fall back to [`DEV_ADMIN_ID`] when no verifier is
    /// configured. Ignored otherwise.
    pub fn allow_dev_identity(mut self, allow: bool) -> Self {
        self.allow_dev_identity = allow;
        self
    }

    /// Accepts `?auth=<principal id>` for principals that already exist.
    pub fn legacy_query_auth(mut self, allow: bool) -> Self {
        self.legacy_query_auth = allow;
        self
    }

    pub fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn dev_identity_active(&self) -> bool {
        self.verifier.is_none() && self.allow_dev_identity
    }

    pub async fn resolve(
        &self,
        engine: &Engine,
        bearer: Option<&str>,
        legacy_id: Option<&str>,
    ) -> Result<AuthContext, ServerError> {
        let principal = if self.dev_identity_active() {
            engine
                .ensure_principal(NewPrincipal {
                    role: Role::Admin,
                    status: PrincipalStatus::Approved,
                    display_name: Some("Development admin".to_string()),
                    ..NewPrincipal::user(DEV_ADMIN_ID)
                })
                .await?
        } else if let (Some(verifier), Some(token)) = (&self.verifier, bearer) {
            let identity = verifier.verify(token).await?;
            engine
                .ensure_principal(NewPrincipal {
                    email: identity.email,
                    display_name: identity.display_name,
                    ..NewPrincipal::user(identity.subject)
                })
                .await?
        } else if let (true, Some(id)) = (self.legacy_query_auth, legacy_id) {
            tracing::warn!(principal = id, "deprecated ?auth= query authentication used");
            match engine.principal(id).await {
                Ok(principal) => principal,
                Err(EngineError::KeyNotFound(_)) => return Err(IdentityError::Missing.into()),
                Err(err) => return Err(err.into()),
            }
        } else {
            return Err(IdentityError::Missing.into());
        };

        if principal.status == PrincipalStatus::Rejected {
            let reason = format!("principal {} is rejected", principal.id);
            return Err(EngineError::Forbidden(reason).into());
        }
        Ok(principal.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_parses_from_all_sources() {
        let raw = r#"{"type": "service_account", "project_id": "tandem-prod"}"#;
        assert_eq!(ServiceAccount::from_json(raw).unwrap().project_id, "tandem-prod");

        let encoded = BASE64_STANDARD.encode(raw);
        assert_eq!(
            ServiceAccount::from_base64(&encoded).unwrap().project_id,
            "tandem-prod"
        );

        assert!(ServiceAccount::from_json(r#"{"project_id": " "}"#).is_err());
        assert!(ServiceAccount::from_base64("%%%").is_err());
    }

    #[test]
    fn dev_identity_requires_no_verifier() {
        struct Never;
        #[async_trait]
        impl TokenVerifier for Never {
            async fn verify(&self, _: &str) -> Result<VerifiedIdentity, IdentityError> {
                Err(IdentityError::InvalidToken("never".to_string()))
            }
        }

        assert!(IdentityResolver::new(None).allow_dev_identity(true).dev_identity_active());
        assert!(!IdentityResolver::new(None).dev_identity_active());
        assert!(
            !IdentityResolver::new(Some(Arc::new(Never)))
                .allow_dev_identity(true)
                .dev_identity_active()
        );
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_key_fetch() {
        let verifier = JwtVerifier::new(
            &ServiceAccount {
                project_id: "p".to_string(),
            },
            Some("http://127.0.0.1:9/unreachable"),
        )
        .unwrap();
        assert!(matches!(
            verifier.verify("not-a-jwt").await,
            Err(IdentityError::InvalidToken(_))
        ));
    }
}
