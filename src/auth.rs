//! HTTP Basic authentication and the customer access rule.
//!
//! Credentials are `email:password`, checked against the Argon2 hash held by
//! the user store. Hashing is CPU bound and runs on the blocking pool.

use crate::error::{Error, Result};
use crate::models::{self, User, ROLE_ADMIN};
use crate::repository::UserRepository;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::sync::Arc;

/// The authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub roles: Vec<String>,
    pub customer_id: Option<i64>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            user_id: user.id,
            email: user.email.clone(),
            roles: models::effective_roles(&user.roles),
            customer_id: user.customer_id,
        }
    }
}

/// Whether `identity` may act on the users of `customer_id`.
pub fn authorize_customer(identity: &Identity, customer_id: i64) -> bool {
    identity.is_admin() || identity.customer_id == Some(customer_id)
}

/// Email and password decoded from an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Decode the first `Authorization` header, if it uses the Basic scheme.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (email, password) = decoded.split_once(':')?;
        if email.is_empty() {
            return None;
        }

        Some(Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    /// `Authorization` header value carrying these credentials.
    pub fn to_header_value(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.email, self.password))
        )
    }
}

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync + 'static {
    /// Hash `password` into a PHC string.
    fn hash(&self, password: &str) -> Result<String>;

    /// Check `password` against a stored PHC string. Unparsable hashes
    /// never verify.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id hasher.
#[derive(Clone, Debug, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost parameters (memory in KiB, iterations, lanes).
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| Error::ConfigError(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Argon2Hasher { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Other(format!("Password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            // Cost parameters are read back from the PHC string.
            Ok(parsed) => self
                .argon2()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash is unparsable: {}", e);
                false
            }
        }
    }
}

/// Resolves request credentials to an [`Identity`].
#[derive(Clone)]
pub struct Authenticator {
    hasher: Arc<dyn PasswordHasher>,
}

impl Authenticator {
    pub fn new(hasher: impl PasswordHasher) -> Self {
        Authenticator {
            hasher: Arc::new(hasher),
        }
    }

    /// Hash a password on the blocking pool.
    pub async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Other(format!("Hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| Error::Other(format!("Verification task failed: {}", e)))
    }

    /// Authenticate the request carried by `headers`.
    ///
    /// `Ok(None)` covers every rejected request: missing or malformed
    /// header, unknown email, wrong password.
    ///
    /// # Errors
    ///
    /// Only repository failures surface as errors.
    pub async fn authenticate<U: UserRepository>(
        &self,
        users: &U,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>> {
        let Some(credentials) = Credentials::from_headers(headers) else {
            debug!("Request without usable Basic credentials");
            return Ok(None);
        };

        let Some(user) = users.find_user_by_email(&credentials.email).await? else {
            debug!("Unknown account {}", credentials.email);
            return Ok(None);
        };

        if !self
            .verify_password(credentials.password, user.password_hash.clone())
            .await?
        {
            debug!("Wrong password for {}", user.email);
            return Ok(None);
        }

        Ok(Some(Identity::from(&user)))
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}
