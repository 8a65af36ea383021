//! Password hashing and credential checks against the users table.

use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::debug;

use crate::app::app_error::AppError;
use crate::models::UserEntity;
use crate::store::CatalogStore;

/// Identity attached to a request once its credentials check out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub is_staff: bool,
}

impl From<UserEntity> for CurrentUser {
    fn from(user: UserEntity) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_staff: user.is_staff,
        }
    }
}

/// Produces argon2id PHC strings. Verification reads the cost parameters back
/// out of each stored hash, so hashes made with different settings coexist.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Minimum-cost hashing so tests do not spend seconds per user.
    #[cfg(any(test, feature = "test-support"))]
    pub fn fast() -> Self {
        Params::new(
            Params::MIN_M_COST,
            Params::MIN_T_COST,
            Params::MIN_P_COST,
            None,
        )
        .map(Self::with_params)
        .unwrap_or_default()
    }

    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("Failed to hash password: {err}"))?;
        Ok(hash.to_string())
    }
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            debug!(error = %err, "stored password hash is not a PHC string");
            false
        }
    }
}

/// Unknown users and wrong passwords both come back as `Unauthorized`.
/// Argon2 verification runs on the blocking pool.
pub async fn authenticate(
    store: &dyn CatalogStore,
    username: &str,
    password: &str,
) -> Result<CurrentUser, AppError> {
    let user = store
        .find_user_by_username(username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let candidate = password.to_owned();
    let password_hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&candidate, &password_hash))
        .await
        .map_err(|err| AppError::Other(anyhow!("Password verification task failed: {err}")))?;

    if !verified {
        debug!(username, "rejected credentials");
        return Err(AppError::Unauthorized);
    }

    Ok(user.into())
}
