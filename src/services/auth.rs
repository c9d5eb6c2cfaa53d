use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::error::{AppError, AppResult, StoreError};
use crate::models::user::{NewUser, PublicUser};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// False on mismatch and on unparsable hashes.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hashes on the blocking pool so Argon2 never stalls a runtime worker.
pub async fn hash_password_task(password: String) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
    Ok(hash)
}

pub async fn verify_password_task(password: String, hash: String) -> AppResult<bool> {
    let matched = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?;
    Ok(matched)
}

pub fn issue_token(user_id: Uuid, secret: &str, ttl_hours: i64) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))?;
    Ok(data.claims)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn signup(state: &AppState, req: SignupRequest) -> AppResult<AuthResponse> {
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    let password = req.password.unwrap_or_default();
    let confirm = req.confirm_password.unwrap_or_default();

    if name.is_empty() || email.is_empty() || password.is_empty() || confirm.is_empty() {
        return Err(AppError::bad_request("All fields are required"));
    }
    if password != confirm {
        return Err(AppError::bad_request("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if state.users.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password_task(password).await?;
    let user = state
        .users
        .create_user(NewUser {
            name: name.to_string(),
            email,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict => AppError::Conflict("Email already registered".into()),
            other => other.into(),
        })?;

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok(AuthResponse {
        token,
        user: user.public(),
    })
}

pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<AuthResponse> {
    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    let password = req.password.unwrap_or_default();

    if email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let invalid = || AppError::unauthorized("Invalid email or password");

    let user = state
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password_task(password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let token = issue_token(user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(AuthResponse {
        token,
        user: user.public(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_password_tasks_leave_the_runtime_free() {
        let ticker = tokio::spawn(async {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            true
        });

        let hash = hash_password_task("hunter22".to_string()).await.unwrap();
        assert!(ticker.is_finished(), "Runtime thread stayed free while hashing");
        assert!(ticker.await.unwrap());

        assert!(verify_password_task("hunter22".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password_task("hunter23".to_string(), hash).await.unwrap());
        assert!(!verify_password_task("hunter22".to_string(), "garbage".to_string())
            .await
            .unwrap());
    }

    #[test]
    fn test_token_carries_user_id() {
        let id = Uuid::new_v4();
        let token = issue_token(id, "secret", 1).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret_or_expired() {
        let id = Uuid::new_v4();
        let token = issue_token(id, "secret", 1).unwrap();
        assert!(validate_token(&token, "other").is_err());

        let expired = issue_token(id, "secret", -2).unwrap();
        assert!(validate_token(&expired, "secret").is_err());
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
