// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use validator::Validate;

use crate::{
    common::error::AppError,
    db::SalesStore,
    models::auth::{AuthResponse, Claims, LoginUserPayload, NewUser, RegisterUserPayload, Role, User},
};

// Validade do token de acesso
const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn SalesStore>,
    jwt_secret: String,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn SalesStore>, jwt_secret: String) -> Self {
        Self { store, jwt_secret, hash_cost: bcrypt::DEFAULT_COST }
    }

    #[cfg(test)]
    fn with_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Cadastro público: sempre cria um SALESPERSON.
    pub async fn register_user(&self, payload: RegisterUserPayload) -> Result<AuthResponse, AppError> {
        payload.validate()?;

        let user = self
            .create_user(payload.name.trim(), &payload.email, &payload.password, Role::Salesperson)
            .await?;

        tracing::info!("👤 Vendedor {} cadastrado", user.id);
        self.issue(&user)
    }

    pub async fn login_user(&self, payload: LoginUserPayload) -> Result<AuthResponse, AppError> {
        payload.validate()?;

        let user = self
            .store
            .find_user_by_email(&normalize_email(&payload.email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = payload.password.clone();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        self.issue(&user)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        self.store
            .find_user(token_data.claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Cria o admin inicial se o e-mail ainda não existir.
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<User, AppError> {
        if let Some(existing) = self.store.find_user_by_email(&normalize_email(email)).await? {
            if !existing.is_admin() {
                tracing::warn!("⚠️ {} já existe e não é ADMIN", existing.email);
            }
            return Ok(existing);
        }

        let admin = self.create_user(name, email, password, Role::Admin).await?;
        tracing::info!("🔑 Admin inicial {} criado", admin.email);
        Ok(admin)
    }

    async fn create_user(&self, name: &str, email: &str, password: &str, role: Role) -> Result<User, AppError> {
        // Hashing fora do runtime assíncrono
        let password_clone = password.to_owned();
        let cost = self.hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        self.store
            .insert_user(NewUser {
                name: name.to_string(),
                email: normalize_email(email),
                password_hash,
                role,
            })
            .await
    }

    fn issue(&self, user: &User) -> Result<AuthResponse, AppError> {
        Ok(AuthResponse { access_token: self.create_token(user)?, role: user.role })
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::hours(TOKEN_TTL_HOURS);

        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
