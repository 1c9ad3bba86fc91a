// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::auth::{Role, User},
};

/// 1. O Trait que define qual papel uma rota exige
pub trait RoleDef: Send + Sync + 'static {
    fn role() -> Role;
}

/// 2. O Extractor (Guardião). Carrega o usuário já verificado.
pub struct RequireRole<T> {
    pub user: User,
    _role: PhantomData<T>,
}

// 3. Implementação do FromRequestParts (roda depois do auth_guard)
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if user.role != T::role() {
            tracing::warn!("🚫 {} tentou acessar rota {:?}", user.id, T::role());
            return Err(AppError::Forbidden);
        }

        Ok(RequireRole { user, _role: PhantomData })
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct AdminOnly;
impl RoleDef for AdminOnly {
    fn role() -> Role { Role::Admin }
}

pub type AdminUser = RequireRole<AdminOnly>;
