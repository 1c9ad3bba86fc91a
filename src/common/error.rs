// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// Erro único da aplicação, convertido em resposta HTTP na borda.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Primeira ligação já registrada para o lead {lead_id}")]
    DuplicateFirstCall { lead_id: Uuid },

    #[error("{0} não encontrado(a)")]
    NotFound(&'static str),

    #[error("Acesso negado")]
    Forbidden,

    #[error("Data inválida em '{field}': {value}")]
    DateParse { field: &'static str, value: String },

    #[error("A ligação {0} já está encerrada")]
    CallClosed(Uuid),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // `anyhow::Error` carrega o contexto de falhas inesperadas.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::DuplicateFirstCall { .. } => (
                StatusCode::CONFLICT,
                "A primeira ligação deste lead já foi registrada.".to_string(),
            ),
            AppError::NotFound(entity) => {
                (StatusCode::NOT_FOUND, format!("{} não encontrado(a).", entity))
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Você não tem acesso a este recurso.".to_string(),
            ),
            AppError::DateParse { field, value } => (
                StatusCode::BAD_REQUEST,
                format!("Data inválida em '{}': '{}'.", field, value),
            ),
            AppError::CallClosed(_) => (
                StatusCode::CONFLICT,
                "Esta ligação já está encerrada.".to_string(),
            ),
            AppError::EmailAlreadyExists => {
                (StatusCode::CONFLICT, "Este e-mail já está em uso.".to_string())
            }
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "E-mail ou senha inválidos.".to_string(),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::UserNotFound => {
                (StatusCode::NOT_FOUND, "Usuário não encontrado.".to_string())
            }

            // Todos os outros erros (banco, bcrypt, jwt, internos) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
