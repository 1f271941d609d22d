// src/error.rs
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Erros de validação por campo (nome do campo -> mensagem).
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regista um erro; o primeiro erro de cada campo prevalece.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.0.entry(field).or_insert(message);
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// `Ok(())` se não houver erros, senão `AppError::Validation`.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            if let Some(first) = list.first() {
                let message = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Valor inválido ({})", first.code));
                out.add(field, message);
            }
        }
        out
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Erro na base de dados: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Erro de migração da base de dados: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro ao processar password")]
    PasswordHashingError,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Erro na sessão: {0}")]
    SessionError(String),

    #[error("Erro na validação")]
    Validation(FieldErrors),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Conflito: {0}")]
    Conflict(String),

    #[error("Falha no serviço externo: {0}")]
    Upstream(String),

    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro interno inesperado")]
    InternalServerError,

    #[error("Não autorizado")]
    Unauthorized,
}

impl From<envy::Error> for AppError {
    fn from(e: envy::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.into())
    }
}

impl AppError {
    /// Atalho para um único erro de campo.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    /// Converte uma violação de UNIQUE no erro do campo correspondente.
    /// `columns`: (`tabela.coluna` como o SQLite a reporta, campo, mensagem).
    pub fn from_unique(e: sqlx::Error, columns: &[(&str, &str, &str)]) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let message = db_err.message();
                columns
                    .iter()
                    .find(|(column, _, _)| message.contains(column))
                    .map(|(_, field, msg)| AppError::field(field, *msg))
                    .unwrap_or_else(|| AppError::Conflict("Registo duplicado.".into()))
            }
            _ => AppError::SqlxError(e),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Mensagem segura para mostrar ao utilizador (nunca expõe detalhes da DB).
    pub fn user_message(&self) -> String {
        match self {
            AppError::SqlxError(_) | AppError::SqlxMigrateError(_) => {
                "Erro ao aceder aos dados.".into()
            }
            AppError::Config(_) => "Erro de configuração.".into(),
            AppError::PasswordHashingError => "Erro ao processar credenciais.".into(),
            AppError::InvalidCredentials => "Email ou senha inválidos.".into(),
            AppError::SessionError(_) => "Erro na gestão da sua sessão.".into(),
            AppError::Validation(_) => "Erro na validação".into(),
            AppError::NotFound(m) | AppError::Forbidden(m) | AppError::Conflict(m) => m.clone(),
            AppError::Upstream(_) => "Serviço externo indisponível. Tente novamente.".into(),
            AppError::Unauthorized => "Não autenticado.".into(),
            AppError::Io(_) | AppError::InternalServerError => {
                "Ocorreu um erro inesperado.".into()
            }
        }
    }

    fn log(&self) {
        if self.status_code().is_server_error() {
            tracing::error!("Erro processado: {:?}", self);
        } else {
            tracing::debug!("Pedido recusado: {:?}", self);
        }
    }
}

// Como converter AppError numa resposta HTTP (páginas HTML)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let user_message = self.user_message();

        (status, Html(format!(r#"
            <!DOCTYPE html><html><head><title>Erro</title><style>body{{font-family:sans-serif;}}</style></head>
            <body><h1>Erro {status_code}</h1><p>{message}</p><a href="javascript:history.back()">Voltar</a></body></html>
         "#, status_code = status.as_u16(), message = user_message))).into_response()
    }
}

/// Variante JSON do `AppError`, usada pelos endpoints `/api/...`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl<E> From<E> for ApiError
where
    E: Into<AppError>,
{
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let status = err.status_code();
        let body = match &err {
            AppError::Validation(errors) => json!({
                "success": false,
                "error": "Erro na validação",
                "errors": errors,
            }),
            other => json!({
                "success": false,
                "error": other.user_message(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;

// Result dos handlers JSON
pub type ApiResult<T = Json<serde_json::Value>> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("email", "Email é obrigatório");
        errors.add("email", "outro");
        assert_eq!(errors.get("email"), Some("Email é obrigatório"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AppError::field("cpf", "CPF inválido");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn api_error_body_lists_field_errors() {
        let response = ApiError(AppError::field("password", "Senha é obrigatória")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"]["password"], "Senha é obrigatória");
    }
}
