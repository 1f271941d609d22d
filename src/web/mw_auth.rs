// src/web/mw_auth.rs
use crate::{
    error::{ApiError, AppError, AppResult},
    models::user::User,
    services::user_service,
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;

pub const SESSION_USER_KEY: &str = "user_id";

/// Utilizador autenticado, posto nas extensões do pedido pelos middlewares abaixo.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Lê o `user_id` da sessão e carrega o utilizador. Sessões de contas apagadas
/// ou inativas são limpas.
pub async fn session_user(db_pool: &SqlitePool, session: &Session) -> AppResult<Option<User>> {
    let user_id = session
        .get::<i64>(SESSION_USER_KEY)
        .await
        .map_err(|e| AppError::SessionError(format!("Erro ao verificar sessão: {}", e)))?;
    let Some(user_id) = user_id else {
        return Ok(None);
    };

    match user_service::find_user_by_id(db_pool, user_id).await? {
        Some(user) if user.is_active => Ok(Some(user)),
        _ => {
            tracing::warn!("Sessão aponta para o user {} que já não está ativo, limpando", user_id);
            session
                .flush()
                .await
                .map_err(|e| AppError::SessionError(format!("Falha ao limpar sessão: {}", e)))?;
            Ok(None)
        }
    }
}

/// Inicia a sessão autenticada (novo ID de sessão + `user_id`).
pub async fn sign_in(session: &Session, user: &User) -> AppResult<()> {
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao rodar ID: {}", e)))?;
    session
        .insert(SESSION_USER_KEY, user.id)
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao inserir na sessão: {}", e)))?;
    tracing::info!("✅ Sessão iniciada para {} ({})", user.email, user.role.as_str());
    Ok(())
}

pub async fn sign_out(session: &Session) -> AppResult<()> {
    session
        .delete()
        .await
        .map_err(|e| AppError::SessionError(format!("Falha ao apagar sessão: {}", e)))
}

// Páginas HTML: sem sessão redireciona para /login
pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match session_user(&state.db_pool, &session).await? {
        Some(user) => {
            tracing::debug!("Autenticação MW: {} autenticado", user.email);
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        None => {
            tracing::debug!("Autenticação MW: não autenticado, redirecionando para /login");
            Ok(Redirect::to("/login").into_response())
        }
    }
}

// Endpoints JSON: sem sessão responde 401
pub async fn require_api_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match session_user(&state.db_pool, &session).await? {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(request).await)
        }
        None => Err(ApiError(AppError::Unauthorized)),
    }
}
