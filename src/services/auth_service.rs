// src/services/auth_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::User,
    services::user_service,
};
use sqlx::SqlitePool;

// Custo reduzido nos testes para não tornar a suite lenta
const BCRYPT_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

/// Verifica se a senha fornecida corresponde ao hash guardado.
pub async fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Verificando hash bcrypt...");
        bcrypt::verify(&password, &stored_hash)
    })
    .await
    .map_err(|e| {
        tracing::error!("Erro na task spawn_blocking (verify_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Erro bcrypt ao verificar senha: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Gera um hash bcrypt para uma senha.
pub async fn hash_password(password: &str) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        tracing::debug!("Gerando hash bcrypt...");
        bcrypt::hash(&password, BCRYPT_COST)
    })
    .await
    .map_err(|e| {
        tracing::error!("Erro na task spawn_blocking (hash_password): {:?}", e);
        AppError::InternalServerError
    })?
    .map_err(|e| {
        tracing::error!("Erro bcrypt ao gerar hash: {:?}", e);
        AppError::PasswordHashingError
    })
}

/// Autentica por email + senha.
/// Email desconhecido, senha errada e conta desativada dão todos `InvalidCredentials`.
pub async fn authenticate(db_pool: &SqlitePool, email: &str, password: &str) -> AppResult<User> {
    let email = email.trim();
    let user = match user_service::find_user_by_email(db_pool, email).await? {
        Some(user) => user,
        None => {
            tracing::warn!("Login: email não encontrado: {}", email);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash).await? {
        tracing::warn!("Login: senha incorreta para {}", email);
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        tracing::warn!("Login: conta desativada {}", email);
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!("✅ Login bem-sucedido para: {} ({})", user.email, user.role.as_str());
    Ok(user)
}
