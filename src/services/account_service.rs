// src/services/account_service.rs
use crate::{
    error::{AppResult, FieldErrors},
    models::{lesson::is_checked, user::User},
    services::{auth_service, profile_service, storage::MediaStorage, user_service},
};
use sqlx::SqlitePool;

pub const DELETE_CONFIRMATION_WORD: &str = "EXCLUIR";

/// Pedido de exclusão de conta (dupla confirmação + senha).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_text: String,
    #[serde(default, deserialize_with = "crate::models::lesson::lenient_flag")]
    pub ack: Option<String>,
}

/// Apaga a conta depois de validar as confirmações. Perfis, veículo, aulas e
/// tokens saem em cascata; os ficheiros enviados são removidos do disco.
pub async fn delete_account(
    db_pool: &SqlitePool,
    storage: &MediaStorage,
    user: &User,
    request: &DeleteAccountRequest,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if !is_checked(request.ack.as_deref()) {
        errors.add("ack", "Confirme que entende que esta ação é irreversível");
    }
    if !request.confirm_text.trim().eq_ignore_ascii_case(DELETE_CONFIRMATION_WORD) {
        errors.add("confirm_text", "Digite EXCLUIR para confirmar");
    }
    let password = request.password.trim();
    if password.is_empty() {
        errors.add("password", "Senha é obrigatória");
    } else if !auth_service::verify_password(password, &user.password_hash).await? {
        errors.add("password", "Senha incorreta");
    }
    if !errors.is_empty() {
        tracing::warn!("Exclusão da conta {} recusada: {:?}", user.id, errors);
    }
    errors.into_result()?;

    let profile = profile_service::load(db_pool, user).await?;
    let files: Vec<String> = [profile.photo(), profile.document()]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();

    user_service::delete_user(db_pool, user.id).await?;
    for file in files {
        storage.remove(&file).await;
    }
    tracing::info!("Conta {} ({}) excluída pelo próprio utilizador", user.id, user.email);
    Ok(())
}
