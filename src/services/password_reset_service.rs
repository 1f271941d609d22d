// src/services/password_reset_service.rs
use crate::{
    error::{AppError, AppResult, FieldErrors},
    services::user_service,
};
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqlitePool;

pub const TOKEN_VALIDITY_HOURS: i64 = 24;
pub const MIN_RESET_PASSWORD_LEN: usize = 8;

/// Envio de mensagens ao utilizador (links de recuperação).
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

/// Mailer que apenas escreve a mensagem no log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        tracing::info!("✉️ Email para {}: {}\n{}", to, subject, body);
        Ok(())
    }
}

/// Pede a recuperação de senha. Emails desconhecidos respondem como sucesso
/// para não revelar que contas existem.
pub async fn request_reset(
    db_pool: &SqlitePool,
    mailer: &dyn Mailer,
    public_base_url: &str,
    email: &str,
) -> AppResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::field("email", "Email é obrigatório"));
    }

    let Some(user) = user_service::find_user_by_email(db_pool, email).await? else {
        tracing::warn!("Recuperação pedida para email desconhecido: {}", email);
        return Ok(());
    };

    let token = uuid::Uuid::new_v4().to_string();
    let expires_at = Utc::now().naive_utc() + Duration::hours(TOKEN_VALIDITY_HOURS);
    sqlx::query("INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)")
        .bind(&token)
        .bind(user.id)
        .bind(expires_at)
        .execute(db_pool)
        .await?;

    let link = format!("{}/password-reset/{}", public_base_url.trim_end_matches('/'), token);
    mailer.send(
        &user.email,
        "Recuperação de senha",
        &format!(
            "Olá {},\n\nPara definir uma nova senha acesse:\n{}\n\nO link é válido por {} horas.",
            user.display_name(),
            link,
            TOKEN_VALIDITY_HOURS
        ),
    )?;
    tracing::info!("Token de recuperação criado para o user {}", user.id);
    Ok(())
}

/// Devolve o user_id dono de um token ainda válido.
pub async fn check_token(db_pool: &SqlitePool, token: &str) -> AppResult<i64> {
    let row: Option<(i64, NaiveDateTime, bool)> = sqlx::query_as(
        "SELECT user_id, expires_at, used FROM password_reset_tokens WHERE token = ?1",
    )
    .bind(token)
    .fetch_optional(db_pool)
    .await?;

    match row {
        Some((user_id, expires_at, false)) if expires_at > Utc::now().naive_utc() => Ok(user_id),
        Some(_) => {
            tracing::warn!("Token de recuperação expirado ou já usado");
            Err(AppError::NotFound("Link de recuperação inválido ou expirado.".into()))
        }
        None => Err(AppError::NotFound("Link de recuperação inválido ou expirado.".into())),
    }
}

/// Define a nova senha e inutiliza o token.
pub async fn confirm_reset(
    db_pool: &SqlitePool,
    token: &str,
    password1: &str,
    password2: &str,
) -> AppResult<()> {
    let user_id = check_token(db_pool, token).await?;

    let mut errors = FieldErrors::new();
    if password1.is_empty() {
        errors.add("password1", "Senha é obrigatória");
    } else if password1.chars().count() < MIN_RESET_PASSWORD_LEN {
        errors.add("password1", "A senha deve ter pelo menos 8 caracteres");
    }
    if password2.is_empty() {
        errors.add("password2", "Confirme a nova senha");
    } else if password1 != password2 {
        errors.add("password2", "As senhas não coincidem");
    }
    errors.into_result()?;

    user_service::update_password(db_pool, user_id, password1).await?;
    sqlx::query("UPDATE password_reset_tokens SET used = 1 WHERE token = ?1")
        .bind(token)
        .execute(db_pool)
        .await?;
    tracing::info!("🔑 Senha redefinida para o user {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool, models::user::Role, services::auth_service,
        services::user_service::tests::insert_user,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, to: &str, _subject: &str, body: &str) -> AppResult<()> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn token_from(body: &str) -> String {
        let start = body.find("/password-reset/").unwrap() + "/password-reset/".len();
        body[start..].split_whitespace().next().unwrap().to_string()
    }

    #[tokio::test]
    async fn unknown_email_sends_nothing() {
        let pool = test_pool().await;
        let mailer = RecordingMailer::default();
        request_reset(&pool, &mailer, "http://x", "ninguem@email.com").await.unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_reset_flow_is_single_use() {
        let pool = test_pool().await;
        let id = insert_user(&pool, "maria@email.com", "antiga123", Role::Aluno).await;
        let mailer = RecordingMailer::default();

        request_reset(&pool, &mailer, "http://localhost:3000/", "maria@email.com")
            .await
            .unwrap();
        let (to, body) = mailer.sent.lock().unwrap()[0].clone();
        assert_eq!(to, "maria@email.com");
        assert!(body.contains("http://localhost:3000/password-reset/"));
        let token = token_from(&body);

        assert_eq!(check_token(&pool, &token).await.unwrap(), id);

        let err = confirm_reset(&pool, &token, "curta", "outra").await.unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.contains("password1"));
                assert!(errors.contains("password2"));
            }
            other => panic!("esperava validação, veio {:?}", other),
        }

        confirm_reset(&pool, &token, "novasenha1", "novasenha1").await.unwrap();
        let user = user_service::find_user_by_id(&pool, id).await.unwrap().unwrap();
        assert!(auth_service::verify_password("novasenha1", &user.password_hash).await.unwrap());

        assert!(matches!(check_token(&pool, &token).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let pool = test_pool().await;
        let id = insert_user(&pool, "joao@email.com", "senha123", Role::Aluno).await;
        sqlx::query("INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ('velho', ?1, ?2)")
            .bind(id)
            .bind(Utc::now().naive_utc() - Duration::hours(1))
            .execute(&pool)
            .await
            .unwrap();
        assert!(matches!(check_token(&pool, "velho").await, Err(AppError::NotFound(_))));
    }
}
