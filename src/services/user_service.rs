// src/services/user_service.rs
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, User},
};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash, full_name, phone, role, is_active,
    created_at, updated_at
"#;

/// Busca um utilizador na base de dados pelo seu ID.
pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    tracing::debug!("Buscando utilizador por ID: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

/// Busca pelo email (a coluna é COLLATE NOCASE).
pub async fn find_user_by_email(db_pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    tracing::debug!("Buscando utilizador por email: {}", email);
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
    ))
    .bind(email.trim())
    .fetch_optional(db_pool)
    .await?;
    Ok(user)
}

pub async fn email_exists<'e, E>(executor: E, email: &str) -> AppResult<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)")
        .bind(email.trim())
        .fetch_one(executor)
        .await?;
    Ok(exists)
}

/// Gera um username único a partir da parte local do email
/// ("maria@email.com" -> "maria", "maria1", "maria2", ...).
pub async fn generate_username(conn: &mut SqliteConnection, email: &str) -> AppResult<String> {
    let base = email
        .trim()
        .split('@')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let base = if base.is_empty() { "usuario".to_string() } else { base };

    let mut candidate = base.clone();
    let mut counter = 1;
    loop {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)")
                .bind(&candidate)
                .fetch_one(&mut *conn)
                .await?;
        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{}{}", base, counter);
        counter += 1;
    }
}

/// Insere a conta (dentro da transação do registo) e devolve o ID.
pub async fn create_user(conn: &mut SqliteConnection, new_user: &NewUser) -> AppResult<i64> {
    tracing::info!("Criando utilizador {} ({})", new_user.email, new_user.role.as_str());
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, full_name, phone, role)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&new_user.username)
    .bind(new_user.email.trim())
    .bind(&new_user.password_hash)
    .bind(&new_user.full_name)
    .bind(&new_user.phone)
    .bind(new_user.role)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        tracing::warn!("Falha ao criar user {}: {}", new_user.email, e);
        AppError::from_unique(
            e,
            &[
                ("users.email", "email", "Este email já está cadastrado"),
                ("users.username", "email", "Este email já está cadastrado"),
            ],
        )
    })?;
    Ok(result.last_insert_rowid())
}

pub async fn update_password(db_pool: &SqlitePool, user_id: i64, new_raw_password: &str) -> AppResult<()> {
    tracing::info!("Alterando senha do user {}", user_id);
    let new_password_hash = crate::services::auth_service::hash_password(new_raw_password).await?;

    let rows_affected = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(new_password_hash)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Falha ao alterar senha: Utilizador '{}' não encontrado.", user_id);
        return Err(AppError::NotFound("Utilizador não encontrado.".into()));
    }
    Ok(())
}

/// Nome completo e telefone (comuns aos três papéis).
pub async fn update_contact(
    conn: &mut SqliteConnection,
    user_id: i64,
    full_name: &str,
    phone: &str,
) -> AppResult<()> {
    let rows_affected = sqlx::query("UPDATE users SET full_name = ?1, phone = ?2 WHERE id = ?3")
        .bind(full_name.trim())
        .bind(phone.trim())
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::NotFound("Utilizador não encontrado.".into()));
    }
    Ok(())
}

/// Apaga a conta; perfis, veículo, aulas e tokens vão em cascata.
pub async fn delete_user(db_pool: &SqlitePool, user_id: i64) -> AppResult<()> {
    let rows_affected = sqlx::query("DELETE FROM users WHERE id = ?1")
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::NotFound("Utilizador não encontrado.".into()));
    }
    tracing::info!("🗑️ Utilizador {} apagado.", user_id);
    Ok(())
}
