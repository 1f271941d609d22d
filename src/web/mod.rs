// src/web/mod.rs
pub mod account_handlers;
pub mod api_auth_handlers;
pub mod auth_handlers;
pub mod cep_handlers;
pub mod dashboard_handlers;
pub mod flash;
pub mod form_data;
pub mod lesson_handlers;
pub mod mw_auth;
pub mod mw_role;
pub mod password_reset_handlers;
pub mod profile_handlers;
pub mod registration_handlers;
pub mod routes;

use crate::{
    error::AppResult,
    models::{profile::Profile, user::User},
    services::profile_service,
    templates::Nav,
};
use sqlx::SqlitePool;

/// Limite dos formulários com fotos/documentos.
pub const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub fn nav_with(user: &User, profile: &Profile) -> Nav {
    Nav {
        user_name: user.display_name().to_string(),
        role: user.role,
        photo_url: profile_service::photo_url(profile),
    }
}

pub async fn nav_for(db_pool: &SqlitePool, user: &User) -> AppResult<Nav> {
    let profile = profile_service::load(db_pool, user).await?;
    Ok(nav_with(user, &profile))
}

pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
