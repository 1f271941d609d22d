// src/state.rs
use crate::{
    config::AppConfig,
    services::{
        cep_service::CepClient,
        password_reset_service::{LogMailer, Mailer},
        storage::MediaStorage,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_cookies::Key;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub storage: MediaStorage,
    pub cep_client: CepClient,
    pub mailer: Arc<dyn Mailer>,
    // Chave dos cookies assinados (mensagens flash)
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let storage = MediaStorage::new(config.media_root.clone());
        let cep_client = CepClient::new(&config.cep_api_base_url)?;
        let cookie_key = Key::from(config.session_secret.as_bytes());
        Ok(AppState {
            db_pool,
            config: Arc::new(config),
            storage,
            cep_client,
            mailer: Arc::new(LogMailer),
            cookie_key,
        })
    }
}

// Permite extrair o pool da DB diretamente
impl axum::extract::FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.db_pool.clone()
    }
}

impl axum::extract::FromRef<AppState> for MediaStorage {
    fn from_ref(state: &AppState) -> MediaStorage {
        state.storage.clone()
    }
}
