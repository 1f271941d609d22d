// src/config.rs
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::path::PathBuf;

// Tamanho mínimo aceite para a chave dos cookies assinados (tower-cookies exige 64 bytes)
pub const MIN_SESSION_SECRET_LEN: usize = 64;

fn def_http_port() -> u16 {
    3000
}

fn def_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn def_cep_api_base_url() -> String {
    String::from("https://viacep.com.br/ws")
}

fn def_public_base_url() -> String {
    String::from("http://localhost:3000")
}

/// Configuração da aplicação, lida das variáveis de ambiente (e do `.env`).
#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// URL da base SQLite, ex: `sqlite://autoescola.db`
    pub database_url: String,

    /// Segredo usado para assinar os cookies de mensagens (flash)
    pub session_secret: String,

    #[serde(default = "def_http_port")]
    pub http_port: u16,

    /// Diretório onde ficam as fotos e documentos enviados
    #[serde(default = "def_media_root")]
    pub media_root: PathBuf,

    /// Base da API de consulta de CEP (ViaCEP)
    #[serde(default = "def_cep_api_base_url")]
    pub cep_api_base_url: String,

    /// URL pública usada nos links de recuperação de senha
    #[serde(default = "def_public_base_url")]
    pub public_base_url: String,

    /// Cookie de sessão só por HTTPS
    #[serde(default)]
    pub session_secure: bool,

    /// Popula a base com dados de exemplo no arranque
    #[serde(default)]
    pub seed_sample_data: bool,
}

impl AppConfig {
    /// Carrega a configuração do ambiente, validando o segredo da sessão.
    pub fn from_env() -> AppResult<AppConfig> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<AppConfig>()?;

        if config.session_secret.len() < MIN_SESSION_SECRET_LEN {
            tracing::error!(
                "SESSION_SECRET tem {} bytes, são necessários pelo menos {}",
                config.session_secret.len(),
                MIN_SESSION_SECRET_LEN
            );
            return Err(AppError::Config(format!(
                "SESSION_SECRET deve ter pelo menos {} caracteres",
                MIN_SESSION_SECRET_LEN
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests(media_root: PathBuf) -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            session_secret: "x".repeat(MIN_SESSION_SECRET_LEN),
            http_port: 0,
            media_root,
            cep_api_base_url: "http://127.0.0.1:9".into(),
            public_base_url: "http://testserver".into(),
            session_secure: false,
            seed_sample_data: false,
        }
    }
}
