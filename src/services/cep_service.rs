// src/services/cep_service.rs
use crate::{
    error::{AppError, AppResult},
    validators,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Endereço devolvido pela consulta de CEP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CepAddress {
    pub cep: String,
    pub rua: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
}

// Corpo de resposta da ViaCEP (`{"erro": true}` quando o CEP não existe)
#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    cep: String,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    fn is_error(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(_) => true,
            None => false,
        }
    }
}

/// Cliente HTTP da API de CEP.
#[derive(Debug, Clone)]
pub struct CepClient {
    http: reqwest::Client,
    base_url: String,
}

impl CepClient {
    pub fn new(base_url: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::Config(format!("cliente HTTP: {}", e)))?;
        Ok(CepClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Consulta `GET {base}/{cep}/json/`.
    pub async fn lookup(&self, raw_cep: &str) -> AppResult<CepAddress> {
        let cep = validators::validate_cep(raw_cep).map_err(|m| AppError::field("cep", m))?;
        let url = format!("{}/{}/json/", self.base_url, cep);
        tracing::debug!("Consultando CEP {} em {}", cep, url);

        let response = self.http.get(&url).send().await.map_err(|e| {
            tracing::error!("Falha ao consultar CEP {}: {}", cep, e);
            AppError::Upstream(e.to_string())
        })?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::NOT_FOUND
        {
            return Err(AppError::NotFound("CEP não encontrado".into()));
        }
        if !response.status().is_success() {
            tracing::error!("API de CEP respondeu {} para {}", response.status(), cep);
            return Err(AppError::Upstream(format!("status {}", response.status())));
        }

        let body: ViaCepResponse = response.json().await.map_err(|e| {
            tracing::error!("Resposta inválida da API de CEP: {}", e);
            AppError::Upstream(e.to_string())
        })?;

        if body.is_error() {
            tracing::debug!("CEP {} inexistente", cep);
            return Err(AppError::NotFound("CEP não encontrado".into()));
        }

        Ok(CepAddress {
            cep: if body.cep.is_empty() { validators::format_cep(&cep) } else { body.cep },
            rua: body.logradouro,
            bairro: body.bairro,
            cidade: body.localidade,
            estado: body.uf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, routing::get, Json, Router};
    use serde_json::json;

    // Servidor local que imita a ViaCEP
    async fn stub_server() -> String {
        let app = Router::new().route(
            "/{cep}/json/",
            get(|Path(cep): Path<String>| async move {
                if cep == "01001000" {
                    Json(json!({
                        "cep": "01001-000",
                        "logradouro": "Praça da Sé",
                        "bairro": "Sé",
                        "localidade": "São Paulo",
                        "uf": "SP"
                    }))
                } else {
                    Json(json!({ "erro": "true" }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn lookup_maps_viacep_fields() {
        let client = CepClient::new(&stub_server().await).unwrap();
        let address = client.lookup("01001-000").await.unwrap();
        assert_eq!(address.rua, "Praça da Sé");
        assert_eq!(address.cidade, "São Paulo");
        assert_eq!(address.estado, "SP");
        assert_eq!(address.cep, "01001-000");
    }

    #[tokio::test]
    async fn unknown_cep_is_not_found() {
        let client = CepClient::new(&stub_server().await).unwrap();
        assert!(matches!(client.lookup("99999-999").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn malformed_cep_never_leaves_the_process() {
        let client = CepClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(client.lookup("123").await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn unreachable_api_is_upstream_error() {
        // Porta 9 (discard) fechada na máquina de testes
        let client = CepClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(client.lookup("01001-000").await, Err(AppError::Upstream(_))));
    }
}
