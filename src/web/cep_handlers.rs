// src/web/cep_handlers.rs
use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct CepQuery {
    #[serde(default)]
    pub cep: String,
}

// GET /api/lookup-cep?cep=01310100
pub async fn lookup_cep(State(state): State<AppState>, Query(query): Query<CepQuery>) -> ApiResult {
    let address = state.cep_client.lookup(&query.cep).await?;
    Ok(Json(json!({
        "success": true,
        "cep": address.cep,
        "rua": address.rua,
        "bairro": address.bairro,
        "cidade": address.cidade,
        "estado": address.estado,
    })))
}
