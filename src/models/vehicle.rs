// src/models/vehicle.rs
use crate::models::lesson::VehicleType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Veículo do instrutor (1:1 com o perfil de instrutor)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InstructorVehicle {
    pub id: i64,
    pub instructor_id: i64,
    pub plate: String,
    pub renavam: String,
    pub make: String,
    pub model: String,
    pub color: String,
    pub year: i64,
    pub category: VehicleType,
    pub dual_control: bool,
    pub adapted_pcd: bool,
    pub last_license_exercise: Option<i64>,
    pub updated_at: NaiveDateTime,
}

/// Dados do veículo já validados, prontos para gravar.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleData {
    pub plate: String,
    pub renavam: String,
    pub make: String,
    pub model: String,
    pub color: String,
    pub year: i32,
    pub category: VehicleType,
    pub dual_control: bool,
    pub adapted_pcd: bool,
    pub last_license_exercise: Option<i32>,
}

/// Campos do veículo tal como chegam do formulário.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleForm {
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub renavam: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub dual_control: Option<String>,
    #[serde(default)]
    pub adapted_pcd: Option<String>,
    #[serde(default)]
    pub last_license_exercise: String,
}

/// Veículo resumido para o JSON de filtros (`/api/filter-vehicles`).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VehicleOption {
    pub id: i64,
    pub instructor_id: i64,
    pub instructor_name: String,
    pub plate: String,
    pub make: String,
    pub model: String,
    pub color: String,
    pub year: i64,
    pub category: VehicleType,
    pub dual_control: bool,
    pub adapted_pcd: bool,
}
