// src/models/profile.rs
use crate::{
    models::vehicle::InstructorVehicle,
    validators::{
        self, categories_rule, cep_rule, cnh_rule, cpf_rule, date_rule, full_name_rule,
        phone_rule, required_rule, uf_rule,
    },
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Situação do instrutor (aprovação pela secretaria).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InstructorStatus {
    Pendente,
    Ativo,
    Inativo,
}

impl InstructorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructorStatus::Pendente => "pendente",
            InstructorStatus::Ativo => "ativo",
            InstructorStatus::Inativo => "inativo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstructorStatus::Pendente => "Pendente",
            InstructorStatus::Ativo => "Ativo",
            InstructorStatus::Inativo => "Inativo",
        }
    }

    pub fn from_slug(slug: &str) -> Option<InstructorStatus> {
        match slug {
            "pendente" => Some(InstructorStatus::Pendente),
            "ativo" => Some(InstructorStatus::Ativo),
            "inativo" => Some(InstructorStatus::Inativo),
            _ => None,
        }
    }
}

/// Bloco de morada partilhado pelos perfis de aluno e instrutor.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub cep: String,
    pub address: String,
    pub address_number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

/// Morada tal como chega dos formulários (registo e edição de perfil).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AddressForm {
    #[serde(default)]
    #[validate(custom = "cep_rule")]
    pub cep: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub address: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub address_number: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub neighborhood: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub city: String,
    #[serde(default)]
    #[validate(custom = "uf_rule")]
    pub state: String,
}

impl AddressForm {
    /// Morada normalizada (CEP `00000-000`, UF em maiúsculas). Só depois de validada.
    pub fn to_address(&self) -> Address {
        Address {
            cep: validators::validate_cep(&self.cep)
                .map(|cep| validators::format_cep(&cep))
                .unwrap_or_else(|_| self.cep.trim().to_string()),
            address: self.address.trim().to_string(),
            address_number: self.address_number.trim().to_string(),
            complement: self.complement.trim().to_string(),
            neighborhood: self.neighborhood.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_ascii_uppercase(),
        }
    }
}

/// Edição de dados pessoais do aluno.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StudentProfileForm {
    #[serde(default)]
    #[validate(custom = "full_name_rule")]
    pub full_name: String,
    #[serde(default)]
    #[validate(custom = "phone_rule")]
    pub phone: String,
    #[serde(default)]
    #[validate(custom = "cpf_rule")]
    pub cpf: String,
    #[serde(default)]
    pub rg: String,
    #[serde(default)]
    #[validate(custom = "date_rule")]
    pub birth_date: String,
    #[serde(default)]
    #[validate(custom = "categories_rule")]
    pub license_categories: String,
    #[serde(flatten)]
    pub address: AddressForm,
}

/// Edição de dados pessoais do instrutor.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InstructorProfileForm {
    #[serde(default)]
    #[validate(custom = "full_name_rule")]
    pub full_name: String,
    #[serde(default)]
    #[validate(custom = "phone_rule")]
    pub phone: String,
    #[serde(default)]
    #[validate(custom = "cpf_rule")]
    pub cpf: String,
    #[serde(default)]
    pub rg: String,
    #[serde(default)]
    #[validate(custom = "date_rule")]
    pub birth_date: String,
    #[serde(default)]
    #[validate(custom = "cnh_rule")]
    pub cnh: String,
    #[serde(default)]
    #[validate(custom = "date_rule")]
    pub cnh_emission_date: String,
    #[serde(default)]
    #[validate(custom = "categories_rule")]
    pub cnh_categories: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub credential: String,
    #[serde(flatten)]
    pub address: AddressForm,
}

/// Edição de dados do funcionário.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EmployeeProfileForm {
    #[serde(default)]
    #[validate(custom = "full_name_rule")]
    pub full_name: String,
    #[serde(default)]
    #[validate(custom = "phone_rule")]
    pub phone: String,
    #[serde(default)]
    #[validate(custom = "cpf_rule")]
    pub cpf: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentProfile {
    pub user_id: i64,
    pub cpf: Option<String>,
    pub rg: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[sqlx(flatten)]
    pub address: Address,
    pub license_categories: String,
    pub completed_lessons: i64,
    pub progress: i64,
    pub photo: Option<String>,
    pub document: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InstructorProfile {
    pub user_id: i64,
    pub cpf: Option<String>,
    pub rg: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub cnh: Option<String>,
    pub cnh_emission_date: Option<NaiveDate>,
    pub cnh_categories: String,
    pub credential: Option<String>,
    #[sqlx(flatten)]
    pub address: Address,
    pub status: InstructorStatus,
    pub photo: Option<String>,
    pub document: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl InstructorProfile {
    pub fn teaches(&self, vehicle_type: &str) -> bool {
        self.cnh_categories.contains(vehicle_type)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmployeeProfile {
    pub user_id: i64,
    pub cpf: Option<String>,
    pub department: String,
    pub position: String,
    pub photo: Option<String>,
    pub updated_at: NaiveDateTime,
}

/// Perfil de um utilizador, consoante o papel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Aluno(StudentProfile),
    Instrutor {
        profile: InstructorProfile,
        vehicle: Option<InstructorVehicle>,
    },
    Funcionario(EmployeeProfile),
}

impl Profile {
    pub fn photo(&self) -> Option<&str> {
        match self {
            Profile::Aluno(p) => p.photo.as_deref(),
            Profile::Instrutor { profile, .. } => profile.photo.as_deref(),
            Profile::Funcionario(p) => p.photo.as_deref(),
        }
    }

    pub fn document(&self) -> Option<&str> {
        match self {
            Profile::Aluno(p) => p.document.as_deref(),
            Profile::Instrutor { profile, .. } => profile.document.as_deref(),
            Profile::Funcionario(_) => None,
        }
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        match self {
            Profile::Aluno(p) => p.updated_at,
            Profile::Instrutor { profile, .. } => profile.updated_at,
            Profile::Funcionario(p) => p.updated_at,
        }
    }

    pub fn cpf(&self) -> Option<&str> {
        match self {
            Profile::Aluno(p) => p.cpf.as_deref(),
            Profile::Instrutor { profile, .. } => profile.cpf.as_deref(),
            Profile::Funcionario(p) => p.cpf.as_deref(),
        }
    }
}

/// Resumo de instrutor pendente, mostrado no painel do funcionário.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InstructorSummary {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub cnh_categories: String,
    pub status: InstructorStatus,
    pub created_at: NaiveDateTime,
}
