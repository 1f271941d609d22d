// src/models/registration.rs
use crate::{
    models::{profile::AddressForm, vehicle::VehicleForm},
    validators::{
        categories_rule, cnh_rule, cpf_rule, date_rule, full_name_rule, phone_rule,
        required_rule,
    },
};
use serde::Deserialize;
use validator::Validate;

/// Registo mínimo pela API (JSON ou FormData): só os dados da conta.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BasicRegistration {
    #[serde(default)]
    #[validate(custom = "required_rule", email(message = "Email inválido"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "A senha deve ter pelo menos 6 caracteres"))]
    pub password: String,
    #[serde(default)]
    #[validate(custom = "full_name_rule")]
    pub full_name: String,
    #[serde(default)]
    #[validate(custom = "phone_rule")]
    pub phone: String,
}

impl BasicRegistration {
    /// Cópia com espaços à volta removidos, como chegam de clientes JSON.
    pub fn normalized(&self) -> BasicRegistration {
        BasicRegistration {
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StudentRegistration {
    #[serde(flatten)]
    pub account: BasicRegistration,
    #[serde(default)]
    pub password_confirm: String,
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

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InstructorRegistration {
    #[serde(flatten)]
    pub account: BasicRegistration,
    #[serde(default)]
    pub password_confirm: String,
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
    #[serde(flatten)]
    pub vehicle: VehicleForm,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EmployeeRegistration {
    #[serde(flatten)]
    pub account: BasicRegistration,
    #[serde(default)]
    pub password_confirm: String,
    #[serde(default)]
    #[validate(custom = "cpf_rule")]
    pub cpf: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub department: String,
    #[serde(default)]
    #[validate(custom = "required_rule")]
    pub position: String,
}
