// src/models/user.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Papel do utilizador na autoescola.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Aluno,
    Instrutor,
    Funcionario,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Aluno => "aluno",
            Role::Instrutor => "instrutor",
            Role::Funcionario => "funcionario",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Aluno => "Aluno",
            Role::Instrutor => "Instrutor",
            Role::Funcionario => "Funcionário",
        }
    }

    /// Página inicial de cada papel depois do login.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Aluno => "/dashboard/aluno",
            Role::Instrutor => "/dashboard/instrutor",
            Role::Funcionario => "/dashboard/funcionario",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Role> {
        match slug {
            "aluno" => Some(Role::Aluno),
            "instrutor" => Some(Role::Instrutor),
            "funcionario" => Some(Role::Funcionario),
            _ => None,
        }
    }
}

// Representa um utilizador lido da tabela 'users'
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

/// Dados para inserir uma nova conta (password já em hash).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
    pub role: Role,
}

// Login por email (formulário HTML e JSON de `/auth/api/login`)
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Resposta de `/auth/api/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl From<&User> for MeResponse {
    fn from(user: &User) -> Self {
        MeResponse {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
        }
    }
}
