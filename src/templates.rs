// src/templates.rs
use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        lesson::{is_checked, InstructorOption, LessonView},
        profile::InstructorStatus,
        user::Role,
    },
    services::lesson_service::{EmployeeDashboard, InstructorDashboard, StudentDashboard},
    web::flash::Flash,
};
use askama::Template;
use axum::response::Html;
use std::collections::HashMap;

/// Renderiza uma página; falhas do Askama viram 500.
pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    template.render().map(Html).map_err(|e| {
        tracing::error!("Falha ao renderizar template: {}", e);
        AppError::InternalServerError
    })
}

/// Barra de navegação das páginas autenticadas.
#[derive(Debug, Clone)]
pub struct Nav {
    pub user_name: String,
    pub role: Role,
    pub photo_url: Option<String>,
}

impl Nav {
    pub fn dashboard_path(&self) -> &'static str {
        self.role.dashboard_path()
    }

    pub fn role_label(&self) -> &'static str {
        self.role.label()
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Aluno
    }
}

/// Valores e erros de um formulário para voltar a mostrá-lo.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub values: HashMap<String, String>,
    pub errors: FieldErrors,
    pub message: Option<String>,
}

impl FormState {
    pub fn new(values: HashMap<String, String>) -> Self {
        FormState { values, ..Default::default() }
    }

    /// Erros que o utilizador pode corrigir voltam ao formulário; o resto propaga.
    pub fn from_error(values: HashMap<String, String>, err: AppError) -> AppResult<Self> {
        let mut state = FormState::new(values);
        match err {
            AppError::Validation(errors) => state.errors = errors,
            AppError::Conflict(_) | AppError::NotFound(_) | AppError::Forbidden(_) => {
                state.message = Some(err.user_message())
            }
            other => return Err(other),
        }
        Ok(state)
    }

    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or("")
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains(field)
    }

    pub fn checked(&self, field: &str) -> bool {
        is_checked(self.values.get(field).map(String::as_str))
    }

    pub fn selected(&self, field: &str, option: &str) -> bool {
        self.value(field).eq_ignore_ascii_case(option)
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub error: Option<String>,
    pub email: String,
}

#[derive(Template)]
#[template(path = "choice.html")]
pub struct ChoicePage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
}

#[derive(Template)]
#[template(path = "register_student.html")]
pub struct RegisterStudentPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub form: FormState,
}

#[derive(Template)]
#[template(path = "register_instructor.html")]
pub struct RegisterInstructorPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub form: FormState,
}

#[derive(Template)]
#[template(path = "register_employee.html")]
pub struct RegisterEmployeePage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub form: FormState,
}

#[derive(Template)]
#[template(path = "password_reset_confirm.html")]
pub struct PasswordResetPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub token: String,
    pub valid: bool,
    pub form: FormState,
}

#[derive(Template)]
#[template(path = "dashboard_aluno.html")]
pub struct StudentDashboardPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub dashboard: StudentDashboard,
    // Horários oferecidos no formulário de remarcação
    pub time_slots: &'static [&'static str],
}

#[derive(Template)]
#[template(path = "dashboard_instrutor.html")]
pub struct InstructorDashboardPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub dashboard: InstructorDashboard,
}

#[derive(Template)]
#[template(path = "dashboard_funcionario.html")]
pub struct EmployeeDashboardPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub dashboard: EmployeeDashboard,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub email: String,
    pub role: Role,
    pub form: FormState,
    // Só instrutores têm veículo
    pub vehicle_form: Option<FormState>,
    pub photo_url: Option<String>,
    pub document_url: Option<String>,
    pub instructor_status: Option<InstructorStatus>,
    pub delete_word: &'static str,
}

impl ProfilePage {
    pub fn is_student(&self) -> bool {
        self.role == Role::Aluno
    }

    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instrutor
    }

    pub fn is_employee(&self) -> bool {
        self.role == Role::Funcionario
    }
}

#[derive(Template)]
#[template(path = "agendamento.html")]
pub struct AgendamentoPage {
    pub nav: Option<Nav>,
    pub flash: Option<Flash>,
    pub form: FormState,
    pub time_slots: &'static [&'static str],
    pub instructors: Vec<InstructorOption>,
    pub lessons: Vec<LessonView>,
    pub min_date: String,
}
