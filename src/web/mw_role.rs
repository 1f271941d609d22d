// src/web/mw_role.rs
//! Restrições por papel. Correm depois de `require_auth`/`require_api_auth`,
//! que deixam o `CurrentUser` nas extensões.
use crate::{
    error::{ApiError, AppError},
    models::user::Role,
    web::mw_auth::CurrentUser,
};
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

// Página de outro papel: volta ao painel do próprio utilizador
async fn page_for(expected: Role, current: CurrentUser, request: Request, next: Next) -> Response {
    let user = current.0;
    if user.role == expected {
        return next.run(request).await;
    }
    tracing::warn!(
        "Acesso negado a {} ({}): página reservada a {}",
        user.email,
        user.role.as_str(),
        expected.as_str()
    );
    Redirect::to(user.role.dashboard_path()).into_response()
}

async fn api_for(expected: Role, current: CurrentUser, request: Request, next: Next) -> Response {
    let user = current.0;
    if user.role == expected {
        return next.run(request).await;
    }
    tracing::warn!(
        "API negada a {} ({}): reservada a {}",
        user.email,
        user.role.as_str(),
        expected.as_str()
    );
    ApiError(AppError::Forbidden(format!(
        "Apenas {} podem executar esta ação.",
        match expected {
            Role::Aluno => "alunos",
            Role::Instrutor => "instrutores",
            Role::Funcionario => "funcionários",
        }
    )))
    .into_response()
}

pub async fn require_aluno(Extension(current): Extension<CurrentUser>, request: Request, next: Next) -> Response {
    page_for(Role::Aluno, current, request, next).await
}

pub async fn require_instrutor(Extension(current): Extension<CurrentUser>, request: Request, next: Next) -> Response {
    page_for(Role::Instrutor, current, request, next).await
}

pub async fn require_funcionario(Extension(current): Extension<CurrentUser>, request: Request, next: Next) -> Response {
    page_for(Role::Funcionario, current, request, next).await
}

pub async fn api_require_aluno(Extension(current): Extension<CurrentUser>, request: Request, next: Next) -> Response {
    api_for(Role::Aluno, current, request, next).await
}

pub async fn api_require_instrutor(Extension(current): Extension<CurrentUser>, request: Request, next: Next) -> Response {
    api_for(Role::Instrutor, current, request, next).await
}
