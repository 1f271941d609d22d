// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        account_handlers, api_auth_handlers, auth_handlers, cep_handlers, dashboard_handlers,
        lesson_handlers, mw_auth, mw_role, password_reset_handlers, profile_handlers,
        registration_handlers, UPLOAD_BODY_LIMIT,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

pub fn create_router(app_state: AppState) -> Router {
    // --- Rotas Públicas ---
    let public_routes = Router::new()
        .route("/", get(auth_handlers::root))
        .route("/login", get(auth_handlers::show_login_form).post(auth_handlers::handle_login))
        .route("/logout", get(auth_handlers::handle_logout))
        .route("/register", get(auth_handlers::register_redirect))
        .route("/choice", get(auth_handlers::show_choice))
        .route(
            "/register/student",
            get(registration_handlers::show_student_form)
                .post(registration_handlers::handle_student_registration)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/register/instructor",
            get(registration_handlers::show_instructor_form)
                .post(registration_handlers::handle_instructor_registration)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/register/employee",
            get(registration_handlers::show_employee_form)
                .post(registration_handlers::handle_employee_registration)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/password-reset/{token}",
            get(password_reset_handlers::show_reset_form).post(password_reset_handlers::handle_reset_form),
        )
        .route(
            "/auth/api/register/{role}",
            post(api_auth_handlers::api_register).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/auth/api/login", post(api_auth_handlers::api_login))
        .route("/auth/api/logout", post(api_auth_handlers::api_logout))
        .route("/auth/api/password-reset", post(api_auth_handlers::api_password_reset))
        .route("/api/lookup-cep", get(cep_handlers::lookup_cep));

    // --- API JSON (exige sessão; 401/403 em JSON) ---
    let api_student_routes = Router::new()
        .route("/api/submit-lesson-rating", post(lesson_handlers::submit_lesson_rating))
        .route("/api/reschedule-lesson/{id}", post(lesson_handlers::reschedule_lesson))
        .route("/api/cancel-lesson/{id}", post(lesson_handlers::cancel_lesson))
        .route("/api/cancel-rejected-lesson/{id}", post(lesson_handlers::cancel_rejected_lesson))
        .route_layer(middleware::from_fn(mw_role::api_require_aluno));

    let api_instructor_routes = Router::new()
        .route("/api/accept-lesson/{id}", post(lesson_handlers::accept_lesson))
        .route("/api/reject-lesson/{id}", post(lesson_handlers::reject_lesson))
        .route("/api/start-lesson/{id}", post(lesson_handlers::start_lesson))
        .route("/api/complete-lesson/{id}", post(lesson_handlers::complete_lesson))
        .route_layer(middleware::from_fn(mw_role::api_require_instrutor));

    let api_routes = Router::new()
        .route("/auth/api/me", get(api_auth_handlers::api_me))
        .route("/api/lessons", get(lesson_handlers::list_lessons))
        .route("/api/filter-instructors", get(lesson_handlers::filter_instructors))
        .route("/api/filter-vehicles", get(lesson_handlers::filter_vehicles))
        .route("/account/delete", post(account_handlers::delete_account))
        .merge(api_student_routes)
        .merge(api_instructor_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_auth::require_api_auth,
        ));

    // --- Páginas por papel ---
    let student_pages = Router::new()
        .route("/dashboard/aluno", get(dashboard_handlers::student_dashboard))
        .route(
            "/agendamento",
            get(lesson_handlers::show_agendamento).post(lesson_handlers::handle_agendamento),
        )
        .route_layer(middleware::from_fn(mw_role::require_aluno));

    let instructor_pages = Router::new()
        .route("/dashboard/instrutor", get(dashboard_handlers::instructor_dashboard))
        .route_layer(middleware::from_fn(mw_role::require_instrutor));

    let employee_pages = Router::new()
        .route("/dashboard/funcionario", get(dashboard_handlers::employee_dashboard))
        .route(
            "/employee/instructors/{id}/status",
            post(dashboard_handlers::update_instructor_status),
        )
        .route_layer(middleware::from_fn(mw_role::require_funcionario));

    // --- Rotas Autenticadas (HTML) ---
    // O require_auth corre antes dos middlewares de papel aninhados acima
    let authenticated_routes = Router::new()
        .route(
            "/profile",
            get(profile_handlers::show_profile).post(profile_handlers::handle_profile_update),
        )
        .route(
            "/profile/photo",
            post(profile_handlers::handle_photo_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/profile/document",
            post(profile_handlers::handle_document_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/profile/vehicle", post(profile_handlers::handle_vehicle_update))
        .merge(student_pages)
        .merge(instructor_pages)
        .merge(employee_pages)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_auth::require_auth,
        ));

    // --- Router Final ---
    let media = ServeDir::new(app_state.storage.root());
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(authenticated_routes)
        .nest_service("/media", media)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, db::test_pool};
    use reqwest::{header, redirect::Policy, StatusCode};
    use serde_json::{json, Value};
    use tower_cookies::CookieManagerLayer;
    use tower_sessions::SessionManagerLayer;
    use tower_sessions_sqlx_store::SqliteStore;

    struct TestApp {
        base: String,
        client: reqwest::Client,
        _media: tempfile::TempDir,
    }

    impl TestApp {
        async fn spawn() -> TestApp {
            let pool = test_pool().await;
            let store = SqliteStore::new(pool.clone());
            store.migrate().await.unwrap();
            let media = tempfile::tempdir().unwrap();
            let state = AppState::new(pool, AppConfig::for_tests(media.path().to_path_buf())).unwrap();

            let app = create_router(state)
                .layer(SessionManagerLayer::new(store).with_secure(false))
                .layer(CookieManagerLayer::new());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let client = reqwest::Client::builder().redirect(Policy::none()).build().unwrap();
            TestApp { base: format!("http://{}", addr), client, _media: media }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base, path)
        }

        // Regista pela API e devolve o cookie de sessão
        async fn register(&self, role: &str, email: &str) -> String {
            let response = self
                .client
                .post(self.url(&format!("/auth/api/register/{}", role)))
                .json(&json!({
                    "email": email,
                    "password": "senha123",
                    "full_name": "Maria Souza",
                    "phone": "(11) 98765-4321",
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            session_cookie(&response)
        }
    }

    fn session_cookie(response: &reqwest::Response) -> String {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("id="))
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn anonymous_requests_are_turned_away() {
        let app = TestApp::spawn().await;

        let me = app.client.get(app.url("/auth/api/me")).send().await.unwrap();
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
        let body: Value = me.json().await.unwrap();
        assert_eq!(body["success"], false);

        let page = app.client.get(app.url("/dashboard/aluno")).send().await.unwrap();
        assert!(page.status().is_redirection());
        assert_eq!(page.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn registration_logs_the_user_in() {
        let app = TestApp::spawn().await;
        let cookie = app.register("aluno", "maria@email.com").await;

        let me = app
            .client
            .get(app.url("/auth/api/me"))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        let body: Value = me.json().await.unwrap();
        assert_eq!(body["email"], "maria@email.com");
        assert_eq!(body["role"], "aluno");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_accepts_right_one() {
        let app = TestApp::spawn().await;
        app.register("instrutor", "joao@email.com").await;

        let wrong = app
            .client
            .post(app.url("/auth/api/login"))
            .json(&json!({ "email": "joao@email.com", "password": "errada123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let right = app
            .client
            .post(app.url("/auth/api/login"))
            .json(&json!({ "email": "JOAO@email.com", "password": "senha123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::OK);
        let body: Value = right.json().await.unwrap();
        assert_eq!(body["redirect_url"], "/dashboard/instrutor");
    }

    #[tokio::test]
    async fn roles_are_enforced() {
        let app = TestApp::spawn().await;
        let cookie = app.register("aluno", "ana@email.com").await;

        let api = app
            .client
            .post(app.url("/api/accept-lesson/1"))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(api.status(), StatusCode::FORBIDDEN);

        let page = app
            .client
            .get(app.url("/dashboard/funcionario"))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert!(page.status().is_redirection());
        assert_eq!(page.headers()[header::LOCATION], "/dashboard/aluno");
    }

    #[tokio::test]
    async fn account_delete_accepts_form_posts() {
        let app = TestApp::spawn().await;
        let cookie = app.register("aluno", "rui@email.com").await;

        let refused = app
            .client
            .post(app.url("/account/delete"))
            .header(header::COOKIE, &cookie)
            .form(&[("confirm_text", "apagar"), ("password", "senha123")])
            .send()
            .await
            .unwrap();
        assert_eq!(refused.status(), StatusCode::BAD_REQUEST);
        let body: Value = refused.json().await.unwrap();
        assert!(body["errors"]["ack"].is_string());
        assert!(body["errors"]["confirm_text"].is_string());

        let deleted = app
            .client
            .post(app.url("/account/delete"))
            .header(header::COOKIE, &cookie)
            .form(&[("ack", "on"), ("confirm_text", "excluir"), ("password", "senha123")])
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        let body: Value = deleted.json().await.unwrap();
        assert_eq!(body["redirect_url"], "/login");

        let login = app
            .client
            .post(app.url("/auth/api/login"))
            .json(&json!({ "email": "rui@email.com", "password": "senha123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn student_dashboard_renders_for_new_account() {
        let app = TestApp::spawn().await;
        let cookie = app.register("aluno", "bia@email.com").await;

        let page = app
            .client
            .get(app.url("/dashboard/aluno"))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::OK);
        assert!(page.text().await.unwrap().contains("Maria"));
    }
}
