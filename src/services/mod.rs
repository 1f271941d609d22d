pub mod account_service;
pub mod auth_service;
pub mod cep_service;
pub mod lesson_service;
pub mod password_reset_service;
pub mod profile_service;
pub mod registration_service;
pub mod seed_service;
pub mod storage;
pub mod user_service;
