pub mod lesson;
pub mod profile;
pub mod registration;
pub mod user;
pub mod vehicle;
