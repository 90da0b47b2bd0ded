pub mod consumers;
pub mod domain;
pub mod models;
pub mod notifications;
pub mod platform;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod services;
