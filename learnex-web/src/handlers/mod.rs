//! HTTP handlers

pub mod auth;
pub mod health;
pub mod views;

pub use auth::{activity, current_user, login, logout, register};
pub use health::health_check;
pub use views::{dashboard, view_resource};
