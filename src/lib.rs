//! Rentdesk Reservation & Pricing Server
//!
//! Customers reserve finite-quantity equipment at a site for a time window.
//! The [`engine`] holds the pure rules (availability, promotions, quotes,
//! penalties and the reservation state machine); [`services`] run them
//! against a [`repository::ReservationStore`]; [`api`] exposes them over
//! JSON/HTTP.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
