//! HTTP handlers for pocket-api.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod images;
pub mod pipeline;
pub mod playground;
