//! Product image → catalog taxonomy classification.
//!
//! This library provides the pieces of the image2taxonomy worker: the
//! taxonomy grammar compiler, the supervisor for the local vision model
//! server, and the queue-driven job processor that persists one terminal
//! outcome per product.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
