//! Asynchronous object-detection job server
//!
//! Clients upload images, receive a job id straight away and poll for the detection
//! result. Detections run on a bounded worker pool against an external detector.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

pub use routes::router;
