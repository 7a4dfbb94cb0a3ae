//! Network layer subsystem.
//!
//! Plain TCP listeners are bound by the binary and handed to
//! `HttpServer::run`; TLS termination goes through `axum-server` with the
//! rustls config loaded here.

pub mod tls;

pub use tls::load_tls_config;
