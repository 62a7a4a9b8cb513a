//! Core building blocks for a configuration-driven HTTP reverse proxy that
//! forwards requests to upstream services and can transform response bodies
//! on the fly into tabular representations (CSV, PDF).
//!
//! ```text
//!            ┌───────────┐   match + params   ┌────────────────┐
//! request ──▶│  router   │───────────────────▶│ proxy backend   │
//!            └───────────┘                    │ (upstream call) │
//!                                              └───────┬─────────┘
//!                                                       │ response bytes
//!                                                       ▼
//!                                              ┌────────────────┐
//!                                              │  pipeline       │
//!                                              │ (producer/     │
//!                                              │  consumer join) │
//!                                              └───────┬─────────┘
//!                                                       │ pages
//!                                                       ▼
//!                                   tablify ──▶ table ──▶ transform (csv/pdf)
//! ```
//!
//! This crate is intentionally independent of any particular HTTP server
//! framework; `flowgate-gateway` wires it to `actix-web`.

pub mod backend;
pub mod config;
pub mod path;
pub mod pipeline;
pub mod router;
pub mod table;
pub mod tablify;
pub mod transform;
