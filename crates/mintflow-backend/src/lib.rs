//! # Mintflow Backend
//!
//! HTTP implementation of [`SettlementBackend`] and [`JobBackend`]
//! against the backend authority's JSON API.
//!
//! [`SettlementBackend`]: mintflow_protocols::SettlementBackend
//! [`JobBackend`]: mintflow_protocols::JobBackend

mod api;
mod client;

pub use client::HttpBackend;
