//! Tandem core library
//!
//! Domain logic for the Tandem shared expense tracker:
//! - `config` - environment-driven configuration, validated at startup
//! - `db` - SQLite-backed database gateway (profiles, categories, expenses, invites)
//! - `extract` - regex heuristics turning labeled emails into expense drafts
//! - `mail` - Gmail REST client (labels, message list/get, MIME decode)
//! - `oauth` - Google OAuth authorization URL + token exchange
//! - `ai` - pluggable generative-model backend (Gemini, mock)
//! - `analysis` - spending aggregation, prompt build, model-reply parsing

pub mod ai;
pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod mail;
pub mod models;
pub mod oauth;

pub use config::Config;
pub use error::{Error, Result};
