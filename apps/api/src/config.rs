use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default, so a bare `cargo run` works against the
/// conventional `model/` and `uploads/` directories.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `model.onnx`, `tokenizer.json` and `config.json`.
    pub model_dir: PathBuf,
    /// Directory uploaded resumes are persisted into; created at startup.
    pub upload_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            model_dir: PathBuf::from(env_or("MODEL_DIR", "model")),
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "uploads")),
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
