use std::{env, fs};

use crate::error::ConfigError;
use crate::models::Directory;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub frontend_origin: String,
    pub jwt_secret: String,
    /// When unset the service keeps everything in memory.
    pub mongo_uri: Option<String>,
    pub database_name: String,
    /// JSON seed of users and team memberships loaded at startup.
    pub directory_file: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            mongo_uri: env::var("MONGO_URI").ok().filter(|uri| !uri.trim().is_empty()),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "leadline".to_string()),
            directory_file: env::var("DIRECTORY_FILE").ok(),
        })
    }

    /// In-memory configuration used by tests and local tooling.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            jwt_secret: jwt_secret.to_string(),
            mongo_uri: None,
            database_name: "leadline".to_string(),
            directory_file: None,
        }
    }
}

/// Reads the user directory seed named by `DIRECTORY_FILE`.
pub fn load_directory_file(path: &str) -> Result<Directory, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError::Directory {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Directory {
        path: path.to_string(),
        reason: e.to_string(),
    })
}
