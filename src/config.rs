//! Process configuration from environment variables

use crate::db::Backend;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub bot_token: String,
    /// The one identity allowed into the admin workflow
    pub admin_chat_id: String,
    pub port: u16,
    pub backend: Backend,
    pub data_path: PathBuf,
    pub api_base: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` on webhook calls
    pub webhook_secret: Option<String>,
    /// Public URL to register with `setWebhook` on startup
    pub webhook_url: Option<String>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let bot_token = require("BOT_TOKEN")?;
        let admin_chat_id = require("ADMIN_CHAT_ID")?.trim().to_string();
        if admin_chat_id.parse::<i64>().is_err() {
            return Err(ConfigError::Invalid {
                name: "ADMIN_CHAT_ID",
                value: admin_chat_id,
            });
        }

        let port = match get("INTAKE_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "INTAKE_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let backend = match get("INTAKE_STORE").as_deref().map(str::trim) {
            None | Some("log") => Backend::Log,
            Some("sqlite") => Backend::Sqlite,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "INTAKE_STORE",
                    value: other.to_string(),
                })
            }
        };

        let data_path = get("INTAKE_DATA_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                let file = match backend {
                    Backend::Log => "orders.jsonl",
                    Backend::Sqlite => "orders.db",
                };
                PathBuf::from(home).join(".site-intake").join(file)
            },
            PathBuf::from,
        );

        Ok(Self {
            bot_token,
            admin_chat_id,
            port,
            backend,
            data_path,
            api_base: get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            webhook_secret: get("WEBHOOK_SECRET"),
            webhook_url: get("WEBHOOK_URL"),
        })
    }
}
