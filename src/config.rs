// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::env;
use std::time::Duration;

use config::{Environment, File};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imap::types::{Credentials, DEFAULT_FOLDER, DEFAULT_IMAP_PORT};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub log: LogConfig,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_user: String,
    pub imap_pass: String,
    pub folder: String,
    pub fetch_timeout_secs: u64,
}

impl Settings {
    /// Defaults, then the optional file, then `MAILSIFT_*` variables, then
    /// the bare `IMAP_*` aliases.
    pub fn new(config_path: Option<&str>) -> Result<Self, SettingsError> {
        let mut config_builder = config::Config::builder()
            .set_default("log.level", "info")?
            .set_default("imap_host", "")?
            .set_default("imap_port", DEFAULT_IMAP_PORT)?
            .set_default("imap_user", "")?
            .set_default("imap_pass", "")?
            .set_default("folder", DEFAULT_FOLDER)?
            .set_default("fetch_timeout_secs", 60)?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        // e.g. `MAILSIFT_IMAP_HOST` or `MAILSIFT_LOG__LEVEL`
        config_builder = config_builder.add_source(
            Environment::with_prefix("MAILSIFT")
                .prefix_separator("_")
                .separator("__")
                .ignore_empty(true),
        );

        let aliases = [
            ("IMAP_HOST", "imap_host"),
            ("IMAP_PORT", "imap_port"),
            ("IMAP_USER", "imap_user"),
            ("IMAP_PASS", "imap_pass"),
            ("IMAP_FOLDER", "folder"),
        ];
        for (env_var, key) in &aliases {
            let Ok(value) = env::var(env_var) else { continue };
            if value.is_empty() {
                continue;
            }
            if *env_var == "IMAP_PORT" {
                match value.parse::<u16>() {
                    Ok(port) => config_builder = config_builder.set_override(*key, port)?,
                    Err(_) => warn!("Invalid port value in {}: {}", env_var, value),
                }
            } else {
                config_builder = config_builder.set_override(*key, value)?;
            }
        }

        Ok(config_builder.build()?.try_deserialize()?)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.imap_host, &self.imap_user, &self.imap_pass).with_port(self.imap_port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            imap_host: String::new(),
            imap_port: DEFAULT_IMAP_PORT,
            imap_user: String::new(),
            imap_pass: String::new(),
            folder: DEFAULT_FOLDER.to_string(),
            fetch_timeout_secs: 60,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}
