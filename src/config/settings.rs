//! Setting lookup from the environment or an interactive prompt
//!
//! Connection settings and credentials are never stored in config files.
//! They are resolved through a [`SettingsProvider`]: normally the
//! environment (after sourcing a dotenv file), then a prompt on the
//! terminal for anything still missing.

use eyre::{Context, Result, eyre};
use std::collections::HashMap;
use std::io::{BufRead, IsTerminal, Write};

/// A named setting and how to ask for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    /// Environment variable name
    pub key: &'static str,
    /// Human readable prompt label
    pub label: &'static str,
    /// Hide input and never echo the value
    pub secret: bool,
    /// Whether an interactive prompt may ask for it
    pub interactive: bool,
}

impl Setting {
    const fn plain(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            secret: false,
            interactive: false,
        }
    }

    const fn prompted(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            secret: false,
            interactive: true,
        }
    }

    const fn secret(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            secret: true,
            interactive: true,
        }
    }
}

pub const MONGO_HOST: Setting = Setting::plain("MONGO_HOST", "MongoDB host(s)");
pub const MONGO_DATABASE: Setting = Setting::prompted("MONGO_DATABASE", "MongoDB database");
pub const MONGO_REPLICA_SET: Setting =
    Setting::prompted("MONGO_REPLICA_SET", "MongoDB replica set (blank for none)");
pub const MONGO_AUTH_SOURCE: Setting = Setting::plain("MONGO_AUTH_SOURCE", "MongoDB auth source");
pub const MONGO_USERNAME: Setting =
    Setting::prompted("MONGO_USERNAME", "MongoDB username (blank for none)");
pub const MONGO_PASSWORD: Setting = Setting::secret("MONGO_PASSWORD", "MongoDB password");
pub const MONGO_COLLECTIONS: Setting =
    Setting::prompted("MONGO_COLLECTIONS", "Collections (comma separated)");
pub const MONGO_BATCH_SIZE: Setting = Setting::plain("MONGO_BATCH_SIZE", "Cursor batch size");

pub const PG_HOST: Setting = Setting::plain("PG_HOST", "PostgreSQL host");
pub const PG_PORT: Setting = Setting::plain("PG_PORT", "PostgreSQL port");
pub const PG_DATABASE: Setting = Setting::prompted("PG_DATABASE", "PostgreSQL database");
pub const PG_USERNAME: Setting =
    Setting::prompted("PG_USERNAME", "PostgreSQL username (blank for none)");
pub const PG_PASSWORD: Setting = Setting::secret("PG_PASSWORD", "PostgreSQL password");
pub const PG_TABLE: Setting = Setting::plain("PG_TABLE", "Target table");

/// Source of setting values
pub trait SettingsProvider {
    /// Look up a setting; `Ok(None)` when this provider has no value
    fn lookup(&self, setting: &Setting) -> Result<Option<String>>;

    /// Look up a setting that must be present
    fn require(&self, setting: &Setting) -> Result<String> {
        self.lookup(setting)?
            .ok_or_else(|| eyre!("{} is required (set {})", setting.label, setting.key))
    }
}

/// Reads settings from process environment variables
#[derive(Debug, Default)]
pub struct EnvSettings;

impl SettingsProvider for EnvSettings {
    fn lookup(&self, setting: &Setting) -> Result<Option<String>> {
        Ok(std::env::var(setting.key)
            .ok()
            .filter(|v| !v.trim().is_empty()))
    }
}

/// Asks the operator on the terminal
///
/// Only settings marked interactive are prompted for; secrets are read
/// without echo. A blank answer counts as unset.
#[derive(Debug, Default)]
pub struct PromptSettings;

impl PromptSettings {
    /// True when stdin is a terminal someone can type into
    pub fn available() -> bool {
        std::io::stdin().is_terminal()
    }
}

impl SettingsProvider for PromptSettings {
    fn lookup(&self, setting: &Setting) -> Result<Option<String>> {
        if !setting.interactive {
            return Ok(None);
        }

        let answer = if setting.secret {
            rpassword::prompt_password(format!("{}: ", setting.label))
                .with_context(|| format!("Failed to read {}", setting.label))?
        } else {
            let mut stderr = std::io::stderr();
            write!(stderr, "{}: ", setting.label)?;
            stderr.flush()?;

            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .with_context(|| format!("Failed to read {}", setting.label))?;
            line
        };

        let answer = answer.trim().to_string();
        Ok((!answer.is_empty()).then_some(answer))
    }
}

/// Fixed values, keyed by environment variable name
impl SettingsProvider for HashMap<String, String> {
    fn lookup(&self, setting: &Setting) -> Result<Option<String>> {
        Ok(self.get(setting.key).cloned())
    }
}

/// Tries each provider in order and returns the first value found
#[derive(Default)]
pub struct SettingsChain {
    providers: Vec<Box<dyn SettingsProvider>>,
}

impl SettingsChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl SettingsProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Environment first, then the terminal when `interactive` and a terminal is attached
    pub fn standard(interactive: bool) -> Self {
        let chain = Self::new().with(EnvSettings);
        if interactive && PromptSettings::available() {
            chain.with(PromptSettings)
        } else {
            chain
        }
    }
}

impl SettingsProvider for SettingsChain {
    fn lookup(&self, setting: &Setting) -> Result<Option<String>> {
        for provider in &self.providers {
            if let Some(value) = provider.lookup(setting)? {
                if setting.secret {
                    log::debug!("Resolved {} (hidden)", setting.key);
                } else {
                    log::debug!("Resolved {}={}", setting.key, value);
                }
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
