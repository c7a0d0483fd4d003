//! Environment-driven server configuration.
//!
//! All settings come from environment variables with sensible defaults, so the
//! server can run unconfigured against a local stub and fully configured in
//! production with nothing but an API key.

use std::env;
use std::fmt;

use tracing::warn;

// ============================================================================
// Runtime mode
// ============================================================================

/// Which tool set the server registers.
///
/// `Basic` exposes only the three core memory tools. `Full` adds the
/// maintenance tools (update, delete, stats, relevance check).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Basic,
    Full,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Basic => write!(f, "basic"),
            Mode::Full => write!(f, "full"),
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Server configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind the HTTP listener to.
    pub host: String,
    /// Port to bind the HTTP listener to.
    pub port: u16,
    /// Verbose logging toggle.
    pub debug: bool,
    /// Raw mode string, validated to `basic` or `full`.
    pub mode: String,
    /// Name reported to clients during the initialize handshake.
    pub server_name: String,
    /// API key for the memory backend.
    pub mem0_api_key: Option<String>,
    /// Base URL of the memory backend.
    pub mem0_base_url: String,
    /// User id memories are stored under when the client does not supply one.
    pub default_user_id: String,
    /// Register the maintenance tools in addition to the core three.
    pub enable_advanced_tools: bool,
    /// Upload extraction instructions to the backend project at startup.
    pub enable_custom_instructions: bool,
    /// Attach permissive CORS headers to responses.
    pub enable_cors: bool,
    /// Default log level when RUST_LOG is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            debug: false,
            mode: "full".to_string(),
            server_name: "mem0-mcp".to_string(),
            mem0_api_key: None,
            mem0_base_url: "https://api.mem0.ai".to_string(),
            default_user_id: "cursor_mcp".to_string(),
            enable_advanced_tools: true,
            enable_custom_instructions: true,
            enable_cors: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let mut config = Config {
            host: env_or("HOST", &defaults.host),
            port: env_port("PORT", defaults.port),
            debug: env_truthy("DEBUG"),
            mode: env_or("MODE", &defaults.mode).to_lowercase(),
            server_name: env_or("SERVER_NAME", &defaults.server_name),
            mem0_api_key: env::var("MEM0_API_KEY").ok().filter(|key| !key.is_empty()),
            mem0_base_url: env_or("MEM0_BASE_URL", &defaults.mem0_base_url),
            default_user_id: env_or("DEFAULT_USER_ID", &defaults.default_user_id),
            enable_advanced_tools: env_enabled("ENABLE_ADVANCED_TOOLS"),
            enable_custom_instructions: env_enabled("ENABLE_CUSTOM_INSTRUCTIONS"),
            enable_cors: env_enabled("ENABLE_CORS"),
            log_level: env_or("LOG_LEVEL", &defaults.log_level).to_lowercase(),
        };

        // Basic mode never exposes the maintenance tools.
        if config.mode == "basic" {
            config.enable_advanced_tools = false;
        }

        config
    }

    /// The validated runtime mode. Call after [`Config::validate`] has passed;
    /// unknown strings fall back to `Full`.
    pub fn mode(&self) -> Mode {
        match self.mode.as_str() {
            "basic" => Mode::Basic,
            _ => Mode::Full,
        }
    }

    pub fn advanced_tools_enabled(&self) -> bool {
        self.enable_advanced_tools && self.mode() != Mode::Basic
    }

    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.mem0_api_key.is_none() {
            problems.push("MEM0_API_KEY is required".to_string());
        }

        if self.port == 0 {
            problems.push("PORT must be between 1 and 65535".to_string());
        }

        if !matches!(self.mode.as_str(), "basic" | "full") {
            problems.push(format!(
                "MODE must be 'basic' or 'full', got '{}'",
                self.mode
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.as_str()) {
            problems.push(format!(
                "LOG_LEVEL must be one of {:?}, got '{}'",
                LEVELS, self.log_level
            ));
        }

        problems
    }

    /// Human-readable settings dump with the API key masked.
    pub fn summary(&self) -> String {
        let masked_key = match &self.mem0_api_key {
            Some(_) => "***",
            None => "(not set)",
        };
        format!(
            "host:                {}\n\
             port:                {}\n\
             mode:                {}\n\
             server_name:         {}\n\
             debug:               {}\n\
             mem0_api_key:        {}\n\
             mem0_base_url:       {}\n\
             default_user_id:     {}\n\
             advanced_tools:      {}\n\
             custom_instructions: {}\n\
             cors:                {}\n\
             log_level:           {}",
            self.host,
            self.port,
            self.mode,
            self.server_name,
            self.debug,
            masked_key,
            self.mem0_base_url,
            self.default_user_id,
            self.enable_advanced_tools,
            self.enable_custom_instructions,
            self.enable_cors,
            self.log_level,
        )
    }
}

// ============================================================================
// Env helpers
// ============================================================================

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_port(key: &str, default: u16) -> u16 {
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => match raw.parse() {
            Ok(port) => port,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparseable port value");
                default
            }
        },
        _ => default,
    }
}

/// Opt-in flag: true only for an explicit truthy value.
fn env_truthy(key: &str) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => false,
    }
}

/// Opt-out flag: enabled unless explicitly set to "false".
fn env_enabled(key: &str) -> bool {
    match env::var(key) {
        Ok(value) => value.to_lowercase() != "false",
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "HOST",
            "PORT",
            "DEBUG",
            "MODE",
            "SERVER_NAME",
            "MEM0_API_KEY",
            "MEM0_BASE_URL",
            "DEFAULT_USER_ID",
            "ENABLE_ADVANCED_TOOLS",
            "ENABLE_CUSTOM_INSTRUCTIONS",
            "ENABLE_CORS",
            "LOG_LEVEL",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.mode, "full");
        assert_eq!(config.default_user_id, "cursor_mcp");
        assert!(config.enable_advanced_tools);
        assert_eq!(config.mode(), Mode::Full);
    }

    #[test]
    fn test_validate_reports_all_problems() {
        let config = Config {
            mem0_api_key: None,
            port: 0,
            mode: "turbo".to_string(),
            log_level: "loud".to_string(),
            ..Config::default()
        };
        let problems = config.validate();
        assert_eq!(problems.len(), 4);
        assert!(problems[0].contains("MEM0_API_KEY"));
    }

    #[test]
    fn test_validate_passes_with_key() {
        let config = Config {
            mem0_api_key: Some("m0-test".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_summary_masks_api_key() {
        let config = Config {
            mem0_api_key: Some("m0-secret".to_string()),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(summary.contains("***"));
        assert!(!summary.contains("m0-secret"));
    }

    #[test]
    fn test_advanced_tools_follow_mode() {
        let mut config = Config::default();
        assert!(config.advanced_tools_enabled());

        config.mode = "basic".to_string();
        assert!(!config.advanced_tools_enabled());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        clear_env();
        std::env::set_var("PORT", "9000");
        std::env::set_var("MODE", "BASIC");
        std::env::set_var("MEM0_API_KEY", "m0-test");
        std::env::set_var("ENABLE_CORS", "false");
        std::env::set_var("DEBUG", "yes");

        let config = Config::from_env();
        assert_eq!(config.port, 9000);
        assert_eq!(config.mode, "basic");
        assert_eq!(config.mem0_api_key.as_deref(), Some("m0-test"));
        assert!(!config.enable_cors);
        assert!(config.debug);
        // Basic mode forces the maintenance tools off.
        assert!(!config.enable_advanced_tools);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_bad_port() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");

        let config = Config::from_env();
        assert_eq!(config.port, 8080);

        clear_env();
    }
}
