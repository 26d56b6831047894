/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Session configuration.
//!
//! The struct is serde-deserializable so configuration loading stays an
//! external concern; anything that can produce these fields (a TOML file, an
//! environment layer, a test literal) can configure a session.

use fixweave_core::error::ConfigError;
use fixweave_core::types::CompId;
use serde::Deserialize;
use std::time::Duration;

/// Default BeginString.
pub const DEFAULT_BEGIN_STRING: &str = "FIX.4.4";

/// Default pipeline, top (closest to the application) first.
pub const DEFAULT_PIPELINE: &[&str] = &[
    "heartbeat",
    "authentication",
    "seqnum",
    "wire",
    "store",
    "transport",
];

/// Which message store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum StoreSelector {
    /// In-memory store; nothing survives a restart.
    #[default]
    Memory,
    /// Append-only file store next to the sid file.
    File,
}

/// Configuration for one FIX session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name identifying this connection; keys the sid file and store.
    pub connection_name: String,
    /// Counterparty host.
    pub host: String,
    /// Counterparty port.
    pub port: u16,
    /// Our CompID (tag 49 on outbound messages).
    pub sender_comp_id: CompId,
    /// Counterparty CompID (tag 56 on outbound messages).
    pub target_comp_id: CompId,
    /// Logon username (tag 553).
    pub username: String,
    /// Logon password (tag 554).
    pub password: String,
    /// Heartbeat interval in seconds (tag 108).
    pub heartbeat_interval: u64,
    /// Grace fraction of the heartbeat interval before a TestRequest.
    pub grace_ratio: f64,
    /// Send ResetSeqNumFlag=Y on logon and restart sequences at 1.
    pub reset_on_logon: bool,
    /// FIX version string (tag 8).
    pub begin_string: String,
    /// Processor identifiers, top first.
    pub pipeline_apps: Vec<String>,
    /// Message store backend.
    pub message_store: StoreSelector,
    /// Directory for the sid file and file store.
    pub state_dir: String,
    /// How long to wait for the Logon response.
    pub logon_timeout_secs: u64,
    /// How long to wait for the Logout confirmation.
    pub logout_timeout_secs: u64,
    /// Largest frame accepted off the wire.
    pub max_message_size: usize,
    /// Mark the session as a test session (tag 464 on Logon).
    pub test_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_name: "default".into(),
            host: "127.0.0.1".into(),
            port: 0,
            sender_comp_id: CompId::new("SENDER").unwrap_or_else(|| unreachable!()),
            target_comp_id: CompId::new("TARGET").unwrap_or_else(|| unreachable!()),
            username: String::new(),
            password: String::new(),
            heartbeat_interval: 30,
            grace_ratio: 0.2,
            reset_on_logon: false,
            begin_string: DEFAULT_BEGIN_STRING.into(),
            pipeline_apps: DEFAULT_PIPELINE.iter().map(|s| (*s).to_string()).collect(),
            message_store: StoreSelector::Memory,
            state_dir: ".".into(),
            logon_timeout_secs: 10,
            logout_timeout_secs: 2,
            max_message_size: 1024 * 1024,
            test_mode: false,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with the required identity fields set.
    #[must_use]
    pub fn new(
        connection_name: impl Into<String>,
        sender_comp_id: CompId,
        target_comp_id: CompId,
    ) -> Self {
        Self {
            connection_name: connection_name.into(),
            sender_comp_id,
            target_comp_id,
            ..Self::default()
        }
    }

    /// Sets host and port.
    #[must_use]
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the logon credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the heartbeat interval in seconds.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval = secs;
        self
    }

    /// Sets whether sequences reset on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets the message store backend.
    #[must_use]
    pub fn with_message_store(mut self, selector: StoreSelector) -> Self {
        self.message_store = selector;
        self
    }

    /// The heartbeat interval as a `Duration`.
    #[must_use]
    pub const fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    /// The grace period: `heartbeat_interval * grace_ratio`.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.heartbeat().mul_f64(self.grace_ratio)
    }

    /// The logon timeout as a `Duration`.
    #[must_use]
    pub const fn logon_timeout(&self) -> Duration {
        Duration::from_secs(self.logon_timeout_secs)
    }

    /// The logout timeout as a `Duration`.
    #[must_use]
    pub const fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_secs)
    }

    /// Path of the sid file for this connection.
    #[must_use]
    pub fn sid_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(format!("{}.sid", self.connection_name))
    }

    /// Path of the file store for this connection.
    #[must_use]
    pub fn store_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.state_dir).join(format!("{}.messages", self.connection_name))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` for missing or unusable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_name.is_empty() {
            return Err(ConfigError::MissingKey("connection_name".into()));
        }
        if self.host.is_empty() {
            return Err(ConfigError::MissingKey("host".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "port".into(),
                reason: "must be non-zero".into(),
            });
        }
        if self.heartbeat_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "heartbeat_interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.grace_ratio) {
            return Err(ConfigError::InvalidValue {
                key: "grace_ratio".into(),
                reason: "must be within [0, 1]".into(),
            });
        }
        if self.pipeline_apps.is_empty() {
            return Err(ConfigError::MissingKey("pipeline_apps".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SessionConfig {
        SessionConfig::new(
            "demo",
            CompId::new("CLIENT").unwrap(),
            CompId::new("BROKER").unwrap(),
        )
        .with_endpoint("fix.example.com", 9876)
    }

    #[test]
    fn builder_defaults() {
        let config = base();
        assert_eq!(config.begin_string, "FIX.4.4");
        assert_eq!(config.heartbeat(), Duration::from_secs(30));
        assert_eq!(config.grace(), Duration::from_secs(6));
        assert_eq!(config.pipeline_apps.len(), DEFAULT_PIPELINE.len());
        config.validate().unwrap();
    }

    #[test]
    fn validation_catches_bad_values() {
        let config = SessionConfig {
            port: 0,
            ..base()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = SessionConfig {
            grace_ratio: 1.5,
            ..base()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            pipeline_apps: vec![],
            ..base()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: SessionConfig = serde_json::from_str(
            r#"{
                "connection_name": "uat",
                "host": "10.0.0.1",
                "port": 9878,
                "sender_comp_id": "CLIENT",
                "target_comp_id": "BROKER",
                "heartbeat_interval": 20,
                "reset_on_logon": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.connection_name, "uat");
        assert_eq!(config.heartbeat_interval, 20);
        assert!(config.reset_on_logon);
        assert_eq!(config.grace_ratio, 0.2);
        assert_eq!(config.message_store, StoreSelector::Memory);
    }

    #[test]
    fn state_paths() {
        let mut config = base();
        config.state_dir = "/var/lib/fix".into();
        assert_eq!(config.sid_path().to_str().unwrap(), "/var/lib/fix/demo.sid");
        assert_eq!(
            config.store_path().to_str().unwrap(),
            "/var/lib/fix/demo.messages"
        );
    }
}
