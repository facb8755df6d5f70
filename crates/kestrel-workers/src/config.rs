use chrono::Duration;

/// Settings threaded explicitly into every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Host of this instance, e.g. `kestrel.example`.
    pub host: String,
    /// `https` outside of tests.
    pub protocol: String,
    /// A Move involving an account attempted more recently than this is
    /// ignored.
    pub move_attempt_cooldown: Duration,
    /// A Move involving an account that succeeded more recently than this
    /// is ignored.
    pub move_success_cooldown: Duration,
}

impl ProcessingConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Base URL of this instance.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.host)
    }

    /// Returns true when `host` names this instance.
    pub fn is_local_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.host)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            protocol: "https".to_string(),
            move_attempt_cooldown: Duration::minutes(5),
            move_success_cooldown: Duration::days(7),
        }
    }
}
