use std::time::Duration;

/// Default cap on outstanding requests per port.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Port behavior configuration.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Name used in log fields.
    pub name: String,
    /// Deadline applied to requests that don't set their own. Default: none.
    pub request_timeout: Option<Duration>,
    /// Maximum number of outstanding requests.
    pub max_pending: usize,
    /// Send a cancel notice to the peer when a request is withdrawn.
    pub cancel_notice: bool,
    /// How long `close()` lets outstanding requests finish. Default: none,
    /// which rejects them immediately.
    pub close_grace: Option<Duration>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            name: "port".to_string(),
            request_timeout: None,
            max_pending: DEFAULT_MAX_PENDING,
            cancel_notice: true,
            close_grace: None,
        }
    }
}

impl PortConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn with_cancel_notice(mut self, enabled: bool) -> Self {
        self.cancel_notice = enabled;
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = Some(grace);
        self
    }
}

/// Per-request overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    timeout: TimeoutSetting,
}

#[derive(Debug, Clone, Copy, Default)]
enum TimeoutSetting {
    #[default]
    Inherit,
    Disabled,
    After(Duration),
}

impl RequestOptions {
    /// Reject with `Timeout` if no response arrives within `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: TimeoutSetting::After(timeout),
        }
    }

    /// Wait indefinitely, ignoring the port's default deadline.
    pub fn without_timeout() -> Self {
        Self {
            timeout: TimeoutSetting::Disabled,
        }
    }

    pub(crate) fn resolve_timeout(&self, config: &PortConfig) -> Option<Duration> {
        match self.timeout {
            TimeoutSetting::Inherit => config.request_timeout,
            TimeoutSetting::Disabled => None,
            TimeoutSetting::After(timeout) => Some(timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reject_immediately_and_never_time_out() {
        let config = PortConfig::default();
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.close_grace, None);
        assert_eq!(config.max_pending, DEFAULT_MAX_PENDING);
        assert!(config.cancel_notice);
    }

    #[test]
    fn request_options_resolve_against_config() {
        let config = PortConfig::default().with_request_timeout(Duration::from_secs(2));

        assert_eq!(
            RequestOptions::default().resolve_timeout(&config),
            Some(Duration::from_secs(2))
        );
        assert_eq!(RequestOptions::without_timeout().resolve_timeout(&config), None);
        assert_eq!(
            RequestOptions::with_timeout(Duration::from_millis(5)).resolve_timeout(&config),
            Some(Duration::from_millis(5))
        );
    }
}
