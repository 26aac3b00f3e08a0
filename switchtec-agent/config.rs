use std::net::SocketAddr;
use std::time::Duration;

/// Default window after which an active MRPC request is declared wedged
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval at which the watchdog re-reads the mailbox status
pub const DEFAULT_COMPLETION_POLL: Duration = Duration::from_millis(10);

/// Default interval of the event poll tick
pub const DEFAULT_EVENT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// MRPC watchdog window, armed when a request becomes active
    pub timeout_duration: Duration,
    pub completion_poll_interval: Duration,
    pub event_poll_interval: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            timeout_duration: DEFAULT_TIMEOUT,
            completion_poll_interval: DEFAULT_COMPLETION_POLL,
            event_poll_interval: DEFAULT_EVENT_POLL,
        }
    }
}

impl DeviceConfig {
    /// Defaults overridden by `SWITCHTEC_TIMEOUT_MS`, `SWITCHTEC_POLL_MS`
    /// and `SWITCHTEC_EVENT_POLL_MS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = Self::env_millis("SWITCHTEC_TIMEOUT_MS") {
            config.timeout_duration = ms;
        }
        if let Some(ms) = Self::env_millis("SWITCHTEC_POLL_MS") {
            config.completion_poll_interval = ms;
        }
        if let Some(ms) = Self::env_millis("SWITCHTEC_EVENT_POLL_MS") {
            config.event_poll_interval = ms;
        }
        config
    }

    fn env_millis(name: &str) -> Option<Duration> {
        let value = std::env::var(name).ok()?;
        match Self::parse_millis(&value) {
            Some(duration) => Some(duration),
            None => {
                tracing::warn!("Ignoring {}={:?}: not a positive millisecond count", name, value);
                None
            }
        }
    }

    fn parse_millis(s: &str) -> Option<Duration> {
        match s.trim().parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(ms) => Some(Duration::from_millis(ms)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn with_completion_poll_interval(mut self, interval: Duration) -> Self {
        self.completion_poll_interval = interval;
        self
    }

    pub fn with_event_poll_interval(mut self, interval: Duration) -> Self {
        self.event_poll_interval = interval;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub listen: SocketAddr,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millis() {
        assert_eq!(DeviceConfig::parse_millis("250"), Some(Duration::from_millis(250)));
        assert_eq!(DeviceConfig::parse_millis(" 7\n"), Some(Duration::from_millis(7)));
        assert_eq!(DeviceConfig::parse_millis("0"), None);
        assert_eq!(DeviceConfig::parse_millis("soon"), None);
    }

    #[test]
    fn test_builder_overrides() {
        let config = DeviceConfig::default().with_timeout(Duration::from_millis(50));
        assert_eq!(config.timeout_duration, Duration::from_millis(50));
        assert_eq!(config.completion_poll_interval, DEFAULT_COMPLETION_POLL);
    }
}
