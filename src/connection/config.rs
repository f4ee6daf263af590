//! Connection configuration types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;

/// Default bound on the attempt counter.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// The fixed remote endpoint a manager connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from a host name (or address literal) and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClientError::invalid_endpoint(format!("missing port in {s:?}")))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| ClientError::invalid_endpoint(format!("unclosed bracket in {s:?}")))?,
            None if host.contains(':') => {
                return Err(ClientError::invalid_endpoint(format!(
                    "IPv6 host must be bracketed in {s:?}"
                )));
            }
            None => host,
        };

        if host.is_empty() {
            return Err(ClientError::invalid_endpoint(format!("empty host in {s:?}")));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| ClientError::invalid_endpoint(format!("invalid port in {s:?}")))?;

        Ok(Self::new(host, port))
    }
}

/// What the attempt counter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryCounting {
    /// Count active protocol sessions: incremented on activation and
    /// decremented when the session stops. Connect failures are not counted.
    #[default]
    CountSessions,
    /// Count connection attempts that end without reaching protocol
    /// activation. Reset on activation.
    CountFailures,
}

/// Retry policy for connection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Bound on the attempt counter.
    pub max_retries: u32,
    /// How long a single connect attempt may take.
    pub connect_timeout: Duration,
    /// Fixed pause before a new attempt after a close.
    pub reconnect_sleep: Duration,
    /// What the attempt counter measures.
    pub counting: RetryCounting,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout: Duration::from_secs(5),
            reconnect_sleep: Duration::from_secs(1),
            counting: RetryCounting::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given bound and timings.
    pub fn new(max_retries: u32, connect_timeout: Duration, reconnect_sleep: Duration) -> Self {
        Self {
            max_retries,
            connect_timeout,
            reconnect_sleep,
            counting: RetryCounting::default(),
        }
    }

    /// Check whether the counter still permits connection work.
    pub fn allows(&self, counter: u32) -> bool {
        counter < self.max_retries
    }

    /// Set what the attempt counter measures.
    pub fn with_counting(mut self, counting: RetryCounting) -> Self {
        self.counting = counting;
        self
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientConfig {
    /// Retry policy.
    pub retry_policy: RetryPolicy,
    /// Reconnect automatically after a close instead of stopping.
    pub auto_reconnect: bool,
}

impl ClientConfig {
    /// Create a configuration that never reconnects on its own.
    pub fn simple() -> Self {
        Self::default()
    }

    /// Create a configuration that reconnects after drops and bounds
    /// consecutive failed attempts.
    pub fn robust() -> Self {
        Self {
            retry_policy: RetryPolicy::default().with_counting(RetryCounting::CountFailures),
            auto_reconnect: true,
        }
    }

    /// Enable or disable auto-reconnect.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the attempt counter bound.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry_policy.max_retries = max_retries;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.retry_policy.connect_timeout = timeout;
        self
    }

    /// Set the pause between attempts.
    pub fn with_reconnect_sleep(mut self, sleep: Duration) -> Self {
        self.retry_policy.reconnect_sleep = sleep;
        self
    }

    /// Set what the attempt counter measures.
    pub fn with_counting(mut self, counting: RetryCounting) -> Self {
        self.retry_policy.counting = counting;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("example.test", 9999).to_string(), "example.test:9999");
        assert_eq!(Endpoint::new("::1", 80).to_string(), "[::1]:80");
    }

    #[test]
    fn test_endpoint_parse() {
        let ep: Endpoint = "127.0.0.1:8080".parse().unwrap();
        assert_eq!(ep.host(), "127.0.0.1");
        assert_eq!(ep.port(), 8080);

        let ep: Endpoint = "[::1]:443".parse().unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.port(), 443);

        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":80".parse::<Endpoint>().is_err());
        assert!("host:70000".parse::<Endpoint>().is_err());
        assert!("::1:80".parse::<Endpoint>().is_err());
        assert!("[::1:80".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_retry_policy_allows() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(10));
        assert!(policy.allows(0));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));

        assert!(!RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).allows(0));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.retry_policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.retry_policy.counting, RetryCounting::CountSessions);
        assert!(!config.auto_reconnect);

        let robust = ClientConfig::robust();
        assert!(robust.auto_reconnect);
        assert_eq!(robust.retry_policy.counting, RetryCounting::CountFailures);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::simple()
            .with_auto_reconnect(true)
            .with_max_retries(4)
            .with_connect_timeout(Duration::from_millis(100))
            .with_reconnect_sleep(Duration::from_millis(20))
            .with_counting(RetryCounting::CountFailures);

        assert!(config.auto_reconnect);
        assert_eq!(config.retry_policy.max_retries, 4);
        assert_eq!(config.retry_policy.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.retry_policy.reconnect_sleep, Duration::from_millis(20));
        assert_eq!(config.retry_policy.counting, RetryCounting::CountFailures);
    }
}
