use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    throttle::{Policy, ThrottleBuilder, DEFAULT_INTERVAL},
};

/// Serializable throttle settings.
///
/// ```toml
/// interval_ms = 16
/// policy = "leading-trailing"   # or "trailing"
/// ```
///
/// Missing fields fall back to the [`ThrottleBuilder`] defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThrottleConfig {
    pub interval_ms: u64,
    pub policy: Policy,
}

impl ThrottleConfig {
    /// Parse a config from TOML text.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use scrollgate::{Policy, ThrottleConfig};
    ///
    /// let config = ThrottleConfig::from_toml("interval_ms = 250\npolicy = \"trailing\"").unwrap();
    ///
    /// assert_eq!(config.interval(), Duration::from_millis(250));
    /// assert_eq!(config.policy, Policy::Trailing);
    /// ```
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// A builder carrying this configuration.
    ///
    /// The interval is validated when the builder builds.
    pub fn builder(&self) -> ThrottleBuilder {
        let mut builder = ThrottleBuilder::default();
        builder.interval(self.interval()).policy(self.policy);

        builder
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            policy: Policy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        timer::{EventLoop, ManualClock},
    };

    #[test]
    fn empty_config_use_defaults() {
        let config = ThrottleConfig::from_toml("").unwrap();

        assert_eq!(config, ThrottleConfig::default());
        assert_eq!(config.interval(), DEFAULT_INTERVAL);
        assert_eq!(config.policy, Policy::LeadingTrailing);
    }

    #[test]
    fn unknown_policy_rejected() {
        let err = ThrottleConfig::from_toml("policy = \"leading\"").unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(ThrottleConfig::from_toml("wait = 16").is_err());
    }

    #[test]
    fn zero_interval_fail_on_build() {
        let config = ThrottleConfig::from_toml("interval_ms = 0").unwrap();
        let ev = EventLoop::new(ManualClock::new());

        let err = config.builder().build(&ev, |_: ()| {}).unwrap_err();

        assert!(matches!(err, Error::InvalidInterval(_)));
    }

    #[test]
    fn builder_carry_config() {
        let config = ThrottleConfig {
            interval_ms: 40,
            policy: Policy::Trailing,
        };
        let ev = EventLoop::new(ManualClock::new());

        let throttled = config.builder().build(&ev, |_: u8| {}).unwrap();

        assert_eq!(throttled.interval(), Duration::from_millis(40));
        assert_eq!(throttled.policy(), Policy::Trailing);
    }
}
