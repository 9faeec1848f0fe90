use std::time::Duration;

/// Errors raised while configuring a throttle.
///
/// Running a throttle never fails by itself: failures inside the wrapped
/// callback belong to the caller and are not caught.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The interval between effective invocations must be positive.
    #[error("throttle interval must be positive, got {0:?}")]
    InvalidInterval(Duration),

    /// A [`ThrottleConfig`](crate::ThrottleConfig) could not be parsed.
    #[error("invalid throttle config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
