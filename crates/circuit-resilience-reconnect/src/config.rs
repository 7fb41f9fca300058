use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default ceiling on reconnection attempts per loss event.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Default delay between reconnection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(20);

/// Default identifier of the reconnection dialog.
pub const DEFAULT_DIALOG_ID: &str = "components-reconnect-modal";

/// Upper bound on the delay before the first attempt of a sequence.
pub const MAX_FIRST_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Computes the delay before the next attempt from `(previous_attempts, max_retries)`.
///
/// Returning `None` ends the reconnection sequence as exhausted.
pub type IntervalFn = Arc<dyn Fn(u32, u32) -> Option<Duration> + Send + Sync>;

/// How long to wait before each reconnection attempt.
#[derive(Clone)]
pub enum RetryInterval {
    /// The same delay before every attempt.
    ///
    /// The delay before the first attempt is capped at
    /// [`MAX_FIRST_RETRY_INTERVAL`] so a short blip is retried quickly.
    Fixed(Duration),

    /// A caller-supplied delay function.
    Custom(IntervalFn),
}

impl RetryInterval {
    /// A fixed delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed(delay)
    }

    /// A delay computed from the number of attempts already made.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32, u32) -> Option<Duration> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Returns the delay before the attempt following `previous_attempts`
    /// attempts, or `None` when no further attempt should be made.
    pub fn delay_before(&self, previous_attempts: u32, max_retries: u32) -> Option<Duration> {
        match self {
            Self::Fixed(delay) if previous_attempts == 0 => {
                Some((*delay).min(MAX_FIRST_RETRY_INTERVAL))
            }
            Self::Fixed(delay) => Some(*delay),
            Self::Custom(f) => f(previous_attempts, max_retries),
        }
    }
}

impl Default for RetryInterval {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RETRY_INTERVAL)
    }
}

impl fmt::Debug for RetryInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(delay) => f.debug_tuple("RetryInterval::Fixed").field(delay).finish(),
            Self::Custom(_) => write!(f, "RetryInterval::Custom"),
        }
    }
}

/// Reconnection policy: retry ceiling, retry delay and the dialog identifier.
///
/// Options are validated when built and immutable afterwards.
///
/// # Examples
///
/// ```
/// use circuit_resilience_reconnect::ReconnectionOptions;
/// use std::time::Duration;
///
/// let options = ReconnectionOptions::builder()
///     .max_retries(3)
///     .retry_interval(Duration::from_secs(1))
///     .dialog_id("reconnect-modal")
///     .build()
///     .unwrap();
///
/// assert_eq!(options.max_retries(), 3);
/// assert_eq!(options.dialog_id(), "reconnect-modal");
/// ```
#[derive(Clone, Debug)]
pub struct ReconnectionOptions {
    max_retries: u32,
    retry_interval: RetryInterval,
    dialog_id: String,
}

impl ReconnectionOptions {
    /// Creates a new builder seeded with the default policy.
    pub fn builder() -> ReconnectionOptionsBuilder {
        ReconnectionOptionsBuilder::default()
    }

    /// Validated options with a fixed retry interval.
    pub fn new(
        max_retries: u32,
        retry_interval: Duration,
        dialog_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::builder()
            .max_retries(max_retries)
            .retry_interval(retry_interval)
            .dialog_id(dialog_id)
            .build()
    }

    /// Returns a builder pre-filled with these options.
    pub fn to_builder(&self) -> ReconnectionOptionsBuilder {
        ReconnectionOptionsBuilder {
            max_retries: self.max_retries,
            retry_interval: self.retry_interval.clone(),
            dialog_id: self.dialog_id.clone(),
        }
    }

    /// Returns the maximum number of attempts per loss event.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the retry interval policy.
    pub fn retry_interval(&self) -> &RetryInterval {
        &self.retry_interval
    }

    /// Returns the identifier of the reconnection dialog.
    pub fn dialog_id(&self) -> &str {
        &self.dialog_id
    }

    /// Delay before the attempt following `previous_attempts` attempts.
    pub(crate) fn delay_before(&self, previous_attempts: u32) -> Option<Duration> {
        if previous_attempts >= self.max_retries {
            return None;
        }
        self.retry_interval
            .delay_before(previous_attempts, self.max_retries)
    }
}

impl Default for ReconnectionOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: RetryInterval::default(),
            dialog_id: DEFAULT_DIALOG_ID.to_string(),
        }
    }
}

/// Builder for constructing [`ReconnectionOptions`].
#[derive(Clone, Debug)]
pub struct ReconnectionOptionsBuilder {
    max_retries: u32,
    retry_interval: RetryInterval,
    dialog_id: String,
}

impl ReconnectionOptionsBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of reconnection attempts per loss event.
    ///
    /// Must be greater than zero.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets a fixed delay between attempts.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = RetryInterval::Fixed(interval);
        self
    }

    /// Sets a fixed delay between attempts, in milliseconds.
    pub fn retry_interval_ms(self, millis: u64) -> Self {
        self.retry_interval(Duration::from_millis(millis))
    }

    /// Sets a delay function receiving `(previous_attempts, max_retries)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use circuit_resilience_reconnect::ReconnectionOptions;
    /// use std::time::Duration;
    ///
    /// // Back off linearly, give up after five attempts.
    /// let options = ReconnectionOptions::builder()
    ///     .max_retries(10)
    ///     .retry_interval_fn(|previous, _max| {
    ///         (previous < 5).then(|| Duration::from_secs(u64::from(previous) + 1))
    ///     })
    ///     .build()
    ///     .unwrap();
    /// # let _ = options;
    /// ```
    pub fn retry_interval_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, u32) -> Option<Duration> + Send + Sync + 'static,
    {
        self.retry_interval = RetryInterval::custom(f);
        self
    }

    /// Sets the retry interval policy.
    pub fn retry_interval_policy(mut self, interval: RetryInterval) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Sets the identifier of the reconnection dialog.
    pub fn dialog_id(mut self, dialog_id: impl Into<String>) -> Self {
        self.dialog_id = dialog_id.into();
        self
    }

    /// Validates and builds the options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMaxRetries`] when `max_retries` is zero and
    /// [`ConfigError::EmptyDialogId`] when the dialog id is blank.
    pub fn build(self) -> Result<ReconnectionOptions, ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries { value: 0 });
        }
        if self.dialog_id.trim().is_empty() {
            return Err(ConfigError::EmptyDialogId);
        }

        Ok(ReconnectionOptions {
            max_retries: self.max_retries,
            retry_interval: self.retry_interval,
            dialog_id: self.dialog_id,
        })
    }
}

impl Default for ReconnectionOptionsBuilder {
    fn default() -> Self {
        ReconnectionOptions::default().to_builder()
    }
}

/// Unvalidated reconnection options in their camelCase wire shape.
///
/// Missing fields take the defaults. Convert with `TryFrom` to get validated
/// [`ReconnectionOptions`].
#[cfg(feature = "serde")]
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawReconnectionOptions {
    /// Maximum number of attempts per loss event.
    pub max_retries: i64,
    /// Delay between attempts in milliseconds.
    pub retry_interval_milliseconds: i64,
    /// Identifier of the reconnection dialog.
    pub dialog_id: String,
}

#[cfg(feature = "serde")]
impl Default for RawReconnectionOptions {
    fn default() -> Self {
        Self {
            max_retries: i64::from(DEFAULT_MAX_RETRIES),
            retry_interval_milliseconds: DEFAULT_RETRY_INTERVAL.as_millis() as i64,
            dialog_id: DEFAULT_DIALOG_ID.to_string(),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<RawReconnectionOptions> for ReconnectionOptions {
    type Error = ConfigError;

    fn try_from(raw: RawReconnectionOptions) -> Result<Self, Self::Error> {
        let max_retries = u32::try_from(raw.max_retries)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidMaxRetries {
                value: raw.max_retries,
            })?;
        let interval = u64::try_from(raw.retry_interval_milliseconds).map_err(|_| {
            ConfigError::NegativeRetryInterval {
                value: raw.retry_interval_milliseconds,
            }
        })?;

        ReconnectionOptions::builder()
            .max_retries(max_retries)
            .retry_interval_ms(interval)
            .dialog_id(raw.dialog_id)
            .build()
    }
}
