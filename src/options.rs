//! Run options and their validation.
//!
//! Options can be built in code or parsed from JSON:
//!
//! ```json
//! { "waitForItems": true, "waitTimeout": 5000, "checkInterval": 250 }
//! ```
//!
//! Durations are milliseconds. Unknown keys are rejected, and a `waitTimeout`
//! of `0` means "wait indefinitely".

use crate::error::{WaterfallError, WaterfallResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling period used while waiting for new jobs, unless overridden.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

/// Options for a single `exec` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRunOptions", into = "RawRunOptions")]
pub struct RunOptions {
    /// Keep the run alive when the queue empties and poll for new jobs.
    pub wait_for_items: bool,
    /// Fail the run if no job shows up within this long while waiting.
    pub wait_timeout: Option<Duration>,
    /// How often the queue is checked while waiting.
    pub check_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            wait_for_items: false,
            wait_timeout: None,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl RunOptions {
    pub fn with_wait_for_items(mut self, wait_for_items: bool) -> Self {
        self.wait_for_items = wait_for_items;
        self
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = Some(wait_timeout);
        self
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Reject option values the executor cannot honor.
    pub fn validate(&self) -> WaterfallResult<()> {
        self.check().map_err(WaterfallError::invalid_options)
    }

    fn check(&self) -> Result<(), &'static str> {
        if self.check_interval.is_zero() {
            return Err("checkInterval must be greater than zero");
        }
        if self.wait_timeout.is_some_and(|t| t.is_zero()) {
            return Err("waitTimeout must be greater than zero (omit it to wait indefinitely)");
        }
        Ok(())
    }

    /// Parse and validate options from a JSON value.
    ///
    /// `null` yields the defaults.
    pub fn from_json_value(value: serde_json::Value) -> WaterfallResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| WaterfallError::invalid_options(e.to_string()))
    }

    pub fn from_json_str(raw: &str) -> WaterfallResult<Self> {
        serde_json::from_str(raw).map_err(|e| WaterfallError::invalid_options(e.to_string()))
    }
}

/// Wire shape of [`RunOptions`].
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRunOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wait_for_items: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wait_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check_interval: Option<u64>,
}

impl TryFrom<RawRunOptions> for RunOptions {
    type Error = &'static str;

    fn try_from(raw: RawRunOptions) -> Result<Self, Self::Error> {
        let options = RunOptions {
            wait_for_items: raw.wait_for_items.unwrap_or(false),
            wait_timeout: raw
                .wait_timeout
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            check_interval: raw
                .check_interval
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CHECK_INTERVAL),
        };
        options.check()?;
        Ok(options)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<RunOptions> for RawRunOptions {
    fn from(options: RunOptions) -> Self {
        RawRunOptions {
            wait_for_items: Some(options.wait_for_items),
            wait_timeout: options.wait_timeout.map(saturating_millis),
            check_interval: Some(saturating_millis(options.check_interval)),
        }
    }
}
