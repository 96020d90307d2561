//! # Global runtime configuration.
//!
//! [`Config`] holds the few knobs shared across components: the serial key
//! used when a call does not name one, and the dedicated serial key that
//! cache probes run under.
//!
//! # Example
//! ```
//! use taskbus::Config;
//!
//! let mut cfg = Config::default();
//! cfg.default_serial = "user-service".into();
//!
//! assert_eq!(cfg.probe_serial, "cache-probe");
//! ```

use std::borrow::Cow;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug)]
pub struct Config {
    /// Serial key used for calls that do not specify one.
    pub default_serial: Cow<'static, str>,
    /// Serial key that stale-value cache probes run under. Kept separate so
    /// a hot method queue cannot delay cached deliveries.
    pub probe_serial: Cow<'static, str>,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `default_serial = "default"`
    /// - `probe_serial = "cache-probe"`
    fn default() -> Self {
        Self {
            default_serial: Cow::Borrowed("default"),
            probe_serial: Cow::Borrowed("cache-probe"),
        }
    }
}
