// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer configuration and its validation.
//!
//! [`BufferSettings`] is the plain configuration record. Durations are signed
//! millisecond counts so that values coming from a YAML file can be negative
//! and get rejected on first use of the buffer instead of failing to
//! parse.
//!
//! ```yaml
//! capacity: 500
//! flush_interval_ms: 2000   # 0 disables time-based flushing
//! push_timeout_ms: 1000
//! flush_timeout_ms: 1000
//! close_timeout_ms: 5000
//! ```

use crate::error::{ConfigError, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default for each of the three facade timeouts.
pub const DEFAULT_TIMEOUT_MS: i64 = 1000;

/// Buffer configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Items per batch. Reaching it triggers a flush. Must be nonzero.
    pub capacity: usize,
    /// Time since the last flush after which a non-empty batch is flushed.
    /// 0 disables time-based flushing.
    pub flush_interval_ms: i64,
    /// How long `push` waits for the worker to take an item.
    pub push_timeout_ms: i64,
    /// How long `flush` waits for the worker to take the request.
    pub flush_timeout_ms: i64,
    /// How long each of the two waits in `close` may take.
    pub close_timeout_ms: i64,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity: 0,
            flush_interval_ms: 0,
            push_timeout_ms: DEFAULT_TIMEOUT_MS,
            flush_timeout_ms: DEFAULT_TIMEOUT_MS,
            close_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl BufferSettings {
    /// Parse settings from a YAML string. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let settings: BufferSettings = serde_yaml::from_str(yaml)?;
        Ok(settings)
    }

    /// Parse settings from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check every field and convert to the form the worker runs with.
    ///
    /// All rules are evaluated and each violation is logged; the first one,
    /// in field order, is returned.
    pub(crate) fn validate(&self, has_sink: bool) -> Result<Timings, ConfigError> {
        let checks = [
            (self.capacity == 0, ConfigError::InvalidSize),
            (!has_sink, ConfigError::MissingSink),
            (
                self.flush_interval_ms < 0,
                ConfigError::InvalidInterval("flush_interval"),
            ),
            (
                self.push_timeout_ms < 0,
                ConfigError::InvalidTimeout("push_timeout"),
            ),
            (
                self.flush_timeout_ms < 0,
                ConfigError::InvalidTimeout("flush_timeout"),
            ),
            (
                self.close_timeout_ms < 0,
                ConfigError::InvalidTimeout("close_timeout"),
            ),
        ];

        let mut first = None;
        for (failed, err) in checks {
            if failed {
                log::warn!("[flushbuf] invalid configuration: {}", err);
                if first.is_none() {
                    first = Some(err);
                }
            }
        }
        if let Some(err) = first {
            return Err(err);
        }

        Ok(Timings {
            capacity: self.capacity,
            flush_interval: match self.flush_interval_ms {
                0 => None,
                ms => Some(ms_to_duration(ms)),
            },
            push_timeout: ms_to_duration(self.push_timeout_ms),
            flush_timeout: ms_to_duration(self.flush_timeout_ms),
            close_timeout: ms_to_duration(self.close_timeout_ms),
        })
    }
}

/// Validated settings, immutable once the worker starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timings {
    pub capacity: usize,
    /// `None` when time-based flushing is disabled.
    pub flush_interval: Option<Duration>,
    pub push_timeout: Duration,
    pub flush_timeout: Duration,
    pub close_timeout: Duration,
}

/// Millisecond resolution. A nonzero duration shorter than 1ms rounds up so
/// it never reads as "disabled".
pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
    if duration.is_zero() {
        return 0;
    }
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX).max(1)
}

fn ms_to_duration(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> BufferSettings {
        BufferSettings {
            capacity: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = BufferSettings::default();
        assert_eq!(settings.capacity, 0);
        assert_eq!(settings.flush_interval_ms, 0);
        assert_eq!(settings.push_timeout_ms, 1000);
        assert_eq!(settings.flush_timeout_ms, 1000);
        assert_eq!(settings.close_timeout_ms, 1000);
    }

    #[test]
    fn test_validate_ok() {
        let timings = valid().validate(true).expect("valid settings");
        assert_eq!(timings.capacity, 10);
        assert_eq!(timings.flush_interval, None);
        assert_eq!(timings.push_timeout, Duration::from_secs(1));
        assert_eq!(timings.close_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let settings = BufferSettings::default();
        assert_eq!(settings.validate(true), Err(ConfigError::InvalidSize));
    }

    #[test]
    fn test_validate_missing_sink() {
        assert_eq!(valid().validate(false), Err(ConfigError::MissingSink));
    }

    #[test]
    fn test_validate_reports_first_failure_in_field_order() {
        let settings = BufferSettings {
            capacity: 0,
            flush_interval_ms: -1,
            ..Default::default()
        };
        assert_eq!(settings.validate(false), Err(ConfigError::InvalidSize));

        let settings = BufferSettings {
            flush_interval_ms: -1,
            close_timeout_ms: -1,
            ..valid()
        };
        assert_eq!(
            settings.validate(true),
            Err(ConfigError::InvalidInterval("flush_interval"))
        );
    }

    #[test]
    fn test_validate_negative_timeouts() {
        let cases = [
            (
                BufferSettings {
                    push_timeout_ms: -1,
                    ..valid()
                },
                "push_timeout",
            ),
            (
                BufferSettings {
                    flush_timeout_ms: -1,
                    ..valid()
                },
                "flush_timeout",
            ),
            (
                BufferSettings {
                    close_timeout_ms: -5,
                    ..valid()
                },
                "close_timeout",
            ),
        ];
        for (settings, field) in cases {
            assert_eq!(
                settings.validate(true),
                Err(ConfigError::InvalidTimeout(field))
            );
        }
    }

    #[test]
    fn test_positive_interval_enables_timer() {
        let settings = BufferSettings {
            flush_interval_ms: 250,
            ..valid()
        };
        let timings = settings.validate(true).unwrap();
        assert_eq!(timings.flush_interval, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_duration_to_ms_rounds_up_submillisecond() {
        assert_eq!(duration_to_ms(Duration::ZERO), 0);
        assert_eq!(duration_to_ms(Duration::from_micros(10)), 1);
        assert_eq!(duration_to_ms(Duration::from_millis(1500)), 1500);
    }

    #[test]
    fn test_from_yaml_partial() {
        let settings = BufferSettings::from_yaml("capacity: 64\nflush_interval_ms: 200\n")
            .expect("parse yaml");
        assert_eq!(settings.capacity, 64);
        assert_eq!(settings.flush_interval_ms, 200);
        assert_eq!(settings.push_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_from_yaml_negative_values_parse_then_fail_validation() {
        let settings =
            BufferSettings::from_yaml("capacity: 1\nflush_timeout_ms: -10\n").expect("parse yaml");
        assert_eq!(
            settings.validate(true),
            Err(ConfigError::InvalidTimeout("flush_timeout"))
        );
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(matches!(
            BufferSettings::from_yaml("capacity: [not, a, number]"),
            Err(SettingsError::Yaml(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capacity: 3").unwrap();
        writeln!(file, "close_timeout_ms: 5000").unwrap();

        let settings = BufferSettings::from_file(file.path()).expect("read settings");
        assert_eq!(settings.capacity, 3);
        assert_eq!(settings.close_timeout_ms, 5000);
    }

    #[test]
    fn test_from_missing_file() {
        let result = BufferSettings::from_file(Path::new("/nonexistent/flushbuf.yaml"));
        assert!(matches!(result, Err(SettingsError::Io(_))));
    }
}
