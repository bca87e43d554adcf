// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types returned by the buffer facade.

use std::fmt;
use thiserror::Error;

/// Facade operation that produced a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `Buffer::push`
    Push,
    /// `Buffer::flush`
    Flush,
    /// `Buffer::close`
    Close,
}

impl Operation {
    /// Operation name as it appears in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Flush => "flush",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid buffer configuration, reported on first use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("size cannot be zero")]
    InvalidSize,

    #[error("sink is not set")]
    MissingSink,

    #[error("interval cannot be negative ({0})")]
    InvalidInterval(&'static str),

    #[error("timeout cannot be negative ({0})")]
    InvalidTimeout(&'static str),
}

/// Errors returned by `Buffer::push`, `Buffer::flush` and `Buffer::close`.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The worker has terminated; the buffer can no longer be used.
    #[error("buffer is closed")]
    Closed,

    /// A bounded wait expired. The request may still be in flight.
    #[error("{}", timeout_message(.op))]
    Timeout { op: Operation },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

fn timeout_message(op: &Operation) -> &'static str {
    match op {
        Operation::Push => "buffer is full: push timed out",
        Operation::Flush => "failed to flush buffer within flush timeout",
        Operation::Close => "failed to close buffer within close timeout",
    }
}

impl BufferError {
    /// True for `Timeout`; the call can be retried.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// True for `Closed`; the buffer must be replaced.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Errors loading `BufferSettings` from YAML.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_field() {
        let err = ConfigError::InvalidTimeout("close_timeout");
        assert_eq!(err.to_string(), "timeout cannot be negative (close_timeout)");

        let err = ConfigError::InvalidInterval("flush_interval");
        assert_eq!(err.to_string(), "interval cannot be negative (flush_interval)");
    }

    #[test]
    fn test_timeout_is_distinguishable_from_closed() {
        let timeout = BufferError::Timeout { op: Operation::Push };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_closed());
        assert!(timeout.to_string().contains("buffer is full"));

        let closed = BufferError::Closed;
        assert!(closed.is_closed());
        assert!(!closed.is_timeout());
    }

    #[test]
    fn test_config_error_converts() {
        let err: BufferError = ConfigError::InvalidSize.into();
        assert!(matches!(err, BufferError::Config(ConfigError::InvalidSize)));
        assert_eq!(err.to_string(), "invalid configuration: size cannot be zero");
    }
}
