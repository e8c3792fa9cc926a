//! Command line glue around [`resampla_image`]: logging setup, the optional config file and batch resizing.
use ::std::str::FromStr;

pub mod batch;
#[cfg(feature = "config")]
pub mod config;

pub use crate::batch::{Batch, BatchOptions, BatchSummary};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Info and above
    #[default]
    Info = 0,
    /// Warnings and above
    Warn = 1,
    /// Errors and above
    Error = 2,
    /// No logging
    Silent = 3,
}
impl LogLevel {
    /// `tracing-subscriber` filter directive
    #[inline]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Silent => "off",
        }
    }
}
impl From<u8> for LogLevel {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Info,
            1 => Self::Warn,
            2 => Self::Error,
            _ => Self::Silent,
        }
    }
}
impl FromStr for LogLevel {
    type Err = String;
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "silent" => Ok(Self::Silent),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log to stderr, `RUST_LOG` takes precedence over `level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(level: LogLevel) -> bool {
    let filter = ::tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| ::tracing_subscriber::EnvFilter::new(level.directive()));
    ::tracing_subscriber::fmt().with_env_filter(filter).with_writer(::std::io::stderr).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_count_maps_to_level() {
        assert_eq!(LogLevel::from(0), LogLevel::Info);
        assert_eq!(LogLevel::from(2), LogLevel::Error);
        assert_eq!(LogLevel::from(9), LogLevel::Silent);
        assert_eq!(LogLevel::Silent.directive(), "off");
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
