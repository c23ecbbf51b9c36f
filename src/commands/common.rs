//! Shared command plumbing: logging setup and input validation.

use clap::ValueEnum;
use regex::Regex;

use crate::Result;
use anyhow::{Context, bail};

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Initialize the logger based on the requested level.
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

/// Component names end up in filesystem paths and clone URLs, so they are
/// restricted to a conservative character set.
pub fn validate_component_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        bail!("component name cannot be empty");
    }

    let pattern = Regex::new(r"^[a-zA-Z0-9._-]{1,100}$").context("compiling component name pattern")?;
    for name in names {
        if !pattern.is_match(name) {
            bail!("invalid component name '{name}': must be 1-100 chars, alphanumeric with .-_ only");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_component_names() {
        let names = vec!["billing".to_string(), "checkout-v2".to_string(), "svc.internal_api".to_string()];
        validate_component_names(&names).unwrap();
    }

    #[test]
    fn test_empty_list_is_rejected() {
        let err = validate_component_names(&[]).unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_invalid_characters_are_rejected() {
        let names = vec!["bad name".to_string()];
        let err = validate_component_names(&names).unwrap_err();
        assert!(err.to_string().contains("invalid component name"));
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let names = vec!["x".repeat(101)];
        let _ = validate_component_names(&names).unwrap_err();
    }
}
