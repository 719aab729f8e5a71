//! # Configuration
//!
//! Controller and server settings loaded from environment variables.

mod controller;
mod duration;
mod server;

pub use controller::{ControllerConfig, TokenPolicy};
pub use duration::parse_kubernetes_duration;
pub use server::ServerConfig;

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_default() {
        let lookup = |key: &str| match key {
            "PORT" => Some(" 9090 ".to_string()),
            "BROKEN" => Some("not-a-number".to_string()),
            _ => None,
        };
        assert_eq!(env_var_or_default(&lookup, "PORT", 8080u16), 9090);
        assert_eq!(env_var_or_default(&lookup, "BROKEN", 8080u16), 8080);
        assert_eq!(env_var_or_default(&lookup, "MISSING", 8080u16), 8080);
    }
}
