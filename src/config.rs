// ============================================================================
// CONFIGURATION
// ============================================================================
// Two small pieces of configuration:
// - FetchOptions: how the fetcher reacts to a tcp_info length mismatch
// - DemoConfig: command-line options of the `tcpinfo` demo binary
//
// Both have sensible defaults; nothing is read from files.

use std::fmt;
use std::net::SocketAddr;

use serde::Serialize;

/// Environment variable that switches the fetcher to strict layout checking
pub const STRICT_LAYOUT_ENV: &str = "TCPINFO_STRICT_LAYOUT";

/// Default bind address of the demo listener (ephemeral loopback port)
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:0";

/// What to do when the kernel returns a different `tcp_info` length than
/// the compiled-in layout expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MismatchPolicy {
    /// Log a warning and extract whatever fields fit; snapshot is marked partial
    #[default]
    Lenient,
    /// Fail the fetch with `FetchError::LayoutMismatch`
    Strict,
}

/// Options for a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FetchOptions {
    pub mismatch: MismatchPolicy,
}

impl FetchOptions {
    /// Strict layout checking
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            mismatch: MismatchPolicy::Strict,
        }
    }

    /// Options from `TCPINFO_STRICT_LAYOUT` (`1`/`true`/`yes` → strict)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(STRICT_LAYOUT_ENV).ok().as_deref())
    }

    /// Parse the value of `TCPINFO_STRICT_LAYOUT`; unset or anything else is lenient
    #[must_use]
    pub fn from_env_value(value: Option<&str>) -> Self {
        let strict = value.is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        });

        if strict {
            Self::strict()
        } else {
            Self::default()
        }
    }
}

// ============================================================================
// DEMO BINARY CONFIGURATION
// ============================================================================

/// Invalid command-line input for the demo binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Bind address did not parse as `ip:port`
    InvalidAddress(String),
    /// Flag the binary does not know
    UnknownFlag(String),
    /// More than one positional argument
    UnexpectedArgument(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress(addr) => {
                write!(f, "invalid bind address '{addr}' (expected ip:port)")
            }
            ConfigError::UnknownFlag(flag) => write!(f, "unknown flag '{flag}'"),
            ConfigError::UnexpectedArgument(arg) => write!(f, "unexpected argument '{arg}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// `tcpinfo [bind_addr] [--strict] [--no-client] [--compact]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Where the demo listener binds
    pub bind_addr: SocketAddr,
    /// Also connect a client and accept it, to show ESTABLISHED sockets
    pub connect_client: bool,
    /// Single-line JSON instead of pretty-printed
    pub compact: bool,
    pub fetch: FetchOptions,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            connect_client: true,
            compact: false,
            fetch: FetchOptions::default(),
        }
    }
}

impl DemoConfig {
    /// Parse arguments (without the program name)
    ///
    /// `base` supplies defaults, typically `FetchOptions::from_env()` wrapped
    /// in a default config, so that `--strict` can only tighten the policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown flags, a malformed address, or
    /// more than one address.
    pub fn parse<I, S>(args: I, base: DemoConfig) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = base;
        let mut addr_seen = false;

        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--strict" => config.fetch = FetchOptions::strict(),
                "--no-client" => config.connect_client = false,
                "--compact" => config.compact = true,
                flag if flag.starts_with("--") => {
                    return Err(ConfigError::UnknownFlag(flag.to_owned()));
                }
                addr if !addr_seen => {
                    config.bind_addr = addr
                        .parse()
                        .map_err(|_| ConfigError::InvalidAddress(addr.to_owned()))?;
                    addr_seen = true;
                }
                extra => return Err(ConfigError::UnexpectedArgument(extra.to_owned())),
            }
        }

        Ok(config)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_lenient() {
        assert_eq!(FetchOptions::default().mismatch, MismatchPolicy::Lenient);
        assert_eq!(FetchOptions::strict().mismatch, MismatchPolicy::Strict);
    }

    #[test]
    fn test_env_value() {
        assert_eq!(FetchOptions::from_env_value(None), FetchOptions::default());
        assert_eq!(FetchOptions::from_env_value(Some("1")), FetchOptions::strict());
        assert_eq!(FetchOptions::from_env_value(Some(" TRUE ")), FetchOptions::strict());
        assert_eq!(FetchOptions::from_env_value(Some("0")), FetchOptions::default());
        assert_eq!(FetchOptions::from_env_value(Some("")), FetchOptions::default());
    }

    #[test]
    fn test_parse_defaults() {
        let config = DemoConfig::parse(Vec::<String>::new(), DemoConfig::default()).unwrap();
        assert_eq!(config, DemoConfig::default());
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_parse_all_options() {
        let config = DemoConfig::parse(
            ["127.0.0.1:9000", "--strict", "--no-client", "--compact"],
            DemoConfig::default(),
        )
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert!(!config.connect_client);
        assert!(config.compact);
        assert_eq!(config.fetch.mismatch, MismatchPolicy::Strict);
    }

    #[test]
    fn test_parse_errors() {
        let base = DemoConfig::default;
        assert_eq!(
            DemoConfig::parse(["--verbose"], base()),
            Err(ConfigError::UnknownFlag("--verbose".into()))
        );
        assert_eq!(
            DemoConfig::parse(["localhost"], base()),
            Err(ConfigError::InvalidAddress("localhost".into()))
        );
        assert_eq!(
            DemoConfig::parse(["127.0.0.1:1", "127.0.0.1:2"], base()),
            Err(ConfigError::UnexpectedArgument("127.0.0.1:2".into()))
        );
    }

    #[test]
    fn test_strict_base_is_kept() {
        let base = DemoConfig {
            fetch: FetchOptions::strict(),
            ..DemoConfig::default()
        };
        let config = DemoConfig::parse(["--compact"], base).unwrap();
        assert_eq!(config.fetch, FetchOptions::strict());
    }
}
