//! Command-line interface configuration.

use argh::FromArgs;
use std::net::SocketAddr;
use tracing::Level;

/// A demo HTTP server that writes one access log line per request
#[derive(Debug, FromArgs)]
pub struct Cli {
    /// server bind address (default: '127.0.0.1:8000')
    #[argh(option, default = "default_bind()")]
    pub bind: SocketAddr,

    /// do not log requests answered with a 2xx status
    #[argh(switch)]
    pub skip_2xx: bool,

    /// compact colored lines instead of structured fields
    #[argh(switch)]
    pub pretty: bool,

    /// maximum log level: error, warn, info, debug or trace (default: 'info')
    #[argh(option, long = "log-level", default = "Level::INFO", from_str_fn(parse_level))]
    pub log_level: Level,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn parse_level(value: &str) -> Result<Level, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::from_args(&["access-log"], &[]).unwrap();
        assert_eq!(cli.bind, default_bind());
        assert!(!cli.skip_2xx);
        assert!(!cli.pretty);
        assert_eq!(cli.log_level, Level::INFO);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::from_args(
            &["access-log"],
            &["--skip-2xx", "--pretty", "--log-level", "warn", "--bind", "0.0.0.0:9000"],
        )
        .unwrap();
        assert!(cli.skip_2xx);
        assert!(cli.pretty);
        assert_eq!(cli.log_level, Level::WARN);
        assert_eq!(cli.bind.port(), 9000);
    }

    #[test]
    fn test_rejects_unknown_level() {
        assert!(Cli::from_args(&["access-log"], &["--log-level", "loud"]).is_err());
    }
}
