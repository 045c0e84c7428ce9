//! CLI argument definitions for the civic assistant.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Civic services assistant: intent router and chat transcripts over HTTP.
#[derive(Parser, Debug)]
#[command(name = "civic", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Persist transcripts in this SQLite file instead of the configured backend.
    #[arg(long = "sqlite", global = true)]
    pub sqlite: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Write a default configuration file to the resolved config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long = "force")]
        force: bool,
    },
    /// Route a single query and print the response as JSON.
    Ask {
        query: String,
        /// Department context: home, tax, vehicle, benefits, housing or waste.
        #[arg(short = 'd', long = "department", default_value = "home")]
        department: String,
    },
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CIVIC_CONFIG env var > ~/.civic/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CIVIC_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > CIVIC_PORT env var > config file value > 3040.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("CIVIC_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3040
    }

    /// Tracing filter forced by the environment of this run.
    ///
    /// Priority: --log-level flag > RUST_LOG. `None` defers to the config
    /// file's `general.log_level`.
    pub fn log_override(&self) -> Option<String> {
        if let Some(ref level) = self.log_level {
            return Some(level.clone());
        }
        std::env::var("RUST_LOG")
            .ok()
            .filter(|filter| !filter.trim().is_empty())
    }
}

fn default_config_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".civic").join("config.toml"),
        Err(_) => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults_to_serve() {
        let args = parse(&["civic"]);
        assert_eq!(args.command(), Command::Serve);
        assert!(args.sqlite.is_none());
    }

    #[test]
    fn test_ask_subcommand() {
        let args = parse(&["civic", "ask", "where is my refund", "--department", "tax"]);
        assert_eq!(
            args.command(),
            Command::Ask {
                query: "where is my refund".to_string(),
                department: "tax".to_string(),
            }
        );
    }

    #[test]
    fn test_ask_defaults_to_home() {
        let args = parse(&["civic", "ask", "hello"]);
        match args.command() {
            Command::Ask { department, .. } => assert_eq!(department, "home"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["civic", "serve", "--port", "8080", "--sqlite", "/tmp/civic.db"]);
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.sqlite, Some(PathBuf::from("/tmp/civic.db")));
    }

    #[test]
    fn test_init_subcommand() {
        assert_eq!(parse(&["civic", "init"]).command(), Command::Init { force: false });
        assert_eq!(
            parse(&["civic", "init", "--force"]).command(),
            Command::Init { force: true }
        );
    }

    #[test]
    fn test_port_flag_wins() {
        let args = parse(&["civic", "--port", "9000"]);
        assert_eq!(args.resolve_port(3040), 9000);
    }

    #[test]
    fn test_config_flag_wins() {
        let args = parse(&["civic", "-c", "/etc/civic.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/civic.toml"));
    }

    #[test]
    fn test_log_level_flag_wins() {
        let args = parse(&["civic", "--log-level", "debug"]);
        assert_eq!(args.log_override().as_deref(), Some("debug"));
    }
}
