use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "deskcal", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the live calendar gateway
    Serve {
        /// Gateway host
        #[arg(long)]
        host: Option<String>,

        /// Gateway port
        #[arg(short, long)]
        port: Option<u16>,

        /// Development mode (verbose logging)
        #[arg(short, long)]
        dev: bool,
    },

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::parse_from(["deskcal", "serve", "--port", "9000", "--dev"]);
        match cli.command {
            Some(Commands::Serve { host, port, dev }) => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
                assert!(dev);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_path() {
        let cli = Cli::parse_from(["deskcal", "check-config", "-c", "/tmp/deskcal.yaml"]);
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
        assert_eq!(cli.config_path.as_deref(), Some("/tmp/deskcal.yaml"));
    }
}
