#![deny(unsafe_code)]

//! ZenGarden CLI: run patterns on a serial pen plotter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use zengarden_config::AppConfig;
use zengarden_core::session::{self, Program};
use zengarden_core::{PatternKind, SerialConnector, TerminalKeyboard, logging, patterns};

/// ZenGarden: draw patterns on a G-code pen plotter.
#[derive(Parser)]
#[command(name = "zengarden", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "zengarden.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Serial port, overriding the configuration.
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate, overriding the configuration.
    #[arg(long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alternate the circle and spiral patterns until Q is pressed.
    Demo,

    /// Draw a single pattern.
    Run {
        /// Pattern name (see `zengarden patterns`).
        #[arg(value_parser = parse_pattern)]
        pattern: PatternKind,
    },

    /// Jog with the arrow keys; number keys start patterns.
    Manual,

    /// List the patterns and manual-mode keys.
    Patterns,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli.config)?;
    let from_file = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    apply_overrides(&mut config, &cli)?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    logging::init(filter);
    if !from_file {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Demo => cmd_plot(&config, Program::Demo)?,
        Commands::Run { pattern } => cmd_plot(&config, Program::Pattern(pattern))?,
        Commands::Manual => cmd_plot(&config, Program::Manual)?,
        Commands::Patterns => print_help(),
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

fn cmd_plot(config: &AppConfig, program: Program) -> Result<()> {
    print_help();

    let connector = SerialConnector::new(Duration::from_millis(config.serial.timeout_ms));
    let keyboard =
        TerminalKeyboard::new().context("could not switch the terminal to raw mode")?;
    let outcome = session::run(&connector, keyboard, config, program)?;

    info!(?outcome, "Finished");
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn print_help() {
    for line in patterns::help() {
        println!("{line}");
    }
    println!();
}

fn parse_pattern(s: &str) -> Result<PatternKind, String> {
    s.parse().map_err(|e| {
        let names: Vec<&str> = PatternKind::ALL.iter().map(|k| k.name()).collect();
        format!("{e}, expected one of: {}", names.join(", "))
    })
}

/// The configuration at `path`, or `None` if there is no such file.
fn load_config(path: &Path) -> Result<Option<AppConfig>> {
    if path.exists() {
        AppConfig::load(path)
            .map(Some)
            .map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(None)
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) -> Result<()> {
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use zengarden_test_utils::config::TempConfig;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_pattern() {
        let cli = Cli::try_parse_from(["zengarden", "run", "box-to-center"]).unwrap();
        match cli.command {
            Commands::Run { pattern } => assert_eq!(pattern, PatternKind::BoxToCenter),
            _ => panic!("expected run"),
        }
        assert_eq!(cli.config, PathBuf::from("zengarden.toml"));
    }

    #[test]
    fn test_unknown_pattern_is_rejected() {
        let err = Cli::try_parse_from(["zengarden", "run", "spirograph"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("circle"));
    }

    #[test]
    fn test_port_override() {
        let cli = Cli::try_parse_from([
            "zengarden", "demo", "--port", "/dev/ttyACM0", "--baud", "115200",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115200);
    }

    #[test]
    fn test_zero_baud_override_is_rejected() {
        let cli = Cli::try_parse_from(["zengarden", "manual", "--baud", "0"]).unwrap();
        let mut config = AppConfig::default();
        assert!(apply_overrides(&mut config, &cli).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let file = TempConfig::with_toml("[serial]\nport = \"COM3\"\n");
        let config = load_config(file.path()).unwrap().unwrap();
        assert_eq!(config.serial.port, "COM3");
    }

    #[test]
    fn test_missing_config_is_none() {
        let loaded = load_config(Path::new("/nonexistent/zengarden.toml")).unwrap();
        assert!(loaded.is_none());
        let config = loaded.unwrap_or_default();
        assert_eq!(config.serial.port, "COM8");
        assert_eq!(config.serial.baud_rate, 57600);
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let file = TempConfig::with_toml("[serial]\nbaud_rate = 0\n");
        assert!(load_config(file.path()).is_err());
    }
}
