//! Plugrun - plugin execution runtime for workflow CLIs.
//!
//! Routes sub-commands and workflow events to installed plugins and gives
//! plugins access to their envstore.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plugrun::plugin::{PluginInput, ENVSTORE_PATH_KEY};
use plugrun::{Config, EnvStore, Plugin, PluginEngine, PluginRoute};

/// Plugin execution runtime for workflow CLIs
#[derive(Parser)]
#[command(name = "plugrun")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// CI mode: never check for plugin updates
    #[arg(long, global = true)]
    ci: bool,

    /// Data directory (routes, update-check state, plugins)
    #[arg(long, global = true, env = "PLUGRUN_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a plugin as a sub-command
    Run {
        /// Plugin name
        plugin: String,

        /// Arguments passed to the plugin
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a plugin in trigger mode
    Trigger {
        /// Plugin name
        plugin: String,

        /// Plugin input (KEY=VALUE)
        #[arg(short, long)]
        input: Vec<String>,
    },

    /// Manage plugin routes
    Route {
        #[command(subcommand)]
        operation: RouteOperation,
    },

    /// Read and write an envstore (for use from inside plugins)
    Envstore {
        #[command(subcommand)]
        operation: EnvstoreOperation,
    },
}

#[derive(Subcommand)]
enum RouteOperation {
    /// List routed plugins
    List,

    /// Register an installed plugin
    Add {
        /// Plugin name
        name: String,

        /// Where the plugin was installed from
        #[arg(short, long, default_value = "local")]
        source: String,

        /// Installed version
        #[arg(long, default_value = "")]
        version: String,
    },
}

#[derive(Subcommand)]
enum EnvstoreOperation {
    /// Create an empty envstore
    Init {
        /// Envstore path
        #[arg(short, long, env = ENVSTORE_PATH_KEY)]
        path: PathBuf,
    },

    /// Add an entry
    Add {
        /// Entry key
        #[arg(short, long)]
        key: String,

        /// Entry value
        #[arg(long)]
        value: String,

        /// Envstore path
        #[arg(short, long, env = ENVSTORE_PATH_KEY)]
        path: PathBuf,
    },

    /// Print the envstore as JSON
    Print {
        /// Envstore path
        #[arg(short, long, env = ENVSTORE_PATH_KEY)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout belongs to the plugin
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { plugin, args } => {
            let (mut engine, plugin) = load_engine(cli.ci, cli.data_dir, &plugin)?;
            print_output(engine.run_by_command(&plugin, &args)?);
        }
        Commands::Trigger { plugin, input } => {
            let input = parse_input(&input)?;
            let (mut engine, plugin) = load_engine(cli.ci, cli.data_dir, &plugin)?;
            print_output(engine.run_by_event(&plugin, input)?);
        }
        Commands::Route { operation } => {
            cmd_route(operation, cli.ci, cli.data_dir)?;
        }
        Commands::Envstore { operation } => {
            cmd_envstore(operation)?;
        }
    }

    Ok(())
}

fn load_config(ci: bool, data_dir: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if ci {
        config.general.ci = true;
    }
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => config.data_dir()?,
    };
    Ok((config, data_dir))
}

fn load_engine(ci: bool, data_dir: Option<PathBuf>, name: &str) -> Result<(PluginEngine, Plugin)> {
    let (config, data_dir) = load_config(ci, data_dir)?;
    let engine = PluginEngine::from_config(&config, &data_dir)?;

    // Without a route the engine reports the plugin as unrouted.
    let plugin = engine
        .routes()
        .read_route(name)?
        .map_or_else(|| Plugin::new(name), |route| route.to_plugin());

    Ok((engine, plugin))
}

fn print_output(output: Option<String>) {
    if let Some(output) = output {
        println!("{}", output);
    }
}

fn parse_input(pairs: &[String]) -> Result<PluginInput> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid input '{}', expected KEY=VALUE", pair))
        })
        .collect()
}

fn cmd_route(operation: RouteOperation, ci: bool, data_dir: Option<PathBuf>) -> Result<()> {
    let (config, data_dir) = load_config(ci, data_dir)?;
    let mut engine = PluginEngine::from_config(&config, &data_dir)?;

    match operation {
        RouteOperation::List => {
            let routes = engine.routes().routes()?;
            if routes.is_empty() {
                println!("No plugins routed.");
                return Ok(());
            }

            for route in &routes {
                let version = if route.version.is_empty() { "-" } else { route.version.as_str() };
                print!("  {} {} ({})", route.name, version, route.source);
                if route.has_pending_update() {
                    print!(" [update available: {}]", route.latest_available_version);
                }
                println!();
            }
            println!("\nTotal: {} plugin(s)", routes.len());
        }
        RouteOperation::Add { name, source, version } => {
            engine.routes_mut().write_route(PluginRoute::new(&name, source, version))?;
            println!("Routed plugin '{}'", name);
        }
    }

    Ok(())
}

fn cmd_envstore(operation: EnvstoreOperation) -> Result<()> {
    match operation {
        EnvstoreOperation::Init { path } => {
            EnvStore::init(path)?;
        }
        EnvstoreOperation::Add { key, value, path } => {
            EnvStore::open(path)?.add(&key, &value)?;
        }
        EnvstoreOperation::Print { path } => {
            println!("{}", EnvStore::open(path)?.to_json()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_input() {
        let input = parse_input(&["A=1".to_string(), "B=x=y".to_string()]).unwrap();
        assert_eq!(input["A"], "1");
        assert_eq!(input["B"], "x=y");

        assert!(parse_input(&["missing".to_string()]).is_err());
    }

    #[test]
    fn test_run_keeps_hyphenated_args() {
        let cli = Cli::try_parse_from(["plugrun", "run", "alpha", "--flag", "value"]).unwrap();
        match cli.command {
            Commands::Run { plugin, args } => {
                assert_eq!(plugin, "alpha");
                assert_eq!(args, vec!["--flag", "value"]);
            }
            _ => panic!("expected run"),
        }
    }
}
