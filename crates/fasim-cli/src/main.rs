#![forbid(unsafe_code)]

mod cmd;
mod output;
mod payload;

use clap::{Parser, Subcommand};
use cmd::Globals;
use cmd::facility::FacilityCommand;
use cmd::item::ItemCommand;
use cmd::pipeline::PipelineCommand;
use output::{CliError, OutputMode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "fasim: manufacturing catalog for items, facilities, and pipelines",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Database file (overrides config files and `FASIM_DB`).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Abort the command once this many milliseconds have elapsed.
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn globals(&self) -> Globals {
        Globals {
            db: self.db.clone(),
            timeout_ms: self.timeout_ms,
            output: output::resolve_output_mode(self.json),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Store",
        about = "Create the database and apply the schema",
        after_help = "EXAMPLES:\n    # Create fasim.db in the current directory\n    fasim init-db\n\n    # Use an explicit database file\n    fasim --db /tmp/catalog.db init-db"
    )]
    InitDb,

    #[command(
        next_help_heading = "Store",
        about = "Apply pending schema migrations",
        after_help = "EXAMPLES:\n    # Upgrade the configured database\n    fasim migrate\n\n    # Emit machine-readable output\n    fasim migrate --json"
    )]
    Migrate,

    #[command(
        next_help_heading = "Catalog",
        about = "Manage items",
        after_help = "EXAMPLES:\n    # Create an item\n    fasim item create --name \"Iron Ore\"\n\n    # List items as JSON\n    fasim item list --json"
    )]
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },

    #[command(
        next_help_heading = "Catalog",
        about = "Manage facilities",
        after_help = "EXAMPLES:\n    # Create a facility from a payload file\n    fasim facility create --file smelter.json\n\n    # Read the payload from stdin\n    cat smelter.json | fasim facility update 3 --file -"
    )]
    Facility {
        #[command(subcommand)]
        command: FacilityCommand,
    },

    #[command(
        next_help_heading = "Catalog",
        about = "Manage pipelines",
        after_help = "EXAMPLES:\n    # Create a pipeline graph\n    fasim pipeline create --file line-a.json\n\n    # Show a pipeline with a deadline\n    fasim pipeline get 1 --timeout-ms 500"
    )]
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommand,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("FASIM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "fasim=debug,fasim_core=debug,info"
        } else {
            "fasim=info,fasim_core=info,warn"
        })
    });

    let format = env::var("FASIM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, globals: &Globals) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    debug!(root = %project_root.display(), "resolved project root");

    match &cli.command {
        Commands::InitDb => cmd::db::run_init_db(globals, &project_root),
        Commands::Migrate => cmd::db::run_migrate(globals, &project_root),
        Commands::Item { command } => cmd::item::run_item(command, globals, &project_root),
        Commands::Facility { command } => {
            cmd::facility::run_facility(command, globals, &project_root)
        }
        Commands::Pipeline { command } => {
            cmd::pipeline::run_pipeline(command, globals, &project_root)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let globals = cli.globals();
    match run(&cli, &globals) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let output: OutputMode = globals.output;
            if let Err(render) = output::render_error(output, &CliError::from_anyhow(&error)) {
                eprintln!("error: {error:#} ({render})");
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "fasim",
            "item",
            "list",
            "--json",
            "--db",
            "catalog.db",
            "--timeout-ms",
            "250",
        ]);
        assert!(cli.json);
        assert_eq!(cli.db, Some(PathBuf::from("catalog.db")));
        assert_eq!(cli.timeout_ms, Some(250));
        assert!(cli.globals().output.is_json());
        assert!(matches!(
            cli.command,
            Commands::Item {
                command: ItemCommand::List
            }
        ));
    }

    #[test]
    fn item_create_takes_name_and_description() {
        let cli = Cli::parse_from([
            "fasim",
            "item",
            "create",
            "--name",
            "Ore",
            "--description",
            "raw",
        ]);
        let Commands::Item {
            command: ItemCommand::Create(fields),
        } = cli.command
        else {
            panic!("expected item create");
        };
        assert_eq!(fields.name, "Ore");
        assert_eq!(fields.description.as_deref(), Some("raw"));
    }

    #[test]
    fn pipeline_update_takes_id_and_file() {
        let cli = Cli::parse_from(["fasim", "pipeline", "update", "4", "-f", "-"]);
        assert!(matches!(
            cli.command,
            Commands::Pipeline {
                command: PipelineCommand::Update { id: 4, .. }
            }
        ));
    }

    #[test]
    fn facility_create_requires_file() {
        assert!(Cli::try_parse_from(["fasim", "facility", "create"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
