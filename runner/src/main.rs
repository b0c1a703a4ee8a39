use clap::{Args, Parser, Subcommand};
use mpiwrap::{
    config::{preflight_checks, LaunchConfig},
    launcher::{
        build, resolve, JobGeometry, LaunchResult, LauncherKind, LauncherSpec,
        SUPPORTED_LAUNCHERS,
    },
};
use std::{
    io::{self, Write},
    path::PathBuf,
    process::exit,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use tracing_unwrap::ResultExt;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print or run the launcher command for an executable
    Wrap(WrapArgs),
    /// Resolve an executable on PATH
    Which { name: String },
    /// List supported launchers and whether their binary is available
    Launchers,
}

#[derive(Args, Debug)]
struct WrapArgs {
    /// YAML launch config, command line values take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    launcher: Option<LauncherKind>,
    /// launcher binary, overrides the default of the launcher kind
    #[arg(long)]
    binary: Option<String>,
    #[arg(long)]
    nodes: Option<u32>,
    #[arg(long)]
    ntasks_per_node: Option<u32>,
    #[arg(long)]
    cpus_per_task: Option<u32>,
    /// extra arguments passed to the launcher verbatim
    #[arg(long, allow_hyphen_values = true)]
    launcher_args: Option<String>,
    /// run the command instead of printing it
    #[arg(long)]
    run: bool,
    executable: String,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    exec_args: Vec<String>,
}

fn wrap(args: WrapArgs) -> i32 {
    let config = match &args.config {
        Some(path) => LaunchConfig::load(path).unwrap_or_log(),
        None => LaunchConfig::default(),
    };
    debug!(config = ?config, "Loaded launch config");

    let geometry = match JobGeometry::new(
        args.nodes.unwrap_or(config.geometry.nodes()),
        args.ntasks_per_node
            .unwrap_or(config.geometry.ntasks_per_node()),
        args.cpus_per_task.unwrap_or(config.geometry.cpus_per_task()),
    ) {
        Ok(geometry) => geometry,
        Err(e) => {
            error!("Invalid job geometry: {e}");
            return 1;
        }
    };

    let mut launcher = match args.launcher {
        Some(kind) => LauncherSpec::new(kind),
        None => config.launcher(),
    };
    if let Some(binary) = args.binary {
        launcher = launcher.with_binary(binary);
    }

    if args.run && preflight_checks(&launcher, &geometry, Some(&args.executable)) {
        error!("Preflight checks failed, not launching");
        return 1;
    }

    let exec_args = shell_words::join(&args.exec_args);
    let launcher_args = args.launcher_args.or(config.launcher_args);

    match build(
        &launcher,
        &args.executable,
        &exec_args,
        &geometry,
        launcher_args.as_deref(),
        !args.run,
    ) {
        Ok(LaunchResult::Command(command)) => {
            println!("{command}");
            0
        }
        Ok(LaunchResult::Completed(output)) => {
            // forwarding is best effort, the return code is what matters
            let _ = io::stdout().write_all(&output.out);
            let _ = io::stderr().write_all(&output.err);

            if output.returncode < 0 {
                128 - output.returncode
            } else {
                output.returncode
            }
        }
        Err(e) => {
            error!(error = ?e, "{e}");
            1
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Wrap(args) => wrap(args),
        Commands::Which { name } => match resolve(&name) {
            Some(path) => {
                println!("{}", path.display());
                0
            }
            None => 1,
        },
        Commands::Launchers => {
            for kind in SUPPORTED_LAUNCHERS {
                let binary = kind.default_binary();
                let location = resolve(binary)
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "not found".to_string());

                println!("{kind:<8} {binary:<8} {location}");
            }
            0
        }
    };

    exit(code)
}
