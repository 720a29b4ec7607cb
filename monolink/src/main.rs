mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "monolink")]
#[command(about = "Monorepo manager: link sibling packages, edit dependencies, run scripts and cut releases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    workspace: WorkspaceArgs,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, action, global = true)]
    quiet: bool,
}

/// Options shared by every subcommand.
#[derive(Args, Clone, Debug)]
pub struct WorkspaceArgs {
    /// Glob for sub-package directories (repeatable, default `packages/*`)
    #[arg(long, global = true)]
    src: Vec<String>,

    /// Glob for sub-package directories to skip
    #[arg(long, global = true)]
    ignore_src: Option<String>,

    /// Regex for dependencies that are linked instead of installed
    #[arg(long, global = true)]
    link: Option<String>,

    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Answer every confirmation with yes
    #[arg(short, long, action, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show git and package status
    Status {
        #[arg(long, action)]
        json: bool,
    },
    /// Install external dependencies and link sibling packages
    Bootstrap {
        #[arg(long, action)]
        production: bool,
        #[arg(long, action)]
        frozen_lockfile: bool,
        #[arg(long, action)]
        pure_lockfile: bool,
        #[arg(long, action)]
        no_lockfile: bool,
    },
    /// Remove node_modules from every sub-package
    Clean,
    /// Add dependencies to a package
    Add {
        package: String,
        #[arg(required = true)]
        deps: Vec<String>,
        #[arg(short = 'D', long, action)]
        dev: bool,
        #[arg(short = 'P', long, action)]
        peer: bool,
        #[arg(short = 'O', long, action)]
        optional: bool,
        #[arg(short = 'E', long, action)]
        exact: bool,
        #[arg(short = 'T', long, action)]
        tilde: bool,
    },
    /// Remove dependencies from a package
    Remove {
        package: String,
        #[arg(required = true)]
        deps: Vec<String>,
    },
    /// Upgrade some (or all) dependencies of a package
    Upgrade {
        package: String,
        deps: Vec<String>,
        #[arg(long, action)]
        ignore_engines: bool,
    },
    /// Show outdated dependencies of every package
    Outdated,
    /// Set the version range of dependencies everywhere they appear
    Bump {
        #[arg(required = true)]
        deps: Vec<String>,
    },
    /// Remove dependencies from every package
    RemoveAll {
        #[arg(required = true)]
        deps: Vec<String>,
    },
    /// Validate versions and copy shared files and attributes to sub-packages
    Prepublish {
        /// Comma-separated root attributes to copy
        #[arg(long, value_delimiter = ',')]
        copy_attrs: Option<Vec<String>>,
    },
    /// Release every package changed since the last tag
    Publish(commands::PublishArgs),
    /// Set the version of every package, the root included
    ResetAllVersions { version: String },
    /// Run a shell command in every sub-package
    All {
        command: String,
        #[command(flatten)]
        run: commands::RunArgs,
    },
    /// Run matching package scripts in every sub-package
    RunScript {
        /// Script name glob, e.g. `test*`
        pattern: String,
        #[command(flatten)]
        run: commands::RunArgs,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .init();

    ctrlc::set_handler(|| std::process::exit(0))
        .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))?;

    let session = commands::Session::open(&cli.workspace)?;

    match cli.command {
        Commands::Status { json } => commands::cmd_status(&session, json).await?,
        Commands::Bootstrap {
            production,
            frozen_lockfile,
            pure_lockfile,
            no_lockfile,
        } => {
            commands::cmd_bootstrap(&session, production, frozen_lockfile, pure_lockfile, no_lockfile)
                .await?
        }
        Commands::Clean => commands::cmd_clean(&session)?,
        Commands::Add {
            package,
            deps,
            dev,
            peer,
            optional,
            exact,
            tilde,
        } => {
            let opts = monolink_core::ops::DepOptions {
                dev,
                peer,
                optional,
                exact,
                tilde,
                ignore_engines: false,
            };
            commands::cmd_deps(&session, &package, monolink_core::ops::DepOperation::Add, &deps, opts)
                .await?
        }
        Commands::Remove { package, deps } => {
            commands::cmd_deps(
                &session,
                &package,
                monolink_core::ops::DepOperation::Remove,
                &deps,
                Default::default(),
            )
            .await?
        }
        Commands::Upgrade {
            package,
            deps,
            ignore_engines,
        } => {
            let opts = monolink_core::ops::DepOptions {
                ignore_engines,
                ..Default::default()
            };
            commands::cmd_deps(&session, &package, monolink_core::ops::DepOperation::Upgrade, &deps, opts)
                .await?
        }
        Commands::Outdated => commands::cmd_outdated(&session).await?,
        Commands::Bump { deps } => commands::cmd_bump(&session, &deps).await?,
        Commands::RemoveAll { deps } => commands::cmd_remove_all(&session, &deps)?,
        Commands::Prepublish { copy_attrs } => commands::cmd_prepublish(&session, copy_attrs)?,
        Commands::Publish(args) => commands::cmd_publish(&session, args).await?,
        Commands::ResetAllVersions { version } => commands::cmd_reset_all_versions(&session, &version)?,
        Commands::All { command, run } => commands::cmd_all(&session, &command, run).await?,
        Commands::RunScript { pattern, run } => commands::cmd_run_script(&session, &pattern, run).await?,
    }

    Ok(())
}
