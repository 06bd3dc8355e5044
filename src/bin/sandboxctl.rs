//! sandboxctl - operator CLI for the sandbox router.
//!
//! Thin shim over the five operator tools: create, use, clear, info,
//! list. Runs outside the agent framework, so the routing scope is an
//! operator-chosen id rather than a live session.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};

use sandbox_router::config::Settings;
use sandbox_router::naming;
use sandbox_router::router::{ProjectContext, Router};
use sandbox_router::scope::NullSessionSource;
use sandbox_router::tools::CreateOptions;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let project_root = cli
        .project
        .canonicalize()
        .with_context(|| format!("resolving project directory {}", cli.project.display()))?;

    let settings = Settings::load_with_file(&project_root, cli.config.as_deref());
    let project = ProjectContext {
        id: naming::sanitize(&project_root.to_string_lossy()),
        root: project_root,
    };
    let router = Router::new(settings, project, Arc::new(NullSessionSource));

    let message = match cli.command {
        Command::Create(cmd) => {
            let env = parse_env_pairs(&cmd.env)?;
            router
                .tool_create(
                    Some(&cli.session),
                    CreateOptions {
                        name: cmd.name,
                        image: cmd.image,
                        workdir: cmd.workdir,
                        project_path: cmd.project_path,
                        network: cmd.network,
                        mounts: cmd.mount,
                        command: cmd.command,
                        env,
                    },
                )
                .await?
        }
        Command::Use { name } => router.tool_use(&cli.session, &name).await?,
        Command::Clear { stop, remove } => router.tool_clear(&cli.session, stop, remove).await?,
        Command::Info => router.tool_info(&cli.session).await?,
        Command::List { all } => router.tool_list(all).await?,
    };

    println!("{message}");
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "sandboxctl",
    author,
    version,
    about = "Manage the per-session container sandboxes behind the tool-call router."
)]
struct Cli {
    /// Project directory the sandbox mounts
    #[arg(long, short = 'p', default_value = ".", global = true)]
    project: PathBuf,

    /// Session scope to operate on
    #[arg(long, short = 's', default_value = "cli", global = true)]
    session: String,

    /// Alternate router config file
    #[arg(long, env = "SANDBOX_ROUTER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create (or adopt) a container and bind this scope to it
    Create(CreateCommand),

    /// Bind this scope to an existing container
    Use {
        /// Container name
        name: String,
    },

    /// Drop this scope's binding
    Clear {
        /// Also stop the container
        #[arg(long)]
        stop: bool,
        /// Also remove the container
        #[arg(long)]
        remove: bool,
    },

    /// Show the bound container and its state
    Info,

    /// List this project's sandbox containers
    List {
        /// Include stopped containers
        #[arg(long, short = 'a')]
        all: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct CreateCommand {
    /// Container name (derived from project and session when omitted)
    #[arg(long)]
    name: Option<String>,

    /// Image to create from
    #[arg(long)]
    image: Option<String>,

    /// Mount point inside the container
    #[arg(long)]
    workdir: Option<String>,

    /// Host path to mount (defaults to the project directory)
    #[arg(long)]
    project_path: Option<PathBuf>,

    /// Container network
    #[arg(long)]
    network: Option<String>,

    /// Extra mount in host:container form (repeatable)
    #[arg(long = "mount")]
    mount: Vec<String>,

    /// Environment variable in K=V form (repeatable)
    #[arg(long = "env", short = 'e')]
    env: Vec<String>,

    /// Entry command
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn parse_env_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid env entry {pair:?}, expected K=V"))?;
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}
