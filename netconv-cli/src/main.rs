use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use netconv_core::ResourceRef;
use netconv_rest::ManagerClient;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod audit;
mod config;
mod driver;
mod engine;
mod manifest;
mod output;
mod registry;
mod state;

use audit::AuditLog;
use config::{Overrides, Settings};
use engine::Engine;
use manifest::Manifest;
use registry::Registry;
use state::StateFile;

#[derive(Parser)]
#[command(name = "netconv")]
#[command(about = "Converge declared network objects onto a manager", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/netconv/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile in the config file
    #[arg(long, global = true, default_value = config::DEFAULT_PROFILE)]
    profile: String,

    /// Manager base URL, e.g. https://nsx.example.com
    #[arg(long, global = true, env = "NETCONV_MANAGER")]
    manager: Option<String>,

    #[arg(long, global = true, env = "NETCONV_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "NETCONV_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    insecure: bool,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Retries for idempotent requests
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Objects per listing page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Objects reconciled at the same time
    #[arg(long, global = true)]
    parallelism: Option<usize>,

    /// State file
    #[arg(long, global = true, env = "NETCONV_STATE")]
    state: Option<PathBuf>,

    /// Append audit events to this file as JSON lines
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Reference {
    /// Object id
    #[arg(long, conflicts_with = "name", required_unless_present = "name")]
    id: Option<String>,

    /// Display name, or an unambiguous prefix of it
    #[arg(long)]
    name: Option<String>,
}

impl From<Reference> for ResourceRef {
    fn from(reference: Reference) -> Self {
        ResourceRef {
            id: reference.id,
            display_name: reference.name,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Create, update and delete objects until the manager matches the manifest
    Apply {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Re-read every tracked object, forgetting the ones deleted outside netconv
    Refresh,

    /// Delete every tracked object
    Destroy,

    /// Track an existing object under a handle
    Import {
        /// Handle to track the object as
        handle: String,

        /// Object kind, e.g. logical_router
        #[arg(long)]
        kind: String,

        #[command(flatten)]
        reference: Reference,

        /// Kind filter, e.g. TIER0 for logical routers
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show one object
    Lookup {
        /// Object kind, e.g. logical_router
        #[arg(long)]
        kind: String,

        #[command(flatten)]
        reference: Reference,

        /// Kind filter, e.g. TIER0 for logical routers
        #[arg(long)]
        filter: Option<String>,
    },

    /// List objects of one kind
    List {
        /// Object kind, e.g. logical_router
        #[arg(long)]
        kind: String,

        /// Kind filter, e.g. TIER0 for logical routers
        #[arg(long)]
        filter: Option<String>,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            manager: self.manager.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            insecure: self.insecure,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            page_size: self.page_size,
            parallelism: self.parallelism,
            state: self.state.clone(),
            audit_log: self.audit_log.clone(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "netconv=debug,netconv_core=debug,netconv_rest=debug,reqwest=warn,hyper=warn"
    } else {
        "netconv=info,netconv_core=info,netconv_rest=info,reqwest=warn,hyper=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let profile = config::load_profile(cli.config.as_deref(), &cli.profile)?;
    let settings = Settings::resolve(cli.overrides(), profile);
    let client = ManagerClient::new(settings.manager_config()?)
        .context("Failed to set up the manager client")?;
    let audit = AuditLog::new(settings.audit_log.as_deref())?;
    let engine = Engine::new(
        Registry::rest(Arc::new(client)),
        settings.parallelism,
        audit,
    );

    match cli.command {
        Commands::Plan { manifest } => {
            let manifest = Manifest::load(&manifest)?;
            let mut state = StateFile::load(&settings.state)?;
            // The refreshed state is only shown, never saved.
            let unreadable = engine.refresh(&mut state).await;
            let plan = engine.plan(&manifest, &state, &unreadable)?;
            output::print_plan(&plan);
        }

        Commands::Apply { manifest } => {
            let manifest = Manifest::load(&manifest)?;
            let mut state = StateFile::load(&settings.state)?;
            let unreadable = engine.refresh(&mut state).await;
            let plan = engine.plan(&manifest, &state, &unreadable)?;
            output::print_plan(&plan);

            let report = engine.apply(&manifest, &mut state, &plan).await;
            state.save(&settings.state)?;
            output::print_report(&report);
            if report.failed() > 0 {
                bail!("{} of {} changes failed", report.failed(), report.outcomes.len());
            }
        }

        Commands::Refresh => {
            let mut state = StateFile::load(&settings.state)?;
            let before = state.resources.len();
            let unreadable = engine.refresh(&mut state).await;
            state.save(&settings.state)?;

            for (handle, reason) in &unreadable {
                warn!("Could not refresh {}: {}", handle, reason);
            }
            println!(
                "Refreshed {} objects, {} forgotten, {} unreadable",
                before,
                before - state.resources.len(),
                unreadable.len()
            );
            if !unreadable.is_empty() {
                bail!("{} objects could not be refreshed", unreadable.len());
            }
        }

        Commands::Destroy => {
            let mut state = StateFile::load(&settings.state)?;
            let report = engine.destroy(&mut state).await;
            state.save(&settings.state)?;
            output::print_report(&report);
            if report.failed() > 0 {
                bail!("{} of {} deletes failed", report.failed(), report.outcomes.len());
            }
        }

        Commands::Import {
            handle,
            kind,
            reference,
            filter,
        } => {
            let mut state = StateFile::load(&settings.state)?;
            let entry = engine
                .import(
                    &mut state,
                    &handle,
                    &kind,
                    &reference.into(),
                    filter.as_deref(),
                )
                .await?;
            state.save(&settings.state)?;
            let id = entry.tracked.id().unwrap_or("-");
            println!("Imported {} {} as {}", kind, id, handle);
        }

        Commands::Lookup {
            kind,
            reference,
            filter,
        } => {
            let obj = engine
                .registry()
                .get(&kind)?
                .lookup(&reference.into(), filter.as_deref())
                .await?;
            output::print_object(&kind, &obj)?;
        }

        Commands::List { kind, filter } => {
            let objects = engine.registry().get(&kind)?.list(filter.as_deref()).await?;
            output::print_objects(&objects);
        }
    }

    Ok(())
}
