use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::{OutputFormat, StatusArg, TrustArg};

#[derive(Parser)]
#[command(
    name = "wingtip",
    about = "Wingtip: multi-tenant catalog and shard routing",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to wingtip.toml
    #[arg(short, long, global = true, default_value = "wingtip.toml")]
    config: PathBuf,
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter wingtip.toml
    Init {
        /// Directory for the catalog and shard databases
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,
        /// Region of this instance
        #[arg(short, long, default_value = "home")]
        region: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Register every tenant listed in the config
    Bootstrap,
    /// Register a single tenant
    Register {
        /// Tenant display name
        name: String,
        /// Shard server (default: [tenant_server].server)
        #[arg(short, long)]
        server: Option<String>,
        /// Service plan (default: [catalog].service_plan)
        #[arg(long)]
        plan: Option<String>,
    },
    /// List registered tenants
    Tenants,
    /// Show a tenant's mapping and recovery state
    Status {
        /// Tenant name or path segment
        name: String,
    },
    /// Route a request path segment as this instance would
    Route {
        /// Tenant path segment, e.g. contosoconcerthall
        tenant: String,
    },
    /// Reconcile a tenant's catalog mapping with its shard
    Resolve {
        /// Tenant name or path segment
        name: String,
        /// Which side wins on disagreement
        #[arg(short, long, value_enum, default_value_t = TrustArg::Local)]
        trust: TrustArg,
    },
    /// Take a tenant online or offline
    SetStatus {
        /// Tenant name or path segment
        name: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// Print the tenant key for a name
    Key {
        /// Tenant name
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wingtip=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let context = || commands::Context::load(&cli.config);

    match cli.command {
        Commands::Init {
            data_dir,
            region,
            force,
        } => commands::setup::init(&cli.config, &data_dir, &region, force),
        Commands::Bootstrap => commands::setup::bootstrap(&context()?, format),
        Commands::Register { name, server, plan } => commands::tenants::register(
            &context()?,
            &name,
            server.as_deref(),
            plan.as_deref(),
            format,
        ),
        Commands::Tenants => commands::tenants::list(&context()?, format),
        Commands::Status { name } => commands::tenants::status(&context()?, &name, format),
        Commands::Route { tenant } => commands::route::route(&context()?, &tenant, format),
        Commands::Resolve { name, trust } => {
            commands::route::resolve(&context()?, &name, trust, format)
        }
        Commands::SetStatus { name, status } => {
            commands::tenants::set_status(&context()?, &name, status, format)
        }
        Commands::Key { name } => commands::tenants::key(&name, format),
    }
}
