//! CLI entry point: serve, config inspection, and Chatwise import/export.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mem0_mcp::backend::MemoryBackend;
use mem0_mcp::chatwise::{self, ChatwiseImporter};
use mem0_mcp::config::Config;
use mem0_mcp::mem0::Mem0Client;
use mem0_mcp::server::{self, AppState};

/// Instructions uploaded to the backend project at startup so extraction
/// lines up with what the memory tools store.
const DEFAULT_INSTRUCTIONS: &str = "\
Extract and remember the following information:
- Personal Information: Save important details about the user's preferences, habits, and personal information.
- Knowledge & Facts: Store useful information, facts, and knowledge that might be referenced later.
- Important Context: Keep track of important context and information from conversations.";

#[derive(Parser)]
#[command(
    name = "mem0-mcp",
    version,
    about = "Streaming memory MCP server backed by the mem0 API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the SSE server
    Serve {
        /// Bind host, overriding HOST
        #[arg(long)]
        host: Option<String>,
        /// Bind port, overriding PORT
        #[arg(long)]
        port: Option<u16>,
        /// Server name, overriding SERVER_NAME
        #[arg(long)]
        name: Option<String>,
        /// Force debug logging
        #[arg(long)]
        debug: bool,
        /// Skip uploading extraction instructions at startup
        #[arg(long)]
        no_instructions: bool,
    },
    /// Print the resolved configuration and any problems with it
    CheckConfig,
    /// Show what a Chatwise export file would import
    Preview {
        /// Chatwise export file
        file: PathBuf,
        /// Number of entries to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Import memories from Chatwise export files
    Import {
        /// Chatwise export files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Store entries even when identical content already exists
        #[arg(long)]
        include_duplicates: bool,
    },
    /// Export stored memories to a Chatwise-compatible JSON file
    Export {
        /// Output file
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            host,
            port,
            name,
            debug,
            no_instructions,
        } => run_serve(host, port, name, debug, no_instructions).await,
        Commands::CheckConfig => run_check_config(),
        Commands::Preview { file, limit } => {
            let rendered = chatwise::preview(&file, limit)?;
            println!("{rendered}");
            Ok(())
        }
        Commands::Import {
            files,
            include_duplicates,
        } => run_import(files, !include_duplicates).await,
        Commands::Export { output } => run_export(output).await,
    }
}

fn init_tracing(config: &Config) {
    let level = if config.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("mem0_mcp={level},tower_http={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
    debug: bool,
    no_instructions: bool,
) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(name) = name {
        config.server_name = name;
    }
    if debug {
        config.debug = true;
    }
    if no_instructions {
        config.enable_custom_instructions = false;
    }

    init_tracing(&config);

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("config error: {problem}");
        }
        bail!("invalid configuration");
    }

    let api_key = config
        .mem0_api_key
        .clone()
        .context("MEM0_API_KEY is required")?;
    let backend = Arc::new(Mem0Client::new(&config.mem0_base_url, api_key));

    if config.enable_custom_instructions {
        match backend.set_project_instructions(DEFAULT_INSTRUCTIONS).await {
            Ok(()) => info!("uploaded extraction instructions to backend project"),
            Err(err) => warn!(error = %err, "could not upload extraction instructions"),
        }
    }

    let state = AppState::new(config.clone(), backend);

    println!();
    println!("{}", "=".repeat(50));
    println!("mem0 MCP server");
    println!("  Server:       http://{}:{}", config.host, config.port);
    println!("  SSE endpoint: http://{}:{}/sse", config.host, config.port);
    println!("  Health check: http://{}:{}/health", config.host, config.port);
    println!("  Mode:         {} ({} tools)", config.mode, state.registry.len());
    println!("{}", "=".repeat(50));

    server::serve(state).await
}

fn run_check_config() -> Result<()> {
    let config = Config::from_env();
    println!("{}", config.summary());

    let problems = config.validate();
    if problems.is_empty() {
        println!("\nConfiguration OK");
        Ok(())
    } else {
        println!("\nProblems:");
        for problem in &problems {
            println!("  - {problem}");
        }
        bail!("{} configuration problem(s)", problems.len())
    }
}

fn backend_from_env() -> Result<(Config, Arc<Mem0Client>)> {
    let config = Config::from_env();
    let api_key = config
        .mem0_api_key
        .clone()
        .context("MEM0_API_KEY is required")?;
    let client = Mem0Client::new(&config.mem0_base_url, api_key);
    Ok((config, Arc::new(client)))
}

async fn run_import(files: Vec<PathBuf>, skip_duplicates: bool) -> Result<()> {
    let (config, backend) = backend_from_env()?;
    init_tracing(&config);

    let importer = ChatwiseImporter::new(backend, &config.default_user_id);
    let report = importer.import_batch(&files, skip_duplicates).await;
    println!("{}", report.summary());
    Ok(())
}

async fn run_export(output: PathBuf) -> Result<()> {
    let (config, backend) = backend_from_env()?;
    init_tracing(&config);

    let importer = ChatwiseImporter::new(backend, &config.default_user_id);
    let message = importer.export_to_file(&output).await?;
    println!("{message}");
    Ok(())
}
