use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use springer_client::client::Retrieval;
use springer_client::config::{find_config_file, load_config, ConfigFile};
use springer_client::models::{
    IdentifierKind, MetaRecords, MetadataRecords, OpenAccessDocument, OpenAccessRecords,
    RecordParser,
};
use springer_client::{Endpoint, Plan, Query, RefreshPolicy, RetrieveOptions, SpringerClient};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// springer-client - Retrieve metadata and open access documents from Springer Nature
#[derive(Parser, Debug)]
#[command(name = "springer-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Retrieve metadata and open access documents from the Springer Nature API", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key (overrides configuration and environment)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Bypass the disk cache for this command
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

/// Identifier type of a query
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum IdType {
    Doi,
    Issn,
    Isbn,
}

impl From<IdType> for IdentifierKind {
    fn from(id_type: IdType) -> Self {
        match id_type {
            IdType::Doi => IdentifierKind::Doi,
            IdType::Issn => IdentifierKind::Issn,
            IdType::Isbn => IdentifierKind::Isbn,
        }
    }
}

/// Arguments shared by the retrieval commands
#[derive(clap::Args, Debug)]
struct RetrieveArgs {
    /// Free-text query, or an identifier with --id-type
    query: String,

    /// Treat the query as an identifier of this type
    #[arg(long, value_enum)]
    id_type: Option<IdType>,

    /// Additional field filter, e.g. --filter datefrom:2024-01-01 (repeatable)
    #[arg(long = "filter", value_name = "FIELD:VALUE")]
    filters: Vec<String>,

    /// 1-based index of the first record
    #[arg(long, short, default_value_t = 1)]
    start: u64,

    /// Number of records to retrieve
    #[arg(long, short = 'n', default_value_t = 10)]
    count: u64,

    /// Use the premium plan page sizes
    #[arg(long)]
    premium: bool,

    /// Refresh cached responses: true, false or a maximum age in days
    #[arg(long, default_value = "false")]
    refresh: RefreshPolicy,

    /// Print the raw merged response instead of records
    #[arg(long)]
    json: bool,
}

impl RetrieveArgs {
    fn query(&self) -> Result<Query> {
        let mut query = match self.id_type {
            Some(kind) => Query::identifier(kind.into(), &self.query),
            None => Query::keyword(&self.query),
        };
        for filter in &self.filters {
            let Some((name, value)) = filter.split_once(':') else {
                bail!("Invalid filter '{}': expected FIELD:VALUE", filter);
            };
            query = query.field(name.trim(), value.trim());
        }
        Ok(query)
    }

    fn options(&self) -> RetrieveOptions {
        let options = RetrieveOptions::default()
            .start(self.start)
            .count(self.count)
            .refresh(self.refresh);
        if self.premium {
            options.plan(Plan::Premium)
        } else {
            options
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Retrieve bibliographic metadata
    Metadata(RetrieveArgs),

    /// Retrieve meta v2 records
    Meta(RetrieveArgs),

    /// Retrieve open access articles and chapters
    #[command(alias = "oa")]
    OpenAccess(RetrieveArgs),

    /// Write a default configuration file
    Init {
        /// Where to write the file (default: user configuration directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Manage local cache
    Cache {
        /// Subcommand
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show cache statistics
    Status,

    /// Clear cached responses
    Clear {
        /// Only clear this endpoint
        #[arg(long, value_enum)]
        endpoint: Option<EndpointArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EndpointArg {
    Metadata,
    Meta,
    OpenAccess,
}

impl From<EndpointArg> for Endpoint {
    fn from(endpoint: EndpointArg) -> Self {
        match endpoint {
            EndpointArg::Metadata => Endpoint::Metadata,
            EndpointArg::Meta => Endpoint::Meta,
            EndpointArg::OpenAccess => Endpoint::OpenAccess,
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("springer-client")
        .join("config.toml")
}

fn client(cli: &Cli) -> Result<SpringerClient> {
    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    let mut config = load_config(config_path.as_deref())
        .with_context(|| "Failed to load configuration")?;
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key);
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    Ok(SpringerClient::new(config)?)
}

fn print_warnings(cli: &Cli, retrieval: &Retrieval) {
    if cli.quiet {
        return;
    }
    for warning in &retrieval.warnings {
        eprintln!("Warning: {}", warning);
    }
}

async fn run_retrieve(cli: &Cli, endpoint: Endpoint, args: &RetrieveArgs) -> Result<()> {
    let client = client(cli)?;
    let query = args.query()?;
    let retrieval = client.retrieve(endpoint, &query, args.options()).await?;
    print_warnings(cli, &retrieval);

    if args.json {
        println!("{}", retrieval.envelope.to_text());
        return Ok(());
    }

    match endpoint {
        Endpoint::Metadata => {
            for record in MetadataRecords::parse(&retrieval.envelope)? {
                println!(
                    "{}\t{}",
                    record.doi.as_deref().unwrap_or("-"),
                    record.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        Endpoint::Meta => {
            for record in MetaRecords::parse(&retrieval.envelope)? {
                let disciplines: Vec<&str> = record
                    .disciplines
                    .iter()
                    .filter_map(|d| d.term.as_deref())
                    .collect();
                println!(
                    "{}\t{}\t{}",
                    record.doi.as_deref().unwrap_or("-"),
                    record.title.as_deref().unwrap_or("(untitled)"),
                    disciplines.join("; ")
                );
            }
        }
        Endpoint::OpenAccess => {
            for document in OpenAccessRecords::parse(&retrieval.envelope)? {
                let kind = match document {
                    OpenAccessDocument::Article(_) => "article",
                    OpenAccessDocument::Chapter(_) => "chapter",
                };
                println!(
                    "{}\t{}\t{}\t{} paragraph(s)",
                    kind,
                    document.doi().unwrap_or("-"),
                    document.title().unwrap_or("(untitled)"),
                    document.paragraphs().len()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("springer_client={}", env_filter)),
        ))
        .with((cli.log_format == LogFormat::Text).then(|| {
            tracing_subscriber::fmt::layer().with_writer(std::io::stderr)
        }))
        .with((cli.log_format == LogFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .init();

    match &cli.command {
        Commands::Metadata(args) => run_retrieve(&cli, Endpoint::Metadata, args).await?,
        Commands::Meta(args) => run_retrieve(&cli, Endpoint::Meta, args).await?,
        Commands::OpenAccess(args) => run_retrieve(&cli, Endpoint::OpenAccess, args).await?,

        Commands::Init { path, force } => {
            let path = path.clone().unwrap_or_else(default_config_path);
            if path.exists() && !force {
                bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            let api_key = cli.api_key.clone().or_else(springer_client::config::api_key_from_env);
            ConfigFile::create_default(api_key).save(&path)?;
            if !cli.quiet {
                eprintln!("Configuration file created at {}", path.display());
            }
        }

        Commands::Cache { command } => {
            let client = client(&cli)?;
            let cache = client.cache();

            match command {
                CacheCommands::Status => {
                    let stats = cache.stats();
                    if !stats.enabled {
                        println!("Cache: disabled");
                        println!("To enable, set SPRINGER_CACHE__ENABLED=true");
                    } else {
                        println!("Cache: enabled");
                        for entry in &stats.endpoints {
                            let updated = entry
                                .last_modified
                                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                                .unwrap_or_else(|| "never".to_string());
                            println!(
                                "{}: {} items ({} KB) in {}, last updated {}",
                                entry.endpoint,
                                entry.entries,
                                entry.size_bytes / 1024,
                                entry.directory.display(),
                                updated
                            );
                        }
                        println!(
                            "Total: {} items ({} KB)",
                            stats.total_entries(),
                            stats.total_size_bytes() / 1024
                        );
                    }
                }
                CacheCommands::Clear { endpoint } => {
                    match endpoint {
                        Some(endpoint) => cache.clear((*endpoint).into())?,
                        None => cache.clear_all()?,
                    }
                    if !cli.quiet {
                        eprintln!("Cache cleared successfully.");
                    }
                }
            }
        }
    }

    Ok(())
}
