//! CLI interface for the vector stores

use ai_store::config::{AppConfig, StoreRegistry};
use ai_store::postgres::{PgDistance, SqlBuilder, Statement};
use ai_store::query::{HybridQuery, Query, QueryOptions, TextQuery, VectorQuery};
use ai_store::{Metadata, Store, Vector, VectorDocument};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ai-store")]
#[command(about = "Vector stores for retrieval pipelines", long_about = None)]
struct Cli {
    /// JSON config file listing the named stores. Defaults to a single
    /// in-memory cosine store named "default".
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a document to a store
    Add {
        /// Document ID
        id: String,
        /// Embedding as comma-separated values (e.g., "1.0,2.0,3.0")
        #[arg(short, long)]
        vector: String,
        /// Source text, stored under the "_text" metadata key
        #[arg(short, long)]
        text: Option<String>,
        /// Extra metadata as a JSON object
        #[arg(short, long)]
        metadata: Option<String>,
        /// Target store; defaults to the configured default store
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Remove documents by ID
    Remove {
        ids: Vec<String>,
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Query a store
    Query {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Print the Postgres statement a query would run, without a database
    Sql {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "embeddings")]
        table: String,
        #[arg(long, default_value = "embedding")]
        vector_field: String,
        #[arg(long, value_enum, default_value = "l2")]
        distance: PgDistanceArg,
        /// Text-search config (e.g. "simple"); required for text and hybrid queries
        #[arg(long)]
        text_search: Option<String>,
    },
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:3000")]
        addr: String,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Query embedding as comma-separated values
    #[arg(short, long)]
    vector: Option<String>,
    /// Text terms; combined with --vector this runs a hybrid query
    #[arg(short, long = "text")]
    texts: Vec<String>,
    /// Weight of the vector component in hybrid queries
    #[arg(long, default_value = "0.5")]
    ratio: f32,
    /// Number of results to return
    #[arg(short, long)]
    k: Option<usize>,
    /// Maximum distance for vector queries
    #[arg(long)]
    threshold: Option<f32>,
}

impl QueryArgs {
    fn to_query(&self) -> Result<Query> {
        let vector = self.vector.as_deref().map(Vector::parse).transpose()?;
        let query: Query = match (vector, self.texts.is_empty()) {
            (Some(vector), false) => {
                HybridQuery::new(vector, self.texts.iter().cloned(), self.ratio)?.into()
            }
            (Some(vector), true) => {
                let mut query = VectorQuery::new(vector);
                if let Some(threshold) = self.threshold {
                    query = query.with_threshold(threshold);
                }
                query.into()
            }
            (None, false) => TextQuery::with_texts(self.texts.iter().cloned()).into(),
            (None, true) => bail!("Pass --vector, --text, or both"),
        };
        Ok(query)
    }

    fn to_options(&self) -> QueryOptions {
        QueryOptions {
            max_items: self.k,
            ..QueryOptions::default()
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum PgDistanceArg {
    L2,
    Cosine,
    InnerProduct,
    L1,
}

impl From<PgDistanceArg> for PgDistance {
    fn from(arg: PgDistanceArg) -> Self {
        match arg {
            PgDistanceArg::L2 => PgDistance::L2,
            PgDistanceArg::Cosine => PgDistance::Cosine,
            PgDistanceArg::InnerProduct => PgDistance::InnerProduct,
            PgDistanceArg::L1 => PgDistance::L1,
        }
    }
}

fn load_registry(path: Option<&PathBuf>) -> Result<StoreRegistry> {
    let config = match path {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::default(),
    };
    let connections = config.open_connections()?;
    Ok(StoreRegistry::from_config(&config, &connections)?)
}

fn resolve_store(registry: &StoreRegistry, store: Option<String>) -> String {
    store.unwrap_or_else(|| registry.default_store_name().to_string())
}

fn parse_metadata(text: Option<String>, metadata: Option<String>) -> Result<Metadata> {
    let mut parsed: Metadata = match metadata {
        Some(json) => serde_json::from_str(&json).context("--metadata must be a JSON object")?,
        None => Metadata::new(),
    };
    if let Some(text) = text {
        parsed = parsed.with_text(text);
    }
    Ok(parsed)
}

fn sql_statement(
    query: &Query,
    options: &QueryOptions,
    builder: &SqlBuilder,
) -> ai_store::Result<Statement> {
    match query {
        Query::Vector(q) => Ok(builder.vector_query(q, options)),
        Query::Text(q) => builder.text_query(q, options),
        Query::Hybrid(q) => builder.hybrid_query(q, options),
    }
}

fn add_document(
    registry: &mut StoreRegistry,
    store: Option<String>,
    document: VectorDocument,
) -> Result<()> {
    let name = resolve_store(registry, store);
    let id = document.id.clone();
    let target = registry
        .get_mut(&name)
        .with_context(|| format!("unknown store \"{}\"", name))?;
    target.add(vec![document])?;
    println!("Added document {} to store {}", id, name);
    Ok(())
}

fn remove_documents(registry: &mut StoreRegistry, store: Option<String>, ids: &[String]) -> Result<()> {
    let name = resolve_store(registry, store);
    let target = registry
        .get_mut(&name)
        .with_context(|| format!("unknown store \"{}\"", name))?;
    let removed = target.remove(ids)?;
    println!("Removed {} document(s) from store {}", removed, name);
    Ok(())
}

fn query_store(registry: &StoreRegistry, store: Option<String>, query: &QueryArgs) -> Result<()> {
    let name = resolve_store(registry, store);
    let target = registry
        .get(&name)
        .with_context(|| format!("unknown store \"{}\"", name))?;
    let results = target.query(&query.to_query()?, &query.to_options())?;

    if results.is_empty() {
        println!("No results found");
    } else {
        println!("Top {} results:", results.len());
        for (i, doc) in results.iter().enumerate() {
            println!("{}. {} (score: {:.4})", i + 1, doc.id, doc.score.unwrap_or(0.0));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            id,
            vector,
            text,
            metadata,
            store,
        } => {
            let document = VectorDocument::new(id, Vector::parse(&vector)?, parse_metadata(text, metadata)?);
            let mut registry = load_registry(cli.config.as_ref())?;
            add_document(&mut registry, store, document)?;
        }
        Commands::Remove { ids, store } => {
            let mut registry = load_registry(cli.config.as_ref())?;
            remove_documents(&mut registry, store, &ids)?;
        }
        Commands::Query { query, store } => {
            let registry = load_registry(cli.config.as_ref())?;
            query_store(&registry, store, &query)?;
        }
        Commands::Sql {
            query,
            table,
            vector_field,
            distance,
            text_search,
        } => {
            let mut builder = SqlBuilder::new(table, vector_field)?.with_distance(distance.into());
            if let Some(config) = text_search {
                builder = builder.with_text_search(config)?;
            }
            let statement = sql_statement(&query.to_query()?, &query.to_options(), &builder)?;
            println!("{}", serde_json::to_string_pretty(&statement)?);
        }
        Commands::Serve { addr } => {
            let registry = load_registry(cli.config.as_ref())?;
            ai_store::server::start(&addr, registry).await?;
        }
    }
    Ok(())
}
