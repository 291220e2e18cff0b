use statgraph::batch;
use statgraph::catalog::IndicatorCatalog;
use statgraph::config::{self, GraphConfig};
use statgraph::graph::{GraphClient, GraphReader, GraphWriter};
use statgraph::layout::DataRoot;
use statgraph::llm::LlmClient;
use statgraph::matcher::IndicatorMatcher;
use statgraph::regions::RegionMatcher;
use statgraph::resolver::{QueryResolver, ResolverOutcome};
use statgraph::schema::TableCatalog;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "statgraph")]
#[command(about = "Statistical-table ETL into a Neo4j indicator graph")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create indicator nodes from a batch config of table coordinates
    Ingest {
        /// Batch config JSON with a "nodes" array
        #[arg(short, long)]
        config: PathBuf,

        /// Root of the per-year data tree
        #[arg(short, long, default_value = "БД")]
        data_root: PathBuf,

        /// Neo4j connection config JSON
        #[arg(short, long, default_value = "neo4j_config.json")]
        graph_config: PathBuf,

        /// Canonical region names JSON (enables fuzzy reconciliation)
        #[arg(long)]
        canonical: Option<PathBuf>,
    },
    /// Create derived nodes computed from stored indicators
    Derive {
        /// Batch config JSON with a "derived_nodes" array
        #[arg(short, long)]
        config: PathBuf,

        /// Neo4j connection config JSON
        #[arg(short, long, default_value = "neo4j_config.json")]
        graph_config: PathBuf,
    },
    /// Resolve a free-text question to table cells and print the values
    Query {
        /// The question in natural language
        question: String,

        /// Table listing CSV shown to the LLM
        #[arg(short, long)]
        tables: PathBuf,

        /// Root of the per-year data tree
        #[arg(short, long, default_value = "БД")]
        data_root: PathBuf,

        /// First year of the requested range
        #[arg(long, default_value_t = 2021)]
        from: u16,

        /// Last year of the requested range
        #[arg(long, default_value_t = 2024)]
        to: u16,
    },
    /// Match a free-text question to a stored indicator node
    MatchIndicator {
        /// The question in natural language
        question: String,

        /// Label of the indicator nodes to match against
        #[arg(short, long, default_value = "Indicator")]
        label: String,

        /// Neo4j connection config JSON
        #[arg(short, long, default_value = "neo4j_config.json")]
        graph_config: PathBuf,
    },
    /// Show how region directories reconcile against canonical names
    Regions {
        /// Root of the per-year data tree
        #[arg(short, long, default_value = "БД")]
        data_root: PathBuf,

        /// Canonical region names JSON
        #[arg(short, long)]
        canonical: PathBuf,

        /// Year whose directory listing to reconcile
        #[arg(short, long)]
        year: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Ingest {
            config,
            data_root,
            graph_config,
            canonical,
        } => run_ingest(config, data_root, graph_config, canonical).await,
        Commands::Derive {
            config,
            graph_config,
        } => run_derive(config, graph_config).await,
        Commands::Query {
            question,
            tables,
            data_root,
            from,
            to,
        } => run_query(question, tables, data_root, from, to).await,
        Commands::MatchIndicator {
            question,
            label,
            graph_config,
        } => run_match(question, label, graph_config).await,
        Commands::Regions {
            data_root,
            canonical,
            year,
        } => run_regions(data_root, canonical, year),
    }
}

fn load_graph_config(path: &PathBuf) -> Result<GraphConfig> {
    if path.exists() {
        Ok(GraphConfig::load(path)?)
    } else {
        info!(
            "Graph config {} not found, falling back to environment",
            path.display()
        );
        Ok(GraphConfig::from_env()?)
    }
}

async fn run_ingest(
    config_path: PathBuf,
    data_root: PathBuf,
    graph_config: PathBuf,
    canonical: Option<PathBuf>,
) -> Result<()> {
    let (items, years_override) = batch::load_batch_document(&config_path, "nodes")?;
    let years = years_override.unwrap_or_else(config::default_years);
    info!(
        "Loaded {} node configs covering years {}..{}",
        items.len(),
        years.first().map(String::as_str).unwrap_or("?"),
        years.last().map(String::as_str).unwrap_or("?")
    );

    let matcher = match canonical {
        Some(path) => Some(RegionMatcher::load(&path)?),
        None => None,
    };

    let graph = GraphClient::connect(&load_graph_config(&graph_config)?).await?;
    let writer = GraphWriter::new(graph);
    let root = DataRoot::new(data_root);

    let report = batch::run_ingest(&writer, &root, &years, matcher.as_ref(), &items).await;
    print_report(&report);
    Ok(())
}

async fn run_derive(config_path: PathBuf, graph_config: PathBuf) -> Result<()> {
    let (items, years_override) = batch::load_batch_document(&config_path, "derived_nodes")?;
    let years = years_override.unwrap_or_else(config::default_years);
    info!("Loaded {} derived node configs", items.len());

    let graph = GraphClient::connect(&load_graph_config(&graph_config)?).await?;
    let writer = GraphWriter::new(graph.clone());
    let reader = GraphReader::new(graph);

    let report = batch::run_derive(&writer, &reader, &years, &items).await;
    print_report(&report);
    Ok(())
}

async fn run_query(
    question: String,
    tables: PathBuf,
    data_root: PathBuf,
    from: u16,
    to: u16,
) -> Result<()> {
    if from > to {
        anyhow::bail!("Year range is inverted: {} > {}", from, to);
    }
    let years: Vec<String> = (from..=to).map(|y| y.to_string()).collect();

    let llm = LlmClient::from_env()?;
    let catalog = TableCatalog::load(&tables)?;
    info!("Loaded {} tables from listing", catalog.tables.len());
    let root = DataRoot::new(data_root);

    let resolver = QueryResolver::new(&llm, &catalog, &root);
    match resolver.resolve(&question, &years).await {
        ResolverOutcome::Found {
            table_number,
            table_name,
            cells,
        } => {
            println!("Table {}: {}", table_number, table_name);
            for cell in &cells {
                println!("\nColumn: {}", cell.cell.column_name);
                println!("Row:    {}", cell.cell.row_name);
                for (year, value) in &cell.values {
                    match value {
                        Some(v) => println!("{}: {}", year, v),
                        None => println!("{}: —", year),
                    }
                }
            }
        }
        ResolverOutcome::NoTable => {
            println!("No suitable table found for this question.");
        }
        ResolverOutcome::NoCells { table_number } => {
            println!(
                "Table {} was selected, but no matching cells were found.",
                table_number
            );
        }
    }
    Ok(())
}

async fn run_match(question: String, label: String, graph_config: PathBuf) -> Result<()> {
    let graph = GraphClient::connect(&load_graph_config(&graph_config)?).await?;
    let reader = GraphReader::new(graph);

    let mut catalog = IndicatorCatalog::new(label);
    catalog.refresh(&reader).await?;

    let llm = LlmClient::from_env()?;
    let matcher = IndicatorMatcher::new(&llm);
    match matcher.find_match(&question, &catalog).await {
        Some(node_id) => {
            println!("Matched node id: {}", node_id);
            if let Some(summary) = catalog.get(&node_id) {
                println!("Name: {}", summary.name);
                if let Some(full_name) = &summary.full_name {
                    println!("Full name: {}", full_name);
                }
            }
        }
        None => println!("No matching indicator found."),
    }
    Ok(())
}

fn run_regions(data_root: PathBuf, canonical: PathBuf, year: Option<String>) -> Result<()> {
    let matcher = RegionMatcher::load(&canonical)?;
    let root = DataRoot::new(data_root);
    let year = year.unwrap_or_else(|| {
        config::default_years()
            .last()
            .cloned()
            .unwrap_or_else(|| "2024".to_string())
    });

    let dirs = root.region_dirs(&year);
    println!("{} region directories in {}", dirs.len(), year);
    let matched = matcher.reconcile(&dirs);
    for m in &matched {
        println!("{:.2}  {}  ->  {}", m.score, m.directory, m.canonical);
    }
    println!("{} of {} directories matched", matched.len(), dirs.len());
    Ok(())
}

fn print_report(report: &batch::BatchReport) {
    println!("\n{}", "=".repeat(60));
    println!(" BATCH RESULT");
    println!("{}", "=".repeat(60));
    println!("Success: {}", report.success);
    println!("Created: {}/{}", report.created, report.total);
    println!("Failed:  {}", report.failed);
    if !report.created_ids.is_empty() {
        println!("\nCreated node ids:");
        for id in &report.created_ids {
            println!("  {}", id);
        }
    }
}
