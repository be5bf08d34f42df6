use inventory_canon::config::PipelineConfig;
use inventory_canon::features;
use inventory_canon::inventory;
use inventory_canon::pipeline::{clear_mapping_cache, Pipeline};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inventory-canon")]
#[command(about = "Canonicalize heavy-equipment inventory categories and manufacturers")]
#[command(version)]
struct Args {
    /// JSON config file (fields not given keep their defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the persisted mappings (or set MAPPING_DIR)
    #[arg(long, global = true)]
    mapping_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct LlmArgs {
    /// LLM API key (or set OPENAI_API_KEY / GROQ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Model name (or set OPENAI_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible base URL (or set OPENAI_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: categories, features, manufacturers, shaping
    Run {
        /// Raw inventory JSON (default: raw_inventory.json)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Taxonomy JSON (default: taxonomy.json)
        #[arg(short, long)]
        taxonomy: Option<PathBuf>,

        /// Output path (default: processed_inventory.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        report: bool,

        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Resolve categories only and write the annotated records
    Categories {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        taxonomy: Option<PathBuf>,

        #[arg(short, long, default_value = "category_output.json")]
        output: PathBuf,

        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Resolve manufacturer names only and write the annotated records
    Makes {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, default_value = "manufacturer_output.json")]
        output: PathBuf,

        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Extract cabin, drive and hours from descriptions
    Features {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, default_value = "features_output.json")]
        output: PathBuf,
    },
    /// Delete the persisted category and manufacturer mappings
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    }
    .with_env();
    if let Some(dir) = args.mapping_dir {
        config.mapping_dir = dir;
    }

    match args.command {
        Commands::Run { input, taxonomy, output, report, llm } => {
            override_paths(&mut config, input, taxonomy, output);
            apply_llm_args(&mut config, llm);
            run_pipeline(config, report).await
        }
        Commands::Categories { input, taxonomy, output, llm } => {
            override_paths(&mut config, input, taxonomy, None);
            apply_llm_args(&mut config, llm);
            run_categories(config, output).await
        }
        Commands::Makes { input, output, llm } => {
            override_paths(&mut config, input, None, None);
            apply_llm_args(&mut config, llm);
            run_makes(config, output).await
        }
        Commands::Features { input, output } => {
            override_paths(&mut config, input, None, None);
            run_features(config, output)
        }
        Commands::ClearCache => {
            let removed = clear_mapping_cache(&config)?;
            println!("Removed {} mapping file(s) from {}", removed, config.mapping_dir.display());
            Ok(())
        }
    }
}

fn override_paths(config: &mut PipelineConfig, input: Option<PathBuf>, taxonomy: Option<PathBuf>, output: Option<PathBuf>) {
    if let Some(input) = input {
        config.inventory_path = input;
    }
    if let Some(taxonomy) = taxonomy {
        config.taxonomy_path = taxonomy;
    }
    if let Some(output) = output {
        config.output_path = output;
    }
}

fn apply_llm_args(config: &mut PipelineConfig, llm: LlmArgs) {
    if llm.api_key.is_some() {
        config.llm.api_key = llm.api_key;
    }
    if let Some(model) = llm.model {
        config.llm.model = model;
    }
    if let Some(base_url) = llm.base_url {
        config.llm.base_url = base_url;
    }
}

async fn run_pipeline(config: PipelineConfig, report: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let (_, summary) = pipeline.run().await.context("Pipeline run failed")?;

    if report {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Processed {} records in {} ms → {}",
            summary.records,
            summary.elapsed_ms,
            summary.output_path.display()
        );
        println!(
            "  categories:    {} distinct, {} resolved, {} unresolved",
            summary.category.distinct_keys,
            summary.category.resolved,
            summary.category.unresolved.len()
        );
        println!(
            "  manufacturers: {} distinct, {} resolved, {} unresolved",
            summary.manufacturer.distinct_keys,
            summary.manufacturer.resolved,
            summary.manufacturer.unresolved.len()
        );
    }
    Ok(())
}

async fn run_categories(config: PipelineConfig, output: PathBuf) -> Result<()> {
    let records = inventory::load_records(&config.inventory_path)?;
    let taxonomy = inventory::load_taxonomy(&config.taxonomy_path)?;
    let pipeline = Pipeline::from_config(config)?;

    let outcome = pipeline
        .resolve_categories(records, taxonomy)
        .await
        .context("Category resolution failed")?;
    inventory::write_json(&output, &outcome.records)?;
    info!("Category stage completed. Records processed: {}", outcome.records.len());
    Ok(())
}

async fn run_makes(config: PipelineConfig, output: PathBuf) -> Result<()> {
    let records = inventory::load_records(&config.inventory_path)?;
    let pipeline = Pipeline::from_config(config)?;

    let outcome = pipeline
        .resolve_manufacturers(records)
        .await
        .context("Manufacturer resolution failed")?;
    inventory::write_json(&output, &outcome.records)?;
    info!("Manufacturer stage completed. Records processed: {}", outcome.records.len());
    Ok(())
}

fn run_features(config: PipelineConfig, output: PathBuf) -> Result<()> {
    let mut records = inventory::load_records(&config.inventory_path)?;
    features::extract_all(&mut records);
    inventory::write_json(&output, &records)?;
    info!("Feature stage completed. Records processed: {}", records.len());
    Ok(())
}
