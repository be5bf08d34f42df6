//! End-to-end pipeline: categories → features → manufacturers → shaping

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features;
use crate::inventory;
use crate::llm::LlmClient;
use crate::oracle::{LlmOracle, Oracle};
use crate::record::Record;
use crate::resolution::{CategoryPolicy, ManufacturerPolicy, ResolutionOrchestrator, ResolutionOutcome, RunReport};
use crate::shaping::{self, ProcessedRecord};
use crate::store::{JsonFileStore, MappingStore};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Records after every stage, before shaping.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub records: Vec<Record>,
    pub category_report: RunReport,
    pub manufacturer_report: RunReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub records: usize,
    pub output_path: PathBuf,
    pub category: RunReport,
    pub manufacturer: RunReport,
    pub elapsed_ms: u64,
}

pub struct Pipeline {
    config: PipelineConfig,
    oracle: Box<dyn Oracle>,
    category_store: Box<dyn MappingStore>,
    manufacturer_store: Box<dyn MappingStore>,
}

impl Pipeline {
    /// LLM-backed oracle and JSON file stores under the configured mapping dir.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let client = LlmClient::from_config(&config.llm)?;
        let oracle = LlmOracle::new(client, config.llm.retry_policy());
        let category_store = JsonFileStore::new(config.category_store_path());
        let manufacturer_store = JsonFileStore::new(config.manufacturer_store_path());

        Ok(Self::with_parts(
            config,
            Box::new(oracle),
            Box::new(category_store),
            Box::new(manufacturer_store),
        ))
    }

    pub fn with_parts(
        config: PipelineConfig,
        oracle: Box<dyn Oracle>,
        category_store: Box<dyn MappingStore>,
        manufacturer_store: Box<dyn MappingStore>,
    ) -> Self {
        Self {
            config,
            oracle,
            category_store,
            manufacturer_store,
        }
    }

    pub async fn resolve_categories(&self, records: Vec<Record>, taxonomy: Vec<String>) -> Result<ResolutionOutcome> {
        let policy = CategoryPolicy::new(taxonomy)?;
        ResolutionOrchestrator::new(self.category_store.as_ref(), self.oracle.as_ref())
            .resolve_and_apply(records, &policy)
            .await
    }

    pub async fn resolve_manufacturers(&self, records: Vec<Record>) -> Result<ResolutionOutcome> {
        let policy = ManufacturerPolicy::new();
        ResolutionOrchestrator::new(self.manufacturer_store.as_ref(), self.oracle.as_ref())
            .resolve_and_apply(records, &policy)
            .await
    }

    /// Run every stage over in-memory records.
    pub async fn process(&self, records: Vec<Record>, taxonomy: Vec<String>) -> Result<PipelineOutput> {
        let categories = self.resolve_categories(records, taxonomy).await?;

        let mut records = categories.records;
        features::extract_all(&mut records);

        let manufacturers = self.resolve_manufacturers(records).await?;

        Ok(PipelineOutput {
            records: manufacturers.records,
            category_report: categories.report,
            manufacturer_report: manufacturers.report,
        })
    }

    /// Load inputs from the configured paths, process, shape and write output.
    pub async fn run(&self) -> Result<(Vec<ProcessedRecord>, PipelineSummary)> {
        let started = Instant::now();
        let records = inventory::load_records(&self.config.inventory_path)?;
        let taxonomy = inventory::load_taxonomy(&self.config.taxonomy_path)?;

        let output = self.process(records, taxonomy).await?;
        let shaped = shaping::shape_and_write(&output.records, &self.config.output_path)?;

        let summary = PipelineSummary {
            records: shaped.len(),
            output_path: self.config.output_path.clone(),
            category: output.category_report,
            manufacturer: output.manufacturer_report,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!("✅ Pipeline completed: {} records in {} ms", summary.records, summary.elapsed_ms);

        Ok((shaped, summary))
    }
}

/// Delete both persisted mappings. Returns how many files were removed.
pub fn clear_mapping_cache(config: &PipelineConfig) -> Result<usize> {
    let mut removed = 0;
    for path in [config.category_store_path(), config.manufacturer_store_path()] {
        if JsonFileStore::new(path).clear()? {
            removed += 1;
        }
    }
    Ok(removed)
}
