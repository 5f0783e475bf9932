// src/pipeline.rs

use crate::aggregate::{self, AggregateMap};
use crate::config::{Config, LlmBackend};
use crate::error::Result;
use crate::heuristics::{self, BrandTable, ReceiptRecord};
use crate::llm_extract::{self, ChatClient, TextGenerator};
use crate::pdf_extract;
use crate::receipt_store;
use std::path::{Path, PathBuf};
use tracing::{Instrument, debug, info, info_span, warn};

/// Everything one run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<ReceiptRecord>,
    pub totals: AggregateMap,
}

/// Extract → aggregate → persist, with all settings fixed at construction.
pub struct Pipeline {
    config: Config,
    brands: BrandTable,
    llm: Option<Box<dyn TextGenerator>>,
}

impl Pipeline {
    /// Build the pipeline, resolving the LLM backend (and its API key) now.
    pub async fn new(config: Config) -> Result<Self> {
        let llm: Option<Box<dyn TextGenerator>> = match llm_extract::resolve_endpoint(&config.llm)? {
            None => {
                info!("Backend set to heuristics — LLM extraction disabled");
                None
            }
            Some(endpoint) => {
                let client = ChatClient::new(endpoint, &config.llm)?;
                if config.llm.backend == LlmBackend::Ollama && !client.check_health().await {
                    warn!("Ollama is not reachable (start it with `ollama serve`) — falling back to heuristics");
                    None
                } else {
                    Some(Box::new(client) as Box<dyn TextGenerator>)
                }
            }
        };
        Ok(Self::with_generator(config, llm))
    }

    /// Build with an explicit generator (or none).
    pub fn with_generator(config: Config, llm: Option<Box<dyn TextGenerator>>) -> Self {
        let brands = BrandTable::with_rules(config.brands.iter().cloned());
        debug!(rules = brands.len(), "Brand table ready");
        Self { config, brands, llm }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract one record from raw text. Never fails: an LLM problem falls
    /// back to the heuristics, which themselves degrade to defaults.
    pub async fn extract_text(&self, text: &str, source_name: &str) -> ReceiptRecord {
        if let Some(llm) = &self.llm {
            match llm_extract::extract_receipt_with_llm(
                &**llm,
                text,
                self.config.llm.max_chars,
                &self.brands,
            )
            .await
            {
                Ok(record) => {
                    info!(backend = %llm.describe(), company = %record.company_name, total = %record.total_amount, "LLM extraction result");
                    return record;
                }
                Err(e) => warn!(error = %e, "LLM extraction failed — falling back to heuristics"),
            }
        }
        heuristics::extract_receipt(text, source_name, &self.brands)
    }

    /// Read a document and extract its record. An unreadable document still
    /// yields a record built from the file name.
    pub async fn extract_document(&self, path: &Path) -> ReceiptRecord {
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match pdf_extract::read_document(path) {
            Ok(Some(text)) => text,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(error = %e, "Could not read document");
                String::new()
            }
        };

        if text.trim().is_empty() {
            // Nothing for a model to look at.
            return heuristics::extract_receipt("", &source_name, &self.brands);
        }
        self.extract_text(&text, &source_name).await
    }

    /// Extract every receipt in the input directory, in file-name order.
    pub async fn extract_all(&self) -> Result<Vec<ReceiptRecord>> {
        let files = receipt_store::list_receipts(&self.config.input_dir)?;
        let total = files.len();
        let mut records = Vec::with_capacity(total);

        for (i, path) in files.iter().enumerate() {
            let span = info_span!("receipt", n = i + 1, of = total, file = %path.display());
            let record = self.extract_document(path).instrument(span.clone()).await;
            span.in_scope(|| {
                info!(company = %record.company_name, total = %record.total_amount, "Extracted");
            });
            records.push(record);
        }

        Ok(records)
    }

    /// Full run: extract, save records, aggregate, save totals.
    pub async fn run(&self) -> Result<RunOutcome> {
        let records = self.extract_all().await?;
        receipt_store::save_records(&self.config.extracted_path(), &records)?;

        let totals = aggregate::aggregate(&records)?;
        receipt_store::save_totals(&self.config.aggregated_path(), &totals)?;

        info!(
            receipts = records.len(),
            companies = totals.len(),
            grand_total = %totals.grand_total(),
            "Run complete"
        );
        Ok(RunOutcome { records, totals })
    }
}

/// Aggregate one or more records files into a single totals file.
pub fn aggregate_files(records_paths: &[PathBuf], totals_path: &Path) -> Result<AggregateMap> {
    let mut totals = AggregateMap::new();
    for path in records_paths {
        let records = receipt_store::load_records(path)?;
        info!(path = %path.display(), records = records.len(), "Loaded extracted records");
        totals.merge(&aggregate::aggregate(&records)?)?;
    }
    receipt_store::save_totals(totals_path, &totals)?;
    Ok(totals)
}
