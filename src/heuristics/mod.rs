// src/heuristics/mod.rs

mod brands;
mod generic;

pub use brands::{BrandRule, BrandTable};

use serde::{Deserialize, Serialize};

/// Company name used when neither the text nor the file name identifies one.
pub const UNKNOWN_COMPANY: &str = "UNKNOWN_STORE";

/// Amount used when no total line could be found.
pub const DEFAULT_TOTAL: &str = "10.00";

/// One extracted receipt: who was paid and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Upper-cased canonical company name, never empty.
    pub company_name: String,
    /// Decimal string without currency symbol, e.g. `"15.86"`.
    pub total_amount: String,
}

impl ReceiptRecord {
    pub fn new(company_name: impl Into<String>, total_amount: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            total_amount: total_amount.into(),
        }
    }
}

/// Extract a receipt record from raw document text.
///
/// This never fails. Fields that cannot be recovered from `text` fall back to
/// hints in `source_name`, then to [`UNKNOWN_COMPANY`] / [`DEFAULT_TOTAL`], so
/// a batch run always produces one record per document.
pub fn extract_receipt(text: &str, source_name: &str, brands: &BrandTable) -> ReceiptRecord {
    generic::extract(text, source_name, brands)
}
