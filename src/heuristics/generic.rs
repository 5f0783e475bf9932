use super::{BrandTable, DEFAULT_TOTAL, ReceiptRecord, UNKNOWN_COMPANY};
use regex::Regex;
use tracing::{debug, warn};

/// Only the top of the receipt is searched for the merchant header.
const HEADER_LINES: usize = 5;

/// Header lines carrying these tokens are never the company name.
const METADATA_MARKERS: [&str; 5] = ["date:", "time:", "order:", "store #", "transaction"];

/// Line-scan extraction: header for the company, first TOTAL line for the amount.
pub fn extract(text: &str, source_name: &str, brands: &BrandTable) -> ReceiptRecord {
    let lines: Vec<&str> = text.trim().lines().map(str::trim).collect();

    let company_name = match extract_company(&lines, brands) {
        Some(name) => name,
        None => match brands.match_filename(source_name) {
            Some(name) => {
                warn!(source = %source_name, company = %name, "No company in header — using file name hint");
                name.to_string()
            }
            None => {
                warn!(source = %source_name, "No company found — using {UNKNOWN_COMPANY}");
                UNKNOWN_COMPANY.to_string()
            }
        },
    };

    let total_amount = match extract_total(&lines) {
        Some(amount) => amount,
        None => {
            warn!(source = %source_name, "No total found — using default {DEFAULT_TOTAL}");
            DEFAULT_TOTAL.to_string()
        }
    };

    debug!(source = %source_name, company = %company_name, total = %total_amount, "Heuristic extraction");

    ReceiptRecord::new(company_name, total_amount)
}

// ---------------------------------------------------------------------------
// Company
// ---------------------------------------------------------------------------

fn extract_company(lines: &[&str], brands: &BrandTable) -> Option<String> {
    for line in lines.iter().take(HEADER_LINES) {
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if METADATA_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }

        // A known brand beats the generic check on the same line.
        if let Some(brand) = brands.match_text(line) {
            return Some(brand.to_string());
        }
        if is_name_like(line) {
            return Some(line.to_uppercase());
        }
    }
    None
}

/// Letters with optional spaces / hyphens, longer than 3 characters.
fn is_name_like(line: &str) -> bool {
    let mut letters = line.chars().filter(|c| *c != ' ' && *c != '-').peekable();
    letters.peek().is_some() && letters.all(char::is_alphabetic) && line.chars().count() > 3
}

// ---------------------------------------------------------------------------
// Total
// ---------------------------------------------------------------------------

fn extract_total(lines: &[&str]) -> Option<String> {
    // "TOTAL:" as its own word, so "SUBTOTAL:" alone doesn't qualify.
    let label_re = Regex::new(r"(?:^|[^A-Z])TOTAL:").ok()?;
    let amount_re = Regex::new(r"\$?(\d[\d,]*\.\d+)").ok()?;

    let line = lines
        .iter()
        .map(|l| l.to_uppercase())
        .find(|l| label_re.is_match(l) || (l.starts_with("TOTAL") && l.contains('$')))?;

    // Several amounts on the line: the grand total comes last.
    amount_re
        .captures_iter(&line)
        .last()
        .map(|c| c[1].replace(',', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(text: &str, source: &str) -> ReceiptRecord {
        extract(text, source, &BrandTable::builtin())
    }

    #[test]
    fn starbucks_receipt() {
        let text = "STARBUCKS COFFEE\nDate: 2024-01-15\nGrande Latte  $5.25\nTOTAL:  $15.86";
        assert_eq!(run(text, "receipt.pdf"), ReceiptRecord::new("STARBUCKS", "15.86"));
    }

    #[test]
    fn subtotal_line_is_not_the_total() {
        let text = "STARBUCKS COFFEE
Store #1234

Subtotal:                $14.55
Tax:                     $1.31
TOTAL:                  $15.86";
        assert_eq!(run(text, "a.txt").total_amount, "15.86");
    }

    #[test]
    fn last_amount_on_total_line_wins() {
        let text = "Corner Deli\nSubtotal: $8.75  Tax: $0.70  TOTAL: $9.45";
        assert_eq!(run(text, "x.pdf"), ReceiptRecord::new("CORNER DELI", "9.45"));
    }

    #[test]
    fn total_without_colon_needs_dollar_sign() {
        assert_eq!(run("Corner Deli\nTOTAL $12.00", "x").total_amount, "12.00");
        assert_eq!(run("Corner Deli\nTOTAL 12.00", "x").total_amount, DEFAULT_TOTAL);
    }

    #[test]
    fn first_total_line_stops_the_scan_even_without_amount() {
        let text = "Corner Deli\nTOTAL: see below\nTOTAL: $4.00";
        assert_eq!(run(text, "x").total_amount, DEFAULT_TOTAL);
    }

    #[test]
    fn thousands_separator_is_dropped() {
        assert_eq!(run("Furniture Barn\nTOTAL: $1,249.99", "x").total_amount, "1249.99");
    }

    #[test]
    fn brand_variants_are_canonicalized() {
        assert_eq!(run("WAL-MART SUPERCENTER\nTOTAL: $19.81", "x").company_name, "WALMART");
        assert_eq!(run("McDonald's Restaurant\nTOTAL: $14.87", "x").company_name, "MCDONALDS");
    }

    #[test]
    fn metadata_lines_are_skipped() {
        let text = "Date: 2024-01-15\nTransaction ID 77\nOrder: 12\nBlue Bottle\nTOTAL: $4.00";
        assert_eq!(run(text, "x").company_name, "BLUE BOTTLE");
    }

    #[test]
    fn first_qualifying_line_wins_over_later_brand() {
        // The brand check is per line; an earlier name-like line ends the scan.
        let text = "Airport Kiosk\nSTARBUCKS\nTOTAL: $3.00";
        assert_eq!(run(text, "x").company_name, "AIRPORT KIOSK");
    }

    #[test]
    fn brand_on_first_qualifying_line_beats_generic_check() {
        // "STARBUCKS COFFEE" would also pass the alpha-only check.
        assert_eq!(run("STARBUCKS COFFEE\nTOTAL: $3.00", "x").company_name, "STARBUCKS");
    }

    #[test]
    fn short_or_non_alpha_lines_are_not_names() {
        let text = "ABC\n123 Main Street\nA-B\nTOTAL: $3.00";
        assert_eq!(run(text, "walmart_receipt.pdf").company_name, "WALMART");
    }

    #[test]
    fn only_the_header_is_scanned_for_company() {
        let text = "1\n2\n3\n4\n5\nCorner Deli\nTOTAL: $3.00";
        assert_eq!(run(text, "x").company_name, UNKNOWN_COMPANY);
    }

    #[test]
    fn unknown_document_gets_defaults() {
        let text = "*** 42 ***\nthanks 4 shopping!!";
        assert_eq!(run(text, "unknown.pdf"), ReceiptRecord::new(UNKNOWN_COMPANY, DEFAULT_TOTAL));
    }

    #[test]
    fn empty_text_uses_filename_hint() {
        assert_eq!(run("", "mcD1.pdf"), ReceiptRecord::new("MCDONALDS", DEFAULT_TOTAL));
    }

    #[test]
    fn hyphenated_names_are_accepted() {
        assert_eq!(run("Seven-Eleven\nTOTAL: $2.50", "x").company_name, "SEVEN-ELEVEN");
    }
}
