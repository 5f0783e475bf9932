use crate::aggregate::AggregateMap;
use crate::heuristics::ReceiptRecord;
use rust_decimal::Decimal;
use std::fmt;

/// Headline numbers for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingSummary {
    pub receipts: usize,
    pub companies: usize,
    pub grand_total: Decimal,
    pub highest: Option<(String, Decimal)>,
    pub lowest: Option<(String, Decimal)>,
}

impl SpendingSummary {
    pub fn new(records: &[ReceiptRecord], totals: &AggregateMap) -> Self {
        // Ties keep the company seen first.
        let mut highest: Option<(&str, Decimal)> = None;
        let mut lowest: Option<(&str, Decimal)> = None;
        for (company, amount) in totals.iter() {
            if highest.is_none_or(|(_, best)| amount > best) {
                highest = Some((company, amount));
            }
            if lowest.is_none_or(|(_, least)| amount < least) {
                lowest = Some((company, amount));
            }
        }

        Self {
            receipts: records.len(),
            companies: totals.len(),
            grand_total: totals.grand_total(),
            highest: highest.map(|(c, a)| (c.to_string(), a)),
            lowest: lowest.map(|(c, a)| (c.to_string(), a)),
        }
    }
}

/// Renders the run as a plain-text report: records, totals, then summary.
pub struct Report<'a> {
    pub records: &'a [ReceiptRecord],
    pub totals: &'a AggregateMap,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.totals.is_empty() {
            return write!(f, "No receipts found.");
        }
        let summary = SpendingSummary::new(self.records, self.totals);

        writeln!(f, "Extracted receipts:")?;
        for (i, r) in self.records.iter().enumerate() {
            writeln!(f, "  {}. {}: ${}", i + 1, r.company_name, r.total_amount)?;
        }

        writeln!(f, "\nTotals by company:")?;
        for (company, amount) in self.totals.iter() {
            writeln!(f, "  {company}: ${}", amount.round_dp(2))?;
        }

        writeln!(f, "{}", "-".repeat(30))?;
        writeln!(f, "TOTAL: ${:.2}", summary.grand_total)?;
        if let Some((company, amount)) = &summary.highest {
            writeln!(f, "Highest spending: {company} (${amount:.2})")?;
        }
        if let Some((company, amount)) = &summary.lowest {
            writeln!(f, "Lowest spending: {company} (${amount:.2})")?;
        }
        write!(
            f,
            "Companies: {}  Receipts: {}",
            summary.companies, summary.receipts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn records() -> Vec<ReceiptRecord> {
        vec![
            ReceiptRecord::new("STARBUCKS", "9.45"),
            ReceiptRecord::new("WALMART", "13.01"),
            ReceiptRecord::new("STARBUCKS", "12.50"),
        ]
    }

    #[test]
    fn summary_numbers() {
        let records = records();
        let totals = aggregate(&records).unwrap();
        let s = SpendingSummary::new(&records, &totals);

        assert_eq!(s.receipts, 3);
        assert_eq!(s.companies, 2);
        assert_eq!(s.grand_total, Decimal::from_str("34.96").unwrap());
        assert_eq!(s.highest, Some(("STARBUCKS".to_string(), Decimal::from_str("21.95").unwrap())));
        assert_eq!(s.lowest, Some(("WALMART".to_string(), Decimal::from_str("13.01").unwrap())));
    }

    #[test]
    fn empty_summary() {
        let s = SpendingSummary::new(&[], &AggregateMap::new());
        assert_eq!(s.grand_total, Decimal::ZERO);
        assert!(s.highest.is_none() && s.lowest.is_none());
    }

    #[test]
    fn report_text() {
        let records = records();
        let totals = aggregate(&records).unwrap();
        let text = Report { records: &records, totals: &totals }.to_string();

        assert!(text.contains("  3. STARBUCKS: $12.50"));
        assert!(text.contains("  STARBUCKS: $21.95"));
        assert!(text.contains("TOTAL: $34.96"));
        assert!(text.contains("Highest spending: STARBUCKS ($21.95)"));
        assert!(text.ends_with("Companies: 2  Receipts: 3"));
    }

    #[test]
    fn empty_report() {
        let text = Report { records: &[], totals: &AggregateMap::new() }.to_string();
        assert_eq!(text, "No receipts found.");
    }
}
