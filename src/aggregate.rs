// src/aggregate.rs

use crate::error::{Result, TallyError};
use crate::heuristics::ReceiptRecord;
use indexmap::IndexMap;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Company name → cumulative spend, held in whole cents.
///
/// Iteration follows first-seen order so reports are stable, but equality
/// compares contents only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateMap {
    totals: IndexMap<String, Decimal>,
}

impl AggregateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount`, rounded to cents, to `company`'s total.
    pub fn add(&mut self, company: &str, amount: Decimal) -> Result<()> {
        let total = self.totals.entry(company.to_string()).or_insert(Decimal::ZERO);
        *total = total
            .checked_add(to_cents(amount))
            .ok_or_else(|| TallyError::Overflow {
                company: company.to_string(),
            })?;
        Ok(())
    }

    pub fn get(&self, company: &str) -> Option<Decimal> {
        self.totals.get(company).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.totals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Fold another run's totals into this one.
    pub fn merge(&mut self, other: &AggregateMap) -> Result<()> {
        for (company, amount) in other.iter() {
            self.add(company, amount)?;
        }
        Ok(())
    }

    /// Sum of all totals, pinned at `Decimal::MAX` rather than overflowing.
    pub fn grand_total(&self) -> Decimal {
        self.totals
            .values()
            .fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v))
    }
}

/// Half-cents round away from zero, the way a till does.
fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a record amount. Surrounding whitespace is tolerated, anything else
/// that isn't a plain decimal is rejected.
pub fn parse_amount(record: &ReceiptRecord) -> Result<Decimal> {
    Decimal::from_str(record.total_amount.trim()).map_err(|_| TallyError::Parse {
        company: record.company_name.clone(),
        value: record.total_amount.clone(),
    })
}

/// Group records by company and sum their amounts.
///
/// Fails on the first record whose amount is not numeric, or whose company
/// total would overflow.
pub fn aggregate(records: &[ReceiptRecord]) -> Result<AggregateMap> {
    let mut map = AggregateMap::new();
    for (idx, record) in records.iter().enumerate() {
        let amount = parse_amount(record)?;
        map.add(&record.company_name, amount)?;
        debug!(
            idx,
            company = %record.company_name,
            amount = %amount,
            running = %map.get(&record.company_name).unwrap_or_default(),
            "Aggregated record"
        );
    }
    Ok(map)
}

// Persisted as a JSON object of plain numbers. Totals are already whole
// cents, so writing and reading them back is lossless.

impl Serialize for AggregateMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(self.totals.len()))?;
        for (company, amount) in &self.totals {
            let value = amount.to_f64().ok_or_else(|| {
                    <S::Error as serde::ser::Error>::custom(format!("amount out of range: {amount}"))
            })?;
            out.serialize_entry(company, &value)?;
        }
        out.end()
    }
}

impl<'de> Deserialize<'de> for AggregateMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = IndexMap::<String, f64>::deserialize(deserializer)?;
        let mut totals = IndexMap::with_capacity(raw.len());
        for (company, value) in raw {
            let amount = Decimal::from_f64(value).ok_or_else(|| {
                <D::Error as de::Error>::custom(format!("invalid total for {company}: {value}"))
            })?;
            totals.insert(company, to_cents(amount));
        }
        Ok(Self { totals })
    }
}
