use serde::Deserialize;

/// Maps surface variants of a merchant to one canonical name.
#[derive(Debug, Clone, Deserialize)]
pub struct BrandRule {
    pub canonical: String,
    /// Substrings looked for in receipt text (case-insensitive).
    #[serde(default)]
    pub text_markers: Vec<String>,
    /// Substrings looked for in the document's file name (case-insensitive).
    #[serde(default)]
    pub filename_markers: Vec<String>,
}

impl BrandRule {
    pub fn new(canonical: &str, text_markers: &[&str], filename_markers: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            text_markers: text_markers.iter().map(|m| m.to_string()).collect(),
            filename_markers: filename_markers.iter().map(|m| m.to_string()).collect(),
        }
        .normalized()
    }

    /// Upper-case canonical name and text markers, lower-case file markers.
    pub fn normalized(self) -> Self {
        Self {
            canonical: self.canonical.trim().to_uppercase(),
            text_markers: self.text_markers.iter().map(|m| m.to_uppercase()).collect(),
            filename_markers: self.filename_markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

/// Ordered brand lookup. The first rule with a matching marker wins.
#[derive(Debug, Clone)]
pub struct BrandTable {
    rules: Vec<BrandRule>,
}

impl Default for BrandTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BrandTable {
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                BrandRule::new("STARBUCKS", &["STARBUCKS"], &["starbucks"]),
                BrandRule::new("WALMART", &["WAL-MART", "WALMART"], &["walmart"]),
                BrandRule::new("MCDONALDS", &["MCDONALD"], &["mcdonalds", "mcd"]),
            ],
        }
    }

    /// Built-in rules followed by `extra`. Markers are normalized so config
    /// authors don't have to care about case.
    pub fn with_rules(extra: impl IntoIterator<Item = BrandRule>) -> Self {
        let mut table = Self::builtin();
        table.rules.extend(extra.into_iter().map(BrandRule::normalized));
        table
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Canonical name for a line of receipt text, if any marker occurs in it.
    pub fn match_text(&self, line: &str) -> Option<&str> {
        let upper = line.to_uppercase();
        self.rules
            .iter()
            .find(|r| r.text_markers.iter().any(|m| !m.is_empty() && upper.contains(m.as_str())))
            .map(|r| r.canonical.as_str())
    }

    /// Canonical name hinted at by a file name.
    pub fn match_filename(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.rules
            .iter()
            .find(|r| {
                r.filename_markers
                    .iter()
                    .any(|m| !m.is_empty() && lower.contains(m.as_str()))
            })
            .map(|r| r.canonical.as_str())
    }
}
