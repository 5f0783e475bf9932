use crate::error::{Result, TallyError};
use crate::heuristics::BrandRule;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for `.pdf` / `.txt` receipts.
    pub input_dir: PathBuf,
    /// Directory the JSON artifacts are written to.
    pub output_dir: PathBuf,
    pub extracted_file: String,
    pub aggregated_file: String,
    pub llm: LlmSection,
    /// Extra brand rules, appended after the built-in ones.
    pub brands: Vec<BrandRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("receipt_pdfs"),
            output_dir: PathBuf::from("output"),
            extracted_file: "extracted_receipts.json".to_string(),
            aggregated_file: "aggregated_receipts.json".to_string(),
            llm: LlmSection::default(),
            brands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Regex / line-scan extraction only.
    Heuristics,
    Ollama,
    /// Any OpenAI-compatible hosted endpoint.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub backend: LlmBackend,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Receipt text beyond this many characters is not sent to the model.
    pub max_chars: usize,
    pub ollama: OllamaConfig,
    pub remote: RemoteConfig,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Heuristics,
            timeout_secs: 60,
            max_retries: 3,
            max_chars: 12_000,
            ollama: OllamaConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub model: String,
    /// Inline key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            api_key_env: "LLM_API_KEY".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TallyError::MissingInput(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.extracted_file.trim().is_empty() || self.aggregated_file.trim().is_empty() {
            return Err(TallyError::Config("output file names must not be empty".into()));
        }
        if self.llm.max_chars == 0 {
            return Err(TallyError::Config("llm.max_chars must be positive".into()));
        }
        for rule in &self.brands {
            if rule.canonical.trim().is_empty() {
                return Err(TallyError::Config("brand rule with empty canonical name".into()));
            }
        }
        Ok(())
    }

    pub fn extracted_path(&self) -> PathBuf {
        self.output_dir.join(&self.extracted_file)
    }

    pub fn aggregated_path(&self) -> PathBuf {
        self.output_dir.join(&self.aggregated_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.input_dir, PathBuf::from("receipt_pdfs"));
        assert_eq!(cfg.llm.backend, LlmBackend::Heuristics);
        assert_eq!(cfg.aggregated_path(), PathBuf::from("output/aggregated_receipts.json"));
    }

    #[test]
    fn full_file() {
        let cfg = Config::parse(
            r#"
input_dir = "in"
output_dir = "out"

[llm]
backend = "remote"
max_retries = 1

[llm.remote]
model = "some-model"
api_key_env = "MY_KEY"

[[brands]]
canonical = "TARGET"
text_markers = ["TARGET"]
filename_markers = ["target"]
"#,
        )
        .unwrap();

        assert_eq!(cfg.extracted_path(), PathBuf::from("out/extracted_receipts.json"));
        assert_eq!(cfg.llm.backend, LlmBackend::Remote);
        assert_eq!(cfg.llm.max_retries, 1);
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.llm.remote.model, "some-model");
        assert_eq!(cfg.llm.remote.api_key_env, "MY_KEY");
        assert_eq!(cfg.brands.len(), 1);
        assert_eq!(cfg.brands[0].canonical, "TARGET");
    }

    #[test]
    fn example_file_parses() {
        let cfg = Config::parse(include_str!("../config.example.toml")).unwrap();
        assert_eq!(cfg.llm.ollama.model, "llama3.1");
        assert_eq!(cfg.brands[0].filename_markers, vec!["target".to_string()]);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = Config::parse("[llm]\nbackend = \"carrier-pigeon\"\n").unwrap_err();
        assert!(matches!(err, TallyError::Toml(_)));
    }

    #[test]
    fn rejects_zero_max_chars() {
        let err = Config::parse("[llm]\nmax_chars = 0\n").unwrap_err();
        assert!(matches!(err, TallyError::Config(_)));
    }

    #[test]
    fn missing_file_is_missing_input() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, TallyError::MissingInput(_)));
    }
}
