use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_story_seed")]
    pub story_seed: String,

    pub llm: LlmConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama", "openai" or "deepseek"
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
    pub deepseek: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

/// Loop budgets for the creation/edit/evaluate cycle.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_revision_cycles")]
    pub max_revision_cycles: usize,
    #[serde(default = "default_max_editing_cycles")]
    pub max_editing_cycles: usize,
    #[serde(default = "default_revision_threshold")]
    pub revision_threshold: f64,
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_revision_cycles: default_max_revision_cycles(),
            max_editing_cycles: default_max_editing_cycles(),
            revision_threshold: default_revision_threshold(),
            max_restarts: default_max_restarts(),
        }
    }
}

/// Optional per-role overrides of the built-in system prompts.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AgentsConfig {
    pub creator: Option<AgentConfig>,
    pub writer: Option<AgentConfig>,
    pub supervisor: Option<AgentConfig>,
    pub editor: Option<AgentConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AgentConfig {
    pub name: Option<String>,
    pub role_prompt: Option<String>,
}

pub const ENV_MAX_REVISION_CYCLES: &str = "MAX_REVISION_CYCLES";
pub const ENV_MAX_EDITING_CYCLES: &str = "MAX_EDITING_CYCLES";
pub const ENV_REVISION_SCORE_THRESHOLD: &str = "REVISION_SCORE_THRESHOLD";
pub const ENV_MAX_RESTART_CYCLES: &str = "MAX_RESTART_CYCLES";
pub const ENV_DEEPSEEK_API_KEY: &str = "DEEPSEEK_API_KEY";
pub const ENV_DEEPSEEK_API_BASE: &str = "DEEPSEEK_API_BASE";

fn default_output() -> String {
    "outputs".to_string()
}
fn default_story_seed() -> String {
    "story_seed.yaml".to_string()
}
fn default_max_revision_cycles() -> usize {
    3
}
fn default_max_editing_cycles() -> usize {
    2
}
fn default_revision_threshold() -> f64 {
    80.0
}
fn default_max_restarts() -> usize {
    3
}

impl WorkflowConfig {
    /// Applies the process environment on top of the configured values.
    pub fn apply_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup. Unset keys keep the
    /// current value; set but unparsable keys are an error.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MAX_REVISION_CYCLES) {
            self.max_revision_cycles = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MAX_REVISION_CYCLES, v))?;
        }
        if let Some(v) = lookup(ENV_MAX_EDITING_CYCLES) {
            self.max_editing_cycles = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MAX_EDITING_CYCLES, v))?;
        }
        if let Some(v) = lookup(ENV_REVISION_SCORE_THRESHOLD) {
            self.revision_threshold = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_REVISION_SCORE_THRESHOLD, v))?;
        }
        if let Some(v) = lookup(ENV_MAX_RESTART_CYCLES) {
            self.max_restarts = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MAX_RESTART_CYCLES, v))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// A threshold outside `(0, 100]` either accepts off-brief drafts or
    /// can never be reached.
    pub fn validate(&self) -> Result<()> {
        let t = self.revision_threshold;
        if !(t.is_finite() && t > 0.0 && t <= 100.0) {
            anyhow::bail!("Invalid revision threshold {}: must be in (0, 100]", t);
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.resolve_env()
    }

    /// Fills values that may come from the environment: workflow budgets and
    /// DeepSeek credentials.
    pub fn resolve_env(self) -> Result<Self> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.workflow = self.workflow.with_overrides(&lookup)?;

        if self.llm.provider == "deepseek" {
            let ds = self.llm.deepseek.get_or_insert_with(|| OpenAIConfig {
                api_key: String::new(),
                model: "deepseek-chat".to_string(),
                base_url: None,
            });
            if ds.api_key.is_empty() {
                ds.api_key = lookup(ENV_DEEPSEEK_API_KEY).unwrap_or_default();
            }
            if ds.base_url.is_none() {
                ds.base_url = lookup(ENV_DEEPSEEK_API_BASE);
            }
            if ds.api_key.is_empty() {
                anyhow::bail!("Missing required environment variable: {}", ENV_DEEPSEEK_API_KEY);
            }
        }
        Ok(self)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_workflow_defaults() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.max_revision_cycles, 3);
        assert_eq!(cfg.max_editing_cycles, 2);
        assert_eq!(cfg.revision_threshold, 80.0);
        assert_eq!(cfg.max_restarts, 3);
    }

    #[test]
    fn test_workflow_overrides() {
        let env: HashMap<&str, &str> = [
            ("MAX_REVISION_CYCLES", "5"),
            ("MAX_EDITING_CYCLES", " 4 "),
            ("REVISION_SCORE_THRESHOLD", "72.5"),
        ]
        .into_iter()
        .collect();

        let cfg = WorkflowConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(cfg.max_revision_cycles, 5);
        assert_eq!(cfg.max_editing_cycles, 4);
        assert_eq!(cfg.revision_threshold, 72.5);
        assert_eq!(cfg.max_restarts, 3);
    }

    #[test]
    fn test_workflow_override_invalid() {
        let result = WorkflowConfig::default().with_overrides(|k| {
            (k == "MAX_EDITING_CYCLES").then(|| "two".to_string())
        });
        let err = result.unwrap_err();
        assert!(err.to_string().contains("MAX_EDITING_CYCLES"));
    }

    #[test]
    fn test_threshold_must_be_reachable() {
        for bad in ["NaN", "inf", "-10", "0", "100.5"] {
            let result = WorkflowConfig::default()
                .with_overrides(|k| (k == "REVISION_SCORE_THRESHOLD").then(|| bad.to_string()));
            let err = result.unwrap_err();
            assert!(err.to_string().contains("Invalid revision threshold"), "{bad}");
        }

        let cfg = WorkflowConfig::default()
            .with_overrides(|k| (k == "REVISION_SCORE_THRESHOLD").then(|| "100".to_string()))
            .unwrap();
        assert_eq!(cfg.revision_threshold, 100.0);
    }

    fn deepseek_config(yaml_llm: &str) -> Config {
        serde_yaml_ng::from_str(yaml_llm).unwrap()
    }

    #[test]
    fn test_deepseek_credentials_from_env() {
        let env: HashMap<&str, &str> = [
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("DEEPSEEK_API_BASE", "https://proxy.example.com/v1"),
        ]
        .into_iter()
        .collect();

        let cfg = deepseek_config("llm:\n  provider: deepseek\n")
            .resolve_with(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        let ds = cfg.llm.deepseek.unwrap();
        assert_eq!(ds.api_key, "sk-test");
        assert_eq!(ds.model, "deepseek-chat");
        assert_eq!(ds.base_url.as_deref(), Some("https://proxy.example.com/v1"));
    }

    #[test]
    fn test_deepseek_config_values_win_over_env() {
        let yaml = r#"
llm:
  provider: deepseek
  deepseek:
    api_key: sk-file
    model: deepseek-reasoner
    base_url: https://api.deepseek.com/v1
"#;
        let cfg = deepseek_config(yaml)
            .resolve_with(|k| match k {
                "DEEPSEEK_API_KEY" => Some("sk-env".to_string()),
                "DEEPSEEK_API_BASE" => Some("https://other.example.com".to_string()),
                _ => None,
            })
            .unwrap();

        let ds = cfg.llm.deepseek.unwrap();
        assert_eq!(ds.api_key, "sk-file");
        assert_eq!(ds.model, "deepseek-reasoner");
        assert_eq!(ds.base_url.as_deref(), Some("https://api.deepseek.com/v1"));
    }

    #[test]
    fn test_deepseek_missing_key() {
        let err = deepseek_config("llm:\n  provider: deepseek\n")
            .resolve_with(|_| None)
            .unwrap_err();
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
    }

    #[test]
    fn test_other_providers_ignore_deepseek_env() {
        let cfg = deepseek_config("llm:\n  provider: ollama\n")
            .resolve_with(|_| None)
            .unwrap();
        assert!(cfg.llm.deepseek.is_none());
    }

    #[test]
    fn test_config_parsing_with_defaults() {
        let yaml = r#"
llm:
  provider: ollama
  ollama:
    base_url: http://localhost:11434
    model: qwen2.5
workflow:
  max_editing_cycles: 1
agents:
  editor:
    role_prompt: 你是一位严格的编辑。
"#;
        let cfg: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(cfg.output_folder, "outputs");
        assert_eq!(cfg.story_seed, "story_seed.yaml");
        assert_eq!(cfg.workflow.max_editing_cycles, 1);
        assert_eq!(cfg.workflow.max_revision_cycles, 3);
        assert_eq!(cfg.workflow.revision_threshold, 80.0);
        assert_eq!(
            cfg.agents.editor.unwrap().role_prompt.as_deref(),
            Some("你是一位严格的编辑。")
        );
        assert!(cfg.agents.creator.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("config.yml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
