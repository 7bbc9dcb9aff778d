use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
}

/// Which chat-completions endpoint the sync engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Local Ollama server, OpenAI-compatible /v1 API.
    Ollama,
    /// Hosted API; key comes from the LLM_API_KEY env var.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSection {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_backend")]
    pub backend: LlmBackend,
    #[serde(default = "default_ollama")]
    pub ollama: EndpointSection,
    #[serde(default = "default_remote")]
    pub remote: EndpointSection,
}

fn default_backend() -> LlmBackend {
    LlmBackend::Ollama
}

fn default_ollama() -> EndpointSection {
    EndpointSection {
        base_url: "http://localhost:11434/v1".to_string(),
        model: "qwen3:8b".to_string(),
    }
}

fn default_remote() -> EndpointSection {
    EndpointSection {
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
        model: "gemini-3-flash-preview".to_string(),
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            ollama: default_ollama(),
            remote: default_remote(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Missing config file is fine — everything has a default.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_selection() {
        let cfg: Config = toml::from_str(
            r#"
            [llm]
            backend = "remote"

            [llm.remote]
            base_url = "https://example.test/v1"
            model = "test-model"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.backend, LlmBackend::Remote);
        assert_eq!(cfg.llm.remote.model, "test-model");
        // Untouched section keeps its default.
        assert_eq!(cfg.llm.ollama.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn empty_config_defaults_to_ollama() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.backend, LlmBackend::Ollama);
    }
}
