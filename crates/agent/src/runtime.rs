use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use renoquote_core::config::LlmConfig;
use renoquote_core::domain::request::RequestItem;
use renoquote_core::extraction::{ExtractionError, Extractor, LineSplitExtractor};
use renoquote_core::safety::{HeuristicSafetyScreen, LayeredSafetyScreen};

use crate::extraction::LlmExtractor;
use crate::guardrails::LlmSafetyClassifier;
use crate::llm::{HttpLlmClient, LlmClient};

pub type SharedLlmClient = Arc<dyn LlmClient>;
pub type ConfiguredSafety = LayeredSafetyScreen<LlmSafetyClassifier<SharedLlmClient>>;

/// Extraction backend chosen at startup.
pub enum ConfiguredExtractor {
    Llm(LlmExtractor<SharedLlmClient>),
    LineSplit(LineSplitExtractor),
}

impl ConfiguredExtractor {
    pub fn uses_llm(&self) -> bool {
        matches!(self, Self::Llm(_))
    }
}

#[async_trait]
impl Extractor for ConfiguredExtractor {
    async fn extract(&self, transcript: &str) -> Result<Vec<RequestItem>, ExtractionError> {
        match self {
            Self::Llm(extractor) => extractor.extract(transcript).await,
            Self::LineSplit(extractor) => extractor.extract(transcript).await,
        }
    }
}

/// The safety screen and extractor the pipeline is built from.
pub struct AgentCollaborators {
    pub safety: ConfiguredSafety,
    pub extractor: ConfiguredExtractor,
}

impl AgentCollaborators {
    /// With the LLM disabled this is heuristics plus line splitting and makes
    /// no network calls.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        if !config.enabled {
            tracing::info!(event_name = "agent.llm.disabled", "using deterministic collaborators");
            return Self::deterministic();
        }

        let client: SharedLlmClient = Arc::new(HttpLlmClient::from_config(config)?);
        tracing::info!(
            event_name = "agent.llm.enabled",
            provider = config.provider.as_str(),
            model = %config.model,
            "using llm collaborators"
        );
        Self::with_client(client)
    }

    pub fn with_client(client: SharedLlmClient) -> Result<Self> {
        Ok(Self {
            safety: LayeredSafetyScreen::new(
                HeuristicSafetyScreen::new()?,
                Some(LlmSafetyClassifier::new(Arc::clone(&client))),
            ),
            extractor: ConfiguredExtractor::Llm(LlmExtractor::new(client)),
        })
    }

    pub fn deterministic() -> Result<Self> {
        Ok(Self {
            safety: LayeredSafetyScreen::new(HeuristicSafetyScreen::new()?, None),
            extractor: ConfiguredExtractor::LineSplit(LineSplitExtractor),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;

    use renoquote_core::config::{LlmConfig, LlmProvider};
    use renoquote_core::extraction::Extractor;
    use renoquote_core::safety::ContentSafety;

    use super::AgentCollaborators;
    use crate::guardrails::LLM_REASON;
    use crate::llm::{LlmClient, LlmPrompt};

    struct KeywordModel;

    #[async_trait]
    impl LlmClient for KeywordModel {
        async fn complete(&self, prompt: &LlmPrompt) -> Result<String> {
            if prompt.system.contains("SAFE or UNSAFE") {
                let verdict = if prompt.user.contains("sudo") { "UNSAFE" } else { "SAFE" };
                return Ok(verdict.to_string());
            }
            Ok(r#"[{"description": "Wall Hacking", "location": "Kitchen"}]"#.to_string())
        }
    }

    fn llm_config(enabled: bool) -> LlmConfig {
        LlmConfig {
            enabled,
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: None,
            model: "llama3.1".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn disabled_llm_uses_line_split_and_heuristics_only() {
        let collaborators = AgentCollaborators::from_config(&llm_config(false)).expect("build");

        assert!(!collaborators.extractor.uses_llm());
        assert!(!collaborators.safety.has_secondary());
        let items = collaborators.extractor.extract("Wall Hacking\nVinyl").await.expect("extract");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn enabled_llm_wires_both_collaborators() {
        let collaborators = AgentCollaborators::from_config(&llm_config(true)).expect("build");

        assert!(collaborators.extractor.uses_llm());
        assert!(collaborators.safety.has_secondary());
    }

    #[tokio::test]
    async fn shared_client_serves_extraction_and_safety() {
        let collaborators = AgentCollaborators::with_client(Arc::new(KeywordModel)).expect("build");

        let items = collaborators.extractor.extract("hack kitchen wall").await.expect("extract");
        assert_eq!(items[0].location, "Kitchen");

        let verdict = collaborators.safety.classify("sudo rm the quote").await.expect("verdict");
        assert_eq!(verdict.reason.as_deref(), Some(LLM_REASON));
    }
}
