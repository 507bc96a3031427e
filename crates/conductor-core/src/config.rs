//! Session configuration (TOML).
//!
//! ```toml
//! iteration = "per_concept"
//!
//! [client]
//! timeout_ms = 5000
//! method = "get"
//!
//! [[concepts]]
//! key = "Concept1"
//! endpoint_url = "http://localhost:1111"
//! control_period = 1
//!
//! [[selection]]
//! decision = 1
//! concept = "Concept1"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::IterationSource;
use crate::domain::{ConceptSpec, ControlPeriod, Endpoint, EndpointError};
use crate::impls::http_client::DEFAULT_TIMEOUT;
use crate::impls::{HttpPolicyClient, RequestMethod};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("concept '{concept}': {source}")]
    Endpoint {
        concept: String,
        #[source]
        source: EndpointError,
    },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("cannot build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Counter that gates control iterations: `per_concept` or `episode_step`.
    #[serde(default)]
    pub iteration: IterationSource,

    #[serde(default)]
    pub client: ClientConfig,

    pub concepts: Vec<ConceptConfig>,

    /// `decision -> concept` table.
    #[serde(default)]
    pub selection: Vec<SelectionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub method: RequestMethod,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            method: RequestMethod::default(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn build_client(&self) -> Result<HttpPolicyClient, ConfigError> {
        Ok(HttpPolicyClient::new(self.method, self.timeout())?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConceptConfig {
    pub key: String,
    pub endpoint_url: String,
    #[serde(default)]
    pub control_period: ControlPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionEntry {
    pub decision: u32,
    pub concept: String,
}

impl SessionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Shape checks only; cross-checks between concepts and the selection
    /// table happen in `SessionBuilder::build`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.timeout_ms == 0 {
            return Err(ConfigError::Invalid("client.timeout_ms must be > 0".into()));
        }
        self.concept_specs().map(|_| ())
    }

    pub fn concept_specs(&self) -> Result<Vec<ConceptSpec>, ConfigError> {
        self.concepts
            .iter()
            .map(|c| {
                let endpoint =
                    Endpoint::parse(&c.endpoint_url).map_err(|source| ConfigError::Endpoint {
                        concept: c.key.clone(),
                        source,
                    })?;
                Ok(ConceptSpec::new(c.key.as_str(), endpoint, c.control_period))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SessionBuilder;
    use crate::domain::{Action, Selection};
    use crate::impls::ScriptedPolicyClient;
    use std::sync::Arc;

    const TWO_CONCEPTS: &str = r#"
        [client]
        timeout_ms = 250
        method = "post"

        [[concepts]]
        key = "Concept1"
        endpoint_url = "http://localhost:1111"

        [[concepts]]
        key = "Concept2"
        endpoint_url = "http://localhost:2222/"
        control_period = 3

        [[selection]]
        decision = 1
        concept = "Concept1"

        [[selection]]
        decision = 2
        concept = "Concept2"
    "#;

    #[test]
    fn parses_full_config() {
        let config = SessionConfig::from_toml_str(TWO_CONCEPTS).unwrap();
        assert_eq!(config.client.timeout(), Duration::from_millis(250));
        assert_eq!(config.client.method, RequestMethod::Post);

        let specs = config.concept_specs().unwrap();
        assert_eq!(specs[0].control_period, ControlPeriod::default());
        assert_eq!(specs[1].control_period.get(), 3);
        assert_eq!(specs[1].endpoint.base(), "http://localhost:2222");
        assert_eq!(config.selection[1].decision, 2);
    }

    #[test]
    fn client_section_is_optional() {
        let config = SessionConfig::from_toml_str(
            r#"
            [[concepts]]
            key = "Concept1"
            endpoint_url = "http://localhost:1111"
            "#,
        )
        .unwrap();
        assert_eq!(config.client, ClientConfig::default());
        assert_eq!(config.client.timeout_ms, 5_000);
        assert_eq!(config.client.method, RequestMethod::Get);
        assert!(config.selection.is_empty());
        assert_eq!(config.iteration, IterationSource::PerConcept);
    }

    #[test]
    fn episode_step_iteration_reaches_the_blueprint() {
        let raw = format!("iteration = \"episode_step\"\n{TWO_CONCEPTS}");
        let config = SessionConfig::from_toml_str(&raw).unwrap();
        assert_eq!(config.iteration, IterationSource::EpisodeStep);

        let client = Arc::new(ScriptedPolicyClient::constant(Action::new()));
        let blueprint = SessionBuilder::from_config(&config, client)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(blueprint.iteration_source(), IterationSource::EpisodeStep);
        assert_eq!(blueprint.start().iteration_source(), IterationSource::EpisodeStep);
    }

    #[test]
    fn zero_control_period_is_rejected() {
        let err = SessionConfig::from_toml_str(
            r#"
            [[concepts]]
            key = "Concept1"
            endpoint_url = "http://localhost:1111"
            control_period = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("control_period"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = SessionConfig::from_toml_str(
            r#"
            [client]
            timeout_ms = 0

            [[concepts]]
            key = "Concept1"
            endpoint_url = "http://localhost:1111"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_endpoint_names_the_concept() {
        let err = SessionConfig::from_toml_str(
            r#"
            [[concepts]]
            key = "Concept7"
            endpoint_url = "localhost-without-scheme"
            "#,
        )
        .unwrap_err();
        assert!(matches!(&err, ConfigError::Endpoint { concept, .. } if concept == "Concept7"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SessionConfig::from_toml_str(
            r#"
            [[concepts]]
            key = "Concept1"
            endpoint = "http://localhost:1111"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SessionConfig::load("/definitely/not/here/session.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn config_drives_builder() {
        let config = SessionConfig::from_toml_str(TWO_CONCEPTS).unwrap();
        let client = Arc::new(ScriptedPolicyClient::constant(Action::new().with("u", 1.0)));
        let blueprint = SessionBuilder::from_config(&config, client.clone())
            .unwrap()
            .build()
            .unwrap();

        let domain: Vec<Selection> = blueprint.selection_table().domain().collect();
        assert_eq!(domain, vec![Selection(1), Selection(2)]);

        let mut session = blueprint.start();
        let record = session
            .step(Selection(2), &crate::domain::State::new())
            .await
            .unwrap();
        assert_eq!(record.concept.as_str(), "Concept2");
        assert_eq!(client.calls()[0].endpoint.base(), "http://localhost:2222");
    }
}
