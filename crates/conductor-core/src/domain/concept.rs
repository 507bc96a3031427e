//! Concept identity: key, endpoint, control period, selection value.

use std::fmt;
use std::num::NonZeroU64;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Stable key of a concept (e.g. `"Concept1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptKey(String);

impl ConceptKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConceptKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ConceptKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Number of control-loop steps between two real inferences.
///
/// `1` queries every step; `3` queries at steps 0, 3, 6, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ControlPeriod(NonZeroU64);

impl ControlPeriod {
    pub const EVERY_STEP: Self = Self(NonZeroU64::MIN);

    /// Returns `None` for 0.
    pub fn new(steps: u64) -> Option<Self> {
        NonZeroU64::new(steps).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for ControlPeriod {
    fn default() -> Self {
        Self::EVERY_STEP
    }
}

impl TryFrom<u64> for ControlPeriod {
    type Error = String;

    fn try_from(steps: u64) -> Result<Self, Self::Error> {
        Self::new(steps).ok_or_else(|| "control_period must be >= 1".to_string())
    }
}

impl From<ControlPeriod> for u64 {
    fn from(period: ControlPeriod) -> Self {
        period.get()
    }
}

impl fmt::Display for ControlPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discrete decision value chosen by the upstream selector each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection(pub u32);

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Selection {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme '{scheme}' in endpoint '{url}' (expected http or https)")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Base address of one policy server.
///
/// Inference goes to `<base>/v1/prediction`; the full URL is computed once
/// at parse time.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: String,
    prediction: Url,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let base = raw.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base).map_err(|e| EndpointError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EndpointError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: parsed.scheme().to_string(),
            });
        }
        let prediction =
            Url::parse(&format!("{base}/v1/prediction")).map_err(|e| EndpointError::InvalidUrl {
                url: raw.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { base, prediction })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn prediction_url(&self) -> &Url {
        &self.prediction
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base
    }
}

impl Eq for Endpoint {}

impl std::hash::Hash for Endpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.base.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.base)
    }
}

/// Configuration of one concept, resolved and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptSpec {
    pub key: ConceptKey,
    pub endpoint: Endpoint,
    pub control_period: ControlPeriod,
}

impl ConceptSpec {
    pub fn new(key: impl Into<ConceptKey>, endpoint: Endpoint, control_period: ControlPeriod) -> Self {
        Self {
            key: key.into(),
            endpoint,
            control_period,
        }
    }
}
