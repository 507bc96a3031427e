//! ConceptRegistry - one predictor per concept key
//!
//! Built once at session start, then only looked up. Lookups hand out
//! `&mut` because calling a predictor mutates its cache and counter.

use std::collections::BTreeMap;

use crate::app::predictor::RateLimitedPredictor;
use crate::domain::ConceptKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("concept '{0}' is already registered")]
    AlreadyRegistered(ConceptKey),

    #[error("no predictor registered for concept '{0}'")]
    UnknownConcept(ConceptKey),
}

#[derive(Default)]
pub struct ConceptRegistry {
    predictors: BTreeMap<ConceptKey, RateLimitedPredictor>,
}

impl ConceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: ConceptKey,
        predictor: RateLimitedPredictor,
    ) -> Result<(), RegistryError> {
        if self.predictors.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        self.predictors.insert(key, predictor);
        Ok(())
    }

    /// Predictor for `key`; unknown keys are an error, never a default.
    pub fn resolve(
        &mut self,
        key: &ConceptKey,
    ) -> Result<&mut RateLimitedPredictor, RegistryError> {
        self.predictors
            .get_mut(key)
            .ok_or_else(|| RegistryError::UnknownConcept(key.clone()))
    }

    pub fn get(&self, key: &ConceptKey) -> Option<&RateLimitedPredictor> {
        self.predictors.get(key)
    }

    pub fn contains(&self, key: &ConceptKey) -> bool {
        self.predictors.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConceptKey> {
        self.predictors.keys()
    }

    pub fn len(&self) -> usize {
        self.predictors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictors.is_empty()
    }
}

/// Bulk construction for keys that are already known to be unique
/// (later duplicates replace earlier ones).
impl FromIterator<(ConceptKey, RateLimitedPredictor)> for ConceptRegistry {
    fn from_iter<I: IntoIterator<Item = (ConceptKey, RateLimitedPredictor)>>(iter: I) -> Self {
        Self {
            predictors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, ControlPeriod, Endpoint, State};
    use crate::impls::ScriptedPolicyClient;
    use std::sync::Arc;

    fn predictor(client: &Arc<ScriptedPolicyClient>, port: u16) -> RateLimitedPredictor {
        RateLimitedPredictor::new(
            Endpoint::parse(&format!("http://localhost:{port}")).unwrap(),
            ControlPeriod::default(),
            client.clone(),
        )
    }

    #[tokio::test]
    async fn register_then_resolve() {
        let client = Arc::new(ScriptedPolicyClient::constant(Action::new().with("u", 1.0)));
        let mut registry = ConceptRegistry::new();
        registry
            .register(ConceptKey::from("Concept1"), predictor(&client, 1111))
            .unwrap();

        let p = registry.resolve(&ConceptKey::from("Concept1")).unwrap();
        assert_eq!(p.endpoint().base(), "http://localhost:1111");
        p.get_action(&State::new()).await.unwrap();

        assert_eq!(
            registry
                .get(&ConceptKey::from("Concept1"))
                .unwrap()
                .next_iteration(),
            1
        );
    }

    #[test]
    fn double_registration_is_rejected() {
        let client = Arc::new(ScriptedPolicyClient::constant(Action::new()));
        let mut registry = ConceptRegistry::new();
        registry
            .register(ConceptKey::from("Concept1"), predictor(&client, 1111))
            .unwrap();
        let result = registry.register(ConceptKey::from("Concept1"), predictor(&client, 2222));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(k)) if k.as_str() == "Concept1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_key_is_an_error() {
        let mut registry = ConceptRegistry::new();
        assert!(registry.is_empty());
        let err = registry.resolve(&ConceptKey::from("Concept9")).err().unwrap();
        assert_eq!(err, RegistryError::UnknownConcept(ConceptKey::from("Concept9")));
    }

    #[test]
    fn keys_are_sorted() {
        let client = Arc::new(ScriptedPolicyClient::constant(Action::new()));
        let mut registry = ConceptRegistry::new();
        registry.register("b".into(), predictor(&client, 2)).unwrap();
        registry.register("a".into(), predictor(&client, 1)).unwrap();
        let keys: Vec<&str> = registry.keys().map(ConceptKey::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(registry.contains(&"a".into()));
    }
}
