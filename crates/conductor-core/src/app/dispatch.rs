//! SelectorDispatcher - routes a step to the concept picked by the selector
//!
//! # Flow
//! 1. `SelectionTable` maps the decision value to a concept key
//! 2. `ConceptRegistry` resolves the key to that session's predictor
//! 3. the predictor answers (fresh query or cached action)
//!
//! The dispatcher returns the action as-is. Merging it into the plant's
//! actuation state is the plant's job.

use std::collections::BTreeMap;

use tracing::debug;

use crate::app::predictor::Prediction;
use crate::app::registry::ConceptRegistry;
use crate::domain::{Action, ConceptKey, ErrorKind, PredictorError, Selection, State};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("selection {0} is not in the configured selection table")]
    InvalidSelection(Selection),

    #[error("no predictor registered for concept '{0}'")]
    UnknownConcept(ConceptKey),

    #[error("concept '{concept}' failed: {source}")]
    Predictor {
        concept: ConceptKey,
        #[source]
        source: PredictorError,
    },
}

impl DispatchError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Predictor { source, .. } => source.error_kind(),
            Self::InvalidSelection(_) | Self::UnknownConcept(_) => ErrorKind::Permanent,
        }
    }
}

/// Fixed `selection -> concept` table, configured once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTable {
    entries: BTreeMap<Selection, ConceptKey>,
}

impl SelectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key already mapped to `selection` if there is one, and
    /// leaves the table unchanged in that case.
    pub fn insert(&mut self, selection: Selection, key: ConceptKey) -> Result<(), ConceptKey> {
        if let Some(existing) = self.entries.get(&selection) {
            return Err(existing.clone());
        }
        self.entries.insert(selection, key);
        Ok(())
    }

    pub fn concept_for(&self, selection: Selection) -> Result<&ConceptKey, DispatchError> {
        self.entries
            .get(&selection)
            .ok_or(DispatchError::InvalidSelection(selection))
    }

    /// Valid selection values, ascending.
    pub fn domain(&self) -> impl Iterator<Item = Selection> + '_ {
        self.entries.keys().copied()
    }

    pub fn targets(&self) -> impl Iterator<Item = &ConceptKey> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Selection, &ConceptKey)> {
        self.entries.iter().map(|(s, k)| (*s, k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of one routed step.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub concept: ConceptKey,
    pub prediction: Prediction,
}

/// Stateless router; all mutable state lives in the predictors it resolves.
#[derive(Debug, Clone)]
pub struct SelectorDispatcher {
    table: SelectionTable,
}

impl SelectorDispatcher {
    pub fn new(table: SelectionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SelectionTable {
        &self.table
    }

    pub async fn dispatch(
        &self,
        registry: &mut ConceptRegistry,
        selection: Selection,
        state: &State,
    ) -> Result<Action, DispatchError> {
        self.route(registry, selection, state)
            .await
            .map(|routed| routed.prediction.action)
    }

    /// Like `dispatch`, also reporting which concept answered and whether it
    /// queried its endpoint. The predictor uses its own counter.
    pub async fn route(
        &self,
        registry: &mut ConceptRegistry,
        selection: Selection,
        state: &State,
    ) -> Result<Routed, DispatchError> {
        self.route_with(registry, selection, state, None).await
    }

    /// Like `route`, with the iteration supplied by the caller.
    pub async fn route_at(
        &self,
        registry: &mut ConceptRegistry,
        selection: Selection,
        state: &State,
        iteration: u64,
    ) -> Result<Routed, DispatchError> {
        self.route_with(registry, selection, state, Some(iteration)).await
    }

    async fn route_with(
        &self,
        registry: &mut ConceptRegistry,
        selection: Selection,
        state: &State,
        iteration: Option<u64>,
    ) -> Result<Routed, DispatchError> {
        let concept = self.table.concept_for(selection)?;
        let predictor = registry
            .resolve(concept)
            .map_err(|_| DispatchError::UnknownConcept(concept.clone()))?;
        debug!(%selection, %concept, ?iteration, "dispatching step");

        let prediction = match iteration {
            Some(iteration) => predictor.predict_at(state, iteration).await,
            None => predictor.predict(state).await,
        }
        .map_err(|source| DispatchError::Predictor {
            concept: concept.clone(),
            source,
        })?;

        Ok(Routed {
            concept: concept.clone(),
            prediction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::predictor::RateLimitedPredictor;
    use crate::domain::{ControlPeriod, Endpoint, InferenceError};
    use crate::impls::ScriptedPolicyClient;
    use std::sync::Arc;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::parse(&format!("http://localhost:{port}")).unwrap()
    }

    /// Concept1 on :1111 answers `{"c": 1}`, Concept2 on :2222 answers
    /// `{"c": 2, "x": <state.x>}`.
    fn two_concept_setup(
        period2: u64,
    ) -> (Arc<ScriptedPolicyClient>, ConceptRegistry, SelectorDispatcher) {
        let client = Arc::new(ScriptedPolicyClient::new(|ep, state| {
            if ep.base().ends_with(":1111") {
                Ok(Action::new().with("c", 1.0))
            } else {
                let x = state.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
                Ok(Action::new().with("c", 2.0).with("x", x))
            }
        }));

        let mut registry = ConceptRegistry::new();
        registry
            .register(
                "Concept1".into(),
                RateLimitedPredictor::new(endpoint(1111), ControlPeriod::default(), client.clone()),
            )
            .unwrap();
        registry
            .register(
                "Concept2".into(),
                RateLimitedPredictor::new(
                    endpoint(2222),
                    ControlPeriod::new(period2).unwrap(),
                    client.clone(),
                ),
            )
            .unwrap();

        let mut table = SelectionTable::new();
        table.insert(Selection(1), "Concept1".into()).unwrap();
        table.insert(Selection(2), "Concept2".into()).unwrap();

        (client, registry, SelectorDispatcher::new(table))
    }

    #[tokio::test]
    async fn dispatch_returns_concept_action_unmodified() {
        let client = Arc::new(ScriptedPolicyClient::constant(
            Action::new().with("f1", 0.25).with("f2", -3.5),
        ));
        let mut registry = ConceptRegistry::new();
        registry
            .register(
                "Concept1".into(),
                RateLimitedPredictor::new(endpoint(1111), ControlPeriod::default(), client),
            )
            .unwrap();
        let mut table = SelectionTable::new();
        table.insert(Selection(1), "Concept1".into()).unwrap();
        let dispatcher = SelectorDispatcher::new(table);

        let action = dispatcher
            .dispatch(&mut registry, Selection(1), &State::new().with("x", 1.0))
            .await
            .unwrap();

        assert_eq!(action, Action::new().with("f1", 0.25).with("f2", -3.5));
    }

    #[tokio::test]
    async fn selection_two_routes_to_concept2_only() {
        let (client, mut registry, dispatcher) = two_concept_setup(1);

        let routed = dispatcher
            .route(&mut registry, Selection(2), &State::new().with("x", 1.0))
            .await
            .unwrap();

        assert_eq!(routed.concept, ConceptKey::from("Concept2"));
        assert_eq!(routed.prediction.action, Action::new().with("c", 2.0).with("x", 1.0));
        assert_eq!(client.calls_to(&endpoint(2222)), 1);
        assert_eq!(client.calls_to(&endpoint(1111)), 0);
        assert_eq!(registry.get(&"Concept1".into()).unwrap().next_iteration(), 0);
    }

    #[tokio::test]
    async fn concept1_activity_does_not_touch_concept2_cache() {
        let (client, mut registry, dispatcher) = two_concept_setup(2);
        let s = |x: f64| State::new().with("x", x);

        let first = dispatcher.dispatch(&mut registry, Selection(2), &s(1.0)).await.unwrap();
        for x in [5.0, 6.0, 7.0] {
            dispatcher.dispatch(&mut registry, Selection(1), &s(x)).await.unwrap();
        }
        // Concept2's own counter is at 1: cache step.
        let second = dispatcher.dispatch(&mut registry, Selection(2), &s(9.0)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.calls_to(&endpoint(2222)), 1);
        assert_eq!(client.calls_to(&endpoint(1111)), 3);
    }

    #[tokio::test]
    async fn invalid_selection_makes_no_call() {
        let (client, mut registry, dispatcher) = two_concept_setup(1);

        let err = dispatcher
            .dispatch(&mut registry, Selection(3), &State::new())
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::InvalidSelection(Selection(3)));
        assert_eq!(err.error_kind(), ErrorKind::Permanent);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn table_target_without_predictor_is_unknown_concept() {
        let (client, mut registry, _) = two_concept_setup(1);
        let mut table = SelectionTable::new();
        table.insert(Selection(7), "Ghost".into()).unwrap();
        let dispatcher = SelectorDispatcher::new(table);

        let err = dispatcher
            .dispatch(&mut registry, Selection(7), &State::new())
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::UnknownConcept("Ghost".into()));
        assert_eq!(err.error_kind(), ErrorKind::Permanent);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn predictor_failure_names_the_concept() {
        let (client, mut registry, dispatcher) = two_concept_setup(1);
        client.set_failure(Some(InferenceError::Unreachable {
            endpoint: endpoint(2222).to_string(),
            reason: "connection refused".into(),
        }));

        let err = dispatcher
            .dispatch(&mut registry, Selection(2), &State::new())
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            DispatchError::Predictor { concept, source: PredictorError::Inference(_) }
                if concept.as_str() == "Concept2"
        ));
        assert_eq!(err.error_kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn route_at_uses_supplied_iteration() {
        let (client, mut registry, dispatcher) = two_concept_setup(3);

        let first = dispatcher
            .route_at(&mut registry, Selection(2), &State::new().with("x", 1.0), 0)
            .await
            .unwrap();
        let cached = dispatcher
            .route_at(&mut registry, Selection(2), &State::new().with("x", 2.0), 5)
            .await
            .unwrap();
        let fresh = dispatcher
            .route_at(&mut registry, Selection(2), &State::new().with("x", 3.0), 6)
            .await
            .unwrap();

        assert!(first.prediction.queried);
        assert_eq!((cached.prediction.iteration, cached.prediction.queried), (5, false));
        assert_eq!(cached.prediction.action, first.prediction.action);
        assert_eq!((fresh.prediction.iteration, fresh.prediction.queried), (6, true));
        assert_eq!(fresh.prediction.action.get("x"), Some(3.0));
        assert_eq!(client.calls_to(&endpoint(2222)), 2);
        assert_eq!(registry.get(&"Concept2".into()).unwrap().next_iteration(), 7);
    }

    #[test]
    fn table_rejects_duplicate_selection() {
        let mut table = SelectionTable::new();
        table.insert(Selection(1), "Concept1".into()).unwrap();
        let existing = table.insert(Selection(1), "Concept2".into()).unwrap_err();
        assert_eq!(existing, ConceptKey::from("Concept1"));
        assert_eq!(table.concept_for(Selection(1)).unwrap().as_str(), "Concept1");
        assert_eq!(table.domain().collect::<Vec<_>>(), vec![Selection(1)]);
    }
}
