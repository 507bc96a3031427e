//! SessionBuilder - wiring and start-up validation
//!
//! # Fail-fast
//! `build()` checks the concept list and the selection table against each
//! other before any episode runs, so a typo in the table shows up at start-up
//! instead of as an `UnknownConcept` in the middle of an episode.
//!
//! # Blueprint / Session
//! `build()` yields a [`SessionBlueprint`]: the validated configuration plus
//! the shared client. Every `start()` constructs a brand-new registry with
//! brand-new predictors, so parallel sessions never share a cache or counter
//! even when they target the same endpoints.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::dispatch::{SelectionTable, SelectorDispatcher};
use crate::app::predictor::RateLimitedPredictor;
use crate::app::registry::ConceptRegistry;
use crate::app::session::{IterationSource, Session};
use crate::config::{ConfigError, SessionConfig};
use crate::domain::{ConceptKey, ConceptSpec, Selection};
use crate::ports::{Clock, IdGenerator, PolicyClient, SystemClock, UlidGenerator};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("no concepts configured")]
    NoConcepts,

    #[error("concept '{0}' is configured more than once")]
    DuplicateConcept(ConceptKey),

    #[error("selection table is empty")]
    EmptySelectionTable,

    #[error("selection {selection} is mapped twice ('{existing}' and '{duplicate}')")]
    DuplicateSelection {
        selection: Selection,
        existing: ConceptKey,
        duplicate: ConceptKey,
    },

    #[error("selection table refers to unconfigured concepts: {0:?}")]
    MissingConcepts(Vec<ConceptKey>),
}

/// SessionBuilder collects concepts and the selection table.
///
/// # Example
/// ```ignore
/// let blueprint = SessionBuilder::new(client)
///     .concept(ConceptSpec::new("Concept1", Endpoint::parse("http://localhost:1111")?, ControlPeriod::default()))
///     .concept(ConceptSpec::new("Concept2", Endpoint::parse("http://localhost:2222")?, ControlPeriod::default()))
///     .select(Selection(1), "Concept1")
///     .select(Selection(2), "Concept2")
///     .build()?;
/// let mut session = blueprint.start();
/// ```
pub struct SessionBuilder {
    client: Arc<dyn PolicyClient>,
    concepts: Vec<ConceptSpec>,
    selections: Vec<(Selection, ConceptKey)>,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    iteration_source: IterationSource,
}

impl SessionBuilder {
    pub fn new(client: Arc<dyn PolicyClient>) -> Self {
        Self {
            client,
            concepts: Vec::new(),
            selections: Vec::new(),
            clock: Arc::new(SystemClock),
            id_generator: Arc::new(UlidGenerator::new(SystemClock)),
            iteration_source: IterationSource::default(),
        }
    }

    /// Builder pre-filled from a parsed config file.
    pub fn from_config(
        config: &SessionConfig,
        client: Arc<dyn PolicyClient>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Self::new(client).iteration_source(config.iteration);
        for spec in config.concept_specs()? {
            builder = builder.concept(spec);
        }
        for entry in &config.selection {
            builder = builder.select(Selection(entry.decision), entry.concept.as_str());
        }
        Ok(builder)
    }

    pub fn concept(mut self, spec: ConceptSpec) -> Self {
        self.concepts.push(spec);
        self
    }

    pub fn select(mut self, selection: Selection, key: impl Into<ConceptKey>) -> Self {
        self.selections.push((selection, key.into()));
        self
    }

    /// Clock used to stamp step records.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn iteration_source(mut self, source: IterationSource) -> Self {
        self.iteration_source = source;
        self
    }

    pub fn build(self) -> Result<SessionBlueprint, BuildError> {
        if self.concepts.is_empty() {
            return Err(BuildError::NoConcepts);
        }
        let mut concepts = BTreeMap::new();
        for spec in self.concepts {
            if concepts.contains_key(&spec.key) {
                return Err(BuildError::DuplicateConcept(spec.key));
            }
            concepts.insert(spec.key.clone(), spec);
        }

        if self.selections.is_empty() {
            return Err(BuildError::EmptySelectionTable);
        }
        let mut table = SelectionTable::new();
        for (selection, key) in self.selections {
            if let Err(existing) = table.insert(selection, key.clone()) {
                return Err(BuildError::DuplicateSelection {
                    selection,
                    existing,
                    duplicate: key,
                });
            }
        }

        let missing: BTreeSet<ConceptKey> = table
            .targets()
            .filter(|key| !concepts.contains_key(*key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingConcepts(missing.into_iter().collect()));
        }

        let targeted: BTreeSet<&ConceptKey> = table.targets().collect();
        for key in concepts.keys().filter(|key| !targeted.contains(key)) {
            warn!(concept = %key, "concept is configured but no selection routes to it");
        }

        Ok(SessionBlueprint {
            concepts: concepts.into_values().collect(),
            dispatcher: SelectorDispatcher::new(table),
            client: self.client,
            clock: self.clock,
            id_generator: self.id_generator,
            iteration_source: self.iteration_source,
        })
    }
}

/// Validated session configuration; `start()` it once per episode.
#[derive(Clone)]
pub struct SessionBlueprint {
    concepts: Vec<ConceptSpec>,
    dispatcher: SelectorDispatcher,
    client: Arc<dyn PolicyClient>,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    iteration_source: IterationSource,
}

impl SessionBlueprint {
    /// Concepts ordered by key.
    pub fn concepts(&self) -> &[ConceptSpec] {
        &self.concepts
    }

    pub fn selection_table(&self) -> &SelectionTable {
        self.dispatcher.table()
    }

    pub fn iteration_source(&self) -> IterationSource {
        self.iteration_source
    }

    /// Fresh session: new id, new predictors, counters at 0, empty caches.
    pub fn start(&self) -> Session {
        let registry: ConceptRegistry = self
            .concepts
            .iter()
            .map(|spec| {
                let predictor = RateLimitedPredictor::new(
                    spec.endpoint.clone(),
                    spec.control_period,
                    Arc::clone(&self.client),
                );
                (spec.key.clone(), predictor)
            })
            .collect();

        let id = self.id_generator.generate_session_id();
        info!(session = %id, concepts = registry.len(), "session started");
        Session::new(
            id,
            registry,
            self.dispatcher.clone(),
            Arc::clone(&self.clock),
            self.iteration_source,
        )
    }
}
