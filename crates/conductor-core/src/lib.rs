//! conductor-core
//!
//! Core building blocks for routing a control loop's decision steps to
//! remotely served concept policies.
//!
//! # Module layout
//! - **domain**: plain data (state, action, concept key, control period, endpoint, selection, errors)
//! - **ports**: seams to the outside world (PolicyClient, Clock, IdGenerator)
//! - **impls**: port implementations (HttpPolicyClient, ScriptedPolicyClient)
//! - **app**: predictor, concept registry, selector dispatch, session wiring
//! - **config**: TOML session configuration

pub mod domain;
pub mod ports;
pub mod impls;
pub mod app;
pub mod config;

pub use self::app::{
    ConceptRegistry, RateLimitedPredictor, SelectionTable, SelectorDispatcher, Session,
    SessionBlueprint, SessionBuilder,
};
pub use self::domain::{Action, ConceptKey, ControlPeriod, Endpoint, Selection, State};
