//! Impls - port implementations
//!
//! # Included
//! - **HttpPolicyClient**: talks to a policy server over HTTP (reqwest)
//! - **ScriptedPolicyClient**: in-memory, records calls; for tests and offline runs

pub mod http_client;
pub mod scripted_client;

pub use self::http_client::{HttpPolicyClient, RequestMethod};
pub use self::scripted_client::{RecordedCall, ScriptedPolicyClient};
