//! Ports - seams to the outside world
//!
//! Each trait hides one external concern so the predictor and dispatcher
//! can be exercised without a network or a wall clock.

pub mod policy_client;
pub mod clock;
pub mod id_generator;

pub use self::policy_client::PolicyClient;
pub use self::clock::{Clock, SystemClock, FixedClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
