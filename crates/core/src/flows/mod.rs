pub mod engine;
pub mod fields;

pub use engine::{
    MissingFields, Prompt, SessionLease, SessionLocks, SessionMachine, SessionSettings, SessionView,
    TurnOutcome,
};
pub use fields::{FieldValue, SessionField};
