//! AI interpretation of vitals
//!
//! Remote interpretation under a hard deadline with a deterministic local
//! fallback, plus the generic deadline combinator it is built on.

pub mod client;
pub mod deadline;
pub mod fallback;

pub use client::{
    HttpInterpreter, Interpretation, InterpretationClient, InterpretationPrompt,
    InterpretationSource, Interpreter, INTERPRETATION_DEADLINE,
};
pub use deadline::{first_to_settle, Settled};
pub use fallback::fallback_report;
