//! Agent runtime - routing, workers, and the bounded workflow loop
//!
//! This crate is the "brain" of the staffer system:
//! - Routes natural-language tasks to specialized worker agents
//! - Runs the stateful slot-filling protocols for scheduling and messaging
//! - Synthesizes worker outcomes into one user-facing reply
//!
//! # Architecture
//!
//! One request flows through a constrained loop:
//! 1. **Routing** (`router`) - NL task -> `RouterDecision` (delegate or clarify)
//! 2. **Execution** (`agents`) - one worker per delegation, in priority order
//! 3. **Synthesis** (`synthesizer`) - outcomes -> final reply
//!
//! The loop is hard-bounded by `workflow.max_iterations`; a worker asking a
//! clarification question suspends the run and returns to the user.
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator and drafter. Whether an event is booked
//! or a message is sent is decided by the deterministic gatekeeper in
//! `staffer-core`, never by model output.

pub mod agents;
pub mod context;
pub mod delivery;
pub mod llm;
pub mod router;
pub mod synthesizer;
pub mod workflow;

pub mod testing;
