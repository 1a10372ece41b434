//! Route inbound messages between the automated assistant and human agents.
//!
//! Per sender, a conversation is either automated or escalated:
//! 1. Escalated: the message is logged for the agent, nothing is sent
//! 2. Handoff keyword: escalate and send the fixed acknowledgment
//! 3. Otherwise: ask the responder, escalate if it answers with the
//!    fallback sentence, and deliver its reply
//!
//! Agents answer and close escalated conversations through the
//! [`HandoffController`].

pub mod classify;
pub mod dedupe;
pub mod engine;
pub mod error;
pub mod handoff;

#[cfg(test)]
mod testing;

pub use {
    classify::EscalationClassifier,
    engine::{InboundMessage, RouteOutcome, RoutingEngine, RoutingSettings},
    error::{Error, Result},
    handoff::{HandoffController, ReleaseReport},
};
