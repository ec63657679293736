//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! intake form for customers and the order workflow for the administrator.

mod admin;
pub mod effect;
pub mod event;
mod intake;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, Session};
pub use transition::{transition, TransitionError};
