//! Pure state transition function
//!
//! Maps the current session and an event to the next session and a list of
//! effects. No I/O happens here; store lookups and sends are effects.

use super::admin;
use super::effect::{Effect, Notice};
use super::event::Event;
use super::intake;
use super::state::{ConvContext, Field, IntakeSession, Session, Step};
use crate::db::OrderId;
use crate::messages;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    /// Session after the event; `None` removes it
    pub next: Option<Session>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(next: Option<Session>) -> Self {
        Self {
            next,
            effects: vec![],
        }
    }

    /// Keep (or set) `session`
    pub fn stay(session: Session) -> Self {
        Self::new(Some(session))
    }

    /// Remove the session
    pub fn end() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events that are refused without any effect
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Event does not apply to the current step (stale or repeated)")]
    OutOfOrder,
    #[error("Review confirmed with {0:?} still unanswered")]
    Incomplete(Field),
    #[error("Sender is not allowed to issue this command")]
    NotPermitted,
}

/// Pure transition function
pub fn transition(
    session: Option<&Session>,
    ctx: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let keep = || TransitionResult::new(session.cloned());

    match (session, event) {
        // ============================================================
        // Commands valid from any state
        // ============================================================
        (Some(_), Event::Cancel) => Ok(TransitionResult::end().with_effect(Effect::reply(
            ctx,
            if ctx.is_admin {
                messages::ADMIN_CANCELLED
            } else {
                messages::CANCELLED
            },
        ))),
        (None, Event::Cancel) => {
            Ok(TransitionResult::end().with_effect(Effect::reply(ctx, messages::NOTHING_TO_CANCEL)))
        }

        (_, Event::Help) => Ok(keep().with_effect(Effect::reply(
            ctx,
            if ctx.is_admin {
                messages::ADMIN_HELP
            } else {
                messages::USER_HELP
            },
        ))),

        (_, Event::BadCommand(err)) => {
            Ok(keep().with_effect(Effect::reply(ctx, messages::bad_command(&err))))
        }

        (_, Event::Admin(_)) if !ctx.is_admin => Err(TransitionError::NotPermitted),
        (_, Event::Admin(command)) => admin::command(session, ctx, command),

        (_, Event::Start) if ctx.is_admin => Ok(admin::menu(ctx)),
        (_, Event::Start) => {
            let (question, keyboard) = messages::prompt(Field::Name, false);
            let greeting = Notice::reply(ctx, format!("{}\n{question}", messages::WELCOME))
                .with_keyboard(keyboard);
            Ok(TransitionResult::stay(Session::Intake(IntakeSession::new()))
                .with_effect(Effect::Notify(greeting)))
        }

        // ============================================================
        // Tracking
        // ============================================================
        (_, Event::Track { order_id: Some(raw) }) => Ok(keep().with_effect(track(ctx, &raw))),
        (_, Event::Track { order_id: None }) => {
            // An unfinished form is parked until the id arrives
            let resume = match session {
                Some(Session::Intake(intake)) => Some(intake.clone()),
                Some(Session::Tracking { resume }) => resume.clone(),
                _ => None,
            };
            Ok(TransitionResult::stay(Session::Tracking { resume })
                .with_effect(Effect::reply(ctx, messages::TRACK_PROMPT)))
        }
        (Some(Session::Tracking { resume }), Event::Text(raw)) => {
            let result = TransitionResult::new(resume.clone().map(Session::Intake))
                .with_effect(track(ctx, &raw));
            Ok(match resume {
                Some(intake) => result.with_effect(intake::resume_prompt(intake, ctx)),
                None => result,
            })
        }
        (_, Event::MyOrders) => Ok(keep().with_effect(Effect::ListMine)),

        // ============================================================
        // Intake and admin sub-flows
        // ============================================================
        (Some(Session::Intake(intake)), Event::Text(text)) => intake::on_text(intake, ctx, &text),
        (Some(Session::Intake(intake)), Event::Choice(choice)) => {
            intake::on_choice(intake, ctx, choice)
        }
        (Some(Session::Admin(step)), Event::Text(text)) if ctx.is_admin => {
            admin::on_text(step, ctx, &text)
        }

        (None, Event::Text(_)) => Ok(TransitionResult::end().with_effect(Effect::reply(
            ctx,
            if ctx.is_admin {
                messages::ADMIN_HELP
            } else {
                messages::START_FIRST
            },
        ))),
        (Some(_), Event::Text(_)) => Ok(keep().with_effect(Effect::reply(ctx, messages::START_FIRST))),

        // A button from a finished or different flow
        (_, Event::Choice(_)) => Err(TransitionError::OutOfOrder),
    }
}

fn track(ctx: &ConvContext, raw: &str) -> Effect {
    match OrderId::parse(raw) {
        Some(order_id) => Effect::Track { order_id },
        None => Effect::reply(ctx, messages::order_not_found(raw)),
    }
}

/// True when `session` is an intake at `step`
pub fn at_step(session: Option<&Session>, step: Step) -> bool {
    matches!(session, Some(Session::Intake(intake)) if intake.step == step)
}
