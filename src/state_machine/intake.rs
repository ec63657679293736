//! User intake form transitions

use super::effect::{Effect, Notice};
use super::event::{BusinessKind, Choice, PurposeKind};
use super::state::{next_field, ConvContext, Field, FieldValue, IntakeSession, Session, Step};
use super::transition::{TransitionError, TransitionResult};
use crate::messages;
use crate::validate::{self, ValidationError};

/// Parsed answer to the current step
enum Outcome {
    Accept(FieldValue),
    /// "Other" picked on a field with a free-text follow-up
    AskCustom(Field),
    Reject(Option<ValidationError>),
}

pub(super) fn on_text(
    intake: &IntakeSession,
    ctx: &ConvContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let Some((field, custom)) = intake.step.target() else {
        return on_review_text(intake, ctx, text);
    };

    let outcome = if custom {
        match validate::non_empty(text) {
            Ok(value) => Outcome::Accept(FieldValue::Text(field, value)),
            Err(e) => Outcome::Reject(Some(e)),
        }
    } else {
        parse_answer(field, text)
    };
    Ok(apply(intake, ctx, field, outcome))
}

fn parse_answer(field: Field, text: &str) -> Outcome {
    let checked = |result: Result<String, ValidationError>| match result {
        Ok(value) => Outcome::Accept(FieldValue::Text(field, value)),
        Err(e) => Outcome::Reject(Some(e)),
    };

    match field {
        Field::Name => checked(validate::name(text)),
        Field::Phone => checked(validate::phone(text)),
        Field::Email => checked(validate::email(text)),
        Field::Features => checked(validate::non_empty(text)),
        Field::Extra => Outcome::Accept(FieldValue::Text(field, validate::optional_text(text))),
        Field::Business => match BusinessKind::from_text(text) {
            Some(kind) => business(kind),
            None => Outcome::Reject(None),
        },
        Field::Purpose => match PurposeKind::from_text(text) {
            Some(kind) => purpose(kind),
            None => Outcome::Reject(None),
        },
        Field::Domain | Field::Support => match validate::yes_no(text) {
            Some(flag) => Outcome::Accept(FieldValue::Flag(field, flag)),
            None => Outcome::Reject(None),
        },
    }
}

fn business(kind: BusinessKind) -> Outcome {
    match kind {
        BusinessKind::Other => Outcome::AskCustom(Field::Business),
        kind => Outcome::Accept(FieldValue::Text(Field::Business, kind.label().to_string())),
    }
}

fn purpose(kind: PurposeKind) -> Outcome {
    match kind {
        PurposeKind::Other => Outcome::AskCustom(Field::Purpose),
        kind => Outcome::Accept(FieldValue::Text(Field::Purpose, kind.label().to_string())),
    }
}

pub(super) fn on_choice(
    intake: &IntakeSession,
    ctx: &ConvContext,
    choice: Choice,
) -> Result<TransitionResult, TransitionError> {
    if intake.step == Step::Confirm {
        return on_review_choice(intake, ctx, &choice);
    }

    // Option buttons only count for the exact step that offered them
    let expected = intake.step.target();
    let Some(field) = choice.field().filter(|f| expected == Some((*f, false))) else {
        return Err(TransitionError::OutOfOrder);
    };

    let outcome = match choice {
        Choice::Business(kind) => business(kind),
        Choice::Purpose(kind) => purpose(kind),
        Choice::Domain(flag) | Choice::Support(flag) => Outcome::Accept(FieldValue::Flag(field, flag)),
        Choice::Confirm | Choice::Discard | Choice::Edit | Choice::EditField(_) => {
            return Err(TransitionError::OutOfOrder)
        }
    };
    Ok(apply(intake, ctx, field, outcome))
}

fn apply(
    intake: &IntakeSession,
    ctx: &ConvContext,
    field: Field,
    outcome: Outcome,
) -> TransitionResult {
    match outcome {
        Outcome::Reject(error) => {
            let (text, keyboard) = messages::invalid(field, error);
            TransitionResult::stay(Session::Intake(intake.clone()))
                .with_effect(Effect::Notify(Notice::reply(ctx, text).with_keyboard(keyboard)))
        }
        Outcome::AskCustom(field) => {
            let step = if intake.step.is_editing() {
                Step::Editing {
                    field,
                    custom: true,
                }
            } else {
                Step::custom_for(field).unwrap_or(intake.step)
            };
            let (text, _) = messages::prompt(field, true);
            let next = IntakeSession {
                step,
                ..intake.clone()
            };
            TransitionResult::stay(Session::Intake(next)).with_effect(Effect::reply(ctx, text))
        }
        Outcome::Accept(value) => accept(intake, ctx, value),
    }
}

fn accept(intake: &IntakeSession, ctx: &ConvContext, value: FieldValue) -> TransitionResult {
    let field = value.field();
    let mut next = intake.clone();
    next.answers.set(value);

    if !intake.step.is_editing() {
        if let Some(following) = next_field(field) {
            next.step = Step::asking(following);
            let (text, keyboard) = messages::prompt(following, false);
            return TransitionResult::stay(Session::Intake(next))
                .with_effect(Effect::Notify(Notice::reply(ctx, text).with_keyboard(keyboard)));
        }
    }

    // Last field answered, or an edit finished: show the review screen.
    // The id is assigned once and survives later edits.
    let order_id = next
        .order_id
        .get_or_insert_with(|| ctx.order_id_candidate.clone())
        .clone();
    next.step = Step::Confirm;
    let review = messages::review(&order_id, &next.answers);
    TransitionResult::stay(Session::Intake(next))
        .with_effect(Effect::reply_with(ctx, review, messages::review_keyboard()))
}

/// The current question again, for picking the form back up after a detour
pub(super) fn resume_prompt(intake: &IntakeSession, ctx: &ConvContext) -> Effect {
    match intake.step.target() {
        Some((field, custom)) => {
            let (text, keyboard) = messages::prompt(field, custom);
            Effect::Notify(Notice::reply(ctx, text).with_keyboard(keyboard))
        }
        None => {
            let order_id = intake.order_id.as_ref().unwrap_or(&ctx.order_id_candidate);
            let review = messages::review(order_id, &intake.answers);
            Effect::reply_with(ctx, review, messages::review_keyboard())
        }
    }
}

// ============================================================================
// Review screen
// ============================================================================

fn on_review_text(
    intake: &IntakeSession,
    ctx: &ConvContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let trimmed = text.trim();
    if matches!(trimmed, "ویرایش" | "edit") {
        return on_review_choice(intake, ctx, &Choice::Edit);
    }
    match validate::yes_no(trimmed) {
        Some(true) => on_review_choice(intake, ctx, &Choice::Confirm),
        Some(false) => on_review_choice(intake, ctx, &Choice::Discard),
        None => Ok(TransitionResult::stay(Session::Intake(intake.clone())).with_effect(
            Effect::reply_with(ctx, messages::CONFIRM_HINT, messages::review_keyboard()),
        )),
    }
}

fn on_review_choice(
    intake: &IntakeSession,
    ctx: &ConvContext,
    choice: &Choice,
) -> Result<TransitionResult, TransitionError> {
    match choice {
        Choice::Confirm => {
            let order_id = intake
                .order_id
                .clone()
                .unwrap_or_else(|| ctx.order_id_candidate.clone());
            let submission = intake
                .answers
                .to_submission(order_id, &ctx.user_id, ctx.username.as_deref())
                .ok_or_else(|| {
                    TransitionError::Incomplete(
                        intake.answers.first_missing().unwrap_or(Field::Name),
                    )
                })?;
            // The runtime restores this session if the append fails
            Ok(TransitionResult::end().with_effect(Effect::CommitOrder(Box::new(submission))))
        }
        Choice::Discard => Ok(TransitionResult::end()
            .with_effect(Effect::Notify(Notice::replace(ctx, messages::CANCELLED)))),
        Choice::Edit => Ok(TransitionResult::stay(Session::Intake(intake.clone())).with_effect(
            Effect::Notify(
                Notice::replace(ctx, messages::EDIT_PICK)
                    .with_keyboard(Some(messages::edit_keyboard())),
            ),
        )),
        Choice::EditField(field) => {
            let next = IntakeSession {
                step: Step::Editing {
                    field: *field,
                    custom: false,
                },
                ..intake.clone()
            };
            let (text, keyboard) = messages::prompt(*field, false);
            Ok(TransitionResult::stay(Session::Intake(next))
                .with_effect(Effect::Notify(Notice::reply(ctx, text).with_keyboard(keyboard))))
        }
        Choice::Business(_) | Choice::Purpose(_) | Choice::Domain(_) | Choice::Support(_) => {
            Err(TransitionError::OutOfOrder)
        }
    }
}
