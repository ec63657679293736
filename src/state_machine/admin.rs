//! Administrator workflow transitions

use super::effect::{AdminOp, Effect, Notice};
use super::event::AdminCommand;
use super::state::{AdminAction, AdminStep, ConvContext, Session};
use super::transition::{TransitionError, TransitionResult};
use crate::db::OrderId;
use crate::messages;
use crate::validate;

/// Admin menu; leaves the admin idle
pub(super) fn menu(ctx: &ConvContext) -> TransitionResult {
    TransitionResult::end().with_effect(Effect::reply_with(
        ctx,
        messages::ADMIN_WELCOME,
        messages::admin_menu(),
    ))
}

pub(super) fn command(
    session: Option<&Session>,
    ctx: &ConvContext,
    command: AdminCommand,
) -> Result<TransitionResult, TransitionError> {
    match command {
        AdminCommand::Menu => Ok(menu(ctx)),
        AdminCommand::Begin(action) => Ok(TransitionResult::stay(Session::Admin(
            AdminStep::Selecting { action },
        ))
        .with_effect(Effect::ShowSelection { action })),

        AdminCommand::Pick { action, order_id } => match session {
            Some(Session::Admin(AdminStep::Selecting { action: selecting }))
                if *selecting == action =>
            {
                Ok(target(ctx, action, order_id))
            }
            _ => Err(TransitionError::OutOfOrder),
        },
        AdminCommand::Target { action, order_id } => Ok(target(ctx, action, order_id)),

        AdminCommand::Price { order_id, amount } => Ok(match validate::amount(&amount) {
            Ok(amount) => apply(AdminOp::Price { order_id, amount }),
            Err(_) => TransitionResult::end().with_effect(Effect::reply(ctx, messages::INVALID_AMOUNT)),
        }),
        AdminCommand::Reject { order_id, reason } => Ok(match validate::non_empty(&reason) {
            Ok(reason) => apply(AdminOp::Reject { order_id, reason }),
            Err(_) => TransitionResult::end().with_effect(Effect::reply(ctx, messages::EMPTY_REASON)),
        }),
        AdminCommand::Complete { order_id } => Ok(apply(AdminOp::Complete { order_id })),

        AdminCommand::List { status } => {
            Ok(TransitionResult::end().with_effect(Effect::ListOrders { status }))
        }
        AdminCommand::Stats => Ok(TransitionResult::end().with_effect(Effect::ShowStats)),
        AdminCommand::DeleteMenu => Ok(TransitionResult::end().with_effect(Effect::Notify(
            Notice::replace(ctx, messages::DELETE_PICK).with_keyboard(Some(messages::delete_menu())),
        ))),
        AdminCommand::DeleteOld(filter) => {
            Ok(TransitionResult::end().with_effect(Effect::DeleteOrders(filter)))
        }
    }
}

/// Bind the sub-flow to one order
fn target(ctx: &ConvContext, action: AdminAction, order_id: OrderId) -> TransitionResult {
    match action {
        AdminAction::Price => {
            let prompt = messages::price_prompt(&order_id);
            TransitionResult::stay(Session::Admin(AdminStep::WaitingPrice { order_id }))
                .with_effect(Effect::reply(ctx, prompt))
        }
        AdminAction::Reject => {
            let prompt = messages::reason_prompt(&order_id);
            TransitionResult::stay(Session::Admin(AdminStep::WaitingReason { order_id }))
                .with_effect(Effect::reply(ctx, prompt))
        }
        AdminAction::Complete => apply(AdminOp::Complete { order_id }),
    }
}

fn apply(op: AdminOp) -> TransitionResult {
    TransitionResult::end().with_effect(Effect::ApplyAdmin(op))
}

pub(super) fn on_text(
    step: &AdminStep,
    ctx: &ConvContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let stay = || TransitionResult::stay(Session::Admin(step.clone()));

    match step {
        AdminStep::WaitingPrice { order_id } => Ok(match validate::amount(text) {
            Ok(amount) => apply(AdminOp::Price {
                order_id: order_id.clone(),
                amount,
            }),
            Err(_) => stay().with_effect(Effect::reply(ctx, messages::INVALID_AMOUNT)),
        }),
        AdminStep::WaitingReason { order_id } => Ok(match validate::non_empty(text) {
            Ok(reason) => apply(AdminOp::Reject {
                order_id: order_id.clone(),
                reason,
            }),
            Err(_) => stay().with_effect(Effect::reply(ctx, messages::EMPTY_REASON)),
        }),
        // A typed id stands in for a button press
        AdminStep::Selecting { action } => Ok(match OrderId::parse(text) {
            Some(order_id) => target(ctx, *action, order_id),
            None => stay().with_effect(Effect::reply(ctx, messages::PICK_FROM_LIST)),
        }),
    }
}
