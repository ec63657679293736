//! Conversation runtime executor
//!
//! For one identity the runtime holds that identity's lock while it reads the
//! session, runs the pure transition, executes store effects and writes the
//! session back with compare-and-swap. Messages go out only after the lock is
//! released.

use super::locks::KeyedLocks;
use super::traits::{Notifier, NotifyOptions, OrderStore, SessionError, SessionStore};
use super::Sender;
use crate::db::{DbError, Order, OrderFilter, OrderId, OrderStatus};
use crate::messages;
use crate::state_machine::effect::{AdminOp, Notice};
use crate::state_machine::event::DeleteFilter;
use crate::state_machine::state::{AdminAction, Step};
use crate::state_machine::transition::at_step;
use crate::state_machine::{transition, ConvContext, Effect, Event, Session, TransitionError};
use chrono::{Duration, Utc};

/// Tries before giving up on finding an unused order id
const ID_ATTEMPTS: usize = 8;

/// Orders offered on one selection keyboard, newest first
const SELECTION_LIMIT: usize = 40;

/// How one inbound event was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Refused by the state machine with no effect
    Refused(TransitionError),
    /// The session changed underneath; the result was discarded
    Conflict,
    /// The session store failed
    Failed,
}

/// What an effect does to the pending session write
enum Flow {
    Continue,
    /// Remove the session regardless of the transition's choice
    EndSession,
    /// Keep the session as it was before the event
    Restore,
}

/// Work to do once the identity's lock is released
#[derive(Debug)]
enum Followup {
    /// Tell the admin about a newly committed order
    Announce(Order),
    /// Drop the owner's session if it still refers to this order
    CloseOwnerSession { chat_id: String, order_id: OrderId },
}

#[derive(Default)]
struct Pass {
    notices: Vec<Notice>,
    followups: Vec<Followup>,
}

/// Generic runtime that can work with any session store, order store and notifier
pub struct ConversationRuntime<S, O, N>
where
    S: SessionStore,
    O: OrderStore,
    N: Notifier,
{
    admin_id: String,
    sessions: S,
    orders: O,
    notifier: N,
    locks: KeyedLocks,
}

impl<S, O, N> ConversationRuntime<S, O, N>
where
    S: SessionStore,
    O: OrderStore,
    N: Notifier,
{
    pub fn new(admin_id: impl Into<String>, sessions: S, orders: O, notifier: N) -> Self {
        Self {
            admin_id: admin_id.into(),
            sessions,
            orders,
            notifier,
            locks: KeyedLocks::new(),
        }
    }

    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Handle one inbound event for `sender`
    pub async fn handle(&self, sender: &Sender, event: Event) -> Outcome {
        let result = {
            let _guard = self.locks.lock(&sender.user_id).await;
            self.step(sender, event).await
        };

        match result {
            Ok((Outcome::Applied, pass)) => {
                self.deliver(pass.notices).await;
                for followup in pass.followups {
                    self.run_followup(followup).await;
                }
                Outcome::Applied
            }
            Ok((outcome, _)) => outcome,
            Err(e) => {
                tracing::error!(user_id = %sender.user_id, error = %e, "Session store failed");
                self.deliver(vec![Notice::new(
                    sender.user_id.clone(),
                    messages::GENERIC_FAILURE,
                )])
                .await;
                Outcome::Failed
            }
        }
    }

    /// Everything that happens under the identity's lock
    async fn step(&self, sender: &Sender, event: Event) -> Result<(Outcome, Pass), SessionError> {
        let current = self.sessions.get(&sender.user_id).await?;
        let ctx = self.context(sender, current.as_ref()).await;

        let result = match transition(current.as_ref(), &ctx, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(user_id = %sender.user_id, reason = %e, "Event refused");
                return Ok((Outcome::Refused(e), Pass::default()));
            }
        };

        let mut next = result.next;
        let mut restore = false;
        let mut pass = Pass::default();
        for effect in result.effects {
            match self.execute_effect(&ctx, effect, &mut pass).await {
                Flow::Continue => {}
                Flow::EndSession => next = None,
                Flow::Restore => restore = true,
            }
        }
        if restore {
            next.clone_from(&current);
        }

        let from = current.as_ref().map(Session::name);
        let to = next.as_ref().map(Session::name);
        if self
            .sessions
            .compare_and_swap(&sender.user_id, current.as_ref(), next)
            .await?
        {
            tracing::debug!(user_id = %sender.user_id, ?from, ?to, "Session updated");
            Ok((Outcome::Applied, pass))
        } else {
            tracing::warn!(
                user_id = %sender.user_id,
                dropped_notices = pass.notices.len(),
                "Session changed during transition; discarding result"
            );
            Ok((Outcome::Conflict, Pass::default()))
        }
    }

    async fn context(&self, sender: &Sender, current: Option<&Session>) -> ConvContext {
        // Only the support answer can open the review screen for the first time
        let needs_id = at_step(current, Step::Support)
            && current.and_then(Session::order_id).is_none();
        let candidate = if needs_id {
            self.fresh_order_id().await
        } else {
            OrderId::generate()
        };

        ConvContext::new(sender.user_id.clone(), self.admin_id.clone(), candidate)
            .with_admin(sender.is_admin)
            .with_username(sender.username.clone())
            .with_message_ref(sender.message_ref.clone())
    }

    /// An id not yet present in the store
    async fn fresh_order_id(&self) -> OrderId {
        let mut candidate = OrderId::generate();
        for _ in 0..ID_ATTEMPTS {
            match self.orders.get(&candidate).await {
                Ok(None) => break,
                Ok(Some(_)) => {
                    tracing::warn!(order_id = %candidate, "Order id collision, regenerating");
                    candidate = OrderId::generate();
                }
                Err(e) => {
                    // The append rejects duplicates anyway
                    tracing::warn!(error = %e, "Could not check order id");
                    break;
                }
            }
        }
        candidate
    }

    // ========================================================================
    // Effects
    // ========================================================================

    async fn execute_effect(&self, ctx: &ConvContext, effect: Effect, pass: &mut Pass) -> Flow {
        match effect {
            Effect::Notify(notice) => {
                pass.notices.push(notice);
                Flow::Continue
            }
            Effect::CommitOrder(submission) => {
                let order = Order::from_submission(*submission, Utc::now());
                self.commit(ctx, order, pass).await
            }
            Effect::Track { order_id } => {
                let text = match self.orders.get(&order_id).await {
                    Ok(Some(order)) if order.chat_id == ctx.user_id => messages::order_status(&order),
                    Ok(_) => messages::order_not_found(order_id.as_str()),
                    Err(e) => {
                        tracing::error!(%order_id, error = %e, "Order lookup failed");
                        messages::GENERIC_FAILURE.to_string()
                    }
                };
                pass.notices.push(Notice::reply(ctx, text));
                Flow::Continue
            }
            Effect::ListMine => {
                let text = match self.orders.list(&OrderFilter::owned_by(ctx.user_id.clone())).await {
                    Ok(orders) => messages::my_orders(&orders),
                    Err(e) => {
                        tracing::error!(error = %e, "Listing own orders failed");
                        messages::GENERIC_FAILURE.to_string()
                    }
                };
                pass.notices.push(Notice::reply(ctx, text));
                Flow::Continue
            }
            Effect::ShowSelection { action } => self.show_selection(ctx, action, pass).await,
            Effect::ApplyAdmin(op) => {
                self.apply_admin(ctx, op, pass).await;
                Flow::Continue
            }
            Effect::ListOrders { status } => {
                let filter = match status {
                    Some(status) => OrderFilter::with_statuses([status]),
                    None => OrderFilter::all(),
                };
                let text = match self.orders.list(&filter).await {
                    Ok(orders) => messages::order_list(&orders, status),
                    Err(e) => {
                        tracing::error!(error = %e, "Listing orders failed");
                        messages::GENERIC_FAILURE.to_string()
                    }
                };
                pass.notices.push(Notice::reply(ctx, text));
                Flow::Continue
            }
            Effect::ShowStats => {
                let text = match self.orders.stats().await {
                    Ok(stats) => messages::stats(&stats),
                    Err(e) => {
                        tracing::error!(error = %e, "Computing stats failed");
                        messages::GENERIC_FAILURE.to_string()
                    }
                };
                pass.notices.push(Notice::reply(ctx, text));
                Flow::Continue
            }
            Effect::DeleteOrders(filter) => {
                let store_filter = match filter {
                    DeleteFilter::OlderThanDays(days) => Duration::try_days(i64::from(days))
                        .and_then(|age| Utc::now().checked_sub_signed(age))
                        .map(OrderFilter::created_before),
                    DeleteFilter::Status(status) => Some(OrderFilter::with_statuses([status])),
                };
                // A cutoff before the earliest representable instant matches nothing
                let outcome = match store_filter {
                    Some(store_filter) => self.orders.delete_matching(&store_filter).await,
                    None => Ok(0),
                };
                let text = match outcome {
                    Ok(count) => {
                        tracing::info!(?filter, count, "Admin bulk delete");
                        messages::deleted(count)
                    }
                    Err(e) => {
                        tracing::error!(?filter, error = %e, "Bulk delete failed");
                        messages::GENERIC_FAILURE.to_string()
                    }
                };
                pass.notices.push(Notice::reply(ctx, text));
                Flow::Continue
            }
        }
    }

    async fn commit(&self, ctx: &ConvContext, order: Order, pass: &mut Pass) -> Flow {
        match self.orders.append(&order).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, chat_id = %order.chat_id, "Order committed");
                pass.notices.push(Notice::reply(ctx, messages::submitted(&order.id)));
                pass.followups.push(Followup::Announce(order));
                Flow::Continue
            }
            Err(DbError::DuplicateOrder(id)) => {
                // A retried confirm whose first append already landed
                tracing::info!(order_id = %id, "Order already committed");
                pass.notices.push(Notice::reply(ctx, messages::submitted(&id)));
                Flow::Continue
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Failed to append order");
                pass.notices.push(Notice::reply(ctx, messages::STORE_FAILURE));
                Flow::Restore
            }
        }
    }

    async fn show_selection(&self, ctx: &ConvContext, action: AdminAction, pass: &mut Pass) -> Flow {
        let filter = OrderFilter::with_statuses(messages::eligible_statuses(action).iter().copied());
        match self.orders.list(&filter).await {
            Ok(orders) if orders.is_empty() => {
                pass.notices
                    .push(Notice::reply(ctx, messages::nothing_eligible(action)));
                Flow::EndSession
            }
            Ok(orders) => {
                let start = orders.len().saturating_sub(SELECTION_LIMIT);
                let newest: Vec<Order> = orders[start..].iter().rev().cloned().collect();
                let (text, keyboard) = messages::selection(action, &newest);
                pass.notices
                    .push(Notice::replace(ctx, text).with_keyboard(Some(keyboard)));
                Flow::Continue
            }
            Err(e) => {
                tracing::error!(?action, error = %e, "Listing eligible orders failed");
                pass.notices
                    .push(Notice::reply(ctx, messages::GENERIC_FAILURE));
                Flow::EndSession
            }
        }
    }

    async fn apply_admin(&self, ctx: &ConvContext, op: AdminOp, pass: &mut Pass) {
        let order_id = op.order_id().clone();
        let to = op.target_status();

        let current = match self.orders.get(&order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                pass.notices
                    .push(Notice::reply(ctx, messages::order_not_found(order_id.as_str())));
                return;
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "Order lookup failed");
                pass.notices
                    .push(Notice::reply(ctx, messages::GENERIC_FAILURE));
                return;
            }
        };
        if !current.status.can_transition_to(to) {
            pass.notices.push(Notice::reply(
                ctx,
                messages::cannot_transition(&order_id, current.status, to),
            ));
            return;
        }

        let status_text = match &op {
            AdminOp::Price { amount, .. } => messages::price_status_text(*amount),
            AdminOp::Reject { reason, .. } => reason.clone(),
            AdminOp::Complete { .. } => current.status_text.clone(),
        };

        let updated = match self.orders.update_status(&order_id, to, &status_text).await {
            Ok(order) => order,
            Err(DbError::InvalidTransition { from, to, .. }) => {
                pass.notices.push(Notice::reply(
                    ctx,
                    messages::cannot_transition(&order_id, from, to),
                ));
                return;
            }
            Err(DbError::OrderNotFound(_)) => {
                pass.notices
                    .push(Notice::reply(ctx, messages::order_not_found(order_id.as_str())));
                return;
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "Status update failed");
                pass.notices
                    .push(Notice::reply(ctx, messages::GENERIC_FAILURE));
                return;
            }
        };
        tracing::info!(
            %order_id,
            action = op.action().key(),
            from = %current.status,
            to = %updated.status,
            "Order status changed"
        );

        let owner_text = match &op {
            AdminOp::Price { amount, .. } => messages::quote_for_owner(&updated, *amount),
            AdminOp::Reject { reason, .. } => messages::rejection_for_owner(&updated, reason),
            AdminOp::Complete { .. } => messages::completion_for_owner(&updated),
        };
        pass.notices.push(Notice::new(updated.chat_id.clone(), owner_text));
        pass.notices.push(Notice::reply(ctx, messages::admin_done(&updated)));

        if updated.status == OrderStatus::Rejected {
            pass.followups.push(Followup::CloseOwnerSession {
                chat_id: updated.chat_id.clone(),
                order_id,
            });
        }
    }

    // ========================================================================
    // After the lock
    // ========================================================================

    async fn deliver(&self, notices: Vec<Notice>) {
        for notice in notices {
            let options = NotifyOptions {
                keyboard: notice.keyboard,
                edit_of: notice.edit_of,
            };
            if let Err(e) = self.notifier.notify(&notice.to, &notice.text, &options).await {
                tracing::warn!(recipient = %notice.to, error = %e, "Failed to deliver message");
            }
        }
    }

    async fn run_followup(&self, followup: Followup) {
        match followup {
            Followup::Announce(order) => {
                let display_name = if order.username.is_some() {
                    None
                } else {
                    match self.notifier.display_name(&order.chat_id).await {
                        Ok(name) => name,
                        Err(e) => {
                            tracing::warn!(chat_id = %order.chat_id, error = %e, "Display name lookup failed");
                            None
                        }
                    }
                };
                let text = messages::new_order(&order, display_name.as_deref());
                self.deliver(vec![Notice::new(self.admin_id.clone(), text)])
                    .await;
            }
            Followup::CloseOwnerSession { chat_id, order_id } => {
                if let Err(e) = self.close_owner_session(&chat_id, &order_id).await {
                    tracing::warn!(%chat_id, %order_id, error = %e, "Failed to close owner session");
                }
            }
        }
    }

    async fn close_owner_session(&self, chat_id: &str, order_id: &OrderId) -> Result<(), SessionError> {
        let _guard = self.locks.lock(chat_id).await;
        let current = self.sessions.get(chat_id).await?;
        if current.as_ref().and_then(Session::order_id) == Some(order_id) {
            self.sessions
                .compare_and_swap(chat_id, current.as_ref(), None)
                .await?;
            tracing::info!(%chat_id, %order_id, "Closed session for rejected order");
        }
        Ok(())
    }
}
