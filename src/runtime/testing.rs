//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::sessions::InMemorySessions;
use super::traits::*;
use super::ConversationRuntime;
use crate::db::{
    check_transition, DbError, DbResult, Order, OrderFilter, OrderId, OrderStats, OrderStatus,
};
use crate::dispatch::Dispatcher;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// In-memory order store
// ============================================================================

/// Order store backed by a map, with injectable append failures
#[derive(Default)]
pub struct InMemoryOrders {
    orders: Mutex<HashMap<OrderId, Order>>,
    failing_appends: AtomicUsize,
    pub appends: AtomicUsize,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` appends fail with an I/O error
    pub fn fail_next_appends(&self, n: usize) {
        self.failing_appends.store(n, Ordering::SeqCst);
    }

    pub fn insert(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }

    pub fn all(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.lock().unwrap().values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }

    pub fn by_id(&self, id: &OrderId) -> Option<Order> {
        self.orders.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn append(&self, order: &Order) -> DbResult<()> {
        let failing = self.failing_appends.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_appends.store(failing - 1, Ordering::SeqCst);
            return Err(DbError::Io(std::io::Error::other("disk full")));
        }
        let mut orders = self.orders.lock().unwrap();
        if orders.contains_key(&order.id) {
            return Err(DbError::DuplicateOrder(order.id.clone()));
        }
        orders.insert(order.id.clone(), order.clone());
        self.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        Ok(self.by_id(id))
    }

    async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        Ok(self.all().into_iter().filter(|o| filter.matches(o)).collect())
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        status_text: &str,
    ) -> DbResult<Order> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(id)
            .ok_or_else(|| DbError::OrderNotFound(id.clone()))?;
        check_transition(order, status)?;
        order.status = status;
        order.status_text = status_text.to_string();
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete_matching(&self, filter: &OrderFilter) -> DbResult<usize> {
        let mut orders = self.orders.lock().unwrap();
        let before = orders.len();
        orders.retain(|_, order| !filter.matches(order));
        Ok(before - orders.len())
    }

    async fn stats(&self) -> DbResult<OrderStats> {
        Ok(self.all().iter().collect())
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub to: String,
    pub text: String,
    pub options: NotifyOptions,
}

/// Notifier that records every message instead of sending it
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    names: Mutex<HashMap<String, String>>,
    fail_sends: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(self, user_id: &str, name: &str) -> Self {
        self.names
            .lock()
            .unwrap()
            .insert(user_id.to_string(), name.to_string());
        self
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.to == recipient)
            .collect()
    }

    pub fn last_to(&self, recipient: &str) -> Option<Sent> {
        self.sent_to(recipient).pop()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient: &str,
        content: &str,
        options: &NotifyOptions,
    ) -> Result<(), NotifyError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(NotifyError::Api {
                method: "sendMessage",
                description: "Forbidden: bot was blocked by the user".into(),
            });
        }
        self.sent.lock().unwrap().push(Sent {
            to: recipient.to_string(),
            text: content.to_string(),
            options: options.clone(),
        });
        Ok(())
    }

    async fn display_name(&self, user_id: &str) -> Result<Option<String>, NotifyError> {
        Ok(self.names.lock().unwrap().get(user_id).cloned())
    }
}

// ============================================================================
// Test runtime builder
// ============================================================================

pub const ADMIN_ID: &str = "999";

pub type TestDispatcher =
    Dispatcher<Arc<InMemorySessions>, Arc<InMemoryOrders>, Arc<RecordingNotifier>>;

/// Dispatcher wired to mocks, with handles kept for assertions
pub struct TestRuntime {
    pub sessions: Arc<InMemorySessions>,
    pub orders: Arc<InMemoryOrders>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(InMemorySessions::new()),
            orders: Arc::new(InMemoryOrders::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    #[must_use]
    pub fn notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn build(&self) -> TestDispatcher {
        Dispatcher::new(ConversationRuntime::new(
            ADMIN_ID,
            Arc::clone(&self.sessions),
            Arc::clone(&self.orders),
            Arc::clone(&self.notifier),
        ))
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::sample_order;
    use crate::dispatch::InboundEvent;
    use crate::runtime::Outcome;
    use crate::state_machine::state::{IntakeSession, Step};
    use crate::state_machine::{Session, TransitionError};

    const USER: &str = "42";

    async fn say(dispatcher: &TestDispatcher, from: &str, text: &str) -> Outcome {
        dispatcher
            .dispatch(InboundEvent::text(from, text).with_username(Some("ali_r".into())))
            .await
    }

    async fn press(dispatcher: &TestDispatcher, from: &str, data: &str) -> Outcome {
        dispatcher
            .dispatch(InboundEvent::callback(from, data, Some("77".into())))
            .await
    }

    /// Walk a customer up to the review screen
    async fn fill_form(dispatcher: &TestDispatcher, from: &str) {
        for step in ["/start", "Ali Rezaei", "09123456789", "."] {
            assert_eq!(say(dispatcher, from, step).await, Outcome::Applied);
        }
        for token in ["biz:personal", "purpose:customers"] {
            assert_eq!(press(dispatcher, from, token).await, Outcome::Applied);
        }
        assert_eq!(say(dispatcher, from, "Gallery, contact form").await, Outcome::Applied);
        assert_eq!(press(dispatcher, from, "domain:no").await, Outcome::Applied);
        assert_eq!(say(dispatcher, from, "-").await, Outcome::Applied);
        assert_eq!(press(dispatcher, from, "support:yes").await, Outcome::Applied);
    }

    fn pending_order(id: &str, chat_id: &str) -> Order {
        sample_order(id, chat_id, Utc::now())
    }

    #[tokio::test]
    async fn test_intake_commits_exactly_one_order() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        fill_form(&dispatcher, USER).await;

        let review = rt.notifier.last_to(USER).unwrap();
        assert!(review.text.contains("ORD-"));
        assert!(review.options.keyboard.is_some());

        assert_eq!(press(&dispatcher, USER, "confirm:yes").await, Outcome::Applied);
        // A retried confirm button finds no session
        assert_eq!(
            press(&dispatcher, USER, "confirm:yes").await,
            Outcome::Refused(TransitionError::OutOfOrder)
        );

        let orders = rt.orders.all();
        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.name, "Ali Rezaei");
        assert_eq!(order.email, "");
        assert_eq!(order.business, "شخصی");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.chat_id, USER);
        assert!(review.text.contains(order.id.as_str()));

        let admin = rt.notifier.last_to(ADMIN_ID).unwrap();
        assert!(admin.text.contains(order.id.as_str()));
        assert!(admin.text.contains("@ali_r"));
        assert!(rt.notifier.last_to(USER).unwrap().text.contains(order.id.as_str()));
        assert_eq!(rt.sessions.get(USER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_confirm_for_retry() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        fill_form(&dispatcher, USER).await;
        rt.orders.fail_next_appends(1);

        assert_eq!(say(&dispatcher, USER, "بله").await, Outcome::Applied);
        assert!(rt.orders.all().is_empty());
        assert_eq!(
            rt.notifier.last_to(USER).unwrap().text,
            crate::messages::STORE_FAILURE
        );
        assert!(rt.notifier.sent_to(ADMIN_ID).is_empty());
        let session = rt.sessions.get(USER).await.unwrap();
        assert!(matches!(
            session,
            Some(Session::Intake(IntakeSession { step: Step::Confirm, .. }))
        ));

        assert_eq!(press(&dispatcher, USER, "confirm:yes").await, Outcome::Applied);
        assert_eq!(rt.orders.all().len(), 1);
    }

    #[tokio::test]
    async fn test_display_name_fallback_when_username_missing() {
        let rt = TestRuntime::new().notifier(RecordingNotifier::new().with_name(USER, "Ali R."));
        let dispatcher = rt.build();
        for step in ["/start", "Ali Rezaei", "09123456789", ".", "وبلاگ", "فروش آنلاین", "x", "خیر", ".", "بله"] {
            let outcome = dispatcher.dispatch(InboundEvent::text(USER, step)).await;
            assert_eq!(outcome, Outcome::Applied, "step {step}");
        }
        dispatcher.dispatch(InboundEvent::text(USER, "بله")).await;

        let admin = rt.notifier.last_to(ADMIN_ID).unwrap();
        assert!(admin.text.contains("Ali R."));
    }

    #[tokio::test]
    async fn test_admin_price_by_command() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        let order = pending_order("ORD-PRICE001", USER);
        rt.orders.insert(order.clone());

        say(&dispatcher, ADMIN_ID, "/price ORD-PRICE001 5000000").await;

        let stored = rt.orders.by_id(&order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Priced);
        assert_eq!(stored.status_text, "5,000,000 تومان");
        assert!(rt.notifier.last_to(USER).unwrap().text.contains("5,000,000"));
        assert!(rt.notifier.last_to(ADMIN_ID).unwrap().text.contains("ORD-PRICE001"));

        say(&dispatcher, ADMIN_ID, "/complete ORD-PRICE001").await;
        assert_eq!(
            rt.orders.by_id(&order.id).unwrap().status,
            OrderStatus::Completed
        );

        // No re-pricing a completed order
        rt.notifier.clear();
        say(&dispatcher, ADMIN_ID, "/price ORD-PRICE001 100").await;
        let stored = rt.orders.by_id(&order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert!(rt.notifier.sent_to(USER).is_empty());
        assert!(!rt.notifier.sent_to(ADMIN_ID).is_empty());
    }

    #[tokio::test]
    async fn test_admin_reject_via_menu_flow() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        rt.orders.insert(pending_order("ORD-REJECT01", USER));

        say(&dispatcher, ADMIN_ID, "/start").await;
        assert!(rt.notifier.last_to(ADMIN_ID).unwrap().options.keyboard.is_some());

        press(&dispatcher, ADMIN_ID, "admin:reject").await;
        let selection = rt.notifier.last_to(ADMIN_ID).unwrap();
        let keyboard = selection.options.keyboard.unwrap();
        assert!(keyboard.tokens().any(|t| t == "pick:reject:ORD-REJECT01"));

        press(&dispatcher, ADMIN_ID, "pick:reject:ORD-REJECT01").await;
        say(&dispatcher, ADMIN_ID, "Out of scope").await;

        let stored = rt.orders.by_id(&OrderId::parse("ORD-REJECT01").unwrap()).unwrap();
        assert_eq!(stored.status, OrderStatus::Rejected);
        assert_eq!(stored.status_text, "Out of scope");
        assert!(rt.notifier.last_to(USER).unwrap().text.contains("Out of scope"));
        assert_eq!(rt.sessions.get(ADMIN_ID).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_selection_ends_admin_session() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        press(&dispatcher, ADMIN_ID, "admin:complete").await;
        assert_eq!(rt.sessions.get(ADMIN_ID).await.unwrap(), None);
        assert_eq!(
            rt.notifier.last_to(ADMIN_ID).unwrap().text,
            crate::messages::nothing_eligible(crate::state_machine::state::AdminAction::Complete)
        );
    }

    #[tokio::test]
    async fn test_unknown_order_reports_not_found() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        say(&dispatcher, ADMIN_ID, "/reject ORD-MISSING1 nope").await;
        let reply = rt.notifier.last_to(ADMIN_ID).unwrap();
        assert!(reply.text.contains("ORD-MISSING1"));
        assert!(rt.orders.all().is_empty());
    }

    #[tokio::test]
    async fn test_reject_closes_owner_session_for_that_order() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        let order = pending_order("ORD-OWNED001", USER);
        rt.orders.insert(order.clone());
        let owner_session = Session::Intake(IntakeSession {
            step: Step::Confirm,
            order_id: Some(order.id.clone()),
            ..IntakeSession::new()
        });
        rt.sessions.put(USER, owner_session).await.unwrap();
        let bystander = Session::Intake(IntakeSession::new());
        rt.sessions.put("43", bystander.clone()).await.unwrap();

        say(&dispatcher, ADMIN_ID, "/reject ORD-OWNED001 duplicate").await;

        assert_eq!(rt.sessions.get(USER).await.unwrap(), None);
        assert_eq!(rt.sessions.get("43").await.unwrap(), Some(bystander));
    }

    #[tokio::test]
    async fn test_track_hides_other_users_orders() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        rt.orders.insert(pending_order("ORD-MINE0001", USER));
        rt.orders.insert(pending_order("ORD-THEIRS01", "43"));

        say(&dispatcher, USER, "/track ORD-THEIRS01").await;
        let reply = rt.notifier.last_to(USER).unwrap();
        assert_eq!(reply.text, crate::messages::order_not_found("ORD-THEIRS01"));
        assert!(!reply.text.contains("Ali Rezaei"));

        say(&dispatcher, USER, "/track").await;
        say(&dispatcher, USER, "ord-mine0001").await;
        let reply = rt.notifier.last_to(USER).unwrap();
        assert!(reply.text.contains("ORD-MINE0001"));
        assert_eq!(rt.sessions.get(USER).await.unwrap(), None);

        say(&dispatcher, USER, "/my_orders").await;
        let reply = rt.notifier.last_to(USER).unwrap();
        assert!(reply.text.contains("ORD-MINE0001"));
        assert!(!reply.text.contains("ORD-THEIRS01"));
    }

    #[tokio::test]
    async fn test_track_mid_form_keeps_answers() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        for step in ["/start", "Ali Rezaei", "09123456789", "/track"] {
            assert_eq!(say(&dispatcher, USER, step).await, Outcome::Applied);
        }
        assert_eq!(say(&dispatcher, USER, "ORD-NOPE0001").await, Outcome::Applied);

        let sent = rt.notifier.sent_to(USER);
        let lookup = &sent[sent.len() - 2];
        assert_eq!(lookup.text, crate::messages::order_not_found("ORD-NOPE0001"));
        let (question, _) = crate::messages::prompt(crate::state_machine::state::Field::Email, false);
        assert_eq!(rt.notifier.last_to(USER).unwrap().text, question);

        let Some(Session::Intake(intake)) = rt.sessions.get(USER).await.unwrap() else {
            panic!("form should be back in progress");
        };
        assert_eq!(intake.step, Step::asking(crate::state_machine::state::Field::Email));
        assert_eq!(intake.answers.name.as_deref(), Some("Ali Rezaei"));
        assert!(intake.answers.phone.is_some());

        // The rest of the form goes on from where it stopped
        assert_eq!(say(&dispatcher, USER, ".").await, Outcome::Applied);
        for token in ["biz:personal", "purpose:customers"] {
            assert_eq!(press(&dispatcher, USER, token).await, Outcome::Applied);
        }
        assert_eq!(say(&dispatcher, USER, "Gallery").await, Outcome::Applied);
        assert_eq!(press(&dispatcher, USER, "domain:no").await, Outcome::Applied);
        assert_eq!(say(&dispatcher, USER, "-").await, Outcome::Applied);
        assert_eq!(press(&dispatcher, USER, "support:yes").await, Outcome::Applied);
        assert_eq!(press(&dispatcher, USER, "confirm:yes").await, Outcome::Applied);

        let orders = rt.orders.all();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].name, "Ali Rezaei");
    }

    #[tokio::test]
    async fn test_admin_listing_stats_and_delete() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        let mut old = sample_order("ORD-OLD00001", USER, Utc::now() - chrono::Duration::days(60));
        old.status = OrderStatus::Rejected;
        rt.orders.insert(old);
        rt.orders.insert(pending_order("ORD-NEW00001", USER));

        say(&dispatcher, ADMIN_ID, "/list_orders pending").await;
        let list = rt.notifier.last_to(ADMIN_ID).unwrap().text;
        assert!(list.contains("ORD-NEW00001"));
        assert!(!list.contains("ORD-OLD00001"));

        say(&dispatcher, ADMIN_ID, "/stats").await;
        assert!(rt.notifier.last_to(ADMIN_ID).unwrap().text.contains('2'));

        say(&dispatcher, ADMIN_ID, "/delete_old rejected").await;
        assert_eq!(
            rt.notifier.last_to(ADMIN_ID).unwrap().text,
            crate::messages::deleted(1)
        );
        assert_eq!(rt.orders.all().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_old_with_huge_age_is_harmless() {
        use crate::runtime::Sender;
        use crate::state_machine::event::{AdminCommand, DeleteFilter};
        use crate::state_machine::Event;

        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        let mut old = sample_order("ORD-OLD00001", USER, Utc::now() - chrono::Duration::days(60));
        old.status = OrderStatus::Rejected;
        rt.orders.insert(old);

        assert_eq!(
            say(&dispatcher, ADMIN_ID, "/delete_old 4000000000").await,
            Outcome::Applied
        );
        assert!(rt
            .notifier
            .last_to(ADMIN_ID)
            .unwrap()
            .text
            .contains("/delete_old"));
        assert_eq!(rt.orders.all().len(), 1);

        // An out-of-range age reaching the runtime directly deletes nothing
        let admin = Sender::new(ADMIN_ID).admin(true);
        let event = Event::Admin(AdminCommand::DeleteOld(DeleteFilter::OlderThanDays(u32::MAX)));
        assert_eq!(dispatcher.runtime().handle(&admin, event).await, Outcome::Applied);
        assert_eq!(
            rt.notifier.last_to(ADMIN_ID).unwrap().text,
            crate::messages::deleted(0)
        );
        assert_eq!(rt.orders.all().len(), 1);
    }

    #[tokio::test]
    async fn test_customer_cannot_reach_admin_flow() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        rt.orders.insert(pending_order("ORD-SAFE0001", USER));

        assert_eq!(
            press(&dispatcher, USER, "pick:price:ORD-SAFE0001").await,
            Outcome::Refused(TransitionError::OutOfOrder)
        );
        say(&dispatcher, USER, "/price ORD-SAFE0001 1").await;
        assert_eq!(
            rt.orders.by_id(&OrderId::parse("ORD-SAFE0001").unwrap()).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_notify_failures_do_not_undo_commit() {
        let rt = TestRuntime::new();
        let dispatcher = rt.build();
        fill_form(&dispatcher, USER).await;
        rt.notifier.fail_sends(true);

        assert_eq!(press(&dispatcher, USER, "confirm:yes").await, Outcome::Applied);
        assert_eq!(rt.orders.all().len(), 1);
        assert_eq!(rt.sessions.get(USER).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_commit_once() {
        let rt = TestRuntime::new();
        let dispatcher = Arc::new(rt.build());
        fill_form(&dispatcher, USER).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .dispatch(InboundEvent::callback(USER, "confirm:yes", None))
                    .await
            }));
        }
        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap() == Outcome::Applied {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(rt.orders.appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_users_in_parallel() {
        let rt = TestRuntime::new();
        let dispatcher = Arc::new(rt.build());

        let mut tasks = Vec::new();
        for user in 0..10 {
            let dispatcher = Arc::clone(&dispatcher);
            tasks.push(tokio::spawn(async move {
                let user = format!("user-{user}");
                fill_form(&dispatcher, &user).await;
                dispatcher
                    .dispatch(InboundEvent::callback(&*user, "confirm:yes", None))
                    .await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), Outcome::Applied);
        }

        let orders = rt.orders.all();
        assert_eq!(orders.len(), 10);
        let mut owners: Vec<_> = orders.iter().map(|o| o.chat_id.clone()).collect();
        owners.sort();
        owners.dedup();
        assert_eq!(owners.len(), 10);
        assert!(rt.sessions.is_empty());
    }
}
