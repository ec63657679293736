//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::effect::Effect;
use super::event::{BusinessKind, Choice, Event, PurposeKind};
use super::state::*;
use super::transition::*;
use crate::db::OrderId;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn ctx_with(candidate: OrderId) -> ConvContext {
    ConvContext::new("42", "999", candidate)
}

fn test_context() -> ConvContext {
    ctx_with(OrderId::generate())
}

/// Apply events, skipping refused ones, and collect every intermediate result
fn run(events: Vec<Event>) -> Vec<(Option<Session>, Result<TransitionResult, TransitionError>)> {
    let mut session: Option<Session> = None;
    let mut trace = Vec::new();
    for event in events {
        let result = transition(session.as_ref(), &test_context(), event);
        let before = session.clone();
        if let Ok(ok) = &result {
            session.clone_from(&ok.next);
        }
        trace.push((before, result));
    }
    trace
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_field() -> impl Strategy<Value = Field> {
    proptest::sample::select(Field::ALL.to_vec())
}

fn arb_choice() -> impl Strategy<Value = Choice> {
    prop_oneof![
        proptest::sample::select(BusinessKind::ALL.to_vec()).prop_map(Choice::Business),
        proptest::sample::select(PurposeKind::ALL.to_vec()).prop_map(Choice::Purpose),
        any::<bool>().prop_map(Choice::Domain),
        any::<bool>().prop_map(Choice::Support),
        Just(Choice::Confirm),
        Just(Choice::Discard),
        Just(Choice::Edit),
        arb_field().prop_map(Choice::EditField),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Ali Rezaei".to_string()),
        Just("09123456789".to_string()),
        Just("+989351112233".to_string()),
        Just("user@example.com".to_string()),
        Just(".".to_string()),
        Just("-".to_string()),
        Just("بله".to_string()),
        Just("خیر".to_string()),
        Just("شرکتی".to_string()),
        Just("ORD-ABCD1234".to_string()),
        "[a-z ]{0,12}",
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        1 => Just(Event::Start),
        1 => Just(Event::Cancel),
        1 => Just(Event::Help),
        1 => Just(Event::Track { order_id: None }),
        8 => arb_text().prop_map(Event::Text),
        8 => arb_choice().prop_map(Event::Choice),
    ]
}

/// Any intake session, with an arbitrary step and partially filled answers
fn arb_intake_session() -> impl Strategy<Value = IntakeSession> {
    let steps = vec![
        Step::Name,
        Step::Phone,
        Step::Email,
        Step::Business,
        Step::BusinessCustom,
        Step::Purpose,
        Step::PurposeCustom,
        Step::Features,
        Step::Domain,
        Step::Extra,
        Step::Support,
        Step::Confirm,
    ];
    (
        proptest::sample::select(steps),
        proptest::option::of("[A-Z][a-z]{2,8}"),
        any::<bool>(),
    )
        .prop_map(|(step, name, with_id)| IntakeSession {
            step,
            answers: Answers {
                name,
                ..Answers::default()
            },
            order_id: with_id.then(OrderId::generate),
        })
}

fn commits(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::CommitOrder(_)))
        .count()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// A customer can never end up in an admin session
    #[test]
    fn prop_user_never_reaches_admin(events in proptest::collection::vec(arb_event(), 0..40)) {
        for (_, result) in run(events) {
            if let Ok(ok) = result {
                prop_assert!(!matches!(ok.next, Some(Session::Admin(_))));
            }
        }
    }

    /// Orders are only committed from the review screen, once, ending the session
    #[test]
    fn prop_commit_only_from_confirm(events in proptest::collection::vec(arb_event(), 0..60)) {
        for (before, result) in run(events) {
            let Ok(ok) = result else { continue };
            let n = commits(&ok.effects);
            prop_assert!(n <= 1);
            if n == 1 {
                let at_confirm = matches!(
                    &before,
                    Some(Session::Intake(intake)) if intake.step == Step::Confirm
                );
                prop_assert!(at_confirm);
                prop_assert!(ok.next.is_none());
            }
        }
    }

    /// Once assigned, the order id survives every later event in the same intake
    #[test]
    fn prop_order_id_assigned_once(events in proptest::collection::vec(arb_event(), 0..60)) {
        for (before, result) in run(events) {
            let Ok(ok) = result else { continue };
            if let (
                Some(Session::Intake(IntakeSession { order_id: Some(old), .. })),
                Some(Session::Intake(next)),
            ) = (&before, &ok.next)
            {
                // Start discards the old intake entirely
                if next.step != Step::Name || next.answers != Answers::default() {
                    prop_assert_eq!(next.order_id.as_ref(), Some(old));
                }
            }
        }
    }

    /// The committed submission carries the id shown on the review screen
    #[test]
    fn prop_commit_uses_reviewed_id(session in arb_intake_session()) {
        let mut session = session;
        session.step = Step::Confirm;
        session.answers = Answers {
            name: Some("Ali".into()),
            phone: Some("09123456789".into()),
            email: Some(String::new()),
            business: Some("شخصی".into()),
            purpose: Some("فروش آنلاین".into()),
            features: Some("shop".into()),
            has_domain: Some(false),
            extra: Some(String::new()),
            wants_support: Some(true),
        };
        let id = session.order_id.clone().unwrap_or_else(OrderId::generate);
        session.order_id = Some(id.clone());

        let result = transition(
            Some(&Session::Intake(session)),
            &test_context(),
            Event::Choice(Choice::Confirm),
        )
        .unwrap();
        let committed = result.effects.iter().find_map(|e| match e {
            Effect::CommitOrder(sub) => Some(sub.id.clone()),
            _ => None,
        });
        prop_assert_eq!(committed, Some(id));
    }

    /// An invalid phone never changes the session
    #[test]
    fn prop_invalid_phone_is_inert(
        session in arb_intake_session(),
        junk in "[a-z]{1,10}|0[0-8][0-9]{9}|09[0-9]{0,8}",
    ) {
        let mut session = session;
        session.step = Step::Phone;
        let before = Session::Intake(session);

        let result = transition(Some(&before), &test_context(), Event::Text(junk)).unwrap();
        prop_assert_eq!(result.next, Some(before));
        prop_assert_eq!(result.effects.len(), 1);
    }

    /// Replaying an accepted option button is refused
    #[test]
    fn prop_option_choice_not_repeatable(
        session in arb_intake_session(),
        choice in arb_choice(),
    ) {
        prop_assume!(choice.field().is_some());
        let before = Session::Intake(session);
        let ctx = test_context();

        if let Ok(first) = transition(Some(&before), &ctx, Event::Choice(choice.clone())) {
            prop_assume!(first.next.as_ref() != Some(&before));
            let again = transition(first.next.as_ref(), &ctx, Event::Choice(choice));
            prop_assert_eq!(again, Err(TransitionError::OutOfOrder));
        }
    }

    /// Cancel always removes the session
    #[test]
    fn prop_cancel_always_ends(session in arb_intake_session()) {
        let result = transition(
            Some(&Session::Intake(session)),
            &test_context(),
            Event::Cancel,
        )
        .unwrap();
        prop_assert!(result.next.is_none());
    }
}
