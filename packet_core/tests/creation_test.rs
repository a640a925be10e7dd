// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use alloy::primitives::utils::parse_ether;
use packet_core::{
    config::FlowConfig,
    context::memory::{InMemoryLedger, DEFAULT_ACCOUNT},
    flow::{CreationController, CreationOutcome, FlowState, PacketForm},
    registry::{ContractRegistry, HARDHAT_DEPLOYMENT},
    ErrorKind, PacketCall, PacketId, ValidationError,
};
use rstest::*;

#[fixture]
fn ledger() -> InMemoryLedger {
    let ledger = InMemoryLedger::default();
    ledger.set_next_packet_id(7);
    ledger
}

fn controller(ledger: &InMemoryLedger) -> CreationController<InMemoryLedger> {
    CreationController::new(
        ledger.clone(),
        ContractRegistry::default(),
        FlowConfig::default(),
    )
}

fn form(amount: &str, slots: &str, password: &str, duration: &str) -> PacketForm {
    PacketForm {
        amount: amount.to_string(),
        total_slots: slots.to_string(),
        password: password.to_string(),
        duration_hours: duration.to_string(),
    }
}

fn succeeded(state: FlowState<CreationOutcome>) -> CreationOutcome {
    match state {
        FlowState::Succeeded(outcome) => outcome,
        other => panic!("expected success, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn create_reports_assigned_packet_id(ledger: InMemoryLedger) {
    let controller = controller(&ledger);
    controller.set_form(form("1.0", "5", "", "24"));

    let state = controller.submit().await.unwrap().unwrap();

    let writes = ledger.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(
        writes[0].call,
        PacketCall::Create {
            total_slots: 5,
            password: String::new(),
            duration_hours: 24,
        }
    );
    assert_eq!(writes[0].value, parse_ether("1").unwrap());
    assert_eq!(writes[0].to, HARDHAT_DEPLOYMENT);
    assert_eq!(writes[0].from, DEFAULT_ACCOUNT);

    let outcome = succeeded(state);
    assert_eq!(outcome.packet_id, Some(PacketId::from(7u64)));
    assert!(!outcome.is_partial());
    assert_eq!(controller.state(), FlowState::Succeeded(outcome));
    assert_eq!(controller.form(), PacketForm::default());
}

#[rstest]
#[case::no_slots("0", "24")]
#[case::too_many_slots("101", "24")]
#[case::no_duration("5", "0")]
#[case::too_long("5", "721")]
#[case::unparsable_slots("a few", "24")]
#[tokio::test]
async fn invalid_form_never_reaches_ledger(
    ledger: InMemoryLedger,
    #[case] slots: &str,
    #[case] duration: &str,
) {
    let controller = controller(&ledger);
    controller.set_form(form("1", slots, "", duration));

    let state = controller.submit().await.unwrap().unwrap();

    let err = state.failed().unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.write_count(), 0);
    assert_eq!(controller.form().total_slots, slots);
}

#[rstest]
#[tokio::test]
async fn validation_runs_before_network_checks(ledger: InMemoryLedger) {
    ledger.set_account(None);
    let controller = controller(&ledger);
    controller.set_form(form("", "5", "", "24"));

    let state = controller.submit().await.unwrap().unwrap();

    assert!(matches!(
        state,
        FlowState::Failed(packet_core::FlowError::Validation(
            ValidationError::InvalidAmount { .. }
        ))
    ));
}

#[rstest]
#[case::disconnected(None, Some(31337))]
#[case::no_network(Some(DEFAULT_ACCOUNT), None)]
#[case::mainnet(Some(DEFAULT_ACCOUNT), Some(1))]
#[case::unknown_chain(Some(DEFAULT_ACCOUNT), Some(5))]
#[tokio::test]
async fn unresolved_network_fails_before_submission(
    ledger: InMemoryLedger,
    #[case] account: Option<alloy::primitives::Address>,
    #[case] chain_id: Option<u64>,
) {
    ledger.set_account(account);
    ledger.set_chain_id(chain_id);
    let controller = controller(&ledger);
    controller.set_form(form("1", "5", "", "24"));

    let state = controller.submit().await.unwrap().unwrap();

    assert_eq!(state.failed().unwrap().kind(), ErrorKind::NetworkUnavailable);
    assert_eq!(ledger.write_count(), 0);
}

#[rstest]
#[tokio::test]
async fn rejected_submission_keeps_form(ledger: InMemoryLedger) {
    ledger.reject_next_send("user denied transaction signature");
    let controller = controller(&ledger);
    let filled = form("0.5", "3", "", "12");
    controller.set_form(filled.clone());

    let state = controller.submit().await.unwrap().unwrap();

    let err = state.failed().unwrap();
    assert_eq!(err.kind(), ErrorKind::Submission);
    assert!(err.to_string().contains("user denied transaction signature"));
    assert_eq!(ledger.write_count(), 1);
    assert_eq!(controller.form(), filled);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn late_logs_are_found_on_retry(ledger: InMemoryLedger) {
    ledger.defer_logs(Duration::from_secs(1));
    let controller = controller(&ledger);
    controller.set_form(form("1", "5", "", "24"));

    let state = controller.submit().await.unwrap().unwrap();

    let outcome = succeeded(state);
    assert_eq!(outcome.packet_id, Some(PacketId::from(7u64)));
    assert!(!outcome.is_partial());
    assert_eq!(ledger.write_count(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn logs_later_than_retry_budget_give_partial_success(ledger: InMemoryLedger) {
    ledger.defer_logs(Duration::from_secs(10));
    let controller = controller(&ledger);
    controller.set_form(form("1", "5", "", "24"));

    let outcome = succeeded(controller.submit().await.unwrap().unwrap());

    assert!(outcome.is_partial());
    assert_eq!(controller.form(), PacketForm::default());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn progress_is_published_while_running(ledger: InMemoryLedger) {
    ledger.delay_receipts(Duration::from_secs(1));
    ledger.defer_logs(Duration::from_secs(10));
    let controller = controller(&ledger);
    controller.set_form(form("1", "5", "", "24"));

    let observe = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let waiting = controller.state();
        // the first miss happens at 1s, the retry at 4s
        tokio::time::sleep(Duration::from_secs(1)).await;
        let extracting = controller.state();
        (waiting, extracting)
    };
    let (submitted, (waiting, extracting)) = tokio::join!(controller.submit(), observe);

    let tx_hash = ledger.last_tx_hash().unwrap();
    assert_eq!(waiting, FlowState::AwaitingReceipt { tx_hash });
    assert_eq!(
        extracting,
        FlowState::ExtractingResult {
            tx_hash,
            attempts: 1
        }
    );
    let outcome = succeeded(submitted.unwrap().unwrap());
    assert!(outcome.is_partial());
    assert_eq!(outcome.tx_hash, tx_hash);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn retry_budget_is_configurable(ledger: InMemoryLedger) {
    ledger.defer_logs(Duration::from_secs(10));
    let controller = CreationController::new(
        ledger.clone(),
        ContractRegistry::default(),
        FlowConfig::default()
            .with_extraction_retries(4)
            .with_extraction_retry_delay(Duration::from_secs(3)),
    );
    controller.set_form(form("1", "5", "", "24"));

    let outcome = succeeded(controller.submit().await.unwrap().unwrap());

    assert_eq!(outcome.packet_id, Some(PacketId::from(7u64)));
}

#[rstest]
#[tokio::test]
async fn missing_logs_are_a_partial_success(ledger: InMemoryLedger) {
    ledger.drop_logs();
    let controller = CreationController::new(
        ledger.clone(),
        ContractRegistry::default(),
        FlowConfig::default().with_extraction_retry_delay(Duration::ZERO),
    );
    controller.set_form(form("2", "4", "secret", "48"));

    let outcome = succeeded(controller.submit().await.unwrap().unwrap());

    assert!(outcome.is_partial());
    assert_eq!(ledger.write_count(), 1);
    // the packet exists even though its id was not reported
    let next = ledger
        .create_packet(DEFAULT_ACCOUNT, parse_ether("1").unwrap(), 1, "", 1)
        .unwrap();
    assert_eq!(next, PacketId::from(8u64));
}

#[rstest]
#[tokio::test]
async fn concurrent_submit_is_ignored(ledger: InMemoryLedger) {
    ledger.yield_on_send();
    let controller = controller(&ledger);
    controller.set_form(form("1", "5", "", "24"));

    let (first, second) = tokio::join!(controller.submit(), controller.submit());

    assert!(first.unwrap().unwrap().succeeded().is_some());
    assert!(second.unwrap().is_none());
    assert_eq!(ledger.write_count(), 1);
    assert!(!controller.is_submitting());
}

#[rstest]
#[tokio::test]
async fn controller_can_submit_again(ledger: InMemoryLedger) {
    let controller = controller(&ledger);
    controller.set_form(form("1", "5", "", "24"));
    controller.submit().await.unwrap().unwrap();

    controller.update_form(|form| form.amount = "3".to_string());
    let outcome = succeeded(controller.submit().await.unwrap().unwrap());

    assert_eq!(outcome.packet_id, Some(PacketId::from(8u64)));
    assert_eq!(ledger.write_count(), 2);
}
