use shared::protocol::EntryFunctionId;

use super::*;
use crate::test_support::{address, Call, FakeChain, SubmitBehavior};

fn dispatcher(chain: &Arc<FakeChain>) -> (MutationDispatcher, broadcast::Receiver<ClientEvent>) {
    let (events, rx) = broadcast::channel(16);
    let dispatcher = MutationDispatcher::new(
        chain.clone(),
        chain.clone(),
        Duration::from_secs(5),
        events,
    );
    (dispatcher, rx)
}

fn register(signer: Option<AccountAddress>) -> MutationRequest {
    MutationRequest {
        operation: EntryFunctionId::new(address("0xcafe"), "FreelanceMarketplace", "register_freelancer"),
        arguments: Vec::new(),
        signer,
    }
}

#[tokio::test]
async fn missing_signer_fails_without_network_calls() {
    let chain = FakeChain::new();
    let (dispatcher, mut events) = dispatcher(&chain);

    let err = dispatcher
        .dispatch(register(None))
        .await
        .expect_err("no signer must fail");

    assert!(matches!(err, DispatchError::MissingSigner { .. }));
    assert_eq!(err.kind(), FailureKind::Precondition);
    assert_eq!(err.notice(), "Please connect your wallet.");
    assert!(chain.calls().is_empty());
    assert!(matches!(
        events.recv().await.expect("event"),
        ClientEvent::MutationFailed {
            kind: FailureKind::Precondition,
            ..
        }
    ));
}

#[tokio::test]
async fn success_waits_for_finality_and_reports_receipt() {
    let chain = FakeChain::new();
    let (dispatcher, mut events) = dispatcher(&chain);

    let receipt = dispatcher
        .dispatch(register(Some(address("0xa11ce"))))
        .await
        .expect("dispatch");

    assert_eq!(receipt.operation.function_name, "register_freelancer");
    assert_eq!(receipt.version, 101);
    assert_eq!(
        chain.calls(),
        vec![
            Call::Submit("register_freelancer".to_string()),
            Call::Finality(receipt.hash.clone()),
        ]
    );
    assert_eq!(
        events.recv().await.expect("event"),
        ClientEvent::MutationSucceeded {
            operation: "register_freelancer".to_string(),
            hash: receipt.hash,
        }
    );
}

#[tokio::test]
async fn declined_request_is_reported_as_user_declined() {
    let chain = FakeChain::new();
    chain.set_submit(SubmitBehavior::Decline);
    let (dispatcher, mut events) = dispatcher(&chain);

    let err = dispatcher
        .dispatch(register(Some(address("0xa11ce"))))
        .await
        .expect_err("declined");

    assert_eq!(err.kind(), FailureKind::UserDeclined);
    assert_eq!(err.notice(), "Transaction rejected by user.");
    match events.recv().await.expect("event") {
        ClientEvent::MutationFailed { kind, notice, .. } => {
            assert_eq!(kind, FailureKind::UserDeclined);
            assert_eq!(notice, "Transaction rejected by user.");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn reverted_transaction_is_an_execution_failure() {
    let chain = FakeChain::new();
    chain.revert_with("Move abort: EINSUFFICIENT_BALANCE");
    let (dispatcher, _events) = dispatcher(&chain);

    let err = dispatcher
        .dispatch(register(Some(address("0xa11ce"))))
        .await
        .expect_err("reverted");

    assert_eq!(err.kind(), FailureKind::ExecutionFailed);
    assert!(err.notice().starts_with("Transaction failed:"));
    assert!(err.notice().contains("EINSUFFICIENT_BALANCE"));
}

#[tokio::test]
async fn failures_are_never_retried() {
    let chain = FakeChain::new();
    chain.set_submit(SubmitBehavior::Unreachable);
    let (dispatcher, _events) = dispatcher(&chain);

    let err = dispatcher
        .dispatch(register(Some(address("0xa11ce"))))
        .await
        .expect_err("unreachable wallet");

    assert!(matches!(err, DispatchError::Network(_)));
    assert_eq!(err.kind(), FailureKind::ExecutionFailed);
    assert_eq!(chain.submissions(), 1);

    chain.set_submit(SubmitBehavior::Fail("insufficient funds".to_string()));
    chain.clear_calls();
    let err = dispatcher
        .dispatch(register(Some(address("0xa11ce"))))
        .await
        .expect_err("wallet failure");
    assert!(matches!(err, DispatchError::ExecutionFailed(_)));
    assert_eq!(chain.calls().len(), 1);
}

#[test]
fn finality_timeout_keeps_the_hash() {
    let err = DispatchError::from(FinalityError::Timeout {
        hash: TransactionHash("0xabc".to_string()),
        waited: Duration::from_secs(3),
    });
    assert_eq!(err.kind(), FailureKind::ExecutionFailed);
    assert!(err.to_string().contains("0xabc"));
}
