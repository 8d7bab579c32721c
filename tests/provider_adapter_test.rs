mod common;

use common::{harness, provider};
use mockito::Matcher;
use pixhub_backend::database::repository::TransactionStore;
use pixhub_backend::error::AppErrorKind;
use pixhub_backend::jobs::{WebhookQueue, WebhookWorker, WorkerConfig};
use pixhub_backend::payments::external_id::is_placeholder;
use pixhub_backend::payments::simulation::{SimulationConfig, SimulationDriver};
use pixhub_backend::payments::traits::sign_payload;
use pixhub_backend::payments::types::{
    AccountType, BankAccount, ChargeRequest, TransactionDetails, TransactionKind,
    TransactionStatus, WithdrawalRequest,
};
use pixhub_backend::reconciliation::TerminalPolicy;
use pixhub_backend::services::TransactionService;
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

fn alice_charge() -> ChargeRequest {
    ChargeRequest {
        amount: dec!(100.00),
        payer_name: Some("Alice".into()),
        payer_document: Some("12345678900".into()),
        description: None,
        reference: None,
    }
}

fn withdrawal() -> WithdrawalRequest {
    WithdrawalRequest {
        amount: dec!(250.50),
        bank_account: BankAccount {
            bank_code: "341".into(),
            agency: "0001".into(),
            account: "12345-6".into(),
            account_type: AccountType::Checking,
            holder_name: Some("Carol".into()),
            holder_document: None,
        },
    }
}

#[tokio::test]
async fn test_subadq_a_charge_is_created_pending() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/pix/create")
        .match_header("x-mock-response-name", "[SUCESSO_PIX] pix_create")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "amount": 100.0,
            "payer_name": "Alice",
            "payer_cpf": "12345678900",
            "description": "Cobrança PIX"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"transaction_id":"SA-123","status":"PENDING"}"#)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqA", &server.url());
    let service = TransactionService::new(h.registry.clone(), None);
    let owner = Uuid::new_v4();

    let tx = service
        .create_charge(owner, Some(&config), alice_charge())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(tx.external_id.as_deref(), Some("SA-123"));
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.amount, dec!(100.00));
    assert_eq!(tx.provider_id, config.id);
    assert_eq!(tx.metadata["provider_response"]["transaction_id"], "SA-123");
    assert_eq!(tx.webhook_count(), 0);
    match &tx.details {
        TransactionDetails::Charge(details) => {
            assert_eq!(details.payer_name.as_deref(), Some("Alice"));
            assert!(details.payment_date.is_none());
        }
        other => panic!("expected charge details, got {:?}", other),
    }

    let stored = h
        .store
        .find_by_external_id(TransactionKind::Charge, "SA-123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, tx.id);

    let listed = service
        .list_for_owner(TransactionKind::Charge, owner, 1, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].external_id.as_deref(), Some("SA-123"));
}

#[tokio::test]
async fn test_created_charge_is_settled_by_simulation() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/pix/create")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"transaction_id":"SA-SIM-1","status":"PENDING"}"#)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqA", &server.url());

    let worker_config = WorkerConfig::default();
    let (queue, receiver) = WebhookQueue::channel(worker_config.queue_capacity);
    let worker =
        WebhookWorker::new(h.registry.clone(), h.events.clone(), worker_config).spawn(receiver);
    let driver = SimulationDriver::new(
        h.registry.clone(),
        queue,
        SimulationConfig {
            enabled: true,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        },
    );
    let service = TransactionService::new(h.registry.clone(), Some(driver));

    let tx = service
        .create_charge(Uuid::new_v4(), Some(&config), alice_charge())
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(tx.status, TransactionStatus::Pending);

    // The worker stops once the service and the scheduled task release the queue
    drop(service);
    worker.await.unwrap();

    let settled = h
        .store
        .find_by_id(TransactionKind::Charge, tx.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, TransactionStatus::Confirmed);
    assert_eq!(settled.webhook_count(), 1);
    assert_eq!(settled.metadata["webhooks"][0]["applied"], true);
}

#[tokio::test]
async fn test_subadq_b_charge_uses_nested_payer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/pix/create")
        .match_header("x-mock-response-name", "SUCESSO_PIX")
        .match_body(Matcher::PartialJson(json!({
            "seller_id": "seller-001",
            "order_id": "order-7",
            "amount": 100.0,
            "payer": {"name": "Alice", "cpf_cnpj": "12345678900"},
            "expires_in": 3600
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"SB-PX-1","status":"PENDING"}"#)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqB", &server.url());
    let service = TransactionService::new(h.registry.clone(), None);

    let mut request = alice_charge();
    request.reference = Some("order-7".into());
    let tx = service
        .create_charge(Uuid::new_v4(), Some(&config), request)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(tx.external_id.as_deref(), Some("SB-PX-1"));
}

#[tokio::test]
async fn test_subadq_b_withdrawal_is_created_pending() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/withdraw")
        .match_header("x-mock-response-name", "[SUCESSO_WD] withdraw")
        .match_body(Matcher::PartialJson(json!({
            "amount": 250.5,
            "bank_account": {"bank_code": "341", "agency": "0001", "account": "12345-6"}
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"withdraw_id":"WB-9","status":"PROCESSING"}"#)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqB", &server.url());
    let service = TransactionService::new(h.registry.clone(), None);

    let tx = service
        .create_withdrawal(Uuid::new_v4(), Some(&config), withdrawal())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(tx.kind(), TransactionKind::Withdrawal);
    assert_eq!(tx.external_id.as_deref(), Some("WB-9"));
    assert_eq!(tx.status, TransactionStatus::Pending);
    match &tx.details {
        TransactionDetails::Withdrawal(details) => {
            assert_eq!(details.bank_account.as_ref().unwrap()["bank_code"], "341");
            assert!(details.requested_at.is_some());
        }
        other => panic!("expected withdrawal details, got {:?}", other),
    }
}

#[tokio::test]
async fn test_provider_error_persists_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/pix/create")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"unavailable"}"#)
        .expect(1)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqA", &server.url());
    let service = TransactionService::new(h.registry.clone(), None);
    let owner = Uuid::new_v4();

    let err = service
        .create_charge(owner, Some(&config), alice_charge())
        .await
        .err()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(err.error_code(), "PROVIDER_CALL_FAILED");
    match &err.kind {
        AppErrorKind::ProviderCallFailed { status, body, .. } => {
            assert_eq!(*status, Some(500));
            assert_eq!(body.as_ref().unwrap()["error"], "unavailable");
        }
        other => panic!("unexpected error kind {:?}", other),
    }

    let stored = h
        .store
        .list_by_owner(TransactionKind::Charge, owner, 10, 0)
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_response_without_identifier_gets_placeholder() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/pix/create")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"PENDING"}"#)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqA", &server.url());
    let service = TransactionService::new(h.registry.clone(), None);

    let tx = service
        .create_charge(Uuid::new_v4(), Some(&config), alice_charge())
        .await
        .unwrap();

    let external_id = tx.external_id.unwrap();
    assert!(is_placeholder(&external_id), "got {}", external_id);
}

#[tokio::test]
async fn test_invalid_request_never_reaches_provider() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/pix/create")
        .expect(0)
        .create_async()
        .await;

    let h = harness(TerminalPolicy::Reject);
    let config = provider("SubadqA", &server.url());
    let service = TransactionService::new(h.registry.clone(), None);

    let mut request = alice_charge();
    request.amount = dec!(0);
    let err = service
        .create_charge(Uuid::new_v4(), Some(&config), request)
        .await
        .err()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(err.error_code(), "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_unknown_or_missing_provider_fails_closed() {
    let h = harness(TerminalPolicy::Reject);
    let service = TransactionService::new(h.registry.clone(), None);

    let unknown = provider("SubadqZ", "http://127.0.0.1:1");
    let err = service
        .create_charge(Uuid::new_v4(), Some(&unknown), alice_charge())
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_code(), "PROVIDER_NOT_FOUND");

    let err = service
        .create_charge(Uuid::new_v4(), None, alice_charge())
        .await
        .err()
        .unwrap();
    assert_eq!(err.error_code(), "PROVIDER_NOT_FOUND");

    let mut inactive = provider("SubadqA", "http://127.0.0.1:1");
    inactive.active = false;
    assert!(h.registry.resolve(&inactive).is_err());
}

#[tokio::test]
async fn test_webhook_signature_validation() {
    let h = harness(TerminalPolicy::Reject);
    let mut config = provider("SubadqB", "http://127.0.0.1:1");
    config.config["webhook_secret"] = json!("s3cret");
    let adapter = h.registry.resolve(&config).unwrap();

    let body = br#"{"type":"pix.status_update","data":{"id":"PX1"}}"#;
    let signature = sign_payload("s3cret", body).unwrap();
    assert!(adapter.validate_webhook_signature(body, &signature));
    assert!(!adapter.validate_webhook_signature(body, "ab12"));
    assert!(!adapter.validate_webhook_signature(b"tampered", &signature));

    let unsigned = h
        .registry
        .resolve(&provider("SubadqB", "http://127.0.0.1:1"))
        .unwrap();
    assert!(!unsigned.validate_webhook_signature(body, &signature));
}
