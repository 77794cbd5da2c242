//! HTTP service clients and JSON-RPC ledger against a mock server

use automata::chain::{EventKind, JsonRpcLedger, Ledger, LogFilter};
use automata::error::{LedgerError, ServiceError};
use automata::runtime::services::{
    HttpInferenceService, HttpRelayService, InferenceRequest, InferenceService, RelayAction, RelayParams,
    RelayRequest, RelayService,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn relay_posts_action_and_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/relay"))
        .and(body_json(json!({
            "action": "transfer",
            "params": { "to": "0xabc", "amount": "10" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "txHash": "0x01" })))
        .expect(1)
        .mount(&server)
        .await;

    let relay = HttpRelayService::new(reqwest::Client::new(), format!("{}/api/relay", server.uri()));
    let response = relay
        .submit(&RelayRequest {
            action: RelayAction::Transfer,
            params: RelayParams {
                to: "0xabc".into(),
                amount: Some("10".into()),
            },
        })
        .await
        .unwrap();

    assert!(response.success);
}

#[tokio::test]
async fn relay_failure_body_is_read_on_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/relay"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "success": false, "error": "insufficient funds" })),
        )
        .mount(&server)
        .await;

    let relay = HttpRelayService::new(reqwest::Client::new(), format!("{}/api/relay", server.uri()));
    let response = relay
        .submit(&RelayRequest {
            action: RelayAction::Mint,
            params: RelayParams {
                to: "0xabc".into(),
                amount: None,
            },
        })
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("insufficient funds"));
}

#[tokio::test]
async fn non_json_reply_is_an_unexpected_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let inference = HttpInferenceService::new(reqwest::Client::new(), format!("{}/api/ai-decision", server.uri()));
    let err = inference
        .decide(&InferenceRequest {
            prompt: "?".into(),
            data: json!({}),
        })
        .await
        .unwrap_err();

    match err {
        ServiceError::UnexpectedResponse { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "Bad Gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn inference_sends_prompt_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai-decision"))
        .and(body_json(json!({ "prompt": "Pay?", "data": { "value": "5" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "result": "TRUE" })))
        .expect(1)
        .mount(&server)
        .await;

    let inference = HttpInferenceService::new(reqwest::Client::new(), format!("{}/api/ai-decision", server.uri()));
    let response = inference
        .decide(&InferenceRequest {
            prompt: "Pay?".into(),
            data: json!({ "value": "5" }),
        })
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.result.as_deref(), Some("TRUE"));
}

#[tokio::test]
async fn json_rpc_ledger_reads_height_and_logs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_blockNumber" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x64" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "eth_getLogs" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{
                "blockNumber": "0x65",
                "logIndex": "0x2",
                "topics": [EventKind::Transfer.topic()],
                "data": "0x"
            }]
        })))
        .mount(&server)
        .await;

    let ledger = JsonRpcLedger::new(server.uri());
    assert_eq!(ledger.current_height().await.unwrap(), 100);

    let filter = LogFilter {
        address: "0x1111111111111111111111111111111111111111".into(),
        event: EventKind::Transfer,
    };
    let logs = ledger.query_logs(&filter, 100, 101).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number, 101);
    assert_eq!(logs[0].log_index, 2);
}

#[tokio::test]
async fn json_rpc_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32005, "message": "query returned more than 10000 results" }
        })))
        .mount(&server)
        .await;

    let ledger = JsonRpcLedger::new(server.uri());
    match ledger.current_height().await {
        Err(LedgerError::Rpc { code, .. }) => assert_eq!(code, -32005),
        other => panic!("unexpected result: {other:?}"),
    }
}
