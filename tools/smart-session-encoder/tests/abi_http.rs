use alloy_primitives::Address;
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use smart_session_encoder::{
    abi::NATIVE_TRANSFER, encoder::selector, AbiDataClient, AbiFunction, AbiState, ActionRegistry,
};

fn target() -> Address {
    Address::repeat_byte(0x70)
}

#[tokio::test]
async fn server_error_offers_only_native_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", target())))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = AbiDataClient::new(server.uri(), "sepolia");
    let state = ActionRegistry::default().resolve_selectors(&client, target()).await;

    match &state {
        AbiState::Unavailable { reason, options } => {
            assert!(reason.starts_with("Failed to fetch contract ABI"));
            assert_eq!(options, &vec![AbiFunction::native_transfer()]);
        }
        AbiState::Ready(_) => panic!("expected unavailable ABI"),
    }
}

#[tokio::test]
async fn fetched_abi_lists_state_changing_functions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", target())))
        .and(query_param("network", "sepolia"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "abi": [
                { "type": "function", "name": "mint", "stateMutability": "nonpayable", "inputs": [], "outputs": [] },
                { "type": "function", "name": "transfer", "stateMutability": "nonpayable",
                  "inputs": [{ "name": "to", "type": "address" }, { "name": "amount", "type": "uint256" }],
                  "outputs": [{ "name": "", "type": "bool" }] },
                { "type": "function", "name": "totalSupply", "stateMutability": "view", "inputs": [],
                  "outputs": [{ "name": "", "type": "uint256" }] }
            ]
        })))
        .mount(&server)
        .await;

    let client = AbiDataClient::new(server.uri(), "sepolia");
    let state = ActionRegistry::default().resolve_selectors(&client, target()).await;

    assert!(state.is_available());
    let names: Vec<&str> = state.options().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["mint", "transfer", NATIVE_TRANSFER]);
    assert!(state.find(selector("transfer(address,uint256)")).is_some());
}

#[tokio::test]
async fn empty_abi_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "abi": [] })))
        .mount(&server)
        .await;

    let client = AbiDataClient::new(server.uri(), "sepolia");
    let state = ActionRegistry::default().resolve_selectors(&client, target()).await;
    assert!(!state.is_available());
    assert_eq!(state.options().len(), 1);
}
