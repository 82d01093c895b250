//! Gateway router driven end to end with `oneshot`

mod common;

use axum::http::{StatusCode, header};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::*;
use graphgate::config::PROTECTED_RESOURCE_PATH;
use graphgate::{Cli, GatewayConfig, build_router};
use graphgate_auth::{IdentityMetadata, SharedHttpClient};

#[tokio::test]
async fn test_missing_token_is_challenged() {
    // GIVEN: a gateway
    let graph = MockGraph::start().await;
    let app = pass_through_gateway(&graph);

    // WHEN: calling the tools endpoint without credentials
    let response = send(app, rpc_request(None, tool_call("hello").to_string())).await;

    // THEN: 401 with a challenge naming the metadata document
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        format!(
            "Bearer error=\"invalid_token\", resource_metadata=\"{}\"",
            resource_metadata_url()
        )
        .as_str()
    );
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_token");
    assert_eq!(graph.request_count("/me").await, 0);
}

#[tokio::test]
async fn test_rejected_token_is_challenged() {
    let graph = MockGraph::start().await;

    let mut expired = graph_claims();
    expired["exp"] = json!(current_timestamp() - 1);
    let mut missing_scope = graph_claims();
    missing_scope["scp"] = json!("User.Read");
    let mut wrong_audience = graph_claims();
    wrong_audience["aud"] = json!("api://someone-else");

    for claims in [expired, missing_scope, wrong_audience] {
        let token = graph_token(&claims);
        let response = send(
            pass_through_gateway(&graph),
            rpc_request(Some(&token), tool_call("hello").to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }
    assert_eq!(graph.request_count("/me").await, 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_is_challenged() {
    let graph = MockGraph::start().await;
    let mut request = rpc_request(None, tool_call("hello").to_string());
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

    let response = send(pass_through_gateway(&graph), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metadata_and_health_are_public() {
    let graph = MockGraph::start().await;

    let response = send(pass_through_gateway(&graph), get_request(PROTECTED_RESOURCE_PATH)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "resource": BASE_URL,
            "authorization_servers": ["https://login.microsoftonline.com/contoso/v2.0"],
            "scopes_supported": ["Mail.Read", "User.Read"],
            "bearer_methods_supported": ["header"],
            "resource_name": "graphgate"
        })
    );

    let response = send(pass_through_gateway(&graph), get_request("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let graph = MockGraph::start().await;
    let token = valid_token();

    let response = call(pass_through_gateway(&graph), &token, initialize("2025-06-18")).await;
    assert_eq!(response["id"], "init");
    assert_eq!(response["result"]["protocolVersion"], "2025-06-18");
    assert_eq!(response["result"]["serverInfo"]["name"], "graphgate");
    assert!(response["result"]["capabilities"]["tools"].is_object());

    let response = call(
        pass_through_gateway(&graph),
        &token,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
    )
    .await;
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["hello", "list_junk_emails"]);

    let response = call(
        pass_through_gateway(&graph),
        &token,
        json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
    )
    .await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_initialize_negotiates_protocol_version() {
    // GIVEN: a gateway and a client speaking an older revision
    let graph = MockGraph::start().await;
    let token = valid_token();

    // WHEN: initializing with 2024-11-05
    let response = call(pass_through_gateway(&graph), &token, initialize("2024-11-05")).await;

    // THEN: the client's revision is kept
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");

    // AND: an unknown revision is answered with the latest one
    let response = call(pass_through_gateway(&graph), &token, initialize("1999-01-01")).await;
    assert_eq!(
        response["result"]["protocolVersion"],
        graphgate::server::mcp::LATEST_PROTOCOL_VERSION
    );
}

#[tokio::test]
async fn test_initialize_requires_client_info() {
    let graph = MockGraph::start().await;

    let response = call(
        pass_through_gateway(&graph),
        &valid_token(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
    )
    .await;

    assert_eq!(response["error"]["code"], -32602);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_hello_passes_token_through() {
    // GIVEN: Graph answering only for the caller's own token
    let graph = MockGraph::start().await;
    let token = valid_token();
    graph.mock_profile(&token, "Adele Vance").await;

    // WHEN: calling hello in pass-through mode
    let response = call(pass_through_gateway(&graph), &token, tool_call("hello")).await;

    // THEN: the profile name is greeted
    assert!(response["result"].get("isError").is_none());
    assert_eq!(result_text(&response), "Hello, Adele Vance!");
    assert_eq!(graph.request_count("/me").await, 1);
}

#[tokio::test]
async fn test_list_junk_emails() {
    let graph = MockGraph::start().await;
    graph
        .mock_junk_emails(json!([
            {
                "subject": "Claim your prize",
                "from": {"emailAddress": {"name": "Prize Desk", "address": "prize@spam.example"}},
                "receivedDateTime": "2024-05-01T10:00:00Z"
            },
            {
                "subject": "Cheap watches",
                "from": {"emailAddress": {"address": "watches@spam.example"}},
                "receivedDateTime": "2024-05-02T08:15:00Z"
            }
        ]))
        .await;

    let response = call(
        pass_through_gateway(&graph),
        &valid_token(),
        tool_call("list_junk_emails"),
    )
    .await;

    assert_eq!(
        result_text(&response),
        "- Claim your prize (from: prize@spam.example, 2024-05-01T10:00:00Z)\n\
         - Cheap watches (from: watches@spam.example, 2024-05-02T08:15:00Z)"
    );

    let requests = graph.server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("top=5"));
}

#[tokio::test]
async fn test_empty_junk_folder() {
    let graph = MockGraph::start().await;
    graph.mock_junk_emails(json!([])).await;

    let response = call(
        pass_through_gateway(&graph),
        &valid_token(),
        tool_call("list_junk_emails"),
    )
    .await;
    assert_eq!(result_text(&response), "No junk emails found.");
}

#[tokio::test]
async fn test_downstream_failure_is_tool_error() {
    // GIVEN: Graph failing
    let graph = MockGraph::start().await;
    graph.mock_status("/me", 503).await;

    // WHEN: calling hello
    let response = call(pass_through_gateway(&graph), &valid_token(), tool_call("hello")).await;

    // THEN: the JSON-RPC call succeeds with an error result, not retried
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(result_text(&response), "downstream API returned status 503");
    assert_eq!(graph.request_count("/me").await, 1);
}

#[tokio::test]
async fn test_on_behalf_of_uses_exchanged_token() {
    // GIVEN: a token endpoint issuing a downstream token
    let graph = MockGraph::start().await;
    graph.mock_token_success("exchanged-graph-token").await;
    graph.mock_profile("exchanged-graph-token", "Adele Vance").await;
    let http = SharedHttpClient::default();
    let app = gateway(&graph, graph.on_behalf_of(http.clone()), http);

    // WHEN: calling hello
    let response = call(app, &valid_token(), tool_call("hello")).await;

    // THEN: Graph was called with the exchanged token
    assert_eq!(result_text(&response), "Hello, Adele Vance!");
    assert_eq!(graph.request_count(TOKEN_PATH).await, 1);
    assert_eq!(graph.request_count("/me").await, 1);
}

#[tokio::test]
async fn test_on_behalf_of_failure_is_tool_error() {
    // GIVEN: a token endpoint refusing the assertion
    let graph = MockGraph::start().await;
    graph
        .mock_token_error("invalid_grant", "AADSTS50013: Assertion failed signature validation.")
        .await;
    let http = SharedHttpClient::default();
    let app = gateway(&graph, graph.on_behalf_of(http.clone()), http);

    // WHEN: calling hello
    let response = call(app, &valid_token(), tool_call("hello")).await;

    // THEN: the provider's code and description reach the caller; Graph is never called
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(
        result_text(&response),
        "on-behalf-of exchange failed: invalid_grant: AADSTS50013: Assertion failed signature validation."
    );
    assert_eq!(graph.request_count("/me").await, 0);
}

#[tokio::test]
async fn test_protocol_errors() {
    let graph = MockGraph::start().await;
    let token = valid_token();

    let response = call(
        pass_through_gateway(&graph),
        &token,
        json!({"jsonrpc": "2.0", "id": 4, "method": "completion/complete"}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["id"], 4);

    let response = call(
        pass_through_gateway(&graph),
        &token,
        json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "rm_rf"}}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32001);

    let response = call(
        pass_through_gateway(&graph),
        &token,
        json!({"jsonrpc": "2.0", "id": 6}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 6);

    let response = call(
        pass_through_gateway(&graph),
        &token,
        json!({"jsonrpc": "1.0", "id": 7, "method": "ping"}),
    )
    .await;
    assert_eq!(response["error"]["code"], -32600);

    let response = send(
        pass_through_gateway(&graph),
        rpc_request(Some(&token), "{not json"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_unexpected_tool_arguments_are_rejected() {
    // GIVEN: Graph ready to answer
    let graph = MockGraph::start().await;
    let token = valid_token();
    graph.mock_profile(&token, "Adele Vance").await;

    // WHEN: calling hello with an argument its schema does not declare
    let mut message = tool_call("hello");
    message["params"]["arguments"] = json!({"bogus": 1});
    let response = call(pass_through_gateway(&graph), &token, message).await;

    // THEN: invalid params, and Graph is never called
    assert_eq!(response["error"]["code"], -32602);
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("bogus")
    );
    assert_eq!(graph.request_count("/me").await, 0);

    // AND: the tool still runs without arguments
    let mut message = tool_call("hello");
    message["params"].as_object_mut().unwrap().remove("arguments");
    let response = call(pass_through_gateway(&graph), &token, message).await;
    assert_eq!(result_text(&response), "Hello, Adele Vance!");
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let graph = MockGraph::start().await;
    let message = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});

    let response = send(
        pass_through_gateway(&graph),
        rpc_request(Some(&valid_token()), message.to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_router_from_configuration() {
    // GIVEN: claims-only pass-through settings pointing at the mock Graph
    let graph = MockGraph::start().await;
    let token = valid_token();
    graph.mock_profile(&token, "Adele Vance").await;

    let cli = Cli::try_parse_args_only([
        "graphgate",
        "--tenant-id",
        TENANT,
        "--verification",
        "claims-only",
        "--allow-unverified-signatures",
        "--base-url",
        BASE_URL,
        "--downstream-base-url",
        graph.uri().as_str(),
    ])
    .unwrap();
    let config = GatewayConfig::from_cli(&cli).unwrap();
    let metadata: IdentityMetadata = serde_json::from_value(json!({
        "issuer": format!("https://login.microsoftonline.com/{TENANT}/v2.0"),
        "jwks_uri": format!("https://login.microsoftonline.com/{TENANT}/discovery/v2.0/keys"),
        "token_endpoint": format!("https://login.microsoftonline.com/{TENANT}/oauth2/v2.0/token"),
    }))
    .unwrap();

    // WHEN: building the router the binary serves
    let app = build_router(&config, &metadata, &SharedHttpClient::default()).unwrap();

    // THEN: a Graph-audience token reaches the tool
    let response = call(app, &token, tool_call("hello")).await;
    assert_eq!(result_text(&response), "Hello, Adele Vance!");
}
