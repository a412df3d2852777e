//! Coordinator, search client, and `ask` flow against a mock HTTP server.

use recall_me::ask::{answer_query, AskOptions};
use recall_me::config::parse_config;
use recall_me::error::WebhookError;
use recall_me::export::AnswerSource;
use recall_me::models::SearchContext;
use recall_me::normalize::extract_text;
use recall_me::search::search_documents;
use recall_me::webhook::{PollOptions, PollStrategy, ReqwestTransport, WebhookCoordinator};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{matchers, Mock, MockServer, Request, ResponseTemplate};

fn fast(strategy: PollStrategy, max_attempts: u32) -> PollOptions {
    PollOptions {
        max_attempts,
        base_delay_ms: 10,
        backoff_factor: 1.0,
        max_delay_ms: None,
        poll_strategy: strategy,
    }
}

fn coordinator(options: PollOptions) -> WebhookCoordinator {
    let transport = ReqwestTransport::new(None).unwrap();
    WebhookCoordinator::new(Arc::new(transport), options)
}

fn hook_url(server: &MockServer) -> String {
    format!("{}/hook", server.uri())
}

async fn requests(server: &MockServer, method: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == method)
        .collect()
}

async fn mount_started(server: &MockServer) {
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .and(matchers::body_partial_json(json!({"event": "chat_message"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Workflow was started"})),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn immediate_answer_is_returned_without_polling() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "Entropy is disorder."})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = coordinator(fast(PollStrategy::Get, 5))
        .request_answer(&hook_url(&server), "entropy", SearchContext::empty("entropy"))
        .await
        .unwrap();

    assert_eq!(reply.polls, 0);
    assert_eq!(extract_text(&reply.payload), "Entropy is disorder.");

    let sent: Value = requests(&server, "POST").await[0].body_json().unwrap();
    assert_eq!(sent["event"], "chat_message");
    assert_eq!(sent["message"], "entropy");
    assert_eq!(sent["session_id"], reply.session_id.as_str());
    assert_eq!(sent["rag_context"]["total_results"], 0);
}

#[tokio::test]
async fn initial_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = coordinator(fast(PollStrategy::Get, 5))
        .request_answer(&hook_url(&server), "q", SearchContext::empty("q"))
        .await
        .unwrap_err();

    match err {
        WebhookError::Http {
            status,
            status_text,
        } => {
            assert_eq!(status, 500);
            assert_eq!(status_text, "Internal Server Error");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_polls_carry_the_session_id() {
    let server = MockServer::start().await;
    mount_started(&server).await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Here it is."})))
        .mount(&server)
        .await;

    let reply = coordinator(fast(PollStrategy::Get, 5))
        .request_answer(&hook_url(&server), "q", SearchContext::empty("q"))
        .await
        .unwrap();

    assert_eq!(reply.polls, 2);
    assert_eq!(extract_text(&reply.payload), "Here it is.");

    let polls = requests(&server, "GET").await;
    assert_eq!(polls.len(), 2);
    for poll in polls {
        let session = poll
            .url
            .query_pairs()
            .find(|(k, _)| k == "session_id")
            .map(|(_, v)| v.into_owned());
        assert_eq!(session.as_deref(), Some(reply.session_id.as_str()));
    }
}

#[tokio::test]
async fn post_polls_send_get_response_action() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .and(matchers::body_partial_json(json!({"action": "get_response"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"output": "From the array."}])))
        .expect(1)
        .mount(&server)
        .await;
    mount_started(&server).await;

    let reply = coordinator(fast(PollStrategy::Post, 5))
        .request_answer(&hook_url(&server), "q", SearchContext::empty("q"))
        .await
        .unwrap();

    assert_eq!(reply.polls, 1);
    assert_eq!(extract_text(&reply.payload), "From the array.");

    let posts = requests(&server, "POST").await;
    assert_eq!(posts.len(), 2);
    let poll: Value = posts[1].body_json().unwrap();
    assert_eq!(poll["session_id"], reply.session_id.as_str());
}

#[tokio::test]
async fn times_out_after_exactly_max_attempts_polls() {
    let server = MockServer::start().await;
    mount_started(&server).await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .expect(3)
        .mount(&server)
        .await;

    let err = coordinator(fast(PollStrategy::Get, 3))
        .request_answer(&hook_url(&server), "q", SearchContext::empty("q"))
        .await
        .unwrap_err();

    assert!(matches!(err, WebhookError::Timeout { attempts: 3 }));
    assert_eq!(requests(&server, "GET").await.len(), 3);
}

#[tokio::test]
async fn failed_poll_counts_but_does_not_abort() {
    let server = MockServer::start().await;
    mount_started(&server).await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Plain text answer"))
        .mount(&server)
        .await;

    let reply = coordinator(fast(PollStrategy::Get, 2))
        .request_answer(&hook_url(&server), "q", SearchContext::empty("q"))
        .await
        .unwrap();

    assert_eq!(reply.polls, 2);
    assert_eq!(extract_text(&reply.payload), "Plain text answer");
}

#[tokio::test]
async fn search_client_sends_query_and_k() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/search_lc"))
        .and(matchers::query_param("query", "heat engines"))
        .and(matchers::query_param("k", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [{"content": "Carnot cycle.", "metadata": {"page": 7}}],
            "image_paths": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = parse_config(&format!("[search]\napi_url = \"{}/\"\n", server.uri())).unwrap();
    let response = search_documents(&cfg.search, "heat engines", 3).await.unwrap();
    assert_eq!(response.hits.len(), 1);
    assert_eq!(response.hits[0].page(), Some(7));
}

#[tokio::test]
async fn search_client_surfaces_backend_errors() {
    let server = MockServer::start().await;
    Mock::given(matchers::path("/search_lc"))
        .and(matchers::query_param("query", "broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "index not loaded"})))
        .mount(&server)
        .await;
    Mock::given(matchers::path("/search_lc"))
        .and(matchers::query_param("query", "down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cfg = parse_config(&format!("[search]\napi_url = \"{}\"\n", server.uri())).unwrap();

    let err = search_documents(&cfg.search, "broken", 5).await.unwrap_err();
    assert_eq!(err.to_string(), "index not loaded");

    let err = search_documents(&cfg.search, "down", 5).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
}

fn ask_config(server: &MockServer) -> recall_me::config::Config {
    parse_config(&format!(
        r#"
[search]
api_url = "{uri}"

[webhook]
url = "{uri}/hook"
profile = "test"

[webhook.profiles.test]
max_attempts = 2
base_delay_ms = 10
backoff_factor = 1.0
poll_strategy = "get"
"#,
        uri = server.uri()
    ))
    .unwrap()
}

async fn mount_search(server: &MockServer) {
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/search_lc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [
                {"content": "Entropy never decreases.", "metadata": {"page": 12, "type": "text"}},
                {"content": "Heat death.", "metadata": {"page": 13}}
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ask_forwards_hits_as_rag_context() {
    let server = MockServer::start().await;
    mount_search(&server).await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "It never decreases."})))
        .expect(1)
        .mount(&server)
        .await;

    let answer = answer_query(&ask_config(&server), &AskOptions::new("entropy"))
        .await
        .unwrap();

    assert_eq!(answer.source, AnswerSource::Webhook);
    assert_eq!(answer.text, "It never decreases.");
    assert_eq!(answer.hits, 2);

    let sent: Value = requests(&server, "POST").await[0].body_json().unwrap();
    assert_eq!(sent["rag_context"]["query"], "entropy");
    assert_eq!(sent["rag_context"]["total_results"], 2);
    assert_eq!(sent["rag_context"]["hits"][0]["content"], "Entropy never decreases.");
    assert_eq!(sent["rag_context"]["hits"][0]["metadata"]["page"], 12);
}

#[tokio::test]
async fn ask_falls_back_to_results_when_webhook_fails() {
    let server = MockServer::start().await;
    mount_search(&server).await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let answer = answer_query(&ask_config(&server), &AskOptions::new("entropy"))
        .await
        .unwrap();

    assert_eq!(answer.source, AnswerSource::SearchResults);
    assert!(answer.text.contains("**1. Text (Page 12)**"));
    assert_eq!(
        answer.webhook_error.as_deref(),
        Some("Webhook HTTP 502: Bad Gateway")
    );
}

#[tokio::test]
async fn ask_without_ai_never_calls_the_webhook() {
    let server = MockServer::start().await;
    mount_search(&server).await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let opts = AskOptions {
        use_ai: false,
        ..AskOptions::new("entropy")
    };
    let answer = answer_query(&ask_config(&server), &opts).await.unwrap();
    assert_eq!(answer.source, AnswerSource::SearchResults);
    assert!(answer.text.starts_with("**Study Context for: \"entropy\"**"));
}
