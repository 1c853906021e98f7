//! Engine wired to the real HTTP clients against mock servers, plus
//! on-disk bootstrap.

use std::io::Write as _;
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kava_config::KavaConfig;
use kava_engine::Engine;
use kava_providers::OllamaClient;
use kava_types::{Provenance, ThreadId};

use crate::common::TEST_CORPUS;

async fn mount_chat_response(server: &MockServer, content: &str, once: bool) {
    let body = serde_json::json!({
        "message": {"role": "assistant", "content": content},
        "done": true,
    });
    let mock = Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = if once { mock.up_to_n_times(1) } else { mock };
    mock.mount(server).await;
}

async fn mount_embed_response(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[0.4, 0.1, 0.3]],
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn bootstrap_runs_turns_against_a_mock_model_daemon() {
    let server = MockServer::start().await;
    // calls arrive in order: extraction, lead-in, extraction, lead-in
    mount_chat_response(&server, r#"[{"name": "warfarin", "category": "drug"}]"#, true).await;
    mount_chat_response(&server, "Logged your warfarin.", true).await;
    mount_chat_response(&server, r#"[{"name": "grapefruit", "category": "food"}]"#, true).await;
    mount_chat_response(&server, "Careful there!", false).await;
    mount_embed_response(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kava.db");
    let corpus_path = dir.path().join("interactions.toml");
    {
        let mut file = std::fs::File::create(&corpus_path).unwrap();
        file.write_all(TEST_CORPUS.as_bytes()).unwrap();
    }

    let model = Arc::new(OllamaClient::new(server.uri(), "chat-model", "embed-model"));
    let engine = Engine::bootstrap(
        &KavaConfig::default(),
        &db_path,
        &corpus_path,
        Arc::clone(&model) as Arc<dyn kava_providers::ChatModel>,
        Some(model as Arc<dyn kava_index::Embedder>),
        None,
    )
    .await
    .expect("bootstrap");

    let thread = ThreadId::from("boot");
    engine.submit_turn(&thread, "I took warfarin").await.unwrap();
    let result = engine.submit_turn(&thread, "I had grapefruit").await.unwrap();

    let record = result.evidence[0].pairs[0].outcome.record().expect("record");
    assert_eq!(record.provenance, Provenance::Exact);
    assert!(result.reply.starts_with("Careful there!"));

    // the log survives on disk: a fresh engine over the same db still
    // sees the thread's history
    drop(engine);
    let log = kava_store::SubstanceLog::open(&db_path).unwrap();
    assert_eq!(log.mention_count(), 2);
}

#[tokio::test]
async fn bootstrap_fails_fast_when_store_path_is_unusable() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_path = dir.path().join("interactions.toml");
    {
        let mut file = std::fs::File::create(&corpus_path).unwrap();
        file.write_all(TEST_CORPUS.as_bytes()).unwrap();
    }

    // a directory where the db file should be makes the store unusable
    let bad_db = dir.path().join("not-a-file");
    std::fs::create_dir(&bad_db).unwrap();

    let server = MockServer::start().await;
    let model = Arc::new(OllamaClient::new(server.uri(), "chat", "embed"));

    let err = Engine::bootstrap(
        &KavaConfig::default(),
        &bad_db,
        &corpus_path,
        model as Arc<dyn kava_providers::ChatModel>,
        None,
        None,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, kava_engine::EngineError::StoreUnreachable(_)));
}

#[tokio::test]
async fn model_outage_still_commits_the_turn() {
    // chat endpoint down: extraction finds nothing, composer falls back,
    // but the turn itself must commit rather than error
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kava.db");
    let corpus_path = dir.path().join("interactions.toml");
    {
        let mut file = std::fs::File::create(&corpus_path).unwrap();
        file.write_all(TEST_CORPUS.as_bytes()).unwrap();
    }

    // nothing mounted: every request 404s
    let server = MockServer::start().await;
    let model = Arc::new(OllamaClient::new(server.uri(), "chat", "embed"));

    let engine = Engine::bootstrap(
        &KavaConfig::default(),
        &db_path,
        &corpus_path,
        model as Arc<dyn kava_providers::ChatModel>,
        None,
        None,
    )
    .await
    .unwrap();

    let result = engine
        .submit_turn(&ThreadId::from("outage"), "I took warfarin")
        .await
        .unwrap();
    assert!(result.evidence.is_empty());
    assert!(!result.reply.is_empty());
}
