//! End-to-end conversation scenarios across the engine boundary.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use kava_engine::SAFETY_DISCLAIMER;
use kava_types::{PairOutcome, Provenance, Severity, ThreadId};

use crate::common::{build_engine, drug_json, food_json, test_policy, ScriptedChat, ScriptedSearch};

#[tokio::test]
async fn warfarin_then_grapefruit_resolves_exact_high_severity() {
    let chat = ScriptedChat::new([
        drug_json("warfarin"),
        "Logged your warfarin.".to_string(),
        food_json("grapefruit"),
        "Careful with grapefruit!".to_string(),
    ]);
    let engine = build_engine(test_policy(), chat, None, None).await;
    let thread = ThreadId::from("scenario-warfarin");

    engine
        .submit_turn(&thread, "I took warfarin this morning")
        .await
        .unwrap();
    let result = engine
        .submit_turn(&thread, "I just had half a grapefruit")
        .await
        .unwrap();

    assert_eq!(result.evidence.len(), 1);
    let pairs = &result.evidence[0].pairs;
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].other.as_str(), "warfarin");

    let record = pairs[0].outcome.record().expect("exact record");
    assert_eq!(record.provenance, Provenance::Exact);
    assert_eq!(record.severity, Severity::High);

    // exact evidence is stated directly, with the standing disclaimer
    assert!(result.reply.contains("known to interact"));
    assert!(result.reply.contains(SAFETY_DISCLAIMER));
}

#[tokio::test]
async fn unknown_supplement_yields_no_invented_risk() {
    let chat = ScriptedChat::new([
        drug_json("warfarin"),
        "Logged.".to_string(),
        r#"[{"name": "shilajit resin", "category": "drug"}]"#.to_string(),
        "Logged that supplement.".to_string(),
    ]);
    // web tool configured but finds nothing for this pair
    let web = Arc::new(ScriptedSearch::new());
    let engine = build_engine(test_policy(), chat, None, Some(web)).await;
    let thread = ThreadId::from("scenario-unknown");

    engine.submit_turn(&thread, "I take warfarin").await.unwrap();
    let result = engine
        .submit_turn(&thread, "I also started shilajit resin")
        .await
        .unwrap();

    let pairs = &result.evidence[0].pairs;
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].outcome, PairOutcome::NoKnownInteraction);

    assert!(result.reply.contains("No known interaction found"));
    // the reply must not manufacture a warning
    assert!(!result.reply.contains("may interact"));
}

#[tokio::test]
async fn unresolved_pair_is_reported_not_omitted() {
    let chat = ScriptedChat::new([
        drug_json("warfarin"),
        "Logged.".to_string(),
        food_json("dragonfruit"),
        "Logged.".to_string(),
    ]);
    let web = Arc::new(ScriptedSearch::new().hanging_on("dragonfruit"));
    let engine = build_engine(test_policy(), chat, None, Some(web)).await;
    let thread = ThreadId::from("scenario-unresolved");

    engine.submit_turn(&thread, "I take warfarin").await.unwrap();
    let result = engine
        .submit_turn(&thread, "I ate dragonfruit")
        .await
        .unwrap();

    let pairs = &result.evidence[0].pairs;
    assert!(pairs[0].outcome.is_unresolved());
    assert!(result.reply.contains("couldn't retrieve interaction evidence"));
}

#[tokio::test]
async fn conversational_turn_is_answered_without_logging() {
    let chat = ScriptedChat::new(["[]".to_string(), "Warfarin is a blood thinner.".to_string()]);
    let engine = build_engine(test_policy(), chat, None, None).await;

    let result = engine
        .submit_turn(&ThreadId::from("scenario-chat"), "what is warfarin?")
        .await
        .unwrap();

    assert!(result.evidence.is_empty());
    assert_eq!(result.reply, "Warfarin is a blood thinner.");
    assert!(!result.reply.contains(SAFETY_DISCLAIMER));
}

#[tokio::test]
async fn reset_clears_one_thread_only() {
    let chat = ScriptedChat::new([
        drug_json("warfarin"),
        "Logged.".to_string(),
        drug_json("warfarin"),
        "Logged.".to_string(),
        food_json("grapefruit"),
        "Checked A.".to_string(),
        food_json("grapefruit"),
        "Checked B.".to_string(),
    ]);
    let engine = build_engine(test_policy(), chat, None, None).await;
    let thread_a = ThreadId::from("reset-a");
    let thread_b = ThreadId::from("reset-b");

    engine.submit_turn(&thread_a, "I take warfarin").await.unwrap();
    engine.submit_turn(&thread_b, "I take warfarin").await.unwrap();

    engine.reset_thread(&thread_a).await.unwrap();

    // thread A lost its history: grapefruit has no partners
    let a = engine.submit_turn(&thread_a, "I had grapefruit").await.unwrap();
    assert!(a.evidence[0].pairs.is_empty());

    // thread B is untouched: the exact pair still resolves
    let b = engine.submit_turn(&thread_b, "I had grapefruit").await.unwrap();
    assert_eq!(b.evidence[0].pairs.len(), 1);
    assert!(matches!(
        b.evidence[0].pairs[0].outcome,
        PairOutcome::Interaction { .. }
    ));
}
