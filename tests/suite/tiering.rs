//! Tier precedence and evidence completeness across the full engine.

use std::sync::Arc;

use kava_types::{PairOutcome, Provenance, ThreadId};

use crate::common::{
    build_engine, drug_json, food_json, test_policy, HashEmbedder, ScriptedChat, ScriptedSearch,
};

#[tokio::test]
async fn exact_beats_similar_even_with_semantic_index_live() {
    // grapefruit+warfarin has an exact record AND embeds close to itself;
    // the resolver must still report exact provenance.
    let chat = ScriptedChat::new([
        drug_json("warfarin"),
        "Logged.".to_string(),
        food_json("grapefruit"),
        "Checked.".to_string(),
    ]);
    let engine = build_engine(test_policy(), chat, Some(Arc::new(HashEmbedder)), None).await;
    let thread = ThreadId::from("tier-exact");

    engine.submit_turn(&thread, "warfarin daily").await.unwrap();
    let result = engine.submit_turn(&thread, "grapefruit for breakfast").await.unwrap();

    let record = result.evidence[0].pairs[0].outcome.record().expect("record");
    assert_eq!(record.provenance, Provenance::Exact);
    assert_eq!(record.confidence, None);
}

#[tokio::test]
async fn similar_tier_answers_for_near_matches() {
    // "grapefruit juice" + "simvastatin" is curated; the juice variant
    // against the same drug should land in the similarity tier when the
    // exact key misses.
    let chat = ScriptedChat::new([
        drug_json("simvastatin"),
        "Logged.".to_string(),
        r#"[{"name": "fresh grapefruit juice", "category": "food"}]"#.to_string(),
        "Checked.".to_string(),
    ]);
    let engine = build_engine(test_policy(), chat, Some(Arc::new(HashEmbedder)), None).await;
    let thread = ThreadId::from("tier-similar");

    engine.submit_turn(&thread, "I take simvastatin").await.unwrap();
    let result = engine
        .submit_turn(&thread, "had fresh grapefruit juice")
        .await
        .unwrap();

    let record = result.evidence[0].pairs[0].outcome.record().expect("record");
    assert_eq!(record.provenance, Provenance::Similar);
    let confidence = record.confidence.expect("similarity score");
    assert!(confidence > 0.0 && confidence <= 1.0);
}

#[tokio::test]
async fn web_tier_is_last_and_hedged() {
    let chat = ScriptedChat::new([
        drug_json("lisinopril"),
        "Logged.".to_string(),
        food_json("banana"),
        "Checked.".to_string(),
    ]);
    let web = Arc::new(ScriptedSearch::new().with_results(
        "banana lisinopril",
        &["Potassium-rich fruit may add to ACE inhibitor effects."],
    ));
    let engine = build_engine(test_policy(), chat, None, Some(web)).await;
    let thread = ThreadId::from("tier-web");

    engine.submit_turn(&thread, "on lisinopril").await.unwrap();
    let result = engine.submit_turn(&thread, "ate a banana").await.unwrap();

    let record = result.evidence[0].pairs[0].outcome.record().expect("record");
    assert_eq!(record.provenance, Provenance::Web);
    assert!(result.reply.contains("Some sources suggest"));
}

#[tokio::test]
async fn one_timeout_among_three_pairs_degrades_only_that_pair() {
    // three actives, then a new substance: the middle pair's web search
    // hangs, the other two resolve normally.
    let chat = ScriptedChat::new([
        drug_json("warfarin"),
        "Logged.".to_string(),
        drug_json("metformin"),
        "Logged.".to_string(),
        drug_json("lisinopril"),
        "Logged.".to_string(),
        food_json("grapefruit"),
        "Checked all three.".to_string(),
    ]);
    let web = Arc::new(
        ScriptedSearch::new()
            .hanging_on("metformin")
            .with_results("lisinopril", &["Possible additive effect reported."]),
    );
    let engine = build_engine(test_policy(), chat, None, Some(web)).await;
    let thread = ThreadId::from("tier-partial");

    engine.submit_turn(&thread, "warfarin").await.unwrap();
    engine.submit_turn(&thread, "metformin").await.unwrap();
    engine.submit_turn(&thread, "lisinopril").await.unwrap();
    let result = engine.submit_turn(&thread, "grapefruit").await.unwrap();

    let pairs = &result.evidence[0].pairs;
    assert_eq!(pairs.len(), 3, "every pair gets exactly one outcome");

    let by_name = |name: &str| {
        pairs
            .iter()
            .find(|p| p.other.as_str() == name)
            .unwrap_or_else(|| panic!("missing pair for {name}"))
    };

    // warfarin pair: exact record, unaffected by the web hang
    assert!(matches!(
        by_name("warfarin").outcome,
        PairOutcome::Interaction { .. }
    ));
    // metformin pair: timed out, explicitly unresolved
    assert!(by_name("metformin").outcome.is_unresolved());
    // lisinopril pair: web evidence came back fine
    let record = by_name("lisinopril").outcome.record().expect("web record");
    assert_eq!(record.provenance, Provenance::Web);

    // the reply names the unresolved pair rather than dropping it
    assert!(result.reply.contains("couldn't retrieve interaction evidence"));
}
