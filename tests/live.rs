//! Live end-to-end searches against a real browser and network.
//!
//! These tests are marked with `#[ignore]` by default because they require
//! a Chrome installation, network access, and the extraction payload files
//! in `SCRIPTS_DIR`.
//!
//! Run with: `cargo test --test live -- --ignored`

use serde_json::Value;

use serp_driver::{execute, AppConfig, SearchOutcome, SearchRequest};

fn envelope_of(outcome: SearchOutcome) -> Value {
    match outcome {
        SearchOutcome::Single(envelope) => envelope,
        SearchOutcome::Batch(mut envelopes) => envelopes.remove(0),
    }
}

#[tokio::test]
#[ignore]
async fn test_single_image_search() {
    let config = AppConfig::from_env();
    let request = SearchRequest::single("rust programming");

    let outcome = execute(&config, &request).await.expect("search should run");
    let envelope = envelope_of(outcome);

    println!(
        "image search envelope: {}",
        serde_json::to_string_pretty(&envelope).unwrap()
    );
    assert_eq!(envelope["query"], Value::String("rust programming".into()));
    assert!(envelope.get("image_results").is_some());
}

#[tokio::test]
#[ignore]
async fn test_batch_preserves_order() {
    let config = AppConfig::from_env();
    let request: SearchRequest = serde_json::from_value(serde_json::json!({
        "queries": [
            {"query": "rust language", "query_id": 1},
            {"query": "tokio runtime", "query_id": 2},
        ],
        "cc": "US",
        "search_type": "web",
    }))
    .unwrap();

    let outcome = execute(&config, &request).await.expect("search should run");
    match outcome {
        SearchOutcome::Batch(envelopes) => {
            assert_eq!(envelopes.len(), 2);
            assert_eq!(envelopes[0]["query_id"], serde_json::json!(1));
            assert_eq!(envelopes[1]["query_id"], serde_json::json!(2));
        }
        SearchOutcome::Single(_) => panic!("two queries should produce a batch"),
    }
}
