//! Round-trip: a contract serialized to the embedded literal format and
//! parsed back yields field-for-field equal conditions, and expression
//! tests behave identically for identical inputs.

use std::time::Duration;

use serde_json::json;

use pact_core::condition::run_condition;
use pact_core::contract::parser::{CONTRACT_MARKER, parse_contract};

#[tokio::test]
async fn serialized_contract_round_trips() {
    let literal = json!({
        "preconditions": [
            {
                "name": "has files",
                "test": "len(data.files) > 0",
                "critical": true,
                "errorMessage": "handoff must include files"
            },
            {
                "name": "branch is set",
                "test": "data.branch != null"
            }
        ],
        "postconditions": [
            {
                "name": "tests pass",
                "test": "data.tests_passed",
                "critical": true
            }
        ],
        "rollback": "data.checkpoint"
    });

    let text = format!(
        "Work handed off.\n\n{CONTRACT_MARKER} {}\n",
        serde_json::to_string_pretty(&literal).unwrap()
    );
    let contract = parse_contract(&text).expect("serialized contract should parse");

    let pre = contract.preconditions.as_ref().unwrap();
    let literal_pre = literal["preconditions"].as_array().unwrap();
    assert_eq!(pre.len(), literal_pre.len());
    for (decoded, original) in pre.iter().zip(literal_pre) {
        assert_eq!(decoded.name, original["name"].as_str().unwrap());
        assert_eq!(
            decoded.critical,
            original["critical"].as_bool().unwrap_or(false)
        );
        assert_eq!(
            decoded.error_message.as_deref(),
            original["errorMessage"].as_str()
        );
    }

    let post = contract.postconditions.as_ref().unwrap();
    assert_eq!(post.len(), 1);
    assert_eq!(post[0].name, "tests pass");
    assert!(post[0].critical);
    assert!(contract.rollback.is_some());

    // Expression tests are not comparable directly; their invocation results
    // must match for identical inputs.
    let timeout = Duration::from_secs(5);
    let with_files = json!({"files": ["a.rs"], "branch": "main"});
    let without_files = json!({"files": [], "branch": null});

    let result = run_condition(&pre[0], &[with_files.clone()], timeout).await;
    assert!(result.passed);
    let result = run_condition(&pre[0], &[without_files.clone()], timeout).await;
    assert!(!result.passed);

    let result = run_condition(&pre[1], &[with_files], timeout).await;
    assert!(result.passed);
    let result = run_condition(&pre[1], &[without_files], timeout).await;
    assert!(!result.passed);
}
