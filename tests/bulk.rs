mod common;

use common::{MockForge, merged};
use mass_merge::{
    ActionResult, BatchReport, PullRequestRecord,
    bulk::{self, MergeAction, merge_batch},
};
use serde_json::json;

fn record(id: &str, title: &str, repository: &str) -> PullRequestRecord {
    PullRequestRecord {
        id: id.to_string(),
        title: title.to_string(),
        author_login: "dependabot".to_string(),
        repository: repository.to_string(),
        repository_id: format!("R_{repository}"),
        labels: Vec::new(),
    }
}

#[tokio::test]
async fn test_batch_errors_are_attributed_by_alias() {
    let forge = MockForge::new(|_, _| {
        json!({
            "data": { "merge_0": { "pullRequest": { "title": "first" } }, "merge_1": null },
            "errors": [{
                "message": "Pull request is in clean status",
                "locations": [{ "line": 3, "column": 5 }],
                "path": ["merge_1"],
            }],
        })
    });
    let items = vec![record("PR_A", "first", "web"), record("PR_B", "second", "api")];

    let results = merge_batch(&forge, items).await;

    assert_eq!(forge.requests_for("MergePullRequests"), vec![json!({ "id0": "PR_A", "id1": "PR_B" })]);
    assert_eq!(results[0].0.id, "PR_A");
    assert_eq!(results[0].1, ActionResult::Success);
    assert_eq!(results[1].0.id, "PR_B");
    assert_eq!(results[1].1.error_messages(), vec!["Pull request is in clean status"]);
    assert_eq!(results[1].1.errors()[0].locations[0].line, 3);
}

#[tokio::test]
async fn test_batch_error_without_path_hits_every_item() {
    let forge = MockForge::new(|_, _| {
        json!({ "errors": [{ "message": "Something went wrong", "locations": [] }] })
    });
    let items = vec![record("PR_A", "first", "web"), record("PR_B", "second", "api")];

    let results = merge_batch(&forge, items).await;

    assert!(results.iter().all(|(_, r)| r.error_messages() == vec!["Something went wrong"]));
}

#[tokio::test]
async fn test_batch_without_data_fails_every_item() {
    let forge = MockForge::new(|_, _| {
        json!({
            "data": null,
            "errors": [{
                "message": "Pull request is not mergeable",
                "locations": [],
                "path": ["merge_1"],
            }],
        })
    });
    let items = vec![record("PR_A", "first", "web"), record("PR_B", "second", "api")];

    let results = merge_batch(&forge, items).await;

    assert_eq!(results[0].1.error_messages(), vec!["Pull request is not mergeable"]);
    assert_eq!(results[1].1.error_messages(), vec!["Pull request is not mergeable"]);
    assert!(results.iter().all(|(_, r)| !r.is_success()));
}

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    let forge = MockForge::new(|_, variables| merged(variables));

    let results = merge_batch::<_, PullRequestRecord>(&forge, Vec::new()).await;

    assert!(results.is_empty());
    assert!(forge.requests().is_empty());
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_others() {
    let forge = MockForge::new(|_, variables| {
        if variables["id0"] == "PR_B" {
            json!({
                "data": { "merge_0": null },
                "errors": [{ "message": "Base branch was modified", "locations": [], "path": ["merge_0"] }],
            })
        } else {
            merged(variables)
        }
    });
    let items = vec![
        record("PR_A", "Bump a from 1 to 2", "web"),
        record("PR_B", "Bump a from 1 to 2", "api"),
        record("PR_C", "Bump a from 1 to 2", "cli"),
    ];

    let results = bulk::execute(items, &MergeAction::new(&forge)).await;

    assert_eq!(forge.requests_for("MergePullRequests").len(), 3);
    let outcomes: Vec<bool> = results.iter().map(|(_, r)| r.is_success()).collect();
    assert_eq!(outcomes, vec![true, false, true]);

    let report = BatchReport::from_results(&results);
    assert_eq!(
        report.messages,
        vec!["Merging pr \"Bump a from 1 to 2\" into api resulted in \"Base branch was modified\""]
    );
}
