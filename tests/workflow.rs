mod common;

use common::{
    MockForge, ScriptedSelector, api_error, merged, pull_request, repository, viewer_page,
};
use mass_merge::{
    ActionResult, BulkOperation, GroupChoice, Outcome, Workflow, WorkflowOptions,
    graphql::GraphQlError,
};
use serde_json::{Value, json};

const LODASH: &str = "Bump lodash from 4.17.19 to 4.17.21";
const LEFT_PAD: &str = "Bump left-pad from 1.0.0 to 1.0.1";

fn two_repositories() -> Value {
    viewer_page(
        vec![
            repository(
                "R_web",
                "web",
                vec![
                    pull_request("PR_web_1", LODASH, "dependabot", &["dependencies"]),
                    pull_request("PR_web_2", "Add dark mode", "alice", &[]),
                ],
            ),
            repository(
                "R_api",
                "api",
                vec![
                    pull_request("PR_api_1", LODASH, "dependabot", &["dependencies"]),
                    pull_request("PR_api_2", LEFT_PAD, "dependabot-preview", &["dependencies"]),
                ],
            ),
        ],
        None,
    )
}

fn merging_forge() -> MockForge {
    MockForge::new(|operation, variables| match operation {
        "ViewerPullRequests" => two_repositories(),
        "MergePullRequests" => merged(variables),
        other => panic!("unexpected operation {other}"),
    })
}

fn merge_options() -> WorkflowOptions {
    WorkflowOptions::default()
}

#[tokio::test]
async fn test_merges_every_pull_request_of_the_chosen_group() {
    let forge = merging_forge();
    let workflow = Workflow::new(&forge, merge_options());
    let mut selector = ScriptedSelector::new().choose(&[LODASH]).answer(true).answer(true);
    let mut output: Vec<u8> = Vec::new();

    workflow.run(&mut selector, &(), &mut output).await.unwrap();

    assert_eq!(
        selector.offered[0],
        vec![GroupChoice::new(LEFT_PAD, 1), GroupChoice::new(LODASH, 2)]
    );
    assert_eq!(selector.prompts, vec!["Merge?\n ● api\n ● web\n", "Done?"]);

    let merges = forge.requests_for("MergePullRequests");
    assert_eq!(merges, vec![json!({ "id0": "PR_web_1" }), json!({ "id0": "PR_api_1" })]);
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_nothing_to_do_without_bot_pull_requests() {
    let forge = MockForge::new(|_, _| {
        viewer_page(
            vec![repository(
                "R_web",
                "web",
                vec![pull_request("PR_1", LODASH, "alice", &[])],
            )],
            None,
        )
    });
    let workflow = Workflow::new(&forge, merge_options());
    let mut selector = ScriptedSelector::new();
    let mut output: Vec<u8> = Vec::new();

    workflow.run(&mut selector, &(), &mut output).await.unwrap();

    assert_eq!(String::from_utf8(output).unwrap(), "Nothing to do\n");
    assert!(selector.offered.is_empty());
    assert!(selector.prompts.is_empty());
}

#[tokio::test]
async fn test_declining_merges_nothing() {
    let forge = merging_forge();
    let workflow = Workflow::new(&forge, merge_options());
    let mut selector = ScriptedSelector::new().choose(&[LODASH]).answer(false).answer(true);
    let mut output: Vec<u8> = Vec::new();

    workflow.run(&mut selector, &(), &mut output).await.unwrap();

    assert!(forge.requests_for("MergePullRequests").is_empty());
    assert_eq!(selector.prompts.len(), 2);
    assert_eq!(selector.prompts[1], "Done?");
}

#[tokio::test]
async fn test_choosing_nothing_ends_without_asking() {
    let forge = merging_forge();
    let workflow = Workflow::new(&forge, merge_options());
    let mut selector = ScriptedSelector::new().choose(&[]);

    let outcome = workflow
        .run_once(&mut selector, &(), &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NoSelection);
    assert!(selector.prompts.is_empty());
}

#[tokio::test]
async fn test_not_done_fetches_again() {
    let forge = merging_forge();
    let workflow = Workflow::new(&forge, merge_options());
    let mut selector = ScriptedSelector::new()
        .choose(&[LEFT_PAD])
        .answer(true)
        .answer(false)
        .choose(&[]);

    workflow
        .run(&mut selector, &(), &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(forge.requests_for("ViewerPullRequests").len(), 2);
    assert_eq!(selector.offered.len(), 2);
    assert_eq!(
        forge.requests_for("MergePullRequests"),
        vec![json!({ "id0": "PR_api_2" })]
    );
}

#[tokio::test]
async fn test_failures_are_reported_per_pull_request() {
    let forge = MockForge::new(|operation, _| match operation {
        "ViewerPullRequests" => two_repositories(),
        _ => api_error("Pull request is not mergeable", &["merge_0"]),
    });
    let workflow = Workflow::new(&forge, merge_options());
    let mut selector = ScriptedSelector::new().choose(&[LODASH]).answer(true);

    let outcome = workflow
        .run_once(&mut selector, &(), &mut std::io::sink())
        .await
        .unwrap();
    let Outcome::Completed(results) = outcome else {
        panic!("expected the merge to run");
    };

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| !r.is_success()));

    let mut output: Vec<u8> = Vec::new();
    mass_merge::workflow::report_failures(&results, &mut output).unwrap();
    let expected = format!("{LODASH}: [\"Pull request is not mergeable\"]\n");
    assert_eq!(String::from_utf8(output).unwrap(), expected.repeat(2));
}

#[tokio::test]
async fn test_batch_merge_sends_one_request() {
    let forge = merging_forge();
    let options = WorkflowOptions {
        operation: BulkOperation::Merge { batch: true },
        ..WorkflowOptions::default()
    };
    let workflow = Workflow::new(&forge, options);
    let mut selector = ScriptedSelector::new().choose(&[LODASH]).answer(true);

    let outcome = workflow
        .run_once(&mut selector, &(), &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(
        forge.requests_for("MergePullRequests"),
        vec![json!({ "id0": "PR_web_1", "id1": "PR_api_1" })]
    );
    let Outcome::Completed(results) = outcome else {
        panic!("expected the merge to run");
    };
    assert!(results.iter().all(|(_, r)| r.is_success()));
}

#[tokio::test]
async fn test_label_flow_labels_chosen_pull_requests() {
    let forge = MockForge::new(|operation, variables| match operation {
        "ViewerPullRequests" => two_repositories(),
        "RepositoryLabels" if variables["id"] == "R_web" => {
            common::labels_page(&[("LA_web_sec", "security"), ("LA_web_dep", "dependencies")])
        }
        "RepositoryLabels" => common::labels_page(&[("LA_api_dep", "dependencies")]),
        "AddLabels" => common::label_added(),
        other => panic!("unexpected operation {other}"),
    });
    let options = WorkflowOptions {
        operation: BulkOperation::Label("security".to_string()),
        ..WorkflowOptions::default()
    };
    let workflow = Workflow::new(&forge, options);
    let mut selector = ScriptedSelector::new().choose(&[LODASH]).answer(true);
    let mut output: Vec<u8> = Vec::new();

    let outcome = workflow
        .run_once(&mut selector, &(), &mut output)
        .await
        .unwrap();

    assert_eq!(selector.prompts, vec!["Add label 'security'?\n ● api\n ● web\n"]);
    assert_eq!(
        forge.requests_for("AddLabels"),
        vec![json!({ "labelableId": "PR_web_1", "labelIds": ["LA_web_sec"] })]
    );

    let Outcome::Completed(results) = outcome else {
        panic!("expected labels to be added");
    };
    assert_eq!(results[0].1, ActionResult::Success);
    assert_eq!(
        results[1].1,
        ActionResult::Failed(vec![GraphQlError::synthetic(
            "label 'security' does not exist in repository R_api"
        )])
    );
    assert_eq!(
        String::from_utf8(output).unwrap(),
        format!("{LODASH}: [\"label 'security' does not exist in repository R_api\"]\n")
    );
}

#[tokio::test]
async fn test_title_strategy_ignores_labels() {
    let forge = MockForge::new(|_, _| {
        viewer_page(
            vec![repository(
                "R_web",
                "web",
                vec![
                    pull_request("PR_1", LODASH, "dependabot", &["dependencies", "javascript"]),
                    pull_request("PR_2", LODASH, "dependabot", &["dependencies"]),
                ],
            )],
            None,
        )
    });
    let labels_workflow = Workflow::new(&forge, WorkflowOptions::default());
    let title_workflow = Workflow::new(
        &forge,
        WorkflowOptions {
            strategy: mass_merge::GroupKeyStrategy::Title,
            ..WorkflowOptions::default()
        },
    );

    let by_labels = labels_workflow.fetch_groups(&()).await.unwrap();
    let by_title = title_workflow.fetch_groups(&()).await.unwrap();

    assert_eq!(
        by_labels.keys().collect::<Vec<_>>(),
        vec![LODASH.to_string(), format!("{LODASH} [javascript]")]
    );
    assert_eq!(by_title.keys().collect::<Vec<_>>(), vec![LODASH]);
    assert_eq!(by_title.get(LODASH).unwrap().records.len(), 2);
}
