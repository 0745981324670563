use super::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::crew::{CrewError, Process};
use crate::task::output::DelegationKind;
use crate::task::status::{FailureReason, TaskStatus};
use crate::task::TaskSpec;
use crate::tools::{ReadWebpageTool, DEFAULT_MAX_OUTPUT_CHARS};

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn completion_dependencies_finish_before_dependents_start() {
    let llm = ScriptedLlm::new()
        .script("Real Estate Researcher", ["Final Answer: three listings"])
        .script("Data Analyst", ["Final Answer: prices up 4%"])
        .script("Real Estate Broker", [Reply::Echo])
        .delay("Real Estate Researcher", Duration::from_millis(60))
        .delay("Data Analyst", Duration::from_millis(20))
        .shared();

    let crew = crew_with(Arc::clone(&llm), tools(vec![]))
        .agent(agent("Real Estate Researcher"))
        .agent(agent("Data Analyst"))
        .agent(agent("Real Estate Broker"))
        .task(TaskSpec::new("Find listings", "Listings", "Real Estate Researcher").named("research").async_execution(true))
        .task(TaskSpec::new("Analyze market", "Trends", "Data Analyst").named("analysis").async_execution(true))
        .task(TaskSpec::new("Pick deals", "Deals", "Real Estate Broker").named("deals").with_context(["research", "analysis"]))
        .build()
        .unwrap();

    let output = tokio::time::timeout(RUN_TIMEOUT, crew.run(CancellationToken::new())).await.unwrap();
    assert!(output.all_completed());

    let research = output.task("research").unwrap();
    let analysis = output.task("analysis").unwrap();
    let deals = output.task("deals").unwrap();
    let deals_start = deals.started_at.unwrap();
    assert!(research.finished_at.unwrap() <= deals_start);
    assert!(analysis.finished_at.unwrap() <= deals_start);

    assert!(deals.raw.contains("## research (Real Estate Researcher)\nthree listings"));
    assert!(deals.raw.contains("## analysis (Data Analyst)\nprices up 4%"));
    assert_eq!(output.result().unwrap(), deals.raw);
}

#[tokio::test]
async fn manager_integrates_leaf_output() {
    let llm = ScriptedLlm::new()
        .script("Real Estate Researcher", ["Final Answer: X"])
        .script("Project Manager", [Reply::Echo])
        .shared();

    let crew = crew_with(llm, tools(vec![]))
        .process(Process::Hierarchical)
        .agent(agent("Project Manager").allow_delegation(true))
        .agent(agent("Real Estate Researcher"))
        .task(TaskSpec::new("Research", "Listings", "Real Estate Researcher").async_execution(true))
        .task(TaskSpec::new("Summarize", "Strategy", "Project Manager").named("summary"))
        .build()
        .unwrap();

    let answer = tokio::time::timeout(RUN_TIMEOUT, crew.kickoff()).await.unwrap().unwrap();
    assert!(answer.contains('X'));
}

#[tokio::test]
async fn manager_delegates_to_coworker() {
    let delegate = r#"Thought: I need comparables.
Action: Delegate work to coworker
Action Input: {"coworker": "Data Analyst", "task": "Find comparable sales", "context": "12 Oak Ave"}"#;
    let llm = ScriptedLlm::new()
        .script("Data Analyst", ["Final Answer: trends", "Final Answer: comps near 300k"])
        .script("Project Manager", [Reply::from(delegate), Reply::Echo])
        .shared();

    let crew = crew_with(Arc::clone(&llm), tools(vec![]))
        .process(Process::Hierarchical)
        .manager("Project Manager")
        .agent(agent("Project Manager").allow_delegation(true))
        .agent(agent("Data Analyst"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst").named("analysis").async_execution(true))
        .task(TaskSpec::new("Summarize", "Strategy", "Project Manager").named("summary"))
        .build()
        .unwrap();

    let output = tokio::time::timeout(RUN_TIMEOUT, crew.run(CancellationToken::new())).await.unwrap();
    let summary = output.task("summary").unwrap();
    assert_eq!(summary.status, TaskStatus::Completed);
    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.delegations.len(), 1);

    let delegated = &summary.delegations[0];
    assert_eq!(delegated.kind, DelegationKind::Work);
    assert_eq!(delegated.coworker, "Data Analyst");
    assert_eq!(delegated.status, TaskStatus::Completed);
    assert_eq!(delegated.output, "comps near 300k");
    assert!(summary.raw.contains("Observation: comps near 300k"));

    let nested = &llm.requests_for("Data Analyst")[1];
    let system = &nested.messages[0].content;
    assert!(!system.contains("Delegate work to coworker"));
    assert!(nested.messages[1].content.contains("12 Oak Ave"));
    assert_eq!(output.usage().delegations, 1);
}

#[tokio::test]
async fn delegation_to_unknown_coworker_is_an_observation() {
    let delegate = r#"Action: Ask question to coworker
Action Input: {"coworker": "Appraiser", "question": "Value?"}"#;
    let llm = ScriptedLlm::new()
        .script("Project Manager", [Reply::from(delegate), Reply::Echo])
        .shared();

    let crew = crew_with(llm, tools(vec![]))
        .process(Process::Hierarchical)
        .agent(agent("Project Manager").allow_delegation(true))
        .agent(agent("Data Analyst"))
        .task(TaskSpec::new("Summarize", "Strategy", "Project Manager"))
        .build()
        .unwrap();

    let output = crew.run(CancellationToken::new()).await;
    let summary = &output.tasks[0];
    assert_eq!(summary.status, TaskStatus::Completed);
    assert!(summary.raw.contains("Data Analyst"));
    assert!(summary.delegations[0].status.failure().is_some());
}

#[tokio::test]
async fn unreachable_url_degrades_but_task_completes() {
    let read_page = r#"Action: read_webpage
Action Input: {"url": "http://127.0.0.1:9/listing"}"#;
    let llm = ScriptedLlm::new()
        .script("Real Estate Researcher", [Reply::from(read_page), Reply::Echo])
        .shared();
    let fetch = ReadWebpageTool::new(Duration::from_secs(2), "property-crew-tests")
        .unwrap()
        .allow_private_hosts(true);

    let crew = crew_with(llm, tools(vec![Arc::new(fetch)]))
        .agent(agent("Real Estate Researcher").with_tools(["read_webpage"]))
        .task(TaskSpec::new("Read the listing", "Listing details", "Real Estate Researcher"))
        .build()
        .unwrap();

    let output = tokio::time::timeout(RUN_TIMEOUT, crew.run(CancellationToken::new())).await.unwrap();
    let task = &output.tasks[0];
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.tool_calls.len(), 1);
    assert!(task.tool_calls[0].is_degraded());
    assert!(task.tool_calls[0].result.starts_with("[tool 'read_webpage'"));
    assert_eq!(output.usage().failed_tool_calls, 1);
}

#[tokio::test]
async fn huge_tool_output_is_capped() {
    let page = "<p>listing</p>".repeat(10 * 1024 * 1024 / 14);
    let llm = ScriptedLlm::new()
        .script("Data Analyst", ["Action: dump\nAction Input: all", "Final Answer: ok"])
        .shared();

    let crew = crew_with(llm, tools(vec![StaticTool::new("dump", page)]))
        .agent(agent("Data Analyst").with_tools(["dump"]))
        .task(TaskSpec::new("Dump", "Everything", "Data Analyst"))
        .build()
        .unwrap();

    let output = crew.run(CancellationToken::new()).await;
    let call = &output.tasks[0].tool_calls[0];
    assert!(call.result.chars().count() <= DEFAULT_MAX_OUTPUT_CHARS);
    assert_eq!(output.tasks[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn iteration_limit_fails_only_that_task() {
    let llm = ScriptedLlm::new()
        .script("Data Analyst", ["Action: search\nAction Input: rents", "Final Answer: too late"])
        .script("Real Estate Broker", ["Final Answer: deals"])
        .shared();

    let crew = crew_with(llm, tools(vec![StaticTool::new("search", "rents are flat")]))
        .agent(agent("Data Analyst").with_tools(["search"]).max_iterations(1))
        .agent(agent("Real Estate Broker"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst").named("analysis").async_execution(true))
        .task(TaskSpec::new("Deals", "Deals", "Real Estate Broker").named("deals").async_execution(true))
        .build()
        .unwrap();

    let output = crew.run(CancellationToken::new()).await;
    assert_eq!(
        output.task("analysis").unwrap().status,
        TaskStatus::Failed(FailureReason::IterationLimitExceeded { limit: 1 })
    );
    assert_eq!(output.task("deals").unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn manager_reports_on_failed_declared_context() {
    let llm = ScriptedLlm::new()
        .script("Data Analyst", ["Action: search\nAction Input: rents"])
        .script("Project Manager", [Reply::Echo])
        .shared();

    let crew = crew_with(llm, tools(vec![StaticTool::new("search", "rents are flat")]))
        .process(Process::Hierarchical)
        .agent(agent("Project Manager").allow_delegation(true))
        .agent(agent("Data Analyst").with_tools(["search"]).max_iterations(1))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst").named("analysis").async_execution(true))
        .task(TaskSpec::new("Summarize", "Strategy", "Project Manager").named("summary").with_context(["analysis"]))
        .build()
        .unwrap();

    let output = tokio::time::timeout(RUN_TIMEOUT, crew.run(CancellationToken::new())).await.unwrap();
    assert_eq!(
        output.task("analysis").unwrap().status,
        TaskStatus::Failed(FailureReason::IterationLimitExceeded { limit: 1 })
    );
    let summary = output.task("summary").unwrap();
    assert_eq!(summary.status, TaskStatus::Completed);
    assert!(summary.raw.contains("[This task failed and produced no result"));
    assert_eq!(output.result().unwrap(), summary.raw);
}

#[tokio::test]
async fn failed_completion_dependency_cascades() {
    let llm = ScriptedLlm::new()
        .script("Data Analyst", [Reply::Fail("backend down".to_string())])
        .script("Project Manager", [Reply::Echo])
        .shared();

    let crew = crew_with(llm, tools(vec![]))
        .agent(agent("Data Analyst").max_iterations(1))
        .agent(agent("Real Estate Broker"))
        .agent(agent("Project Manager"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst").named("analysis").async_execution(true))
        .task(TaskSpec::new("Deals", "Deals", "Real Estate Broker").named("deals").async_execution(true).with_context(["analysis"]))
        .task(TaskSpec::new("Summarize", "Strategy", "Project Manager").named("summary"))
        .build()
        .unwrap();

    let output = tokio::time::timeout(RUN_TIMEOUT, crew.run(CancellationToken::new())).await.unwrap();
    let analysis = output.task("analysis").unwrap();
    assert!(matches!(analysis.status, TaskStatus::Failed(FailureReason::Completion(_))));

    let deals = output.task("deals").unwrap();
    assert_eq!(
        deals.status,
        TaskStatus::Failed(FailureReason::DependencyFailed {
            task: "analysis".to_string()
        })
    );
    assert!(deals.started_at.is_none());
    assert_eq!(deals.iterations, 0);

    let summary = output.task("summary").unwrap();
    assert_eq!(summary.status, TaskStatus::Completed);
    assert!(summary.raw.contains("[This task failed and produced no result"));
}

#[tokio::test]
async fn cancellation_fails_every_unfinished_task() {
    let llm = ScriptedLlm::new()
        .delay("Data Analyst", Duration::from_secs(30))
        .shared();

    let crew = crew_with(llm, tools(vec![]))
        .agent(agent("Data Analyst"))
        .agent(agent("Real Estate Broker"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst").named("analysis"))
        .task(TaskSpec::new("Deals", "Deals", "Real Estate Broker").named("deals"))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let output = tokio::time::timeout(RUN_TIMEOUT, crew.run(cancel)).await.unwrap();
    for task in &output.tasks {
        assert_eq!(task.status, TaskStatus::Failed(FailureReason::Cancelled));
    }
    assert!(output.task("analysis").unwrap().started_at.is_some());
    assert!(output.task("deals").unwrap().started_at.is_none());
    assert!(matches!(output.result(), Err(CrewError::Cancelled)));
}

#[tokio::test]
async fn panicking_task_is_aborted() {
    let llm = ScriptedLlm::new()
        .script("Data Analyst", [Reply::Panic])
        .shared();

    let crew = crew_with(llm, tools(vec![]))
        .agent(agent("Data Analyst"))
        .agent(agent("Real Estate Broker"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst").named("analysis").async_execution(true))
        .task(TaskSpec::new("Deals", "Deals", "Real Estate Broker").named("deals").async_execution(true))
        .build()
        .unwrap();

    let output = crew.run(CancellationToken::new()).await;
    assert_eq!(
        output.task("analysis").unwrap().status,
        TaskStatus::Failed(FailureReason::Aborted("scripted panic".to_string()))
    );
    assert_eq!(output.task("deals").unwrap().status, TaskStatus::Completed);
    assert_eq!(output.result().unwrap(), "done");
}

#[tokio::test]
async fn transient_completion_error_consumes_an_iteration() {
    let llm = ScriptedLlm::new()
        .script("Data Analyst", [Reply::Fail("busy".to_string()), Reply::from("Final Answer: recovered")])
        .shared();

    let crew = crew_with(llm, tools(vec![]))
        .agent(agent("Data Analyst"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst"))
        .build()
        .unwrap();

    let output = crew.run(CancellationToken::new()).await;
    assert_eq!(output.tasks[0].status, TaskStatus::Completed);
    assert_eq!(output.tasks[0].iterations, 2);
    assert_eq!(output.tasks[0].raw, "recovered");
}

#[tokio::test]
async fn disallowed_tool_is_reported_to_the_agent() {
    let llm = ScriptedLlm::new()
        .script("Data Analyst", [Reply::from("Action: search\nAction Input: rents"), Reply::Echo])
        .shared();

    let crew = crew_with(llm, tools(vec![StaticTool::new("search", "rents are flat")]))
        .agent(agent("Data Analyst"))
        .task(TaskSpec::new("Analyze", "Trends", "Data Analyst"))
        .build()
        .unwrap();

    let output = crew.run(CancellationToken::new()).await;
    let task = &output.tasks[0];
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.tool_calls.is_empty());
    assert!(task.raw.contains("Tool 'search' is not available to you"));
}
