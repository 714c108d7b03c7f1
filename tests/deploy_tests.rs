// DeploymentRunner state machine tests against real /bin/sh commands

use chrono::Utc;
use fleetmon::config::{DeployConfig, ServiceSpec};
use fleetmon::deploy::{DeployError, DeploymentRunner};
use fleetmon::models::{DeployStatus, ServiceStatus};
use fleetmon::registry::ServiceRegistry;
use std::sync::Arc;

fn fleet() -> Vec<ServiceSpec> {
    vec![
        ServiceSpec {
            id: 1,
            name: "Frontend".into(),
            version: "v1.2.0".into(),
        },
        ServiceSpec {
            id: 2,
            name: "Backend".into(),
            version: "v3.4.1".into(),
        },
    ]
}

fn runner_with(command: &str, timeout_secs: u64) -> (Arc<ServiceRegistry>, DeploymentRunner) {
    let registry = Arc::new(ServiceRegistry::new(&fleet(), Utc::now()));
    let config = DeployConfig {
        command: command.into(),
        timeout_secs,
        stderr_excerpt_max: 1024,
    };
    let runner = DeploymentRunner::new(config, registry.clone());
    (registry, runner)
}

#[tokio::test]
async fn successful_run_marks_running_and_advances_last_deploy() {
    let (registry, runner) = runner_with("true", 30);
    let before = registry.last_deploy().await.unwrap();

    runner.trigger().await.unwrap();
    runner.wait_idle().await;

    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Succeeded);
    assert_eq!(run.exit_code, Some(0));
    assert!(run.stderr_excerpt.is_none());
    assert!(run.completed_at.is_some());

    let services = registry.list().await;
    assert!(services.iter().all(|s| s.status == ServiceStatus::Running));
    assert!(
        registry.last_deploy().await.unwrap() > before,
        "success must advance last_deploy_at"
    );
}

#[tokio::test]
async fn failed_run_marks_stopped_and_keeps_last_deploy() {
    let (registry, runner) = runner_with("echo boom >&2; exit 3", 30);
    let before = registry.last_deploy().await.unwrap();

    runner.trigger().await.unwrap();
    runner.wait_idle().await;

    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Failed);
    assert_eq!(run.exit_code, Some(3));
    let excerpt = run.stderr_excerpt.expect("stderr retained on failure");
    assert!(excerpt.contains("boom"));

    let services = registry.list().await;
    assert!(services.iter().all(|s| s.status == ServiceStatus::Stopped));
    assert_eq!(
        registry.last_deploy().await.unwrap(),
        before,
        "failure must not advance last_deploy_at"
    );
}

#[tokio::test]
async fn missing_command_fails_with_shell_exit_code() {
    let (_registry, runner) = runner_with("this-command-does-not-exist-0xfleet", 30);
    runner.trigger().await.unwrap();
    runner.wait_idle().await;

    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Failed);
    assert_eq!(run.exit_code, Some(127));
}

#[tokio::test]
async fn retrigger_while_running_is_rejected_and_original_unaffected() {
    let (registry, runner) = runner_with("sleep 1", 30);
    runner.trigger().await.unwrap();

    let rejected = runner.trigger().await;
    assert!(matches!(rejected, Err(DeployError::AlreadyInProgress)));

    // Original run keeps going: still in flight, fleet mid-deploy.
    assert!(runner.is_running().await);
    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Running);
    assert!(run.completed_at.is_none());
    assert!(
        registry
            .list()
            .await
            .iter()
            .all(|s| s.status == ServiceStatus::Deploying)
    );

    runner.wait_idle().await;
    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Succeeded);

    // Terminal state: a new trigger is accepted again.
    runner.trigger().await.unwrap();
    runner.wait_idle().await;
}

#[tokio::test]
async fn hung_command_is_killed_and_marked_failed() {
    let (registry, runner) = runner_with("sleep 30", 1);
    let started = std::time::Instant::now();

    runner.trigger().await.unwrap();
    runner.wait_idle().await;

    assert!(
        started.elapsed() < std::time::Duration::from_secs(10),
        "timeout must not wait out the full command"
    );
    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Failed);
    assert!(run.exit_code.is_none());
    assert!(
        run.stderr_excerpt
            .expect("timeout reason retained")
            .contains("timed out")
    );
    assert!(!runner.is_running().await, "runner must be idle again");
    assert!(
        registry
            .list()
            .await
            .iter()
            .all(|s| s.status == ServiceStatus::Stopped)
    );
}

#[tokio::test]
async fn stderr_excerpt_is_bounded() {
    let registry = Arc::new(ServiceRegistry::new(&fleet(), Utc::now()));
    let config = DeployConfig {
        command: "for i in 1 2 3 4 5 6 7 8 9 10; do echo aaaaaaaaaaaaaaaa >&2; done; exit 1".into(),
        timeout_secs: 30,
        stderr_excerpt_max: 16,
    };
    let runner = DeploymentRunner::new(config, registry);

    runner.trigger().await.unwrap();
    runner.wait_idle().await;

    let run = runner.last_run().await.expect("run record");
    assert_eq!(run.status, DeployStatus::Failed);
    let excerpt = run.stderr_excerpt.expect("excerpt");
    assert!(
        excerpt.len() <= 16,
        "excerpt must stay within the configured bound, got {} bytes",
        excerpt.len()
    );
}

#[tokio::test]
async fn trigger_returns_before_command_completes() {
    let (_registry, runner) = runner_with("sleep 2", 30);
    let started = std::time::Instant::now();
    runner.trigger().await.unwrap();
    assert!(
        started.elapsed() < std::time::Duration::from_millis(500),
        "trigger must not wait on the deploy command"
    );
    runner.wait_idle().await;
}
