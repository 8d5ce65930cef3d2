//! Integration tests for the gateway transport and job lifecycle
//! engine, driven against a stub HTTP gateway.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;
use mockito::Matcher;
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;
use sparkbridge_core::params::SparkSubmissionParameter;
use sparkbridge_core::retry::RetryPolicy;
use sparkbridge_gateway::job::{AggregationGate, DoneDetection};
use sparkbridge_gateway::{SparkBatchJob, SparkBatchJobState, SparkBatchSubmission, YarnClient};
use tokio_util::sync::CancellationToken;

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        retries_max: 3,
        delay: Duration::from_millis(1),
    }
}

fn job_for(server: &mockito::Server) -> SparkBatchJob {
    let transport = Arc::new(SparkBatchSubmission::new(
        format!("{}/livy", server.url()),
        HttpCredential::Anonymous,
    ));
    let yarn = YarnClient::new(Arc::clone(&transport), format!("{}/yarnui", server.url()));
    let parameter = SparkSubmissionParameter::new("c1", "wasbs://jobs@acct/app.jar", "Main")
        .with_args(vec!["--x".into()]);
    SparkBatchJob::new(transport, yarn, parameter).with_retry_policy(fast_policy())
}

async fn created_job(server: &mut mockito::Server) -> SparkBatchJob {
    let create = server
        .mock("POST", "/livy/batches")
        .with_status(201)
        .with_body(r#"{"id": 42, "state": "starting"}"#)
        .create_async()
        .await;

    let mut job = job_for(server);
    job.create_batch_job().await.expect("creation should succeed");
    create.assert_async().await;
    job
}

#[tokio::test]
async fn create_assigns_the_batch_id() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    assert_eq!(job.batch_id(), Some(42));
}

#[tokio::test]
async fn invalid_config_never_reaches_the_gateway() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = [("driverMemory".to_string(), serde_json::json!("four gigs"))]
        .into_iter()
        .collect();
    let parameter = SparkSubmissionParameter::new("c1", "wasbs://jobs@acct/app.jar", "Main")
        .with_job_config(config);
    let transport = Arc::new(SparkBatchSubmission::new(
        format!("{}/livy", server.url()),
        HttpCredential::Anonymous,
    ));
    let yarn = YarnClient::new(Arc::clone(&transport), format!("{}/yarnui", server.url()));
    let mut job = SparkBatchJob::new(transport, yarn, parameter);

    let err = job.create_batch_job().await.unwrap_err();

    assert_matches!(err, SparkError::Configuration(message) if message.contains("driverMemory"));
    assert_eq!(job.batch_id(), None);
    create.assert_async().await;
}

#[tokio::test]
async fn create_failure_is_fatal_and_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let create = server
        .mock("POST", "/livy/batches")
        .with_status(400)
        .with_body("bad request body")
        .expect(1)
        .create_async()
        .await;

    let mut job = job_for(&server);
    let err = job.create_batch_job().await.unwrap_err();

    assert_matches!(err, SparkError::Protocol { status: 400, .. });
    assert_eq!(job.batch_id(), None);
    create.assert_async().await;
}

#[tokio::test]
async fn get_state_returns_terminal_state_without_retrying() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    let status = server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "success", "appId": "app_1"}"#)
        .expect(2)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let first = job.get_state(&cancel).await.unwrap();
    let second = job.get_state(&cancel).await.unwrap();

    // Once terminal, subsequent polls observe the same terminal state.
    assert_eq!(first, SparkBatchJobState::Success);
    assert_eq!(second, SparkBatchJobState::Success);
    status.assert_async().await;
}

#[tokio::test]
async fn well_formed_error_response_fails_immediately() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    let status = server
        .mock("GET", "/livy/batches/42")
        .with_status(500)
        .with_body("internal failure")
        .expect(1)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let err = job.get_state(&cancel).await.unwrap_err();

    assert_matches!(err, SparkError::Protocol { status: 500, .. });
    status.assert_async().await;
}

#[tokio::test]
async fn create_transport_failure_surfaces_without_retry() {
    // Nothing listens on this port; the create attempt is a connect error.
    let transport = Arc::new(SparkBatchSubmission::new(
        "http://127.0.0.1:1/livy",
        HttpCredential::Anonymous,
    ));
    let yarn = YarnClient::new(Arc::clone(&transport), "http://127.0.0.1:1/yarnui");
    let parameter = SparkSubmissionParameter::new("c1", "app.jar", "Main");
    let mut job = SparkBatchJob::new(transport, yarn, parameter).with_retry_policy(RetryPolicy {
        retries_max: 2,
        delay: Duration::from_millis(1),
    });

    // Creation is not retried: the first transport error surfaces raw.
    assert_matches!(job.create_batch_job().await, Err(SparkError::Transport(_)));
}

#[tokio::test]
async fn missing_app_id_exhausts_the_retry_budget() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    // The gateway keeps answering without an appId assigned.
    let status = server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "starting"}"#)
        .expect(2)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let err = job
        .clone()
        .with_retry_policy(RetryPolicy {
            retries_max: 2,
            delay: Duration::from_millis(1),
        })
        .get_app_id(&cancel)
        .await
        .unwrap_err();

    assert_matches!(err, SparkError::RetriesExhausted { attempts: 2, .. });
    status.assert_async().await;
}

#[tokio::test]
async fn wait_done_gates_on_log_aggregation() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "success", "appId": "app_1"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/yarnui/ws/v1/cluster/apps/app_1")
        .with_status(200)
        .with_body(
            r#"{"app": {"state": "FINISHED", "finalStatus": "SUCCEEDED",
                        "logAggregationStatus": "SUCCEEDED",
                        "finishedTime": 1700000000000}}"#,
        )
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let detection = DoneDetection {
        poll_interval: Duration::from_millis(5),
        settle_delay: Duration::from_millis(5),
        gate: AggregationGate::RequireSucceeded,
    };

    let state = job.wait_done(detection, &cancel).await.unwrap();
    assert_eq!(state, SparkBatchJobState::Success);
}

#[tokio::test]
async fn wait_done_accept_terminal_unblocks_on_failed_aggregation() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "dead", "appId": "app_1"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/yarnui/ws/v1/cluster/apps/app_1")
        .with_status(200)
        .with_body(
            r#"{"app": {"state": "FAILED", "logAggregationStatus": "TIME_OUT",
                        "finishedTime": 1700000000000}}"#,
        )
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let detection = DoneDetection {
        poll_interval: Duration::from_millis(5),
        settle_delay: Duration::from_millis(5),
        gate: AggregationGate::AcceptTerminal,
    };

    let state = job.wait_done(detection, &cancel).await.unwrap();
    assert_eq!(state, SparkBatchJobState::Dead);
}

#[tokio::test]
async fn submission_log_streams_in_offset_order_then_terminates() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    server
        .mock("GET", "/livy/batches/42/log")
        .match_query(Matcher::UrlEncoded("from".into(), "0".into()))
        .with_status(200)
        .with_body(r#"{"id": 42, "from": 0, "total": 2, "log": ["line one", "line two"]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/livy/batches/42/log")
        .match_query(Matcher::UrlEncoded("from".into(), "2".into()))
        .with_status(200)
        .with_body(r#"{"id": 42, "from": 2, "total": 2, "log": []}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "success"}"#)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let stream = job.get_submission_log(cancel).unwrap();
    let lines: Vec<String> = stream
        .map(|item| item.expect("log line"))
        .collect()
        .await;

    assert_eq!(lines, vec!["line one".to_string(), "line two".to_string()]);
}

#[tokio::test]
async fn driver_host_resolves_from_the_yarn_application() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "running", "appId": "app_1"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/yarnui/ws/v1/cluster/apps/app_1")
        .with_status(200)
        .with_body(
            r#"{"app": {"state": "RUNNING", "amHostHttpAddress": "10.0.0.15:30060",
                        "finishedTime": 0}}"#,
        )
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let host = job.get_spark_driver_host(&cancel).await.unwrap();
    assert_eq!(host, "10.0.0.15");
}

#[tokio::test]
async fn driver_host_is_not_retrievable_for_a_finished_application() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    server
        .mock("GET", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"id": 42, "state": "success", "appId": "app_1"}"#)
        .create_async()
        .await;
    let yarn = server
        .mock("GET", "/yarnui/ws/v1/cluster/apps/app_1")
        .with_status(200)
        .with_body(
            r#"{"app": {"state": "FINISHED", "amHostHttpAddress": "10.0.0.15:30060",
                        "finishedTime": 1700000000000}}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let err = job.get_spark_driver_host(&cancel).await.unwrap_err();

    assert_matches!(err, SparkError::UnexpectedResponse(_));
    // Fatal, not retried.
    yarn.assert_async().await;
}

#[tokio::test]
async fn kill_tolerates_success_and_surfaces_stop_errors() {
    let mut server = mockito::Server::new_async().await;
    let job = created_job(&mut server).await;

    let delete_ok = server
        .mock("DELETE", "/livy/batches/42")
        .with_status(200)
        .with_body(r#"{"msg": "deleted"}"#)
        .expect(1)
        .create_async()
        .await;

    job.kill_batch_job().await.unwrap();
    delete_ok.assert_async().await;

    drop(delete_ok);
    let delete_gone = server
        .mock("DELETE", "/livy/batches/42")
        .with_status(404)
        .with_body("no such batch")
        .create_async()
        .await;

    let err = job.kill_batch_job().await.unwrap_err();
    assert_matches!(err, SparkError::Protocol { status: 404, .. });
    delete_gone.assert_async().await;
}

#[tokio::test]
async fn poll_before_create_is_a_caller_contract_violation() {
    let server = mockito::Server::new_async().await;
    let job = job_for(&server);

    let cancel = CancellationToken::new();
    assert_matches!(
        job.get_state(&cancel).await,
        Err(SparkError::Configuration(_))
    );
    assert_matches!(job.kill_batch_job().await, Err(SparkError::Configuration(_)));
}
