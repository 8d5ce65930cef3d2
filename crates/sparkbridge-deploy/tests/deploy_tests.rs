//! Integration tests for the upload backends against a stub storage
//! server.

use std::path::PathBuf;

use assert_matches::assert_matches;
use mockito::Matcher;
use sparkbridge_core::auth::HttpCredential;
use sparkbridge_core::error::SparkError;
use sparkbridge_deploy::{AdlsGen2Deploy, BlobDeploy, Deployable, SessionDeploy, WebhdfsDeploy};

/// Write a throwaway artifact file and return its path.
async fn temp_artifact() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sparkbridge-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("app.jar");
    tokio::fs::write(&path, b"artifact-bytes").await.unwrap();
    path
}

#[tokio::test]
async fn webhdfs_deploy_follows_the_create_redirect() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    let mkdirs = server
        .mock("PUT", Matcher::Regex(r"^/webhdfs/v1/staging/SparkSubmission/.+$".into()))
        .match_query(Matcher::UrlEncoded("op".into(), "MKDIRS".into()))
        .with_status(200)
        .with_body(r#"{"boolean": true}"#)
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("PUT", Matcher::Regex(r"^/webhdfs/v1/staging/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("op".into(), "CREATE".into()))
        .with_status(307)
        .with_header("location", &format!("{}/datanode/app.jar", server.url()))
        .expect(1)
        .create_async()
        .await;
    let datanode = server
        .mock("PUT", "/datanode/app.jar")
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let deploy = WebhdfsDeploy::new(
        format!("{}/webhdfs/v1", server.url()),
        "staging",
        HttpCredential::Anonymous,
    )
    .unwrap();

    let uri = deploy.deploy(&artifact).await.unwrap();

    assert!(uri.starts_with(&format!("{}/webhdfs/v1/staging/SparkSubmission/", server.url())));
    assert!(uri.ends_with("/app.jar"));
    mkdirs.assert_async().await;
    create.assert_async().await;
    datanode.assert_async().await;
}

#[tokio::test]
async fn webhdfs_deploy_fails_without_a_redirect_location() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    server
        .mock("PUT", Matcher::Regex(r"^/webhdfs/v1/SparkSubmission/.+$".into()))
        .match_query(Matcher::UrlEncoded("op".into(), "MKDIRS".into()))
        .with_status(200)
        .create_async()
        .await;
    server
        .mock("PUT", Matcher::Regex(r"^/webhdfs/v1/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("op".into(), "CREATE".into()))
        .with_status(307)
        // No Location header.
        .create_async()
        .await;
    let datanode = server
        .mock("PUT", "/datanode/app.jar")
        .expect(0)
        .create_async()
        .await;

    let deploy =
        WebhdfsDeploy::new(format!("{}/webhdfs/v1", server.url()), "", HttpCredential::Anonymous)
            .unwrap();

    let err = deploy.deploy(&artifact).await.unwrap_err();

    assert_matches!(err, SparkError::UnexpectedResponse(_));
    // The final PUT is never attempted.
    datanode.assert_async().await;
}

#[tokio::test]
async fn webhdfs_deploy_fails_fast_when_mkdirs_fails() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    server
        .mock("PUT", Matcher::Regex(r"^/webhdfs/v1/SparkSubmission/.+$".into()))
        .match_query(Matcher::UrlEncoded("op".into(), "MKDIRS".into()))
        .with_status(500)
        .with_body("name node on fire")
        .create_async()
        .await;
    let create = server
        .mock("PUT", Matcher::Regex(r".*".into()))
        .match_query(Matcher::UrlEncoded("op".into(), "CREATE".into()))
        .expect(0)
        .create_async()
        .await;

    let deploy =
        WebhdfsDeploy::new(format!("{}/webhdfs/v1", server.url()), "", HttpCredential::Anonymous)
            .unwrap();

    let err = deploy.deploy(&artifact).await.unwrap_err();

    assert_matches!(err, SparkError::Protocol { status: 500, .. });
    create.assert_async().await;
}

#[tokio::test]
async fn adls_gen2_deploy_runs_all_four_steps() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    let directory = server
        .mock("PUT", Matcher::Regex(r"^/fs/staging/SparkSubmission/.+$".into()))
        .match_query(Matcher::UrlEncoded("resource".into(), "directory".into()))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let file = server
        .mock("PUT", Matcher::Regex(r"^/fs/staging/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("resource".into(), "file".into()))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let append = server
        .mock("PATCH", Matcher::Regex(r"^/fs/staging/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("action".into(), "append".into()))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;
    let flush = server
        .mock("PATCH", Matcher::Regex(r"^/fs/staging/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("action".into(), "flush".into()),
            Matcher::UrlEncoded("position".into(), "14".into()),
        ]))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let deploy = AdlsGen2Deploy::new(server.url(), "fs", "staging", HttpCredential::Anonymous);
    let uri = deploy.deploy(&artifact).await.unwrap();

    assert!(uri.starts_with("abfs://fs@"));
    assert!(uri.ends_with("/app.jar"));
    directory.assert_async().await;
    file.assert_async().await;
    append.assert_async().await;
    flush.assert_async().await;
}

#[tokio::test]
async fn adls_gen2_deploy_tolerates_an_existing_directory() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    server
        .mock("PUT", Matcher::Regex(r"^/fs/SparkSubmission/.+$".into()))
        .match_query(Matcher::UrlEncoded("resource".into(), "directory".into()))
        .with_status(409)
        .with_body(r#"{"error": {"code": "PathAlreadyExists"}}"#)
        .create_async()
        .await;
    server
        .mock("PUT", Matcher::Regex(r"^/fs/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("resource".into(), "file".into()))
        .with_status(201)
        .create_async()
        .await;
    server
        .mock("PATCH", Matcher::Regex(r"^/fs/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("action".into(), "append".into()))
        .with_status(202)
        .create_async()
        .await;
    server
        .mock("PATCH", Matcher::Regex(r"^/fs/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("action".into(), "flush".into()))
        .with_status(200)
        .create_async()
        .await;

    let deploy = AdlsGen2Deploy::new(server.url(), "fs", "", HttpCredential::Anonymous);
    assert!(deploy.deploy(&artifact).await.is_ok());
}

#[tokio::test]
async fn adls_gen2_forbidden_directory_is_a_configuration_error() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    server
        .mock("PUT", Matcher::Regex(r"^/fs/SparkSubmission/.+$".into()))
        .match_query(Matcher::UrlEncoded("resource".into(), "directory".into()))
        .with_status(403)
        .create_async()
        .await;
    let file = server
        .mock("PUT", Matcher::Regex(r"^/fs/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("resource".into(), "file".into()))
        .expect(0)
        .create_async()
        .await;

    let deploy = AdlsGen2Deploy::new(server.url(), "fs", "", HttpCredential::Anonymous);
    let err = deploy.deploy(&artifact).await.unwrap_err();

    assert_matches!(err, SparkError::Configuration(_));
    file.assert_async().await;
}

#[tokio::test]
async fn blob_deploy_puts_a_block_blob() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    let put = server
        .mock("PUT", Matcher::Regex(r"^/jobs/SparkSubmission/.+/app\.jar$".into()))
        .match_query(Matcher::UrlEncoded("sv".into(), "2021-08-06".into()))
        .match_header("x-ms-blob-type", "BlockBlob")
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let deploy = BlobDeploy::new(server.url(), "jobs", "sv=2021-08-06");
    let uri = deploy.deploy(&artifact).await.unwrap();

    assert!(uri.starts_with("wasbs://jobs@"));
    assert!(uri.ends_with("/app.jar"));
    put.assert_async().await;
}

#[tokio::test]
async fn session_deploy_returns_the_session_local_name() {
    let mut server = mockito::Server::new_async().await;
    let artifact = temp_artifact().await;

    let upload = server
        .mock("POST", "/livy/sessions/7/upload-file")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let deploy = SessionDeploy::new(format!("{}/livy", server.url()), 7, HttpCredential::Anonymous);
    let name = deploy.deploy(&artifact).await.unwrap();

    assert_eq!(name, "app.jar");
    upload.assert_async().await;
}
