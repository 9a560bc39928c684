use super::*;
use crate::session::UploadSession;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::domain::SessionPhase;
use std::io::Write;
use tokio::{net::TcpListener, sync::Mutex};

const CONVERTED_CSV: &str = "Name,Names_Pronounced\nराम,rAma\n";

#[derive(Debug, Clone, Default)]
struct ReceivedUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    file_bytes: Vec<u8>,
    column: Option<String>,
}

#[derive(Clone, Default)]
struct ServiceState {
    uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
}

async fn handle_upload(State(state): State<ServiceState>, mut multipart: Multipart) -> Response {
    let mut upload = ReceivedUpload::default();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.file_bytes = field.bytes().await.expect("file bytes").to_vec();
            }
            Some("column") => {
                upload.column = Some(field.text().await.expect("column text"));
            }
            _ => {}
        }
    }

    let column = upload.column.clone().unwrap_or_default();
    let header = String::from_utf8_lossy(&upload.file_bytes)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    state.uploads.lock().await.push(upload);

    if !header.split(',').any(|name| name.trim() == column) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid column name" })),
        )
            .into_response();
    }
    Json(json!({
        "message": "File processed successfully",
        "download_url": "/download",
    }))
    .into_response()
}

async fn handle_download() -> &'static str {
    CONVERTED_CSV
}

async fn handle_malformed_upload() -> &'static str {
    "<p>server is running</p>"
}

async fn spawn_service(app: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn spawn_conversion_service() -> anyhow::Result<(String, ServiceState)> {
    let state = ServiceState::default();
    let app = Router::new()
        .route("/upload", post(handle_upload))
        .route("/download", get(handle_download))
        .with_state(state.clone());
    Ok((spawn_service(app).await?, state))
}

fn csv_file(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .prefix("names")
        .suffix(".csv")
        .tempfile()
        .expect("tempfile");
    tmp.write_all(content.as_bytes()).expect("write csv");
    tmp
}

#[test]
fn resolves_relative_download_url_against_base() {
    let reference =
        resolve_result_reference("https://api.example.com", "/files/42.csv").expect("resolve");
    assert_eq!(reference.as_str(), "https://api.example.com/files/42.csv");

    let reference =
        resolve_result_reference("https://api.example.com/", "files/42.csv").expect("resolve");
    assert_eq!(reference.as_str(), "https://api.example.com/files/42.csv");

    let reference =
        resolve_result_reference("http://127.0.0.1:5000", "/download").expect("resolve");
    assert_eq!(reference.to_string(), "http://127.0.0.1:5000/download");
}

#[test]
fn absolute_download_url_is_kept() {
    let reference = resolve_result_reference(
        "https://api.example.com",
        "https://cdn.example.com/out/42.csv",
    )
    .expect("resolve");
    assert_eq!(reference.as_str(), "https://cdn.example.com/out/42.csv");
}

#[test]
fn scheme_like_relative_paths_are_joined_to_base() {
    let reference =
        resolve_result_reference("https://api.example.com", "files:42").expect("resolve");
    assert_eq!(reference.as_str(), "https://api.example.com/files:42");

    let reference = resolve_result_reference("https://api.example.com", "localhost:5000/x")
        .expect("resolve");
    assert_eq!(reference.as_str(), "https://api.example.com/localhost:5000/x");
}

#[test]
fn unusable_download_url_is_a_transport_fault() {
    let err = resolve_result_reference("https://api.example.com", "  ").expect_err("empty");
    assert!(matches!(err, SessionError::TransportFault(_)));

    let err = resolve_result_reference("not a base", "/download").expect_err("bad base");
    assert!(err.to_string().contains("invalid download url"));
}

#[test]
fn suggests_processed_file_name() {
    let file = LocalFile::new("/home/user/names.csv");
    assert_eq!(download_file_name(Some(&file)), "processed-names.csv");
    assert_eq!(download_file_name(None), "processed-data.csv");
}

#[tokio::test]
async fn submit_posts_file_and_column_as_multipart() {
    let (base_url, state) = spawn_conversion_service().await.expect("spawn service");
    let tmp = csv_file("Name,Age\nराम,30\n");
    let file = LocalFile::new(tmp.path());

    let service = HttpConversionService::new(format!("{base_url}/"));
    let reference = service.submit(&file, "Name").await.expect("submit");

    assert_eq!(reference.as_str(), format!("{base_url}/download"));
    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_name.as_deref(), Some(file.name()));
    assert_eq!(uploads[0].content_type.as_deref(), Some("text/csv"));
    assert_eq!(uploads[0].file_bytes, "Name,Age\nराम,30\n".as_bytes());
    assert_eq!(uploads[0].column.as_deref(), Some("Name"));
}

#[tokio::test]
async fn rejected_upload_maps_to_service_rejected() {
    let (base_url, _) = spawn_conversion_service().await.expect("spawn service");
    let tmp = csv_file("Name,Age\n");

    let err = HttpConversionService::new(base_url)
        .submit(&LocalFile::new(tmp.path()), "City")
        .await
        .expect_err("should be rejected");
    assert_eq!(err, SessionError::ServiceRejected { status: 400 });
    assert_eq!(err.to_string(), "Failed to process CSV");
}

#[tokio::test]
async fn malformed_response_is_a_transport_fault() {
    let app = Router::new().route("/upload", post(handle_malformed_upload));
    let base_url = spawn_service(app).await.expect("spawn service");
    let tmp = csv_file("Name\n");

    let err = HttpConversionService::new(base_url)
        .submit(&LocalFile::new(tmp.path()), "Name")
        .await
        .expect_err("should fail");
    match err {
        SessionError::TransportFault(detail) => {
            assert!(detail.starts_with("malformed conversion service response"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_a_transport_fault() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let tmp = csv_file("Name\n");

    let err = HttpConversionService::new(format!("http://{addr}"))
        .submit(&LocalFile::new(tmp.path()), "Name")
        .await
        .expect_err("should fail");
    assert!(matches!(err, SessionError::TransportFault(_)));
    assert!(!err.to_string().is_empty());
}

#[tokio::test]
async fn missing_local_file_fails_before_any_request() {
    let (base_url, state) = spawn_conversion_service().await.expect("spawn service");
    let dir = tempfile::tempdir().expect("tempdir");

    let err = HttpConversionService::new(base_url)
        .submit(&LocalFile::new(dir.path().join("gone.csv")), "Name")
        .await
        .expect_err("should fail");
    assert!(matches!(err, SessionError::FileRead(_)));
    assert!(state.uploads.lock().await.is_empty());
}

#[tokio::test]
async fn download_fetches_converted_file() {
    let (base_url, _) = spawn_conversion_service().await.expect("spawn service");
    let service = HttpConversionService::new(&base_url);
    let reference = resolve_result_reference(service.base_url(), "/download").expect("resolve");

    let bytes = service.download(&reference).await.expect("download");
    assert_eq!(bytes, CONVERTED_CSV.as_bytes());

    let missing = resolve_result_reference(&base_url, "/files/absent.csv").expect("resolve");
    let err = service.download(&missing).await.expect_err("404");
    assert_eq!(err, SessionError::ServiceRejected { status: 404 });
}

#[tokio::test]
async fn session_converts_file_over_http() {
    let (base_url, state) = spawn_conversion_service().await.expect("spawn service");
    let tmp = csv_file("Name, Age ,City\nराम,30,Delhi\n");
    let file = LocalFile::new(tmp.path());
    let expected_name = format!("processed-{}", file.name());

    let mut session = UploadSession::new(
        Arc::new(HttpConversionService::new(&base_url)),
        Arc::new(FsFileSource),
    );
    session.select_file(Some(file));
    session.settle().await;
    assert_eq!(session.available_columns(), ["Name", "Age", "City"]);

    assert!(session.select_column("Age"));
    assert!(session.submit());
    session.settle().await;

    assert_eq!(session.phase(), SessionPhase::Completed);
    assert_eq!(
        session.result_reference().map(ResultReference::as_str),
        Some(format!("{base_url}/download").as_str())
    );
    assert_eq!(session.download_file_name(), expected_name);
    assert_eq!(
        state.uploads.lock().await[0].column.as_deref(),
        Some("Age")
    );
}
