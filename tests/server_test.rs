mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{invoice_header, sample_rows, template_bytes, xlsx_bytes};
use invoicr::{
    configuration::ServerConfiguration,
    server::{router, AppState},
};
use std::io::Cursor;
use tempfile::TempDir;
use tower::ServiceExt as _;

const BOUNDARY: &str = "invoicr-test-boundary";

/// One part of a multipart body, with an optional file name.
struct Part<'a> {
    name: &'a str,
    file_name: Option<&'a str>,
    contents: Vec<u8>,
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend(format!("--{}\r\n", BOUNDARY).into_bytes());
        match part.file_name {
            Some(file_name) => body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, file_name
                )
                .into_bytes(),
            ),
            None => body.extend(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).into_bytes(),
            ),
        }
        body.extend(&part.contents);
        body.extend(b"\r\n");
    }
    body.extend(format!("--{}--\r\n", BOUNDARY).into_bytes());
    body
}

fn generate_request(parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn spreadsheet_part(rows: usize) -> Part<'static> {
    Part {
        name: "excel_file",
        file_name: Some("invoices.xlsx"),
        contents: xlsx_bytes(&invoice_header(), &sample_rows(rows)),
    }
}

fn template_part() -> Part<'static> {
    Part {
        name: "template_file",
        file_name: Some("template.pdf"),
        contents: template_bytes(),
    }
}

/// A router whose staging directories are created under a root the test can inspect.
fn test_router(maximum_upload_bytes: usize) -> (Router, TempDir) {
    let staging_root = tempfile::tempdir().unwrap();
    let configuration = ServerConfiguration {
        staging_directory: Some(staging_root.path().to_path_buf()),
        maximum_upload_bytes,
        ..ServerConfiguration::default()
    };
    (router(AppState::new(configuration)), staging_root)
}

async fn error_of(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["error"].as_str().unwrap().to_string()
}

fn staged_entries(staging_root: &TempDir) -> usize {
    std::fs::read_dir(staging_root.path()).unwrap().count()
}

#[tokio::test]
async fn serves_the_upload_form() {
    let (router, _staging_root) = test_router(1024);
    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8_lossy(&body);
    assert!(html.contains("name=\"excel_file\""));
    assert!(html.contains("name=\"template_file\""));
}

#[tokio::test]
async fn rejects_requests_without_files() {
    let (router, staging_root) = test_router(1024 * 1024);
    let response = router
        .oneshot(generate_request(&[Part {
            name: "comment",
            file_name: None,
            contents: b"no files".to_vec(),
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_of(response).await,
        "Both Excel and Template files are required"
    );
    assert_eq!(staged_entries(&staging_root), 0);
}

#[tokio::test]
async fn rejects_requests_that_are_not_multipart() {
    let (router, _staging_root) = test_router(1024 * 1024);
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_of(response).await,
        "Both Excel and Template files are required"
    );
}

#[tokio::test]
async fn rejects_requests_with_a_single_file() {
    let (router, staging_root) = test_router(1024 * 1024);
    let response = router
        .oneshot(generate_request(&[spreadsheet_part(3)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_of(response).await,
        "Both Excel and Template files are required"
    );
    assert_eq!(staged_entries(&staging_root), 0);
}

#[tokio::test]
async fn rejects_files_without_a_name() {
    let (router, _staging_root) = test_router(1024 * 1024);
    let unnamed_template = Part {
        file_name: Some(""),
        ..template_part()
    };
    let response = router
        .oneshot(generate_request(&[spreadsheet_part(1), unnamed_template]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "No file selected");
}

#[tokio::test]
async fn rejects_empty_files() {
    let (router, _staging_root) = test_router(1024 * 1024);
    let empty_template = Part {
        contents: Vec::new(),
        ..template_part()
    };
    let response = router
        .oneshot(generate_request(&[spreadsheet_part(1), empty_template]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn returns_an_archive_with_one_invoice_per_row() {
    let (router, staging_root) = test_router(1024 * 1024);
    let response = router
        .oneshot(generate_request(&[spreadsheet_part(3), template_part()]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/zip"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"invoices_"));
    assert!(disposition.ends_with(".zip\""));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(body.to_vec())).unwrap();
    assert_eq!(archive.len(), 3);
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "Invoice_INV-2024-001.pdf",
            "Invoice_INV-2024-002.pdf",
            "Invoice_INV-2024-003.pdf"
        ]
    );
    let mut invoice = Vec::new();
    std::io::copy(
        &mut archive.by_name("Invoice_INV-2024-002.pdf").unwrap(),
        &mut invoice,
    )
    .unwrap();
    let document = lopdf::Document::load_mem(&invoice).unwrap();
    assert_eq!(document.get_pages().len(), 1);

    assert_eq!(staged_entries(&staging_root), 0);
}

#[tokio::test]
async fn reports_processing_failures() {
    let (router, staging_root) = test_router(1024 * 1024);
    let broken_template = Part {
        contents: b"this is not a pdf".to_vec(),
        ..template_part()
    };
    let response = router
        .oneshot(generate_request(&[spreadsheet_part(2), broken_template]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_of(response)
        .await
        .starts_with("Failed to load the template"));
    assert_eq!(staged_entries(&staging_root), 0);
}

#[tokio::test]
async fn rejects_uploads_over_the_limit() {
    let (router, staging_root) = test_router(256);
    let response = router
        .oneshot(generate_request(&[spreadsheet_part(3), template_part()]))
        .await
        .unwrap();

    assert!(response.status().is_client_error(), "{}", response.status());
    assert_eq!(staged_entries(&staging_root), 0);
}
