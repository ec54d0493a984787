mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;
use helpers::clamd::{closed_port, fake_clamd};
use helpers::{api_path, png_bytes, setup_test_app, setup_test_app_with, TestOptions};
use serde_json::Value;

fn upload_form(subject_id: &str, file_name: &str, mime: &str, data: Vec<u8>) -> MultipartForm {
    let part = Part::bytes(Bytes::from(data))
        .file_name(file_name.to_string())
        .mime_type(mime.to_string());
    MultipartForm::new()
        .add_text("subjectId", subject_id.to_string())
        .add_text("fieldName", "id_card")
        .add_part("file", part)
}

#[tokio::test]
async fn test_upload_stores_under_detected_extension() {
    let app = setup_test_app().await;

    // 2 MB PNG declared as a PDF
    let form = upload_form("42", "scan.pdf", "application/pdf", png_bytes(2 * 1024 * 1024));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "42_scan.png");
    assert_eq!(body["size"], 2 * 1024 * 1024);
    assert!(body.get("error").is_none());

    let stored = app.storage_root().join("42_scan.png");
    assert_eq!(std::fs::metadata(&stored).unwrap().len(), 2 * 1024 * 1024);
    assert_eq!(app.stored_files(), vec!["42_scan.png".to_string()]);
    assert!(app.staged_files().is_empty());
    assert_eq!(app.audit_events(), vec!["upload_accepted".to_string()]);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_content() {
    let app = setup_test_app().await;

    let form = upload_form(
        "7",
        "photo.jpg",
        "image/jpeg",
        b"<?php system($_GET['c']); ?>".to_vec(),
    );
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "File type not allowed");
    assert!(body.get("filename").is_none());

    assert!(app.stored_files().is_empty());
    assert!(app.staged_files().is_empty());
    assert_eq!(app.audit_events(), vec!["upload_rejected".to_string()]);
}

#[tokio::test]
async fn test_upload_rejects_unsafe_names() {
    let app = setup_test_app().await;

    for name in ["evil.php.png", "../../etc/x y.png", "spaced name.png", ".png"] {
        let form = upload_form("7", name, "image/png", png_bytes(64));
        let response = app
            .client()
            .post(&api_path("/uploads"))
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), 400, "name {:?}", name);
        let body: Value = response.json();
        assert_eq!(body["error"], "Invalid file name");
    }

    // Directory components are stripped, not rejected
    let form = upload_form("7", "C:\\Users\\me\\passport.png", "image/png", png_bytes(64));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 201);
    assert_eq!(app.stored_files(), vec!["7_passport.png".to_string()]);
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = setup_test_app_with(TestOptions {
        max_upload_size_bytes: 1024 * 1024,
        ..TestOptions::default()
    })
    .await;

    let form = upload_form("3", "big.png", "image/png", png_bytes(1024 * 1024 + 1));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(app.stored_files().is_empty());
    assert!(app.staged_files().is_empty());
}

#[tokio::test]
async fn test_upload_requires_subject_and_file() {
    let app = setup_test_app().await;

    for subject in ["0", "-5", "abc"] {
        let form = upload_form(subject, "a.png", "image/png", png_bytes(64));
        let response = app
            .client()
            .post(&api_path("/uploads"))
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), 400, "subject {:?}", subject);
    }

    let form = MultipartForm::new().add_text("subjectId", "5");
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "No file provided");

    let form = upload_form("5", "empty.png", "image/png", Vec::new());
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 400);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_scanner_down_soft_mode_accepts() {
    let app = setup_test_app_with(TestOptions {
        clamav: Some((closed_port(), false)),
        ..TestOptions::default()
    })
    .await;

    let form = upload_form("9", "receipt.png", "image/png", png_bytes(4096));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    assert_eq!(app.stored_files(), vec!["9_receipt.png".to_string()]);
    assert_eq!(
        app.audit_events(),
        vec!["scan_unavailable".to_string(), "upload_accepted".to_string()]
    );
}

#[tokio::test]
async fn test_scanner_down_strict_mode_rejects() {
    let app = setup_test_app_with(TestOptions {
        clamav: Some((closed_port(), true)),
        ..TestOptions::default()
    })
    .await;

    let form = upload_form("9", "receipt.png", "image/png", png_bytes(4096));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 503);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(app.stored_files().is_empty());
    assert!(app.staged_files().is_empty());
    assert_eq!(app.audit_events(), vec!["scan_unavailable".to_string()]);
}

#[tokio::test]
async fn test_infected_upload_rejected_without_signature() {
    let (port, daemon) = fake_clamd("stream: Eicar-Test-Signature FOUND", 1);
    let app = setup_test_app_with(TestOptions {
        clamav: Some((port, true)),
        ..TestOptions::default()
    })
    .await;

    let form = upload_form("11", "invoice.pdf", "application/pdf", helpers::pdf_bytes());
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 400);
    let text = response.text();
    assert!(!text.contains("Eicar"));
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "File rejected");

    assert_eq!(daemon.join().unwrap(), vec![helpers::pdf_bytes().len()]);
    assert!(app.stored_files().is_empty());
    assert!(app.staged_files().is_empty());
    assert_eq!(app.audit_events(), vec!["malware_detected".to_string()]);
}

#[tokio::test]
async fn test_clean_scan_stores_file() {
    let (port, daemon) = fake_clamd("stream: OK", 1);
    let app = setup_test_app_with(TestOptions {
        clamav: Some((port, true)),
        ..TestOptions::default()
    })
    .await;

    let form = upload_form("11", "invoice.pdf", "application/pdf", helpers::pdf_bytes());
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["filename"], "11_invoice.pdf");
    assert_eq!(daemon.join().unwrap().len(), 1);
    assert_eq!(app.stored_files(), vec!["11_invoice.pdf".to_string()]);
}

#[tokio::test]
async fn test_invalid_form_fields_are_audited() {
    let app = setup_test_app().await;

    let form = upload_form("abc", "a.png", "image/png", png_bytes(64));
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(app.audit_events(), vec!["upload_rejected".to_string()]);

    let part = Part::bytes(Bytes::from(png_bytes(64)))
        .file_name("a.png".to_string())
        .mime_type("image/png".to_string());
    let form = MultipartForm::new()
        .add_text("subjectId", "5")
        .add_text("fieldName", "../etc")
        .add_part("file", part);
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(
        app.audit_events(),
        vec!["upload_rejected".to_string(), "upload_rejected".to_string()]
    );
    assert!(app.stored_files().is_empty());
    assert!(app.staged_files().is_empty());
}

#[tokio::test]
async fn test_truncated_multipart_gets_generic_error() {
    let app = setup_test_app().await;

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        \u{89}PNG partial";
    let response = app
        .client()
        .post(&api_path("/uploads"))
        .content_type("multipart/form-data; boundary=XBOUNDARY")
        .bytes(Bytes::from(body))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Malformed multipart request");
    assert_eq!(app.audit_events(), vec!["upload_rejected".to_string()]);
    assert!(app.staged_files().is_empty());
}
