mod helpers;

use helpers::{api_path, pdf_bytes, png_bytes, setup_test_app, setup_test_app_with, TestOptions};
use serde_json::Value;

fn store(app: &helpers::TestApp, name: &str, data: &[u8]) {
    std::fs::write(app.storage_root().join(name), data).unwrap();
}

#[tokio::test]
async fn test_download_stored_file() {
    let app = setup_test_app().await;
    let data = png_bytes(2048);
    store(&app, "42_scan.png", &data);

    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "42_scan.png")
        .add_header("X-Forwarded-For", "203.0.113.5")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type"), "image/png");
    assert_eq!(response.header("content-length"), "2048");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"42_scan.png\"; filename*=UTF-8''42_scan.png"
    );
    assert_eq!(response.header("cache-control"), "private, no-store");
    assert_eq!(response.header("x-ratelimit-limit"), "100");
    assert_eq!(response.header("x-ratelimit-remaining"), "99");
    assert_eq!(response.as_bytes().as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_download_inline_mode() {
    let app = setup_test_app().await;
    store(&app, "7_doc.pdf", &pdf_bytes());

    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "7_doc.pdf")
        .add_query_param("mode", "inline")
        .await;
    assert_eq!(response.status_code(), 200);
    assert!(response
        .header("content-disposition")
        .to_str()
        .unwrap()
        .starts_with("inline;"));

    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "7_doc.pdf")
        .add_query_param("mode", "sideways")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let app = setup_test_app().await;
    std::fs::write(app.storage_root().join("..").join("outside.png"), png_bytes(16)).unwrap();

    for mode in ["attachment", "inline"] {
        for name in ["../outside.png", "a/b.png", "..\\outside.png", "x..png"] {
            let response = app
                .client()
                .get(&api_path("/download"))
                .add_query_param("file", name)
                .add_query_param("mode", mode)
                .add_header("X-Forwarded-For", "198.51.100.9")
                .await;
            assert_eq!(response.status_code(), 400, "name {:?} mode {}", name, mode);
            let body: Value = response.json();
            assert_eq!(body["error"], "Invalid file name");
        }
    }

    let events = app.audit_events();
    assert_eq!(events.len(), 8);
    assert!(events.iter().all(|e| e == "path_traversal"));
}

#[tokio::test]
async fn test_download_disallowed_and_missing() {
    let app = setup_test_app().await;
    store(&app, "shell.php", b"<?php echo 1; ?>");

    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "shell.php")
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "absent.png")
        .await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["error"], "File not found");

    let response = app.client().get(&api_path("/download")).await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_download_rate_limited_per_client() {
    let app = setup_test_app_with(TestOptions {
        rate_limit_max_requests: 2,
        rate_limit_window_secs: 60,
        ..TestOptions::default()
    })
    .await;
    store(&app, "1_a.png", &png_bytes(32));

    let fetch = |ip: &'static str| {
        app.client()
            .get(&api_path("/download"))
            .add_query_param("file", "1_a.png")
            .add_header("X-Forwarded-For", ip)
    };

    assert_eq!(fetch("192.0.2.1").await.status_code(), 200);
    let second = fetch("192.0.2.1").await;
    assert_eq!(second.status_code(), 200);
    assert_eq!(second.header("x-ratelimit-remaining"), "0");

    let refused = fetch("192.0.2.1").await;
    assert_eq!(refused.status_code(), 429);
    assert_eq!(refused.header("retry-after"), "60");
    assert_eq!(refused.header("x-ratelimit-limit"), "2");
    assert_eq!(refused.header("x-ratelimit-remaining"), "0");
    let body: Value = refused.json();
    assert_eq!(body["error"], "Too many requests. Please slow down.");
    assert_eq!(body["code"], "RATE_LIMITED");

    // Another address has its own window
    assert_eq!(fetch("192.0.2.2").await.status_code(), 200);

    app.clock.advance(60);
    assert_eq!(fetch("192.0.2.1").await.status_code(), 200);

    assert!(app.audit_events().contains(&"rate_limited".to_string()));
}

#[tokio::test]
async fn test_forged_forwarding_headers_do_not_reset_window() {
    let app = setup_test_app_with(TestOptions {
        rate_limit_max_requests: 2,
        trusted_proxy_count: 0,
        ..TestOptions::default()
    })
    .await;
    store(&app, "1_a.png", &png_bytes(32));

    let mut statuses = Vec::new();
    for i in 0..6 {
        let response = app
            .client()
            .get(&api_path("/download"))
            .add_query_param("file", "1_a.png")
            .add_header("X-Forwarded-For", format!("203.0.113.{}", i))
            .add_header("X-Real-IP", format!("198.51.100.{}", i))
            .await;
        statuses.push(response.status_code().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 429, 429, 429, 429]);
}

#[tokio::test]
async fn test_rate_limit_counts_before_name_checks() {
    let app = setup_test_app_with(TestOptions {
        rate_limit_max_requests: 1,
        ..TestOptions::default()
    })
    .await;

    let first = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "missing.png")
        .add_header("X-Forwarded-For", "192.0.2.50")
        .await;
    assert_eq!(first.status_code(), 404);

    let second = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "../etc/passwd")
        .add_header("X-Forwarded-For", "192.0.2.50")
        .await;
    assert_eq!(second.status_code(), 429);
}

#[tokio::test]
async fn test_token_download() {
    let app = setup_test_app().await;
    std::fs::write(app.documents_dir().join("42.pdf"), pdf_bytes()).unwrap();

    let token = app.state.tokens.generate(42);
    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("token", &token)
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type"), "application/pdf");
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"42.pdf\"; filename*=UTF-8''42.pdf"
    );
    assert_eq!(response.as_bytes().as_ref(), pdf_bytes().as_slice());
    assert!(response.headers().get("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_token_rejections() {
    let app = setup_test_app().await;
    std::fs::write(app.documents_dir().join("42.pdf"), pdf_bytes()).unwrap();

    let mut tampered = app.state.tokens.generate(42);
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    for token in [tampered.as_str(), "garbage", ""] {
        let response = app
            .client()
            .get(&api_path("/download"))
            .add_query_param("token", token)
            .await;
        assert_eq!(response.status_code(), 403, "token {:?}", token);
        let body: Value = response.json();
        assert_eq!(body["error"], "Access denied");
    }

    let expiring = app.state.tokens.generate_with_lifetime(42, 30);
    app.clock.advance(30);
    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("token", &expiring)
        .await;
    assert_eq!(response.status_code(), 403);

    assert!(app.audit_events().iter().all(|e| e == "token_rejected"));
    assert_eq!(app.audit_events().len(), 4);
}

#[tokio::test]
async fn test_token_for_subject_without_document() {
    let app = setup_test_app().await;
    let token = app.state.tokens.generate(99);
    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_file_and_token_together_rejected() {
    let app = setup_test_app().await;
    store(&app, "1_a.png", &png_bytes(32));
    let token = app.state.tokens.generate(1);

    let response = app
        .client()
        .get(&api_path("/download"))
        .add_query_param("file", "1_a.png")
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_health_openapi_and_scanner_ping() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scanner"], "disabled");
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(response.header("x-content-type-options"), "nosniff");

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let doc: Value = response.json();
    assert!(doc["paths"]["/api/v0/download"].is_object());

    let response = app.client().get(&api_path("/scanner/ping")).await;
    let body: Value = response.json();
    assert_eq!(body["enabled"], false);
    assert_eq!(body["reachable"], false);
}
