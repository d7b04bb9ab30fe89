//! Integration tests for the upload, finish, and delete endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestServer;
use serde_json::Value;
use stow_core::upload::UploadId;
use tower::ServiceExt;

const BOUNDARY: &str = "stow-test-boundary";

/// Build a multipart body with text fields and an optional qqfile part.
fn multipart_body(fields: &[(&str, String)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"qqfile\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn post_multipart(
    router: &axum::Router,
    uri: &str,
    fields: &[(&str, String)],
    file: Option<(&str, &[u8])>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields, file)))
        .unwrap();
    send(router, request).await
}

async fn post_form(router: &axum::Router, uri: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    send(router, request).await
}

/// Upload one part of a chunked upload.
async fn upload_part(
    server: &TestServer,
    id: &UploadId,
    filename: &str,
    index: u32,
    total: u32,
    total_size: u64,
    data: &[u8],
) -> (StatusCode, Value) {
    let fields = vec![
        ("qquuid", id.to_string()),
        ("qqfilename", filename.to_string()),
        ("qqpartindex", index.to_string()),
        ("qqtotalparts", total.to_string()),
        ("qqtotalfilesize", total_size.to_string()),
    ];
    post_multipart(&server.router, "/uploads", &fields, Some((filename, data))).await
}

async fn finish(
    server: &TestServer,
    id: &UploadId,
    filename: &str,
    total: u32,
) -> (StatusCode, Value) {
    post_form(
        &server.router,
        "/uploads/finish",
        format!("qquuid={id}&qqfilename={filename}&qqtotalparts={total}"),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&server.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("status").and_then(Value::as_str), Some("ok"));
}

#[tokio::test]
async fn test_chunked_upload_out_of_order() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    // Three 1000-byte parts arriving in order 2, 0, 1.
    for index in [2u32, 0, 1] {
        let data = vec![b'a' + index as u8; 1000];
        let (status, body) = upload_part(&server, &id, "report.pdf", index, 3, 3000, &data).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("success"), Some(&Value::Bool(true)));
    }

    let (status, body) = finish(&server, &id, "report.pdf", 3).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));

    // Content comes out in index order regardless of arrival order.
    let combined = server
        .state
        .storage
        .get(&format!("uploads/{id}/report.pdf"))
        .await
        .unwrap();
    assert_eq!(combined.len(), 3000);
    assert_eq!(&combined[..1000], &[b'a'; 1000][..]);
    assert_eq!(&combined[1000..2000], &[b'b'; 1000][..]);
    assert_eq!(&combined[2000..], &[b'c'; 1000][..]);
}

#[tokio::test]
async fn test_simple_upload() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    let fields = vec![
        ("qquuid", id.to_string()),
        ("qqfilename", "hello.txt".to_string()),
    ];
    let (status, body) = post_multipart(
        &server.router,
        "/uploads",
        &fields,
        Some(("hello.txt", b"hi")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));

    let stored = server
        .state
        .storage
        .get(&format!("uploads/{id}/hello.txt"))
        .await
        .unwrap();
    assert_eq!(&stored[..], b"hi");
}

#[tokio::test]
async fn test_done_query_combines_after_last_part() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    let (status, _) = upload_part(&server, &id, "file.bin", 0, 2, 20, &[b'x'; 10]).await;
    assert_eq!(status, StatusCode::OK);

    let fields = vec![
        ("qquuid", id.to_string()),
        ("qqfilename", "file.bin".to_string()),
        ("qqpartindex", "1".to_string()),
        ("qqtotalparts", "2".to_string()),
        ("qqtotalfilesize", "20".to_string()),
    ];
    let (status, body) = post_multipart(
        &server.router,
        "/uploads?done",
        &fields,
        Some(("file.bin", &[b'y'; 10])),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));
    assert!(
        server
            .state
            .storage
            .exists(&format!("uploads/{id}/file.bin"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_finish_with_missing_part_fails() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    upload_part(&server, &id, "file.bin", 0, 3, 30, &[b'x'; 10]).await;
    upload_part(&server, &id, "file.bin", 2, 3, 30, &[b'z'; 10]).await;

    let (status, body) = finish(&server, &id, "file.bin", 3).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.get("success"), Some(&Value::Bool(false)));
    let error = body.get("error").and_then(Value::as_str).unwrap();
    assert!(error.contains("missing part"), "error was: {error}");
    // A missing part is retryable; the client may send it and finish again.
    assert!(body.get("preventRetry").is_none());

    upload_part(&server, &id, "file.bin", 1, 3, 30, &[b'y'; 10]).await;
    let (status, _) = finish(&server, &id, "file.bin", 3).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_finish_with_absurd_part_count_rejected() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    // A hostile part count must be refused outright, not used to size any
    // bookkeeping. Zero is equally meaningless.
    for declared in [u32::MAX, 0] {
        let (status, body) = finish(&server, &id, "file.bin", declared).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "count: {declared}");
        assert_eq!(body.get("success"), Some(&Value::Bool(false)));
        assert!(body.get("preventRetry").is_none());
    }
}

#[tokio::test]
async fn test_finish_is_idempotent() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    upload_part(&server, &id, "file.bin", 0, 1, 10, &[b'x'; 10]).await;

    let (status, _) = finish(&server, &id, "file.bin", 1).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = finish(&server, &id, "file.bin", 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));

    let stored = server
        .state
        .storage
        .get(&format!("uploads/{id}/file.bin"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 10);
}

#[tokio::test]
async fn test_declared_size_over_limit_prevents_retry() {
    let server = TestServer::with_config(|config| {
        config.server.max_file_size = 1000;
    })
    .await;
    let id = UploadId::new();

    let (status, body) = upload_part(&server, &id, "big.bin", 0, 2, 5000, &[b'x'; 10]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.get("success"), Some(&Value::Bool(false)));
    assert_eq!(body.get("preventRetry"), Some(&Value::Bool(true)));

    // Nothing is kept around for an upload that can never be accepted.
    assert!(
        server
            .state
            .storage
            .list(&format!("chunks/{id}"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    upload_part(&server, &id, "file.bin", 0, 1, 10, &[b'x'; 10]).await;
    finish(&server, &id, "file.bin", 1).await;

    let delete_request = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/uploads/{id}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&server.router, delete_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));
    assert!(
        !server
            .state
            .storage
            .exists(&format!("uploads/{id}/file.bin"))
            .await
            .unwrap()
    );

    // Deleting again, after everything is already gone, still succeeds.
    let (status, body) = send(&server.router, delete_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_post_method_override_delete() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    upload_part(&server, &id, "file.bin", 0, 1, 10, &[b'x'; 10]).await;
    finish(&server, &id, "file.bin", 1).await;

    let (status, body) = post_form(
        &server.router,
        &format!("/uploads/{id}"),
        "_method=DELETE".to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_post_without_delete_override_is_rejected() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    for body in ["_method=PATCH", ""] {
        let (status, _) = post_form(
            &server.router,
            &format!("/uploads/{id}"),
            body.to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "body: {body:?}");
    }
}

#[tokio::test]
async fn test_invalid_upload_id_rejected() {
    let server = TestServer::new().await;

    let fields = vec![
        ("qquuid", "not-a-uuid".to_string()),
        ("qqfilename", "file.bin".to_string()),
    ];
    let (status, body) = post_multipart(
        &server.router,
        "/uploads",
        &fields,
        Some(("file.bin", b"data")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.get("success"), Some(&Value::Bool(false)));
}

#[tokio::test]
async fn test_upload_without_file_rejected() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    let fields = vec![
        ("qquuid", id.to_string()),
        ("qqfilename", "file.bin".to_string()),
    ];
    let (status, _) = post_multipart(&server.router, "/uploads", &fields, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_filename_is_sanitized_to_basename() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    let fields = vec![
        ("qquuid", id.to_string()),
        ("qqfilename", "../../etc/passwd".to_string()),
    ];
    let (status, _) = post_multipart(
        &server.router,
        "/uploads",
        &fields,
        Some(("x", b"data")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        server
            .state
            .storage
            .exists(&format!("uploads/{id}/passwd"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_upload_success_verifies_stored_size() {
    let server = TestServer::with_config(|config| {
        config.server.max_file_size = 100;
    })
    .await;
    let id = UploadId::new();

    // A file within the limit passes.
    server
        .state
        .storage
        .put(&format!("uploads/{id}/ok.bin"), bytes::Bytes::from(vec![0u8; 50]))
        .await
        .unwrap();
    let (status, body) = post_form(
        &server.router,
        "/uploads/success",
        format!("uuid={id}&name=ok.bin"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("success"), Some(&Value::Bool(true)));

    // An oversized file is removed and the client told not to retry.
    let big = UploadId::new();
    server
        .state
        .storage
        .put(
            &format!("uploads/{big}/big.bin"),
            bytes::Bytes::from(vec![0u8; 500]),
        )
        .await
        .unwrap();
    let (status, body) = post_form(
        &server.router,
        "/uploads/success",
        format!("uuid={big}&name=big.bin"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.get("error").and_then(Value::as_str), Some("Too big!"));
    assert_eq!(body.get("preventRetry"), Some(&Value::Bool(true)));
    assert!(
        !server
            .state
            .storage
            .exists(&format!("uploads/{big}/big.bin"))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_upload_success_unknown_key_is_not_found() {
    let server = TestServer::new().await;
    let id = UploadId::new();

    let (status, body) = post_form(
        &server.router,
        "/uploads/success",
        format!("uuid={id}&name=nope.bin"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.get("success"), Some(&Value::Bool(false)));
}
