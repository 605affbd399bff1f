//! Object storage backends: filesystem via tempfile, HTTP via wiremock.

use pocket_db::{Error, FilesystemBackend, HttpObjectStore, StorageBackend};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn filesystem(dir: &TempDir) -> FilesystemBackend {
    FilesystemBackend::new(
        dir.path(),
        "user-images",
        "http://localhost:3000",
        b"test-signing-key".to_vec(),
    )
}

#[tokio::test]
async fn test_filesystem_put_get_delete() {
    let dir = TempDir::new().unwrap();
    let storage = filesystem(&dir);
    let key = "user/recipes/0001.png";

    storage.put(key, b"png-bytes", "image/png").await.unwrap();
    assert!(dir.path().join("user-images").join(key).exists());
    assert_eq!(storage.get(key).await.unwrap(), b"png-bytes");

    storage.delete(key).await.unwrap();
    assert!(matches!(storage.get(key).await, Err(Error::NotFound(_))));

    // Deleting again is fine.
    storage.delete(key).await.unwrap();
}

#[tokio::test]
async fn test_filesystem_put_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let storage = filesystem(&dir);

    storage.put("u/a/1.jpg", b"first", "image/jpeg").await.unwrap();
    let err = storage.put("u/a/1.jpg", b"second", "image/jpeg").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(storage.get("u/a/1.jpg").await.unwrap(), b"first");
}

#[tokio::test]
async fn test_filesystem_rejects_traversal() {
    let dir = TempDir::new().unwrap();
    let storage = filesystem(&dir);

    let err = storage.put("../escape.png", b"x", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_filesystem_validate() {
    let dir = TempDir::new().unwrap();
    assert!(filesystem(&dir).validate().await.is_ok());
}

#[tokio::test]
async fn test_http_store_upload_and_sign() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/object/user-images/u/a/1.png"))
        .and(header("x-upsert", "false"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Key": "user-images/u/a/1.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/object/sign/user-images/u/a/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signedURL": "/object/sign/user-images/u/a/1.png?token=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpObjectStore::new(server.uri(), "service-key", "user-images").unwrap();
    store.put("u/a/1.png", b"bytes", "image/png").await.unwrap();

    let url = store.signed_url("u/a/1.png", 3600).await.unwrap();
    assert_eq!(
        url,
        format!("{}/object/sign/user-images/u/a/1.png?token=abc", server.uri())
    );
}

#[tokio::test]
async fn test_http_store_maps_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/object/user-images/u/a/dup.png"))
        .respond_with(ResponseTemplate::new(409).set_body_string("Duplicate"))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/object/user-images/u/a/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/object/user-images/u/a/broken.png"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let store = HttpObjectStore::new(server.uri(), "k", "user-images").unwrap();

    let err = store.put("u/a/dup.png", b"x", "image/png").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    store.delete("u/a/gone.png").await.unwrap();

    let err = store.get("u/a/broken.png").await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
}
