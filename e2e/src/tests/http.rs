use deepjson::errors::RequestError;
use deepjson::{DeepJsonClient, Error, GetOptions, KeyFilter, PostOptions, PutOptions, StatusCode};
use httpmock::prelude::*;
use serde_json::json;

use super::utils::init_tracing;

const TEXT: &str = "text/plain; charset=utf-8";

fn client_for(server: &MockServer) -> DeepJsonClient {
    init_tracing();
    let client = DeepJsonClient::new(&server.base_url()).unwrap();
    client.set_token("t0k");
    client
}

#[tokio::test]
async fn crud_round_trip() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let post = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/keys/users/alice")
                .header("authorization", "Bearer t0k")
                .header("content-type", TEXT)
                .body(r#"{"age":30}"#);
            then.status(201).body("created");
        })
        .await;
    let get = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/keys/users/alice")
                .header("authorization", "Bearer t0k");
            then.status(200).json_body(json!({"age": 30}));
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/keys/users/alice")
                .body(r#"{"age":31}"#);
            then.status(200);
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/keys/users/alice");
            then.status(204);
        })
        .await;

    let resp = client.post("users/alice", r#"{"age":30}"#).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.text().await.unwrap(), "created");

    let value: serde_json::Value = client.get_json("users/alice").await.unwrap();
    assert_eq!(value, json!({"age": 30}));

    client.put("users/alice", json!({"age": 31})).await.unwrap();
    client.delete("users/alice").await.unwrap();

    post.assert_async().await;
    get.assert_async().await;
    put.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn keys_are_percent_encoded() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let get = server
        .mock_async(|when, then| {
            when.method(GET).path("/keys/notes/a%20b%3F");
            then.status(200).body("x");
        })
        .await;

    client.get("notes/a b?", "").await.unwrap();
    get.assert_async().await;
}

#[tokio::test]
async fn overwrite_flag_applies_once() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let overwrite = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/keys/cfg")
                .header("x-override-existing", "true")
                .body("v2");
            then.status(200);
        })
        .await;
    let plain = server
        .mock_async(|when, then| {
            when.method(POST).path("/keys/cfg").body("v3");
            then.status(200);
        })
        .await;

    client.set_overwrite_key(true);
    assert!(client.is_overwrite_key());
    client.post("cfg", "v2").await.unwrap();
    assert!(!client.is_overwrite_key());
    assert!(client.flags().is_clear());

    client.post("cfg", "v3").await.unwrap();

    overwrite.assert_async().await;
    plain.assert_async().await;
}

#[tokio::test]
async fn flags_reset_even_when_request_fails() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    server
        .mock_async(|when, then| {
            when.method(GET).path("/keys/missing");
            then.status(404).body("no such key");
        })
        .await;

    let err = client
        .set_binary(true)
        .set_get_body(true)
        .get("missing", "")
        .await;
    // get_body turns the call into a POST, which nothing answers.
    assert!(err.is_err());
    assert!(client.flags().is_clear());

    let err = client.get("missing", "").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.details(), Some("no such key"));
    assert!(matches!(
        err,
        Error::Request(RequestError::Server { .. })
    ));
}

/// Arm all three one-shot flags.
fn arm(client: &DeepJsonClient) {
    client
        .set_binary(true)
        .set_overwrite_key(true)
        .set_get_body(true);
    assert!(!client.flags().is_clear());
}

#[tokio::test]
async fn every_verb_clears_pending_flags() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    server
        .mock_async(|when, then| {
            when.path("/keys/k");
            then.status(200).body("ok");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.path("/keys/broken");
            then.status(500).body("boom");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/cmd/move");
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/cmd/keys");
            then.status(200).json_body(json!([]));
        })
        .await;
    let get_with = server
        .mock_async(|when, then| {
            when.method(GET).path("/keys/plain");
            then.status(200);
        })
        .await;

    arm(&client);
    client.put("k", "v").await.unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    client.delete("k").await.unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    client.move_key("k", "k2").await.unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    client
        .upload_bytes("k", "k.bin", b"bytes".to_vec(), false)
        .await
        .unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    client.list_keys(KeyFilter::None).await.unwrap();
    assert!(client.flags().is_clear());

    // Pending get_body would turn this into a POST, which nothing answers.
    arm(&client);
    client
        .get_with("plain", "", &GetOptions::default())
        .await
        .unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    client
        .post_with("k", "v", &PostOptions::default())
        .await
        .unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    client
        .put_with("k", "v", &PutOptions::default())
        .await
        .unwrap();
    assert!(client.flags().is_clear());

    arm(&client);
    let err = client.put("broken", "v").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert!(client.flags().is_clear());

    arm(&client);
    assert!(client.delete("").await.is_err());
    assert!(client.flags().is_clear());

    get_with.assert_async().await;
}

#[tokio::test]
async fn binary_get_carries_token_in_query() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let get = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/keys/images/logo")
                .query_param("binary", "true")
                .query_param("token", "t0k");
            then.status(200).body([0u8, 159, 146, 150]);
        })
        .await;

    let bytes = client
        .set_binary(true)
        .get("images/logo", "")
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), &[0u8, 159, 146, 150]);
    get.assert_async().await;
}

#[tokio::test]
async fn get_body_is_sent_as_post_with_method_override() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let query = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/keys/orders")
                .header("x-method-override", "GET")
                .body(r#"{"status":"open"}"#);
            then.status(200).json_body(json!([{"id": 1}]));
        })
        .await;

    let opts = GetOptions::default().get_body(true);
    let resp = client
        .get_with("orders", r#"{"status":"open"}"#, &opts)
        .await
        .unwrap();
    let rows: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(rows, json!([{"id": 1}]));
    query.assert_async().await;
}

#[tokio::test]
async fn scripts_wrap_the_payload() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let post = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/keys/counter")
                .header("x-override-existing", "true")
                .body("javascript:\nreturn data + 1;\n\njavascript!\n\n41");
            then.status(200).body("42");
        })
        .await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/keys/counter")
                .body("javascript:\nreturn 0;\n\njavascript!\n\n");
            then.status(200);
        })
        .await;

    let opts = PostOptions::default()
        .overwrite_key(true)
        .script("return data + 1;");
    client.post_with("counter", "41", &opts).await.unwrap();

    let opts = PutOptions::default().script("return 0;");
    client.put_with("counter", "", &opts).await.unwrap();

    post.assert_async().await;
    put.assert_async().await;
}

#[tokio::test]
async fn move_sends_json_command() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let mv = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/cmd/move")
                .header("content-type", "application/json; charset=utf-8")
                .json_body(json!({"from": "drafts/a", "to": "posts/a"}));
            then.status(200);
        })
        .await;

    client.move_key("drafts/a", "posts/a").await.unwrap();
    mv.assert_async().await;
}

#[tokio::test]
async fn list_keys_filters() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let filtered = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cmd/keys")
                .query_param("keys", r"^users/\d+$");
            then.status(200).json_body(json!(["users/1", "users/2"]));
        })
        .await;
    let text = server
        .mock_async(|when, then| {
            when.method(GET).path("/cmd/keys").query_param("keys", "users");
            then.status(200).json_body(json!(["users/1"]));
        })
        .await;

    let re = regex::Regex::new(r"^users/\d+$").unwrap();
    let keys = client.list_keys(&re).await.unwrap();
    assert_eq!(keys, json!(["users/1", "users/2"]));

    let keys = client
        .list_keys(KeyFilter::Pattern(r"/^users/\d+$/".into()))
        .await
        .unwrap();
    assert_eq!(keys, json!(["users/1", "users/2"]));

    let keys = client.list_keys("users").await.unwrap();
    assert_eq!(keys, json!(["users/1"]));

    filtered.assert_hits_async(2).await;
    text.assert_async().await;
}

#[tokio::test]
async fn upload_bytes_and_file() {
    let server = MockServer::start_async().await;
    let client = client_for(&server);

    let upload = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/keys/docs/report")
                .header("authorization", "Bearer t0k")
                .header("x-override-existing", "false")
                .header_exists("content-type")
                .body_contains(r#"name="file"; filename="report.txt""#)
                .body_contains("quarterly numbers");
            then.status(201);
        })
        .await;

    client
        .upload_bytes("docs/report", "report.txt", b"quarterly numbers".to_vec(), false)
        .await
        .unwrap();

    let dir = std::env::temp_dir().join(format!("deepjson-e2e-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("report.txt");
    tokio::fs::write(&path, "quarterly numbers").await.unwrap();

    client.upload_file("docs/report", &path, false).await.unwrap();
    upload.assert_hits_async(2).await;

    let missing = client
        .upload_file("docs/report", dir.join("nope.txt"), true)
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        Error::Request(RequestError::File { .. })
    ));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn network_failure_is_not_an_api_error() {
    init_tracing();
    let client = DeepJsonClient::new("http://127.0.0.1:9").unwrap();

    let err = client.get("anything", "").await.unwrap_err();
    assert!(matches!(err, Error::Request(RequestError::Network(_))));
    assert_eq!(err.status(), None);
    assert_eq!(err.details(), None);
}
