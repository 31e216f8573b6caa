use std::path::Path;

use httpmock::prelude::*;
use serde_json::{json, Value};
use slack_backup::export::{BackupOptions, BackupService};
use slack_backup::SlackClient;

fn read_json(path: &Path) -> Value {
    let contents = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e));
    serde_json::from_str(&contents).unwrap()
}

async fn mock_listing(server: &MockServer, types: &str, channels: Value) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/conversations.list")
                .query_param("types", types);
            then.status(200).json_body(json!({
                "ok": true,
                "channels": channels,
                "response_metadata": { "next_cursor": "" }
            }));
        })
        .await;
}

async fn mock_history(server: &MockServer, channel: &str, messages: Value) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/conversations.history")
                .query_param("channel", channel);
            then.status(200).json_body(json!({
                "ok": true,
                "messages": messages,
                "has_more": false
            }));
        })
        .await;
}

async fn mock_workspace(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth.test")
                .header("authorization", "Bearer xoxp-test");
            then.status(200).json_body(json!({
                "ok": true,
                "team": "Acme",
                "team_id": "T1",
                "user": "alice",
                "user_id": "U1"
            }));
        })
        .await;

    mock_listing(
        server,
        "public_channel,private_channel",
        json!([
            { "id": "C1", "name": "general", "is_private": false },
            { "id": "C2", "name": "leads", "is_private": true }
        ]),
    )
    .await;
    mock_listing(server, "mpim", json!([{ "id": "G1", "name": "mpdm-alice--bob-1" }])).await;
    mock_listing(
        server,
        "im",
        json!([
            { "id": "D1", "is_im": true, "user": "U2" },
            { "id": "D2", "is_im": true, "user": "U404" }
        ]),
    )
    .await;

    mock_history(
        server,
        "C1",
        json!([
            { "ts": "2.0", "text": "second" },
            { "ts": "1.0", "text": "kickoff", "reply_count": 1 }
        ]),
    )
    .await;
    mock_history(server, "C2", json!([{ "ts": "5.0", "text": "private" }])).await;
    mock_history(server, "G1", json!([{ "ts": "6.0", "text": "group" }])).await;
    mock_history(server, "D1", json!([{ "ts": "7.0", "text": "hi bob" }])).await;
    mock_history(server, "D2", json!([])).await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/conversations.replies")
                .query_param("channel", "C1")
                .query_param("ts", "1.0");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [
                    { "ts": "1.0", "text": "kickoff", "reply_count": 1 },
                    { "ts": "1.5", "text": "reply", "thread_ts": "1.0" }
                ],
                "has_more": false
            }));
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/users.list");
            then.status(200).json_body(json!({
                "ok": true,
                "members": [
                    { "id": "U1", "name": "alice" },
                    { "id": "U2", "name": "bob" }
                ],
                "response_metadata": { "next_cursor": "" }
            }));
        })
        .await;
}

async fn mock_files(server: &MockServer) {
    let download_url = server.url("/files-pri/T1-F1/download/notes.txt");
    server
        .mock_async(|when, then| {
            when.method(GET).path("/files.list");
            then.status(200).json_body(json!({
                "ok": true,
                "files": [
                    {
                        "id": "F1",
                        "name": "notes.txt",
                        "user": "U2",
                        "timestamp": 1700000000,
                        "url_private_download": download_url
                    },
                    { "id": "F2", "name": "external.gdoc", "user": "U1", "is_external": true }
                ],
                "paging": { "count": 100, "total": 2, "page": 1, "pages": 1 }
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/files-pri/T1-F1/download/notes.txt")
                .header("authorization", "Bearer xoxp-test");
            then.status(200).body("remember the milk");
        })
        .await;
}

fn client_for(server: &MockServer) -> SlackClient {
    SlackClient::new("xoxp-test".into()).with_api_base(server.base_url())
}

#[tokio::test]
async fn full_backup_writes_expected_tree() {
    let server = MockServer::start_async().await;
    mock_workspace(&server).await;
    mock_files(&server).await;

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path();
    let summary = BackupService::new(client_for(&server), out, BackupOptions::default())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.conversations, 5);
    assert_eq!(summary.messages, 5);
    // the thread parent is not counted as a reply
    assert_eq!(summary.replies, 1);
    assert_eq!(summary.users, 2);
    assert_eq!(summary.files_downloaded, 1);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.bytes_downloaded, 17);
    assert!(summary.errors.is_empty());

    let channels = read_json(&out.join("channels.json"));
    assert_eq!(channels.as_array().unwrap().len(), 2);

    let general = read_json(&out.join("channels/general.json"));
    assert_eq!(general[0]["text"], "second");
    assert_eq!(general[1]["replies"][1]["text"], "reply");

    let leads = read_json(&out.join("private_channels/leads.json"));
    assert_eq!(leads[0]["text"], "private");
    assert!(!out.join("channels/leads.json").exists());

    let group = read_json(&out.join("groups/mpdm-alice--bob-1.json"));
    assert_eq!(group[0]["text"], "group");

    let users = read_json(&out.join("users.json"));
    assert_eq!(users[1]["name"], "bob");

    let dms = read_json(&out.join("direct_messages.json"));
    assert_eq!(dms[0]["is_im"], true);
    let bob = read_json(&out.join("direct_messages/bob_U2.json"));
    assert_eq!(bob[0]["text"], "hi bob");
    // unknown users fall back to their id
    let unknown = read_json(&out.join("direct_messages/U404_U404.json"));
    assert_eq!(unknown, json!([]));

    let files = read_json(&out.join("files.json"));
    assert_eq!(files.as_array().unwrap().len(), 2);
    let downloaded = out.join("files/bob/2023-11-14 22_13_20_F1_notes.txt");
    assert_eq!(
        std::fs::read_to_string(downloaded).unwrap(),
        "remember the milk"
    );
}

#[tokio::test]
async fn skip_files_and_replies() {
    let server = MockServer::start_async().await;
    mock_workspace(&server).await;
    let files_list = server
        .mock_async(|when, then| {
            when.method(GET).path("/files.list");
            then.status(200).json_body(json!({ "ok": true, "files": [] }));
        })
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut options = BackupOptions {
        download_files: false,
        ..Default::default()
    };
    options.history.with_replies = false;

    let summary = BackupService::new(client_for(&server), tmp.path(), options)
        .run()
        .await
        .unwrap();

    files_list.assert_hits_async(0).await;
    assert_eq!(summary.replies, 0);
    assert!(!tmp.path().join("files.json").exists());

    let general = read_json(&tmp.path().join("channels/general.json"));
    assert!(general[1].get("replies").is_none());
}

#[tokio::test]
async fn failing_conversation_aborts_by_default() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/auth.test");
            then.status(200).json_body(json!({ "ok": true, "team": "Acme" }));
        })
        .await;
    mock_listing(
        &server,
        "public_channel,private_channel",
        json!([{ "id": "C9", "name": "locked" }]),
    )
    .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "not_in_channel" }));
        })
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let err = BackupService::new(client_for(&server), tmp.path(), BackupOptions::default())
        .run()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("not_in_channel"));
    assert!(tmp.path().join("channels.json").exists());
    assert!(!tmp.path().join("channels/locked.json").exists());
}

#[tokio::test]
async fn continue_on_error_records_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/auth.test");
            then.status(200).json_body(json!({ "ok": true, "team": "Acme" }));
        })
        .await;
    mock_listing(
        &server,
        "public_channel,private_channel",
        json!([
            { "id": "C9", "name": "locked" },
            { "id": "C1", "name": "general" }
        ]),
    )
    .await;
    mock_listing(&server, "mpim", json!([])).await;
    mock_listing(&server, "im", json!([])).await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/conversations.history")
                .query_param("channel", "C9");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "not_in_channel" }));
        })
        .await;
    mock_history(&server, "C1", json!([{ "ts": "1.0", "text": "ok" }])).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users.list");
            then.status(200).json_body(json!({ "ok": true, "members": [] }));
        })
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let options = BackupOptions {
        download_files: false,
        continue_on_error: true,
        ..Default::default()
    };
    let summary = BackupService::new(client_for(&server), tmp.path(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.conversations, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("channel locked:"));
    assert!(tmp.path().join("channels/general.json").exists());
}

#[tokio::test]
async fn colliding_channel_names_keep_both_histories() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/auth.test");
            then.status(200).json_body(json!({ "ok": true, "team": "Acme" }));
        })
        .await;
    mock_listing(
        &server,
        "public_channel,private_channel",
        json!([
            { "id": "C1", "name": "a/b" },
            { "id": "C2", "name": "a_b" }
        ]),
    )
    .await;
    mock_listing(&server, "mpim", json!([])).await;
    mock_listing(&server, "im", json!([])).await;
    mock_history(&server, "C1", json!([{ "ts": "1.0", "text": "slash" }])).await;
    mock_history(&server, "C2", json!([{ "ts": "2.0", "text": "underscore" }])).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/users.list");
            then.status(200).json_body(json!({ "ok": true, "members": [] }));
        })
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let options = BackupOptions {
        download_files: false,
        ..Default::default()
    };
    let summary = BackupService::new(client_for(&server), tmp.path(), options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.conversations, 2);
    let first = read_json(&tmp.path().join("channels/a_b.json"));
    assert_eq!(first[0]["text"], "slash");
    let second = read_json(&tmp.path().join("channels/a_b_C2.json"));
    assert_eq!(second[0]["text"], "underscore");
}
