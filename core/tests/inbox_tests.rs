/// Inbox synchronizer and conversation tests against a scripted endpoint
mod support;

use serde_json::{json, Value};
use support::{session, Scripted, ScriptedEndpoint};
use threadline_core::endpoint::paths;
use threadline_core::model::{ItemKind, User};
use threadline_core::{FeedError, Inbox};

fn item(id: &str, ts: i64, text: &str) -> Value {
    json!({"item_id": id, "user_id": 42, "timestamp": ts, "item_type": "text", "text": text})
}

fn thread(id: &str, items: Vec<Value>) -> Value {
    json!({
        "thread_id": id,
        "thread_title": format!("title {}", id),
        "thread_type": "private",
        "users": [{"pk": 42, "username": "friend"}],
        "items": items,
        "has_older": true,
    })
}

fn inbox_page(threads: Vec<Value>, cursor: &str, has_older: bool, seq_id: i64) -> Value {
    json!({
        "inbox": {
            "threads": threads,
            "has_older": has_older,
            "oldest_cursor": cursor,
            "unseen_count": 3,
        },
        "seq_id": seq_id,
        "pending_requests_total": 2,
        "snapshot_at_ms": 1_700_000_000_000_i64,
        "most_recent_inviter": {"pk": 7, "username": "inviter"},
        "status": "ok",
    })
}

fn ids(inbox: &Inbox) -> Vec<&str> {
    inbox.conversations.iter().map(|c| c.id.as_str()).collect()
}

#[tokio::test]
async fn test_sync_merges_instead_of_replacing() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(
        paths::INBOX,
        inbox_page(vec![thread("t1", vec![item("a", 100, "first")]), thread("t2", vec![])], "", false, 10),
    );
    let mut updated = thread("t1", vec![item("b", 150, "second")]);
    updated["thread_title"] = json!("renamed");
    updated["muted"] = json!(true);
    endpoint.push_json(paths::INBOX, inbox_page(vec![updated, thread("t3", vec![])], "", false, 11));

    let mut inbox = Inbox::new();
    inbox.sync(&session).await.unwrap();
    assert_eq!(ids(&inbox), vec!["t2", "t1"]);
    assert_eq!(inbox.seq_id, 10);

    inbox.sync(&session).await.unwrap();
    assert_eq!(ids(&inbox), vec!["t3", "t2", "t1"]);
    assert_eq!(inbox.seq_id, 11);
    assert_eq!(inbox.pending_requests_total, 2);
    assert_eq!(inbox.unseen_count, 3);
    assert_eq!(inbox.most_recent_inviter.as_ref().unwrap().username, "inviter");
    assert_eq!(inbox.snapshot_at().unwrap().timestamp(), 1_700_000_000);

    let t1 = inbox.conversation("t1").unwrap();
    assert_eq!(t1.title, "renamed");
    assert!(t1.muted);
    let msgs: Vec<_> = t1.items.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(msgs, vec!["b", "a"]);

    let call = &endpoint.calls_to(paths::INBOX)[0];
    assert_eq!(call.request.query_value("visual_message_return_type"), Some("unseen"));
    assert_eq!(call.request.query_value("persistentBadging"), Some("true"));
    assert_eq!(call.request.query_value("limit"), Some("0"));
}

#[tokio::test]
async fn test_sync_keeps_items_with_missing_payloads() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    let odd = vec![
        json!({"item_id": "b", "timestamp": 2, "item_type": "media_share"}),
        json!({"item_id": "c", "timestamp": 1}),
    ];
    endpoint.push_json(
        paths::INBOX,
        inbox_page(vec![thread("t1", vec![item("a", 5, "fine")]), thread("t2", odd)], "", false, 4),
    );

    let mut inbox = Inbox::new();
    inbox.sync(&session).await.unwrap();

    assert_eq!(ids(&inbox), vec!["t2", "t1"]);
    let t2 = inbox.conversation("t2").unwrap();
    assert_eq!(t2.items.len(), 2);
    assert!(matches!(t2.items[0].kind, ItemKind::MediaShare { .. }));
    assert_eq!(t2.items[1].kind, ItemKind::Other);
}

#[tokio::test]
async fn test_sync_pending_uses_pending_endpoint() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::PENDING_INBOX, inbox_page(vec![thread("p1", vec![])], "", false, 5));

    let mut inbox = Inbox::new();
    inbox.sync_pending(&session).await.unwrap();

    assert_eq!(ids(&inbox), vec!["p1"]);
    assert_eq!(endpoint.calls_to(paths::PENDING_INBOX).len(), 1);
    assert!(endpoint.calls_to(paths::INBOX).is_empty());
}

#[tokio::test]
async fn test_next_until_exhausted_then_sticky() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::INBOX, inbox_page(vec![thread("t1", vec![])], "cursor-1", true, 1));
    endpoint.push_json(paths::INBOX, inbox_page(vec![thread("t2", vec![])], "cursor-2", false, 2));

    let mut inbox = Inbox::new();
    assert!(inbox.next(&session).await);
    assert_eq!(inbox.cursor, "cursor-1");
    assert!(inbox.error().is_none());

    assert!(!inbox.next(&session).await);
    assert!(inbox.error().unwrap().is_no_more_data());

    // No request is issued once exhausted
    assert!(!inbox.next(&session).await);
    assert!(!inbox.next_pending(&session).await);
    assert_eq!(endpoint.calls().len(), 2);

    let calls = endpoint.calls_to(paths::INBOX);
    assert_eq!(calls[0].request.query_value("cursor"), Some(""));
    assert_eq!(calls[1].request.query_value("cursor"), Some("cursor-1"));
    assert_eq!(ids(&inbox), vec!["t2", "t1"]);
}

#[tokio::test]
async fn test_next_with_empty_cursor_is_exhausted() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::INBOX, inbox_page(vec![], "", true, 1));

    let mut inbox = Inbox::new();
    assert!(!inbox.next(&session).await);
    assert!(inbox.state().is_exhausted());
}

#[tokio::test]
async fn test_failure_is_sticky_and_reset_does_not_clear_it() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push(paths::INBOX, Scripted::Fail("connection reset"));
    endpoint.push_json(paths::INBOX, inbox_page(vec![], "c", true, 1));

    let mut inbox = Inbox::new();
    assert!(!inbox.next(&session).await);
    assert!(matches!(inbox.error(), Some(FeedError::Transport(_))));

    inbox.reset();
    assert!(inbox.cursor.is_empty());
    assert!(!inbox.next(&session).await);
    assert_eq!(endpoint.calls().len(), 1);
}

#[tokio::test]
async fn test_sync_surfaces_status_and_decode_errors() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push(paths::INBOX, Scripted::Raw(500, r#"{"status":"fail"}"#));
    endpoint.push(paths::INBOX, Scripted::Raw(200, "<html>not json</html>"));

    let mut inbox = Inbox::new();
    let err = inbox.sync(&session).await.unwrap_err();
    assert!(matches!(err, FeedError::Status { status: 500, .. }));

    let err = inbox.sync(&session).await.unwrap_err();
    assert!(matches!(err, FeedError::Decode(_)));

    // Sync errors do not poison pagination
    assert!(inbox.state().is_ready());
}

#[tokio::test]
async fn test_initial_snapshot_params() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::INBOX, inbox_page(vec![thread("t1", vec![])], "c1", true, 3));

    let mut inbox = Inbox::new();
    assert!(inbox.initial_snapshot(&session).await);

    let call = &endpoint.calls()[0];
    assert_eq!(call.request.query_value("fetch_reason"), Some("initial_snapshot"));
    assert_eq!(call.request.query_value("thread_message_limit"), Some("10"));
    assert_eq!(call.request.query_value("limit"), Some("20"));
}

#[tokio::test]
async fn test_thread_with_looks_up_locally_then_remotely() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::INBOX, inbox_page(vec![thread("t1", vec![])], "", false, 100));
    let mut remote = thread("t9", vec![item("z", 5, "hey")]);
    remote["users"] = json!([{"pk": 99}]);
    endpoint.push_json(paths::THREAD_BY_PARTICIPANTS, json!({"thread": remote, "status": "ok"}));
    endpoint.push_json(paths::THREAD_BY_PARTICIPANTS, json!({"thread": null, "status": "ok"}));

    let mut inbox = Inbox::new();
    inbox.sync(&session).await.unwrap();

    let local = inbox.thread_with(&session, 42).await.unwrap().unwrap();
    assert_eq!(local.id, "t1");
    assert!(endpoint.calls_to(paths::THREAD_BY_PARTICIPANTS).is_empty());

    let found = inbox.thread_with(&session, 99).await.unwrap().unwrap();
    assert_eq!(found.id, "t9");
    assert_eq!(ids(&inbox), vec!["t9", "t1"]);

    let call = &endpoint.calls_to(paths::THREAD_BY_PARTICIPANTS)[0];
    assert_eq!(call.request.query_value("recipient_users"), Some("[99]"));
    assert_eq!(call.request.query_value("seq_id"), Some("101"));

    assert!(inbox.thread_with(&session, 1234).await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_and_older_messages() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(
        paths::INBOX,
        inbox_page(vec![thread("t1", vec![item("m3", 300, "c"), item("m2", 200, "b")])], "", false, 50),
    );
    let thread_path = paths::thread("t1");
    let mut older = thread("t1", vec![item("m1", 100, "a")]);
    older["has_older"] = json!(false);
    endpoint.push_json(&thread_path, json!({"thread": older, "status": "ok"}));

    let mut inbox = Inbox::new();
    inbox.sync(&session).await.unwrap();

    assert!(!inbox.older_messages(&session, "t1").await);
    let conv = inbox.conversation("t1").unwrap();
    let msgs: Vec<_> = conv.items.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(msgs, vec!["m3", "m2", "m1"]);
    assert!(conv.error().unwrap().is_no_more_data());

    let call = &endpoint.calls_to(&thread_path)[0];
    assert_eq!(call.request.query_value("cursor"), Some("m2"));
    assert_eq!(call.request.query_value("direction"), Some("older"));
    assert_eq!(call.request.query_value("seq_id"), Some("51"));

    // Refresh is not pagination and still works
    endpoint.push_json(&thread_path, json!({"thread": thread("t1", vec![item("m4", 400, "d")]), "status": "ok"}));
    inbox.refresh_thread(&session, "t1").await.unwrap();
    assert_eq!(inbox.conversation("t1").unwrap().items[0].id, "m4");

    assert!(inbox.refresh_thread(&session, "nope").await.is_err());
    assert!(!inbox.older_messages(&session, "nope").await);
}

#[tokio::test]
async fn test_send_text_appends_ack() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::INBOX, inbox_page(vec![thread("t1", vec![item("m1", 100, "a")])], "", false, 1));
    endpoint.push_json(
        paths::SEND_TEXT,
        json!({
            "action": "item_ack",
            "payload": {"client_context": "ctx", "item_id": "m2", "thread_id": "t1", "timestamp": "500"},
            "status": "ok",
            "status_code": "200",
        }),
    );

    let mut inbox = Inbox::new();
    inbox.sync(&session).await.unwrap();
    let conv = inbox.conversation_mut("t1").unwrap();
    conv.send_text(&session, "hello there").await.unwrap();

    assert_eq!(conv.items[0].id, "m2");
    assert_eq!(conv.items[0].timestamp, 500);
    assert_eq!(conv.items[0].kind, ItemKind::Text { text: "hello there".to_string() });

    let call = &endpoint.calls_to(paths::SEND_TEXT)[0];
    assert_eq!(call.request.query_value("action"), Some("send_item"));
    assert_eq!(call.request.query_value("thread_ids"), Some(r#"["t1"]"#));
    assert_eq!(call.request.query_value("recipient_users"), Some("[[42]]"));
    assert_eq!(call.request.query_value("_uuid"), Some("device-uuid"));
    assert_eq!(call.request.query_value("device_id"), Some("android-device"));
}

#[tokio::test]
async fn test_message_user_starts_new_thread() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::THREAD_BY_PARTICIPANTS, json!({"thread": null, "status": "ok"}));
    endpoint.push_json(
        paths::SEND_TEXT,
        json!({"payload": {"item_id": "m1", "thread_id": "new-thread", "timestamp": "10"}, "status": "ok"}),
    );
    endpoint.push_json(
        &paths::thread("new-thread"),
        json!({"thread": thread("new-thread", vec![item("m1", 10, "hi")]), "status": "ok"}),
    );

    let mut inbox = Inbox::new();
    let user = User { id: 42, username: "friend".to_string(), ..Default::default() };
    let conv = inbox.message_user(&session, &user, "hi").await.unwrap();
    assert_eq!(conv.id, "new-thread");
    assert_eq!(conv.items.len(), 1);
    assert_eq!(ids(&inbox), vec!["new-thread"]);

    let call = &endpoint.calls_to(paths::SEND_TEXT)[0];
    assert!(call.request.query_value("thread_ids").is_none());
    assert!(call.request.query_value("client_context").unwrap().starts_with("68"));
}

#[tokio::test]
async fn test_mark_seen() {
    let endpoint = ScriptedEndpoint::new();
    let session = session(&endpoint);
    endpoint.push_json(paths::INBOX, inbox_page(vec![thread("t1", vec![item("m1", 1, "a")])], "", false, 1));
    let seen = paths::item_seen("t1", "m1");
    endpoint.push_json(&seen, json!({"status": "ok"}));
    endpoint.push_json(&seen, json!({"status": "fail"}));

    let mut inbox = Inbox::new();
    inbox.sync(&session).await.unwrap();
    let conv = inbox.conversation("t1").unwrap();

    conv.mark_seen(&session, "m1").await.unwrap();
    let err = conv.mark_seen(&session, "m1").await.unwrap_err();
    assert!(matches!(err, FeedError::Api(_)));

    let call = &endpoint.calls_to(&seen)[0];
    assert_eq!(call.request.query_value("action"), Some("mark_seen"));
    assert_eq!(call.request.query_value("thread_id"), Some("t1"));
    assert_eq!(
        call.request.query_value("client_context"),
        call.request.query_value("offline_threading_id")
    );
}
