use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bulk_sender::chat::{download_contacts, open_tab, ChatTransport, DownloadLabels};
use bulk_sender::{TabHandle, Transport, TransportError, WebDriverSession};
use serde_json::{json, Value};

const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a5cbcd0e966";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    body: Value,
}

type Router = dyn Fn(&str, &str, &Value) -> (u16, Value) + Send + Sync;

/// Fake WebDriver endpoint answering with `route` and recording every request.
fn start_driver(route: Arc<Router>) -> (String, Arc<Mutex<Vec<Recorded>>>, Arc<tiny_http::Server>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let server_arc = Arc::new(server);
    let server_clone = server_arc.clone();
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_clone = log.clone();

    thread::spawn(move || {
        for mut request in server_clone.incoming_requests() {
            let mut raw = String::new();
            request.as_reader().read_to_string(&mut raw).unwrap();
            let body = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let method = request.method().to_string();
            let url = request.url().to_string();

            let (status, payload) = route(&method, &url, &body);
            log_clone.lock().unwrap().push(Recorded { method, url, body });

            let header: tiny_http::Header = "Content-Type: application/json".parse().unwrap();
            let response = tiny_http::Response::from_string(payload.to_string())
                .with_status_code(status)
                .with_header(header);
            request.respond(response).unwrap();
        }
    });

    (format!("http://127.0.0.1:{port}"), log, server_arc)
}

fn router<F>(route: F) -> Arc<Router>
where
    F: Fn(&str, &str, &Value) -> (u16, Value) + Send + Sync + 'static,
{
    Arc::new(route)
}

fn ok(value: Value) -> (u16, Value) {
    (200, json!({ "value": value }))
}

fn no_such_element() -> (u16, Value) {
    (
        404,
        json!({ "value": { "error": "no such element", "message": "Unable to locate element" } }),
    )
}

fn element(id: &str) -> (u16, Value) {
    ok(json!({ ELEMENT_KEY: id }))
}

/// Routes a chat client UI; `known` decides whether the contact search finds anyone.
fn chat_router(known: bool) -> Arc<Router> {
    router(move |method, url, body| {
        if method == "POST" && url.ends_with("/element") {
            let xpath = body["value"].as_str().unwrap_or_default();
            if xpath.contains("New chat") {
                element("new-chat")
            } else if xpath.contains("Search name or number") {
                element("search")
            } else if xpath.contains("gridcell") {
                if known {
                    element("cell")
                } else {
                    no_such_element()
                }
            } else if xpath.contains("Type a message") {
                element("message")
            } else {
                no_such_element()
            }
        } else {
            ok(Value::Null)
        }
    })
}

fn paths(log: &Arc<Mutex<Vec<Recorded>>>) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url))
        .collect()
}

#[tokio::test]
async fn test_start_session_reads_session_id() {
    let (url, log, _server) = start_driver(router(|method, url, _| {
        if method == "POST" && url == "/session" {
            ok(json!({ "sessionId": "s1", "capabilities": {} }))
        } else {
            ok(Value::Null)
        }
    }));

    let caps = WebDriverSession::chrome_capabilities("profile", false);
    let session = WebDriverSession::start(&url, caps).await.unwrap();
    assert_eq!(session.session_id(), "s1");

    let requests = log.lock().unwrap().clone();
    assert_eq!(
        requests[0].body["capabilities"]["alwaysMatch"]["browserName"],
        "chrome"
    );

    session.quit().await.unwrap();
    assert_eq!(paths(&log).last().unwrap(), "DELETE /session/s1");
}

#[tokio::test]
async fn test_session_error_is_reported() {
    let (url, _log, _server) = start_driver(router(|_, _, _| {
        (
            500,
            json!({ "value": { "error": "session not created", "message": "Chrome failed to start" } }),
        )
    }));

    let result = WebDriverSession::start(&url, json!({})).await;
    assert!(matches!(result, Err(TransportError::Session(msg)) if msg.contains("Chrome failed")));
}

#[tokio::test]
async fn test_chat_transport_delivers_message() {
    let (url, log, _server) = start_driver(chat_router(true));
    let session = WebDriverSession::attach(&url, "s1");
    let transport = ChatTransport::new(&session).with_pace(Duration::ZERO);

    let delivered = transport.send("3331234567", "Hi Ann!\nBye").await.unwrap();
    assert!(delivered);

    assert_eq!(
        paths(&log),
        [
            "POST /session/s1/element",
            "POST /session/s1/element/new-chat/click",
            "POST /session/s1/element",
            "POST /session/s1/element/search/value",
            "POST /session/s1/element",
            "POST /session/s1/element/cell/click",
            "POST /session/s1/element",
            "POST /session/s1/element/message/value",
        ]
    );

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests[3].body["text"], "3331234567");
    assert_eq!(
        requests[7].body["text"],
        "Hi Ann!\u{E008}\u{E007}\u{E000}Bye\u{E007}"
    );
}

#[tokio::test]
async fn test_chat_transport_reports_unknown_contact() {
    let (url, log, _server) = start_driver(chat_router(false));
    let session = WebDriverSession::attach(&url, "s1");
    let transport = ChatTransport::new(&session).with_pace(Duration::ZERO);

    let delivered = transport.send("000", "Hi").await.unwrap();
    assert!(!delivered);
    assert!(!paths(&log).iter().any(|p| p.ends_with("/value") && p.contains("message")));
}

#[tokio::test]
async fn test_missing_ui_is_a_hard_fault() {
    let (url, _log, _server) = start_driver(router(|_, _, _| no_such_element()));
    let session = WebDriverSession::attach(&url, "s1");
    let transport = ChatTransport::new(&session).with_pace(Duration::ZERO);

    let result = transport.send("111", "Hi").await;
    assert!(matches!(result, Err(TransportError::ElementNotFound(_))));
}

#[tokio::test]
async fn test_focus_switches_to_chat_tab() {
    let (url, log, _server) = start_driver(chat_router(true));
    let session = WebDriverSession::attach(&url, "s1");
    let transport = ChatTransport::new(&session).with_tab(TabHandle("chat".to_string()));

    transport.focus().await.unwrap();
    let requests = log.lock().unwrap().clone();
    assert_eq!(requests[0].url, "/session/s1/window");
    assert_eq!(requests[0].body["handle"], "chat");
}

#[tokio::test]
async fn test_open_tab_navigates_new_window() {
    let (url, log, _server) = start_driver(router(|method, url, _| {
        if method == "POST" && url.ends_with("/window/new") {
            ok(json!({ "handle": "tab-2", "type": "tab" }))
        } else {
            ok(Value::Null)
        }
    }));
    let session = WebDriverSession::attach(&url, "s1");

    let tab = open_tab(&session, "https://web.whatsapp.com/").await.unwrap();
    assert_eq!(tab, TabHandle("tab-2".to_string()));

    let requests = log.lock().unwrap().clone();
    assert_eq!(requests[0].body["type"], "tab");
    assert_eq!(requests[1].body["handle"], "tab-2");
    assert_eq!(requests[2].url, "/session/s1/url");
    assert_eq!(requests[2].body["url"], "https://web.whatsapp.com/");
}

#[tokio::test]
async fn test_download_contacts_clicks_menu_and_restores_window() {
    let (url, log, _server) = start_driver(router(|method, url, body| match (method, url) {
        ("GET", u) if u.ends_with("/window") => ok(json!("main")),
        ("POST", u) if u.ends_with("/window/new") => ok(json!({ "handle": "sheet", "type": "tab" })),
        ("POST", u) if u.ends_with("/element") => {
            let xpath = body["value"].as_str().unwrap_or_default();
            if xpath.contains("\"File\"") {
                element("file")
            } else if xpath.contains("\"Download\"") {
                element("download")
            } else if xpath.contains("(.csv)") {
                element("csv")
            } else {
                no_such_element()
            }
        }
        _ => ok(Value::Null),
    }));
    let session = WebDriverSession::attach(&url, "s1");

    download_contacts(
        &session,
        "https://docs.google.com/spreadsheets/d/x",
        &DownloadLabels::default(),
        Duration::ZERO,
    )
    .await
    .unwrap();

    let requests = paths(&log);
    let clicks: Vec<_> = requests.iter().filter(|p| p.ends_with("/click")).collect();
    assert_eq!(
        clicks,
        [
            "POST /session/s1/element/file/click",
            "POST /session/s1/element/download/click",
            "POST /session/s1/element/csv/click",
        ]
    );
    assert!(requests.contains(&"DELETE /session/s1/window".to_string()));

    let recorded = log.lock().unwrap().clone();
    let last = recorded.last().unwrap();
    assert_eq!(last.url, "/session/s1/window");
    assert_eq!(last.body["handle"], "main");
}
