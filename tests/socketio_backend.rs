//! 실제 Socket.IO 전송과 HTTP 백엔드를 인프로세스 axum 서버에 대해 구동하는 통합 테스트

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use livestream_swarm::backend::HttpBackend;
use livestream_swarm::config::BackendConfig;
use livestream_swarm::error::{BackendError, DispatchError, PoolError};
use livestream_swarm::transport::SocketIoTransport;
use livestream_swarm::{PoolController, PoolEvent, PoolSettings, SessionContext};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// 가짜 백엔드가 받은 요청 기록
#[derive(Default)]
struct Recorded {
    sockets: AtomicUsize,
    handshakes: Mutex<Vec<(HashMap<String, String>, Option<String>)>>,
    emits: Mutex<Vec<Value>>,
    pongs: AtomicUsize,
    views: Mutex<Vec<(Value, Option<String>)>>,
    gifts: Mutex<Vec<Value>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn socket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(recorded): State<Arc<Recorded>>,
) -> impl IntoResponse {
    recorded
        .handshakes
        .lock()
        .unwrap()
        .push((query, header(&headers, "userid")));
    let number = recorded.sockets.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| serve_socket(socket, number, recorded))
}

/// 최소한의 Socket.IO v4 서버 동작
async fn serve_socket(mut socket: WebSocket, number: usize, recorded: Arc<Recorded>) {
    let open = format!(
        r#"0{{"sid":"engine-{}","upgrades":[],"pingInterval":25000,"pingTimeout":20000}}"#,
        number
    );
    if socket.send(Message::Text(open)).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };

        if text == "40" {
            let connect = format!(r#"40{{"sid":"socket-{}"}}"#, number);
            let _ = socket.send(Message::Text(connect)).await;
            let _ = socket.send(Message::Text("2".to_string())).await;
        } else if text == "3" {
            recorded.pongs.fetch_add(1, Ordering::SeqCst);
        } else if let Some(rest) = text.strip_prefix("42") {
            let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
            let ack_id = &rest[..digits];
            let data: Value = serde_json::from_str(&rest[digits..]).unwrap();
            recorded.emits.lock().unwrap().push(data[2].clone());
            let ack = format!(r#"43{}[null,{{"ok":true}}]"#, ack_id);
            let _ = socket.send(Message::Text(ack)).await;
        }
    }
}

async fn view_handler(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    recorded
        .views
        .lock()
        .unwrap()
        .push((body, header(&headers, "authorization")));
    Json(json!({ "ok": true }))
}

async fn gift_handler(State(recorded): State<Arc<Recorded>>, Json(body): Json<Value>) -> Json<Value> {
    recorded.gifts.lock().unwrap().push(body);
    Json(json!({ "ok": true }))
}

async fn start_backend() -> (String, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/socket.io/", get(socket_handler))
        .route("/livestreams", post(view_handler))
        .route("/iaps/send-gift", post(gift_handler))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), recorded)
}

fn controller(base_url: &str) -> Arc<PoolController> {
    controller_with_timeout(base_url, Duration::from_secs(2))
}

fn controller_with_timeout(base_url: &str, request_timeout: Duration) -> Arc<PoolController> {
    let session = SessionContext::new(
        "app-1",
        "viewer-1",
        "loadbot",
        "viewer-token",
        base_url,
        "stream-1",
        "streamer-1",
    )
    .unwrap();
    let backend = HttpBackend::new(&BackendConfig {
        base_url: base_url.to_string(),
        app_uuid: "app-1".to_string(),
        api_token: "api-secret".to_string(),
        connect_timeout: Duration::from_secs(2),
        request_timeout,
    })
    .unwrap();

    Arc::new(PoolController::new(
        Arc::new(session),
        Arc::new(SocketIoTransport::new()),
        Arc::new(backend),
        PoolSettings {
            connect_timeout: Duration::from_secs(2),
            gift_id: "gift-70".to_string(),
            gift_settle: Duration::from_millis(10),
        },
    ))
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_pool_joins_over_socketio_and_drives_traffic() {
    // given
    let (base_url, recorded) = start_backend().await;
    let pool = controller(&base_url);
    let events = Arc::new(Mutex::new(Vec::<PoolEvent>::new()));
    let sink = events.clone();
    let (done_tx, done_rx) = oneshot::channel();

    // when
    pool.create_pool(
        3,
        Arc::new(move |event| sink.lock().unwrap().push(event)),
        move || {
            let _ = done_tx.send(());
        },
    )
    .await
    .unwrap();

    // then
    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("pool never completed")
        .unwrap();
    eventually(|| pool.snapshot().iter().all(|c| c.connected)).await;

    let ids: Vec<Option<String>> = pool.snapshot().into_iter().map(|c| c.id).collect();
    assert!(ids.iter().all(|id| id.as_deref().unwrap_or("").starts_with("socket-")));

    {
        let handshakes = recorded.handshakes.lock().unwrap();
        assert_eq!(handshakes.len(), 3);
        let (query, userid) = &handshakes[0];
        assert_eq!(query["EIO"], "4");
        assert_eq!(query["transport"], "websocket");
        assert_eq!(query["channel"], "comment_streamer-1_app-1");
        assert_eq!(query["appId"], "app-1");
        assert_eq!(userid.as_deref(), Some("viewer-1"));
    }

    eventually(|| recorded.emits.lock().unwrap().len() == 3).await;
    for join in recorded.emits.lock().unwrap().iter() {
        assert_eq!(join["Action"], "Comment");
        assert_eq!(join["room"], "comment_streamer-1_app-1");
        assert_eq!(join["userRecordId"], "viewer-1");
        assert_eq!(join["message"]["type"], "join");
    }
    eventually(|| recorded.pongs.load(Ordering::SeqCst) == 3).await;

    eventually(|| recorded.views.lock().unwrap().len() == 3).await;
    {
        let views = recorded.views.lock().unwrap();
        let (body, authorization) = &views[0];
        assert_eq!(body["Action"], "IncrementView");
        assert_eq!(body["streamId"], "stream-1");
        assert_eq!(authorization.as_deref(), Some("Bearer api-secret"));
    }

    // broadcast message
    let (settled_tx, settled_rx) = oneshot::channel();
    let results = Arc::new(Mutex::new(Vec::new()));
    let result_sink = results.clone();
    pool.broadcast_message(
        Arc::new(move |index: usize, result: Result<String, DispatchError>| {
            result_sink.lock().unwrap().push((index, result))
        }),
        move || {
            let _ = settled_tx.send(());
        },
    );
    tokio::time::timeout(Duration::from_secs(5), settled_rx)
        .await
        .expect("broadcast never settled")
        .unwrap();
    eventually(|| results.lock().unwrap().len() == 3).await;
    assert!(results.lock().unwrap().iter().all(|(_, result)| result.is_ok()));

    // broadcast gift
    let gifts_done = Arc::new(AtomicUsize::new(0));
    let counter = gifts_done.clone();
    pool.broadcast_gift(Arc::new(move |_: usize, result: Result<(), BackendError>| {
        assert!(result.is_ok());
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    eventually(|| gifts_done.load(Ordering::SeqCst) == 3).await;
    assert!(pool.snapshot().iter().all(|c| !c.busy));

    let gifts = recorded.gifts.lock().unwrap().clone();
    assert_eq!(gifts.len(), 3);
    assert_eq!(
        gifts[0],
        json!({
            "appid": "app-1",
            "userSendId": "viewer-1",
            "userReceiveId": "streamer-1",
            "coinFieldId": "coin",
            "giftId": "gift-70",
            "accessToken": "viewer-token",
            "room": "streamer-1"
        })
    );

    assert!(events
        .lock()
        .unwrap()
        .iter()
        .all(|event| matches!(event, PoolEvent::Connected { .. })));
}

#[tokio::test]
async fn test_unreachable_backend_leaves_connections_pending() {
    let pool = controller("http://127.0.0.1:9");
    let events = Arc::new(Mutex::new(Vec::<PoolEvent>::new()));
    let sink = events.clone();

    pool.create_pool(2, Arc::new(move |event| sink.lock().unwrap().push(event)), || {
        panic!("pool must not complete")
    })
    .await
    .unwrap();

    eventually(|| events.lock().unwrap().len() == 2).await;
    assert!(events.lock().unwrap().iter().all(PoolEvent::is_failure));
    assert!(pool.snapshot().iter().all(|c| c.state == "pending"));
}

#[tokio::test]
async fn test_stalled_gift_endpoint_settles_and_clears_busy() {
    // given: 연결은 받지만 어떤 요청에도 응답하지 않는 백엔드
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    let pool = controller_with_timeout(&format!("http://{}", addr), Duration::from_millis(200));
    pool.create_pool(1, Arc::new(|_: PoolEvent| {}), || {})
        .await
        .unwrap();

    // when
    let result = tokio::time::timeout(Duration::from_secs(5), pool.send_gift_at(0))
        .await
        .expect("gift never settled");

    // then
    assert!(matches!(result, Err(PoolError::Backend(BackendError::Request(_)))));
    assert!(!pool.connection(0).unwrap().is_busy());
    assert!(!matches!(pool.send_gift_at(0).await, Err(PoolError::Busy(_))));
}
