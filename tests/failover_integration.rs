//! Integration tests for host failover against real HTTP servers
//!
//! Each test spins up hyper servers on loopback ports and points the
//! dispatcher at a mix of live, silent and refused endpoints.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use influxpool::db::{ClientSettings, DbError, QueryOptions, WriteOptions};
use influxpool::dispatch::{
    DispatchError, Dispatcher, DispatcherConfig, ErrorKind, HyperTransport, RequestDescriptor,
    TransportError, TransportOptions,
};
use influxpool::InfluxDb;

/// Requests seen by a test server: `(path_and_query, body)`
type Seen = Arc<Mutex<Vec<(String, String)>>>;

async fn spawn_server(status: StatusCode, body: &'static str) -> (u16, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let log = Arc::clone(&log);
                    async move {
                        let target = req
                            .uri()
                            .path_and_query()
                            .map(|pq| pq.to_string())
                            .unwrap_or_default();
                        let payload = req.into_body().collect().await.unwrap().to_bytes();
                        log.lock()
                            .unwrap()
                            .push((target, String::from_utf8_lossy(&payload).into_owned()));

                        let response = hyper::Response::builder()
                            .status(status)
                            .body(Full::new(Bytes::from_static(body.as_bytes())))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (port, seen)
}

/// Accepts connections and never answers
async fn spawn_silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    port
}

/// Distinct loopback ports with nothing listening
fn refused_ports(n: usize) -> Vec<u16> {
    let listeners: Vec<_> = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

fn dispatcher_for(ports: &[u16], config: DispatcherConfig) -> Arc<Dispatcher> {
    let dispatcher = Dispatcher::new(config).unwrap();
    for port in ports {
        dispatcher.add_host("127.0.0.1", *port).unwrap();
    }
    Arc::new(dispatcher)
}

fn client_for(dispatcher: &Arc<Dispatcher>) -> InfluxDb {
    InfluxDb::new(
        Arc::clone(dispatcher),
        ClientSettings {
            database: Some("metrics".to_string()),
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_fails_over_from_refused_host() {
    let dead = refused_ports(1)[0];
    let (live, seen) = spawn_server(StatusCode::OK, r#"[{"name":"metrics"}]"#).await;
    let dispatcher = dispatcher_for(&[dead, live], DispatcherConfig::default());

    let response = dispatcher
        .get(RequestDescriptor::new("db").query("u", "root"))
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.host.port, live);
    assert_eq!(response.attempts, 2);

    let disabled = dispatcher.hosts_disabled();
    assert_eq!(disabled.len(), 1);
    assert_eq!(disabled[0].port, dead);
    assert_eq!(seen.lock().unwrap().len(), 1);

    // The dead host stays out of rotation
    let response = dispatcher.get(RequestDescriptor::new("db")).await.unwrap();
    assert_eq!(response.attempts, 1);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let (first, first_seen) =
        spawn_server(StatusCode::NOT_FOUND, "Database metrics doesn't exist").await;
    let (second, second_seen) = spawn_server(StatusCode::OK, "[]").await;
    let dispatcher = dispatcher_for(&[first, second], DispatcherConfig::default());
    let db = client_for(&dispatcher);

    let err = db
        .query("select * from cpu", &QueryOptions::default())
        .await
        .unwrap_err();

    match err {
        DbError::Server { status, body } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body.contains("doesn't exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(first_seen.lock().unwrap().len(), 1);
    assert!(second_seen.lock().unwrap().is_empty());
    assert!(dispatcher.hosts_disabled().is_empty());
}

#[tokio::test]
async fn test_timeout_disables_silent_host() {
    let silent = spawn_silent_server().await;
    let (live, _seen) = spawn_server(StatusCode::OK, "[]").await;
    let dispatcher = dispatcher_for(
        &[silent, live],
        DispatcherConfig {
            request_timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        },
    );

    let response = dispatcher.get(RequestDescriptor::new("ping")).await.unwrap();
    assert_eq!(response.host.port, live);
    assert_eq!(response.attempts, 2);
    assert_eq!(dispatcher.hosts_disabled()[0].port, silent);
}

#[tokio::test]
async fn test_silent_host_bounded_without_request_timeout() {
    let silent = spawn_silent_server().await;
    let (live, _seen) = spawn_server(StatusCode::OK, "[]").await;

    let transport = HyperTransport::with_options(TransportOptions {
        response_timeout: Duration::from_millis(300),
        ..Default::default()
    })
    .unwrap();
    let dispatcher = Dispatcher::with_transport(DispatcherConfig::default(), transport);
    dispatcher.add_host("127.0.0.1", silent).unwrap();
    assert_eq!(dispatcher.request_timeout(), None);

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.get(RequestDescriptor::new("ping")),
    )
    .await
    .expect("dispatch must not hang on a silent host")
    .unwrap_err();
    match err {
        DispatchError::AllHostsExhausted { source, .. } => {
            assert!(matches!(source, TransportError::Timeout(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The next live host picks up once the silent one is out
    dispatcher.add_host("127.0.0.1", live).unwrap();
    let response = dispatcher.get(RequestDescriptor::new("ping")).await.unwrap();
    assert_eq!(response.host.port, live);
}

#[tokio::test]
async fn test_all_hosts_exhausted() {
    let dispatcher = dispatcher_for(&refused_ports(2), DispatcherConfig::default());

    let err = dispatcher.get(RequestDescriptor::new("ping")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AllHostsExhausted);
    match err {
        DispatchError::AllHostsExhausted { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(dispatcher.hosts_available().is_empty());

    let err = dispatcher.get(RequestDescriptor::new("ping")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoHostsAvailable);
}

#[tokio::test]
async fn test_write_point_sends_json_body() {
    let (live, seen) = spawn_server(StatusCode::OK, "").await;
    let dispatcher = dispatcher_for(&[live], DispatcherConfig::default());
    let db = client_for(&dispatcher);

    let mut fields = Map::new();
    fields.insert("value".to_string(), json!(0.64));
    let mut tags = BTreeMap::new();
    tags.insert("host".to_string(), "server01".to_string());

    db.write_point("cpu_load", fields, &tags, &WriteOptions::default())
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let (target, body) = &seen[0];
    assert!(target.starts_with("/write?"));
    assert!(target.contains("u=root"));
    assert!(target.contains("time_precision=ms"));

    let body: Value = serde_json::from_str(body).unwrap();
    assert_eq!(body["database"], "metrics");
    assert_eq!(body["tags"]["host"], "server01");
    assert_eq!(body["points"][0]["name"], "cpu_load");
    assert_eq!(body["points"][0]["fields"]["value"], 0.64);
}

#[tokio::test]
async fn test_query_parses_json_result() {
    let (live, seen) = spawn_server(
        StatusCode::OK,
        r#"{"results":[{"series":[{"name":"databases","columns":["name"],"values":[["metrics"]]}]}]}"#,
    )
    .await;
    let dispatcher = dispatcher_for(&[live], DispatcherConfig::default());
    let db = client_for(&dispatcher);

    let result = db.get_databases().await.unwrap();
    assert_eq!(result["results"][0]["series"][0]["values"][0][0], "metrics");

    let seen = seen.lock().unwrap();
    assert!(seen[0].0.starts_with("/query?"));
    assert!(seen[0].0.contains("q=show%20databases"));
}
