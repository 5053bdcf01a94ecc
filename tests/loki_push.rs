use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mockito::{Matcher, Server};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use loki_log_sink::error::SinkError;
use loki_log_sink::layer::{deliver, LokiLayer};
use loki_log_sink::loki::{LokiConfig, LokiSink};
use loki_log_sink::record::{LogRecord, Severity};
use loki_log_sink::sink::LogSink;

const PUSH: &str = "/loki/api/v1/push";

fn config(url: &str) -> LokiConfig {
    LokiConfig::new(url, "dev", "rust", "my-computer").with_timeout(Duration::from_secs(2))
}


#[tokio::test]
async fn pushes_one_stream_with_one_value() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH)
        .match_header("content-type", "application/json")
        .match_header("x-scope-orgid", "tenant1")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Regex(
            concat!(
                r#"^\{"streams":\[\{"stream":\{"application":"rust","environment":"dev","#,
                r#""host":"my-computer"\},"values":\[\["#,
            )
            .to_string(),
        ))
        .with_status(204)
        .create_async()
        .await;

    // Trailing slash on the base URL must not produce a double slash.
    let sink = LokiSink::new(config(&format!("{}/", server.url())).with_tenant("tenant1")).unwrap();
    let record = LogRecord::new(Severity::Warning, "disk full");

    sink.send(&record).await.expect("push should succeed");
    mock.assert_async().await;
}

#[tokio::test]
async fn body_carries_formatted_line() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH)
        .match_body(Matcher::Regex(
            concat!(
                r#""values":\[\["\d+","#,
                r#""\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3} \[WARNING\] disk full"\]\]"#,
            )
            .to_string(),
        ))
        .with_status(204)
        .create_async()
        .await;

    let sink = LokiSink::new(config(&server.url())).unwrap();
    sink.send(&LogRecord::new(Severity::Warning, "disk full")).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn sends_basic_auth_and_level_label() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH)
        .match_header("authorization", "Basic dXNlcjpwYXNz")
        .match_header("x-scope-orgid", Matcher::Missing)
        .match_body(Matcher::Regex(r#""host":"my-computer","level":"error"\}"#.to_string()))
        .with_status(204)
        .create_async()
        .await;

    let cfg = config(&server.url())
        .with_tenant("  ")
        .with_basic_auth("user", "pass")
        .with_level_label(true);
    let sink = LokiSink::new(cfg).unwrap();

    sink.send(&LogRecord::new(Severity::Error, "boom")).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_is_reported_not_propagated() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH)
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(2)
        .create_async()
        .await;

    let sink = LokiSink::new(config(&server.url())).unwrap();
    let record = LogRecord::new(Severity::Info, "hello");

    match sink.send(&record).await {
        Err(SinkError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "Internal Server Error");
        }
        other => panic!("expected status error, got {:?}", other),
    }

    // One more attempt through the boundary; neither call retries.
    assert!(!deliver(&sink, &record).await);
    mock.assert_async().await;
}

#[tokio::test]
async fn auth_rejection_is_a_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PUSH)
        .with_status(401)
        .with_body("no org id")
        .create_async()
        .await;

    let sink = LokiSink::new(config(&server.url())).unwrap();
    let err = sink.send(&LogRecord::new(Severity::Info, "x")).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.body(), Some("no org id"));
}

#[tokio::test]
async fn connection_refused_is_reported_not_propagated() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let sink = LokiSink::new(config(&format!("http://127.0.0.1:{}", port))).unwrap();
    let record = LogRecord::new(Severity::Error, "nobody listening");

    let err = sink.send(&record).await.unwrap_err();
    assert!(matches!(err, SinkError::Transport(_)), "got {:?}", err);
    assert!(!deliver(&sink, &record).await);
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    // Accepts connections into the backlog but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let sink = LokiSink::new(config(&url).with_timeout(Duration::from_millis(200))).unwrap();
    let record = LogRecord::new(Severity::Info, "into the void");

    let started = Instant::now();
    let err = sink.send(&record).await.unwrap_err();
    match &err {
        SinkError::Transport(e) => assert!(e.is_timeout(), "not a timeout: {:?}", e),
        other => panic!("expected a transport timeout, got {:?}", other),
    }
    assert!(!deliver(&sink, &record).await);
    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    drop(listener);
}

#[tokio::test]
async fn concurrent_sends_are_independent() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", PUSH)
        .match_body(Matcher::Regex(r"\[INFO\] first".to_string()))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", PUSH)
        .match_body(Matcher::Regex(r"\[ERROR\] second".to_string()))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let sink = Arc::new(LokiSink::new(config(&server.url())).unwrap());
    let a = LogRecord::new(Severity::Info, "first");
    let b = LogRecord::new(Severity::Error, "second");

    let (ra, rb) = tokio::join!(sink.send(&a), sink.send(&b));
    ra.unwrap();
    rb.unwrap();

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn layer_ships_events_through_loki_sink() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PUSH)
        .match_body(Matcher::Regex(
            r#"\[WARNING\] disk full",\{"custom_field":"custom_value"\}\]\]"#.to_string(),
        ))
        .with_status(204)
        .expect(1)
        .create_async()
        .await;

    let sink = LokiSink::new(config(&server.url()).with_structured_metadata(true)).unwrap();
    let layer = LokiLayer::new(Arc::new(sink), Level::INFO).unwrap();
    let stats = layer.stats();

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::warn!(custom_field = "custom_value", "disk full");
        tracing::debug!("below threshold");
    });

    assert_eq!(stats.delivered(), 1);
    assert_eq!(stats.failed(), 0);
    mock.assert_async().await;
}
