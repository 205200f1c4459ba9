#![cfg(unix)]

use plughost::{
    DetachedDispatcher, LauncherConfig, LauncherError, McpDispatcher, MemorySink, Plughost,
    PlughostError, Readiness, RelayConfig, RetryConfig, Transport,
};
use std::time::Duration;

const MARKER_FMT: &str = "\\n{plugin:terminated}\\r\\033[2K";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_file(true)
        .with_thread_ids(false)
        .with_target(false)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

fn quick_retry() -> RetryConfig {
    RetryConfig {
        min_delay_ms: 10,
        max_delay_ms: 20,
        max_attempts: 2,
        jitter_factor: 0.0,
    }
}

#[tokio::test]
async fn test_detached_plugin_output_reaches_sinks() {
    init_tracing();

    let script = format!("printf 'loaded\\n'; printf '{MARKER_FMT}'; printf '{MARKER_FMT}' >&2; sleep 30");
    let config = LauncherConfig::builder()
        .name("detached_plugin")
        .version("0.1")
        .command("sh")
        .args(["-c", script.as_str()])
        .build()
        .unwrap();
    let out = MemorySink::new();
    let err = MemorySink::new();

    let launcher =
        plughost::launcher_with_sinks(config, DetachedDispatcher, out.stdout(), err.stderr());
    let connected = launcher.launch().await.unwrap().connect().await.unwrap();
    assert!(connected.pid().is_some());

    tokio::time::sleep(Duration::from_millis(300)).await;
    connected.shutdown().await.unwrap();

    assert!(out.contents_lossy().starts_with("loaded\n"));
}

/// A plugin that never opens its endpoint is stopped after the last
/// connection attempt, and its output has still been relayed.
#[tokio::test]
async fn test_unreachable_endpoint_stops_plugin() {
    init_tracing();

    let config = LauncherConfig::builder()
        .name("mute_plugin")
        .version("0.1")
        .command("sh")
        .args(["-c", "echo booting; sleep 30"])
        .transport(Transport::Sse {
            url: "http://127.0.0.1:9/sse".to_string(),
        })
        .retry_config(quick_retry())
        .relay(RelayConfig::default().with_grace_period(Duration::from_millis(200)))
        .build()
        .unwrap();
    let out = MemorySink::new();
    let err = MemorySink::new();

    let dispatcher = McpDispatcher::new().with_readiness(Readiness {
        max_attempts: 1,
        interval: Duration::from_millis(10),
    });
    let launched = plughost::launcher_with_sinks(config, dispatcher, out.stdout(), err.stderr())
        .launch()
        .await
        .unwrap();

    let result = launched.connect().await;
    assert!(matches!(result, Err(LauncherError::ConnectionFailed(_))));
    assert_eq!(out.contents_lossy(), "booting\n");
}

#[tokio::test]
async fn test_plughost_rejects_detached_transport() {
    init_tracing();

    let config = LauncherConfig::builder()
        .name("no_rpc")
        .version("0.1")
        .command("sh")
        .args(["-c", "sleep 30"])
        .retry_config(RetryConfig::no_retry())
        .relay(RelayConfig::default().with_grace_period(Duration::from_millis(100)))
        .build()
        .unwrap();

    let result = Plughost::new(config).connect().await;
    let Err(error) = result else {
        panic!("a detached plugin has no MCP session");
    };
    assert!(matches!(
        error,
        PlughostError::Launcher(LauncherError::ConfigurationError(_))
    ));
    assert!(!error.is_retryable());
}
