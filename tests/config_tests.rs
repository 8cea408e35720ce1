//! Unit tests for the config module
//!
//! Run with: cargo test --test config_tests

use metafeed::config::Config;
use std::time::Duration;

fn create_test_config() -> Config {
    Config {
        feed_host: "10.1.2.3".to_string(),
        feed_port: 4002,
        feed_secure: false,
        connect_timeout_ms: 2_000,
        reconnect_interval_ms: 250,
        max_queue_size: 50,
        max_incomplete_messages: 8,
        chunk_stale_secs: 60,
        server_host: "127.0.0.1".to_string(),
        server_port: 9090,
    }
}

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.feed_host, "127.0.0.1");
    assert_eq!(config.feed_port, 4001);
    assert!(!config.feed_secure);
    assert_eq!(config.connect_timeout_ms, 10_000);
    assert_eq!(config.reconnect_interval_ms, 5_000);
    assert_eq!(config.max_queue_size, 1_000);
    assert_eq!(config.max_incomplete_messages, 256);
    assert_eq!(config.chunk_stale_secs, 300);
    assert_eq!(config.server_port, 8080);
}

#[test]
fn test_feed_url_plaintext() {
    let config = create_test_config();
    assert_eq!(config.feed_url(), "ws://10.1.2.3:4002");
}

#[test]
fn test_feed_url_secure() {
    let mut config = create_test_config();
    config.feed_secure = true;
    assert_eq!(config.feed_url(), "wss://10.1.2.3:4002");
}

#[test]
fn test_socket_addr() {
    let config = create_test_config();
    let addr = config.socket_addr();
    assert_eq!(addr.ip().to_string(), "127.0.0.1");
    assert_eq!(addr.port(), 9090);
}

#[test]
fn test_connect_timeout() {
    let config = create_test_config();
    assert_eq!(config.connect_timeout(), Duration::from_millis(2_000));
}

#[test]
fn test_reconnect_interval() {
    let config = create_test_config();
    assert_eq!(config.reconnect_interval(), Duration::from_millis(250));
}

#[test]
fn test_chunk_stale_window() {
    let config = create_test_config();
    assert_eq!(config.chunk_stale(), Duration::from_secs(60));
}
