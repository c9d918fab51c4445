//! Integration tests for the SA818 simulator
//!
//! These tests drive a running simulator through an in-memory duplex stream,
//! playing the part of the firmware on the other end of the UART:
//! - Command handling and state updates for every supported command
//! - Framing across reads and with mixed terminators
//! - Concurrent RSSI injection and state inspection
//! - Start/stop lifecycle and transport release

use std::time::Duration;

use sa818_protocol::{EncodeCommand, FilterFlags, GroupConfig, Sa818Command};
use sa818_sim::{
    DeviceState, DuplexConnector, LifecycleState, Sa818Simulator, SimError, SimulatorConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Simulator with a short poll interval, already started
    pub fn running_sim() -> (Sa818Simulator<DuplexConnector>, DuplexStream) {
        let (connector, peer) = DuplexConnector::pair("uart_1", 4096);
        let config = SimulatorConfig {
            poll_interval_ms: 20,
            ..Default::default()
        };
        let mut sim = Sa818Simulator::with_connector(connector, config);
        sim.start().unwrap();
        (sim, peer)
    }

    /// Read one CR LF terminated response line, without the terminator
    pub async fn read_response(peer: &mut DuplexStream) -> String {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while !out.ends_with(b"\r\n") {
            let n = tokio::time::timeout(Duration::from_secs(2), peer.read(&mut byte))
                .await
                .expect("timed out waiting for response")
                .unwrap();
            assert_eq!(n, 1, "stream closed mid-response");
            out.push(byte[0]);
        }
        out.truncate(out.len() - 2);
        String::from_utf8(out).unwrap()
    }

    /// Send a line and read its response
    pub async fn exchange(peer: &mut DuplexStream, line: &str) -> String {
        peer.write_all(line.as_bytes()).await.unwrap();
        peer.write_all(b"\r\n").await.unwrap();
        read_response(peer).await
    }

    /// Assert that nothing arrives within `ms`
    pub async fn assert_silent(peer: &mut DuplexStream, ms: u64) {
        let mut buf = [0u8; 64];
        let result =
            tokio::time::timeout(Duration::from_millis(ms), peer.read(&mut buf)).await;
        assert!(result.is_err(), "unexpected data: {:?}", result);
    }
}

use helpers::*;

// ============================================================================
// Command Handling
// ============================================================================

#[tokio::test]
async fn test_set_volume_valid_range() {
    let (mut sim, mut peer) = running_sim();

    for n in 1..=8 {
        let resp = exchange(&mut peer, &format!("AT+DMOSETVOLUME={}", n)).await;
        assert_eq!(resp, "+DMOSETVOLUME:0");
        assert_eq!(sim.get_state().volume, n);
    }

    sim.stop().await;
}

#[tokio::test]
async fn test_set_volume_out_of_range_leaves_state() {
    let (mut sim, mut peer) = running_sim();
    exchange(&mut peer, "AT+DMOSETVOLUME=3").await;

    assert_eq!(exchange(&mut peer, "AT+DMOSETVOLUME=0").await, "+DMOSETVOLUME:1");
    assert_eq!(sim.get_state().volume, 3);
    assert_eq!(exchange(&mut peer, "AT+DMOSETVOLUME=9").await, "+DMOSETVOLUME:1");
    assert_eq!(sim.get_state().volume, 3);

    sim.stop().await;
}

#[tokio::test]
async fn test_set_group() {
    let (mut sim, mut peer) = running_sim();

    let resp = exchange(&mut peer, "AT+DMOSETGROUP=0,145.500,145.500,0,5,0").await;
    assert_eq!(resp, "+DMOSETGROUP:0");

    let state = sim.get_state();
    assert_eq!(state.bandwidth, 0);
    assert_eq!(state.freq_tx, 145.5);
    assert_eq!(state.freq_rx, 145.5);
    assert_eq!(state.ctcss_tx, 0);
    assert_eq!(state.squelch, 5);
    assert_eq!(state.ctcss_rx, 0);

    sim.stop().await;
}

#[tokio::test]
async fn test_set_group_from_encoded_command() {
    let (mut sim, mut peer) = running_sim();

    let cmd = Sa818Command::SetGroup(GroupConfig {
        bandwidth: 1,
        freq_tx: 439.2,
        freq_rx: 431.6,
        ctcss_tx: 12,
        squelch: 3,
        ctcss_rx: 0,
    });
    peer.write_all(&cmd.encode()).await.unwrap();
    assert_eq!(read_response(&mut peer).await, "+DMOSETGROUP:0");

    let state = sim.get_state();
    assert_eq!(state.bandwidth, 1);
    assert!((state.freq_tx - 439.2).abs() < 1e-9);
    assert!((state.freq_rx - 431.6).abs() < 1e-9);
    assert_eq!(state.ctcss_tx, 12);
    assert_eq!(state.squelch, 3);

    sim.stop().await;
}

#[tokio::test]
async fn test_set_filter() {
    let (mut sim, mut peer) = running_sim();

    assert_eq!(exchange(&mut peer, "AT+SETFILTER=1,0,1").await, "+DMOSETFILTER:0");
    assert_eq!(
        sim.get_state().filters(),
        FilterFlags {
            pre_emphasis: true,
            high_pass: false,
            low_pass: true,
        }
    );

    sim.stop().await;
}

#[tokio::test]
async fn test_rssi_injection() {
    let (mut sim, mut peer) = running_sim();

    assert_eq!(exchange(&mut peer, "RSSI?").await, "RSSI=120");

    sim.set_rssi(77);
    assert_eq!(exchange(&mut peer, "RSSI?").await, "RSSI=77");
    assert_eq!(exchange(&mut peer, "RSSI?").await, "RSSI=77");

    sim.set_rssi(12);
    assert_eq!(exchange(&mut peer, "rssi?").await, "RSSI=12");

    sim.stop().await;
}

#[tokio::test]
async fn test_handshake_connect_and_version() {
    let (mut sim, mut peer) = running_sim();

    assert_eq!(exchange(&mut peer, "AT").await, "+DMOCONNECT:0");
    assert_eq!(exchange(&mut peer, "AT+DMOCONNECT").await, "+DMOCONNECT:0");
    assert_eq!(exchange(&mut peer, "AT+VERSION").await, "SA818_V4.2");

    sim.stop().await;
}

#[tokio::test]
async fn test_unknown_command_is_error_without_state_change() {
    let (mut sim, mut peer) = running_sim();
    let before = sim.get_state();

    assert_eq!(exchange(&mut peer, "FOO=1").await, "ERROR");
    assert_eq!(exchange(&mut peer, "AT+DMOSETVOLUME=abc").await, "ERROR");
    assert_eq!(sim.get_state(), before);

    sim.stop().await;
}

#[tokio::test]
async fn test_empty_line_has_no_response() {
    let (mut sim, mut peer) = running_sim();
    let before = sim.get_state();

    peer.write_all(b"\r\n").await.unwrap();
    peer.write_all(b"   \n").await.unwrap();
    assert_silent(&mut peer, 150).await;
    assert_eq!(sim.get_state(), before);
    assert!(sim.received_commands().is_empty());

    sim.stop().await;
}

// ============================================================================
// Framing
// ============================================================================

#[tokio::test]
async fn test_command_split_across_reads() {
    let (mut sim, mut peer) = running_sim();

    peer.write_all(b"AT+DMOSETVOL").await.unwrap();
    peer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    peer.write_all(b"UME=6").await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_silent(&mut peer, 50).await;

    peer.write_all(b"\r").await.unwrap();
    assert_eq!(read_response(&mut peer).await, "+DMOSETVOLUME:0");
    assert_eq!(sim.get_state().volume, 6);

    sim.stop().await;
}

#[tokio::test]
async fn test_multiple_commands_in_one_write() {
    let (mut sim, mut peer) = running_sim();

    peer.write_all(b"AT\rAT+DMOSETVOLUME=2\nRSSI?\r\nFOO\n")
        .await
        .unwrap();

    assert_eq!(read_response(&mut peer).await, "+DMOCONNECT:0");
    assert_eq!(read_response(&mut peer).await, "+DMOSETVOLUME:0");
    assert_eq!(read_response(&mut peer).await, "RSSI=120");
    assert_eq!(read_response(&mut peer).await, "ERROR");
    assert_eq!(
        sim.received_commands(),
        vec!["AT", "AT+DMOSETVOLUME=2", "RSSI?", "FOO"]
    );

    sim.stop().await;
}

// ============================================================================
// State Semantics
// ============================================================================

#[tokio::test]
async fn test_last_value_wins_with_interleaved_queries() {
    let (mut sim, mut peer) = running_sim();

    exchange(&mut peer, "AT+DMOSETVOLUME=5").await;
    exchange(&mut peer, "RSSI?").await;
    exchange(&mut peer, "AT+DMOSETGROUP=1,146.520,146.520,8,2,8").await;
    exchange(&mut peer, "AT+SETFILTER=0,0,0").await;
    exchange(&mut peer, "RSSI?").await;
    exchange(&mut peer, "AT+DMOSETVOLUME=7").await;
    exchange(&mut peer, "AT+DMOSETGROUP=0,145.000,144.400,0,6,0").await;
    exchange(&mut peer, "AT+DMOSETVOLUME=12").await;
    exchange(&mut peer, "RSSI?").await;

    let expected = DeviceState {
        bandwidth: 0,
        freq_tx: 145.0,
        freq_rx: 144.4,
        ctcss_tx: 0,
        squelch: 6,
        ctcss_rx: 0,
        volume: 7,
        pre_emphasis: false,
        high_pass: false,
        low_pass: false,
        rssi: 120,
    };
    assert_eq!(sim.get_state(), expected);

    sim.stop().await;
}

#[tokio::test]
async fn test_state_events_published() {
    let (connector, mut peer) = DuplexConnector::pair("uart_1", 1024);
    let mut sim = Sa818Simulator::with_connector(connector, SimulatorConfig::default());
    let mut events = sim.subscribe();
    sim.start().unwrap();

    let initial = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(initial, DeviceState::default());

    exchange(&mut peer, "AT+DMOSETVOLUME=8").await;
    let changed = events.recv().await.unwrap();
    assert_eq!(changed.volume, 8);

    sim.set_rssi(3);
    assert_eq!(events.recv().await.unwrap().rssi, 3);

    // Queries and rejected commands publish nothing
    exchange(&mut peer, "RSSI?").await;
    exchange(&mut peer, "AT+DMOSETVOLUME=0").await;
    assert!(events.try_recv().is_err());

    sim.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_rssi_injection_and_reads() {
    let (mut sim, mut peer) = running_sim();
    let store = sim.store();

    // Injected values all exceed the default RSSI and only ever increase
    let injector = tokio::spawn(async move {
        for v in 200..400 {
            store.set_rssi(v);
            tokio::task::yield_now().await;
        }
    });

    let mut previous = DeviceState::default().rssi;
    for _ in 0..20 {
        let resp = exchange(&mut peer, "RSSI?").await;
        let value: i32 = resp.strip_prefix("RSSI=").unwrap().parse().unwrap();
        assert!(
            value == 120 || (200..400).contains(&value),
            "unexpected RSSI {}",
            value
        );
        assert!(value >= previous, "RSSI went from {} to {}", previous, value);
        previous = value;
    }
    injector.await.unwrap();

    assert_eq!(exchange(&mut peer, "RSSI?").await, "RSSI=399");
    assert_eq!(sim.get_state().rssi, 399);

    sim.stop().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_double_start_is_failed_precondition() {
    let (mut sim, mut peer) = running_sim();

    let err = sim.start().unwrap_err();
    assert!(matches!(err, SimError::FailedPrecondition { .. }));

    // The running responder is unaffected
    assert_eq!(exchange(&mut peer, "AT").await, "+DMOCONNECT:0");

    sim.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent_and_releases_transport() {
    let (mut sim, mut peer) = running_sim();
    assert_eq!(exchange(&mut peer, "AT").await, "+DMOCONNECT:0");

    sim.stop().await;
    sim.stop().await;
    assert_eq!(sim.lifecycle(), LifecycleState::Stopped);

    // Transport was closed: no further responses, just end-of-stream
    let _ = peer.write_all(b"AT\r\n").await;
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(1), peer.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_stop_is_prompt() {
    let (connector, _peer) = DuplexConnector::pair("uart_1", 1024);
    let mut sim = Sa818Simulator::with_connector(connector, SimulatorConfig::default());
    sim.start().unwrap();

    let started = std::time::Instant::now();
    sim.stop().await;
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_restart_requires_new_transport() {
    let (mut sim, _peer) = running_sim();
    sim.set_rssi(5);
    sim.stop().await;

    // State of the last run stays readable after stop
    assert_eq!(sim.get_state().rssi, 5);

    // The duplex connector can only be opened once
    let err = sim.start().unwrap_err();
    assert!(matches!(err, SimError::TransportOpen { .. }));
    assert_eq!(sim.lifecycle(), LifecycleState::Stopped);
}
