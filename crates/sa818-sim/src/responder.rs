//! Responder task
//!
//! A pure async task that owns the transport and a [`VirtualSa818`]. The
//! task uses a biased select loop to:
//! - Stop as soon as a shutdown command arrives
//! - Wait up to one poll interval for bytes from the peer
//! - Split the bytes into lines, apply each one and write its response
//!
//! I/O errors are logged and the loop keeps going, since the peer on the
//! other side of a PTY may disconnect and come back.

use std::io;
use std::time::Duration;

use sa818_protocol::{LineCodec, ProtocolCodec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::device::VirtualSa818;
use crate::transport::Transport;

/// Commands that can be sent to a responder task
#[derive(Debug, Clone)]
pub enum ResponderCommand {
    /// Stop the responder and release the transport
    Shutdown,
}

/// Timing and buffer settings for the responder loop
#[derive(Debug, Clone, Copy)]
pub struct ResponderSettings {
    /// Upper bound on each wait for readable bytes
    pub poll_interval: Duration,
    /// Maximum bytes taken per read
    pub read_chunk_size: usize,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            read_chunk_size: 256,
        }
    }
}

/// Run the responder task
///
/// Lines are handled strictly in arrival order. For each line the state is
/// updated before the response is written, so a peer that has read a
/// response can rely on the state already reflecting its command.
///
/// Returns once a [`ResponderCommand::Shutdown`] is received or the command
/// channel closes. The transport is shut down and dropped on return.
pub async fn run_responder_task<S>(
    mut stream: S,
    device: VirtualSa818,
    mut cmd_rx: mpsc::Receiver<ResponderCommand>,
    settings: ResponderSettings,
) -> io::Result<()>
where
    S: Transport,
{
    let mut codec = LineCodec::new();
    let mut buf = vec![0u8; settings.read_chunk_size.max(1)];

    info!("Starting SA818 responder on {}", device.id());

    // Emit initial state
    device.store().publish_current();

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ResponderCommand::Shutdown) => {
                        info!("Shutdown requested for SA818 responder on {}", device.id());
                    }
                    None => {
                        debug!("Command channel closed for SA818 responder on {}", device.id());
                    }
                }
                break;
            }

            result = timeout(settings.poll_interval, stream.read(&mut buf)) => {
                match result {
                    // Nothing arrived this interval
                    Err(_) => {}
                    Ok(Ok(0)) => {
                        debug!("Peer closed {}, waiting for reconnect", device.id());
                        sleep(settings.poll_interval).await;
                    }
                    Ok(Ok(n)) => {
                        debug!("SA818 responder {} received {} bytes: {:02X?}", device.id(), n, &buf[..n]);
                        codec.push_bytes(&buf[..n]);

                        while let Some((cmd, line)) = codec.next_command_with_line() {
                            debug!("SA818 responder {} received command: {}", device.id(), line);
                            device.store().record_command(&line);
                            let response = device.process_command(&cmd);
                            debug!("SA818 responder {} responding: {}", device.id(), response);

                            if let Err(e) = stream.write_all(&response.encode()).await {
                                warn!("SA818 responder {} write error: {}", device.id(), e);
                                continue;
                            }
                            if let Err(e) = stream.flush().await {
                                warn!("SA818 responder {} flush error: {}", device.id(), e);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("SA818 responder {} read error: {}", device.id(), e);
                        sleep(settings.poll_interval).await;
                    }
                }
            }
        }
    }

    if let Err(e) = stream.shutdown().await {
        debug!("Error closing transport {}: {}", device.id(), e);
    }

    info!("SA818 responder ended for {}", device.id());
    Ok(())
}
