//! Channel-based access to a radio handle
//!
//! A [`RawStream`] owns a radio handle and turns its blocking
//! receive/send calls into a pair of queues serviced by two background
//! tasks. Once a handle is wrapped it must not be touched directly
//! anymore, not even to close it.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::radio::{Channel, DataRate, OutgoingFrame, RadioHandle, RadioPacket};
use crate::shutdown::Shutdown;
use crate::{Result, WifiError};

/// How many received packets may queue up before the reader blocks.
const INCOMING_BUFFER_SIZE: usize = 16;

/// A channel-based wrapper around a [`RadioHandle`].
pub struct RawStream {
    handle: Arc<dyn RadioHandle>,
    incoming: tokio::sync::Mutex<mpsc::Receiver<RadioPacket>>,
    outgoing: Mutex<Option<mpsc::Sender<OutgoingFrame>>>,
    first_error: Arc<Mutex<Option<WifiError>>>,
}

impl RawStream {
    /// Wrap a radio handle. The stream takes over the handle; closing
    /// the stream closes the handle.
    pub fn new(handle: Arc<dyn RadioHandle>) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_BUFFER_SIZE);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(1);
        let first_error = Arc::new(Mutex::new(None));
        let receive_failed = Shutdown::new();

        tokio::spawn(incoming_loop(
            handle.clone(),
            incoming_tx,
            first_error.clone(),
            receive_failed.clone(),
        ));
        tokio::spawn(outgoing_loop(
            handle.clone(),
            outgoing_rx,
            first_error.clone(),
            receive_failed,
        ));

        RawStream {
            handle,
            incoming: tokio::sync::Mutex::new(incoming_rx),
            outgoing: Mutex::new(Some(outgoing_tx)),
            first_error,
        }
    }

    /// Receive the next incoming radio packet. Returns `None` once the
    /// stream has closed; [`first_error`] tells why.
    ///
    /// [`first_error`]: RawStream::first_error
    pub async fn recv(&self) -> Option<RadioPacket> {
        self.incoming.lock().await.recv().await
    }

    /// Queue a frame for transmission. Fails once the stream has
    /// closed or encountered an error.
    pub async fn send(&self, frame: OutgoingFrame) -> Result<()> {
        let sender = self.outgoing.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(frame).await.map_err(|_| self.closed_error()),
            None => Err(self.closed_error()),
        }
    }

    /// Close the outgoing side. Queued frames are still transmitted,
    /// then the underlying handle is closed.
    pub fn close(&self) {
        self.outgoing.lock().unwrap().take();
    }

    /// The first error encountered while reading or writing the
    /// underlying handle. This can be used to figure out why a stream
    /// closed early.
    pub fn first_error(&self) -> Option<WifiError> {
        self.first_error.lock().unwrap().clone()
    }

    /// The error a caller should see for an operation on the closed
    /// stream.
    pub fn closed_error(&self) -> WifiError {
        let inner = self.first_error().unwrap_or(WifiError::Radio {
            message: "stream closed".to_string(),
        });
        WifiError::TransportClosed(Box::new(inner))
    }

    /// Tune the radio to a channel.
    pub async fn set_channel(&self, channel: Channel) -> Result<()> {
        self.handle.set_channel(channel).await
    }

    /// The channel the radio is tuned to.
    pub async fn channel(&self) -> Channel {
        self.handle.channel().await
    }

    /// The channels the radio supports.
    pub async fn supported_channels(&self) -> Vec<Channel> {
        self.handle.supported_channels().await
    }

    /// The rates the radio supports.
    pub async fn supported_rates(&self) -> Vec<DataRate> {
        self.handle.supported_rates().await
    }
}

fn latch_first_error(slot: &Mutex<Option<WifiError>>, err: WifiError) {
    let mut slot = slot.lock().unwrap();
    if slot.is_none() {
        *slot = Some(err);
    }
}

async fn incoming_loop(
    handle: Arc<dyn RadioHandle>,
    incoming: mpsc::Sender<RadioPacket>,
    first_error: Arc<Mutex<Option<WifiError>>>,
    receive_failed: Shutdown,
) {
    loop {
        match handle.receive().await {
            Ok(packet) => {
                if incoming.send(packet).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                log::warn!("radio receive failed: {}", err);
                latch_first_error(&first_error, err);
                break;
            }
        }
    }
    receive_failed.trigger();
    // dropping the sender closes the incoming queue
}

async fn outgoing_loop(
    handle: Arc<dyn RadioHandle>,
    mut outgoing: mpsc::Receiver<OutgoingFrame>,
    first_error: Arc<Mutex<Option<WifiError>>>,
    receive_failed: Shutdown,
) {
    loop {
        tokio::select! {
            maybe = outgoing.recv() => match maybe {
                None => break,
                Some(frame) => {
                    if let Err(err) = handle.send(&frame.frame, frame.rate).await {
                        log::warn!("radio send failed: {}", err);
                        latch_first_error(&first_error, err);
                        break;
                    }
                }
            },
            _ = receive_failed.wait() => break,
        }
    }
    // Refuse further sends and discard whatever is still queued, so
    // that nothing blocks on a stream that can no longer transmit.
    outgoing.close();
    while outgoing.try_recv().is_ok() {}
    handle.close().await;
}
