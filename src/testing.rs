//! Mock radio backend used by the test suites.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::radio::{Channel, DataRate, OutgoingFrame, RadioHandle, RadioInfo, RadioPacket};
use crate::shutdown::Shutdown;
use crate::{Result, WifiError};

/// Inspects a transmitted frame and produces the frames the mock access
/// point sends back.
pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// An in-memory radio. Tests feed it received frames with [`inject`],
/// script replies with [`set_responder`] and observe everything the
/// stack transmitted with [`sent_frames`].
///
/// [`inject`]: MockRadio::inject
/// [`set_responder`]: MockRadio::set_responder
/// [`sent_frames`]: MockRadio::sent_frames
pub(crate) struct MockRadio {
    incoming_tx: mpsc::Sender<RadioPacket>,
    incoming_rx: tokio::sync::Mutex<mpsc::Receiver<RadioPacket>>,
    sent: Mutex<Vec<OutgoingFrame>>,
    responder: Mutex<Option<Responder>>,
    current_channel: Mutex<Channel>,
    channel_history: Mutex<Vec<Channel>>,
    channels: Vec<Channel>,
    rates: Vec<DataRate>,
    fail_set_channel: Mutex<bool>,
    receive_failure: Shutdown,
    closed: Shutdown,
}

impl MockRadio {
    pub fn new(channel_numbers: &[u8]) -> Arc<Self> {
        let (incoming_tx, incoming_rx) = mpsc::channel(64);
        Arc::new(MockRadio {
            incoming_tx,
            incoming_rx: tokio::sync::Mutex::new(incoming_rx),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
            current_channel: Mutex::new(Channel::new(1)),
            channel_history: Mutex::new(Vec::new()),
            channels: channel_numbers.iter().map(|&n| Channel::new(n)).collect(),
            rates: vec![DataRate(0x02), DataRate(0x04), DataRate(0x0b), DataRate(0x16)],
            fail_set_channel: Mutex::new(false),
            receive_failure: Shutdown::new(),
            closed: Shutdown::new(),
        })
    }

    /// Script the access point side of the exchange.
    pub fn set_responder(&self, f: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static) {
        *self.responder.lock().unwrap() = Some(Box::new(f));
    }

    /// Queue a frame for the stack to receive.
    pub async fn inject(&self, frame: Vec<u8>) {
        let _ = self
            .incoming_tx
            .send(RadioPacket {
                frame: Bytes::from(frame),
                radio: RadioInfo::default(),
            })
            .await;
    }

    /// Everything the stack transmitted, in order.
    pub fn sent_frames(&self) -> Vec<OutgoingFrame> {
        self.sent.lock().unwrap().clone()
    }

    /// The channels the stack tuned to, in order.
    pub fn channel_history(&self) -> Vec<Channel> {
        self.channel_history.lock().unwrap().clone()
    }

    /// Make every subsequent `set_channel` call fail.
    pub fn fail_set_channel(&self) {
        *self.fail_set_channel.lock().unwrap() = true;
    }

    /// Make the pending and every subsequent `receive` call fail.
    pub fn fail_receive(&self) {
        self.receive_failure.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_triggered()
    }
}

#[async_trait]
impl RadioHandle for MockRadio {
    async fn receive(&self) -> Result<RadioPacket> {
        let mut rx = self.incoming_rx.lock().await;
        tokio::select! {
            _ = self.receive_failure.wait() => Err(WifiError::Radio {
                message: "mock receive failure".to_string(),
            }),
            _ = self.closed.wait() => Err(WifiError::Radio {
                message: "radio closed".to_string(),
            }),
            maybe = rx.recv() => maybe.ok_or(WifiError::Radio {
                message: "mock incoming exhausted".to_string(),
            }),
        }
    }

    async fn send(&self, frame: &[u8], rate: Option<DataRate>) -> Result<()> {
        if self.closed.is_triggered() {
            return Err(WifiError::Radio {
                message: "radio closed".to_string(),
            });
        }
        self.sent.lock().unwrap().push(OutgoingFrame {
            frame: frame.to_vec(),
            rate,
        });
        let replies = {
            let mut responder = self.responder.lock().unwrap();
            match responder.as_mut() {
                Some(f) => f(frame),
                None => Vec::new(),
            }
        };
        for reply in replies {
            self.inject(reply).await;
        }
        Ok(())
    }

    async fn set_channel(&self, channel: Channel) -> Result<()> {
        if *self.fail_set_channel.lock().unwrap() {
            return Err(WifiError::InvalidChannel {
                channel: channel.number,
            });
        }
        self.channel_history.lock().unwrap().push(channel);
        *self.current_channel.lock().unwrap() = channel;
        Ok(())
    }

    async fn channel(&self) -> Channel {
        *self.current_channel.lock().unwrap()
    }

    async fn supported_channels(&self) -> Vec<Channel> {
        self.channels.clone()
    }

    async fn supported_rates(&self) -> Vec<DataRate> {
        self.rates.clone()
    }

    async fn close(&self) {
        self.closed.trigger();
    }
}

/// Poll a condition until it holds, panicking after one second.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within one second");
}
