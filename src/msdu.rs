//! Reliable MSDU transfer over an open network
//!
//! An [`OpenMsduStream`] turns a raw frame stream into a bidirectional
//! pipe for whole MSDUs: outgoing packets are fragmented, sequenced and
//! retransmitted until acknowledged; incoming fragments are filtered,
//! acknowledged and reassembled. QoS, HCF and PCF are not supported.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::frames::frame::{decode_frame, Frame, FrameType, SequenceControl};
use crate::frames::mac::Mac;
use crate::partial_msdu::PartialMsdu;
use crate::radio::{DataRate, OutgoingFrame};
use crate::raw_stream::RawStream;
use crate::shutdown::Shutdown;
use crate::Result;

/// How long to wait for an ACK before retransmitting a data fragment.
pub const DATA_RESEND_TIMEOUT: Duration = Duration::from_millis(10);

// TODO: derive the duration ID from SIFS and the ACK transmission time
// as section 8.3.1.4 of the 2012 standard describes; 2ms is a safe
// stand-in.
const DATA_DURATION_ID: u16 = 2000;

/// How many frames or MSDUs each internal queue buffers.
const QUEUE_SIZE: usize = 16;

/// A MAC service data unit: one whole upper-layer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msdu {
    /// The station on the far side of the distribution system.
    pub remote: Mac,
    /// The packet contents.
    pub payload: bytes::Bytes,
}

/// Configuration for an [`OpenMsduStream`].
#[derive(Clone)]
pub struct OpenMsduStreamConfig {
    /// The size, in bytes, at which MSDUs are fragmented into multiple
    /// MPDUs.
    pub fragment_threshold: usize,

    /// The rate at which data frames are sent.
    pub data_rate: DataRate,

    /// The BSS identifier of the access point.
    pub bssid: Mac,

    /// The MAC address of this client.
    pub client: Mac,

    /// The stream used to transfer raw 802.11 frames.
    pub stream: Arc<RawStream>,
}

/// A bidirectional MSDU pipe over an open network, for one
/// (BSSID, client) pair.
///
/// Close it by calling [`close`], which drains queued outgoing MSDUs
/// and then closes the underlying stream, or abort immediately with
/// [`force_close`].
///
/// [`close`]: OpenMsduStream::close
/// [`force_close`]: OpenMsduStream::force_close
pub struct OpenMsduStream {
    shutdown: Shutdown,
    stream: Arc<RawStream>,
    incoming: tokio::sync::Mutex<mpsc::Receiver<Msdu>>,
    outgoing: Mutex<Option<mpsc::Sender<Msdu>>>,
}

impl OpenMsduStream {
    /// Start an MSDU stream over the configured raw stream. The stream
    /// becomes the sole consumer of the raw stream's incoming side.
    pub fn new(config: OpenMsduStreamConfig) -> Self {
        let shutdown = Shutdown::new();
        let (incoming_tx, incoming_rx) = mpsc::channel(QUEUE_SIZE);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(QUEUE_SIZE);
        let (data_tx, data_rx) = mpsc::channel(QUEUE_SIZE);
        let (ack_tx, ack_rx) = mpsc::channel(QUEUE_SIZE);

        let receiver = tokio::spawn(receiver_loop(
            config.clone(),
            data_tx,
            ack_tx,
            shutdown.clone(),
        ));
        let reassembler = tokio::spawn(reassembly_loop(
            config.clone(),
            data_rx,
            incoming_tx,
            shutdown.clone(),
        ));
        let sender = tokio::spawn(sender_loop(
            config.clone(),
            outgoing_rx,
            ack_rx,
            shutdown.clone(),
        ));

        let stream = config.stream.clone();
        let raw_stream = stream.clone();
        tokio::spawn(async move {
            let _ = receiver.await;
            let _ = reassembler.await;
            let _ = sender.await;
            raw_stream.close();
        });

        OpenMsduStream {
            shutdown,
            stream,
            incoming: tokio::sync::Mutex::new(incoming_rx),
            outgoing: Mutex::new(Some(outgoing_tx)),
        }
    }

    /// Receive the next reassembled MSDU. Returns `None` once the
    /// stream has closed.
    pub async fn recv(&self) -> Option<Msdu> {
        self.incoming.lock().await.recv().await
    }

    /// Queue an MSDU for transmission. MSDUs go out in submission
    /// order; each one holds the sender until its last fragment is
    /// acknowledged.
    pub async fn send(&self, msdu: Msdu) -> Result<()> {
        let sender = self.outgoing.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(msdu).await.map_err(|_| self.stream.closed_error()),
            None => Err(self.stream.closed_error()),
        }
    }

    /// Begin an orderly shutdown: queued outgoing MSDUs are still
    /// delivered, then the underlying stream's outgoing side closes.
    pub fn close(&self) {
        self.outgoing.lock().unwrap().take();
    }

    /// Terminate any pending outgoing or incoming MSDUs immediately.
    /// Calling this more than once is harmless.
    pub fn force_close(&self) {
        self.shutdown.trigger();
    }
}

/// Pulls raw packets and routes data frames to the reassembler and
/// ACKs to the sender.
async fn receiver_loop(
    config: OpenMsduStreamConfig,
    data: mpsc::Sender<Frame>,
    acks: mpsc::Sender<Frame>,
    shutdown: Shutdown,
) {
    loop {
        let packet = tokio::select! {
            _ = shutdown.wait() => break,
            maybe = config.stream.recv() => match maybe {
                None => break,
                Some(packet) => packet,
            },
        };

        let Ok(frame) = decode_frame(&packet.frame) else {
            continue;
        };

        if frame.frame_type == FrameType::DATA {
            let for_us = frame.from_ds
                && frame.addresses[1] == config.bssid
                && (frame.addresses[0] == config.client || frame.addresses[0] == Mac::BROADCAST);
            if !for_us {
                continue;
            }
            tokio::select! {
                _ = shutdown.wait() => break,
                sent = data.send(frame) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        } else if frame.frame_type == FrameType::ACK && frame.addresses[0] == config.client {
            // Overflow is dropped so a flood of forged ACKs cannot
            // wedge this loop.
            let _ = acks.try_send(frame);
        }
    }
    shutdown.trigger();
}

/// Consumes filtered data frames, acknowledges every fragment and
/// emits each MSDU once its final piece is in.
async fn reassembly_loop(
    config: OpenMsduStreamConfig,
    mut data: mpsc::Receiver<Frame>,
    incoming: mpsc::Sender<Msdu>,
    shutdown: Shutdown,
) {
    let mut current_sequence: u16 = 0;
    let mut current: Option<PartialMsdu> = None;

    loop {
        let frame = tokio::select! {
            _ = shutdown.wait() => break,
            maybe = data.recv() => match maybe {
                None => break,
                Some(frame) => frame,
            },
        };

        let Some(sequence_control) = frame.sequence_control else {
            continue;
        };

        // A different sequence number supersedes whatever was in
        // flight.
        if current.is_none() || current_sequence != sequence_control.sequence {
            current = Some(PartialMsdu::new());
            current_sequence = sequence_control.sequence;
        }
        if let Some(partial) = current.as_mut() {
            partial.insert(
                sequence_control.fragment,
                frame.payload.clone(),
                !frame.more_frag,
            );
        }

        let mut ack = Frame {
            frame_type: FrameType::ACK,
            addresses: vec![frame.addresses[1]],
            ..Frame::default()
        };
        if frame.more_frag {
            ack.duration_id = DATA_DURATION_ID;
        }
        let delivered = tokio::select! {
            _ = shutdown.wait() => break,
            sent = config.stream.send(OutgoingFrame::new(ack.encode())) => sent,
        };
        if delivered.is_err() {
            break;
        }

        if current.as_ref().map_or(false, |partial| partial.is_complete()) {
            if let Some(partial) = current.take() {
                let msdu = Msdu {
                    remote: frame.addresses[2],
                    payload: partial.assemble(),
                };
                tokio::select! {
                    _ = shutdown.wait() => break,
                    sent = incoming.send(msdu) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    shutdown.trigger();
    // dropping the incoming sender closes the MSDU receiver
}

/// Consumes outgoing MSDUs and drives the fragment/ACK/retry loop.
async fn sender_loop(
    config: OpenMsduStreamConfig,
    mut outgoing: mpsc::Receiver<Msdu>,
    mut acks: mpsc::Receiver<Frame>,
    shutdown: Shutdown,
) {
    let mut sequence: u16 = 0;

    loop {
        let msdu = tokio::select! {
            _ = shutdown.wait() => break,
            maybe = outgoing.recv() => match maybe {
                None => break,
                Some(msdu) => msdu,
            },
        };

        let sent = send_fragments(&config, &mut acks, &shutdown, sequence, msdu).await;
        sequence = (sequence + 1) & 0xfff;
        if !sent {
            break;
        }
    }
    // Unblock anything still trying to queue an MSDU.
    outgoing.close();
    while outgoing.try_recv().is_ok() {}
    shutdown.trigger();
}

/// Fragment one MSDU and transmit each piece until it is acknowledged.
/// Returns false when the stream shut down mid-transfer.
async fn send_fragments(
    config: &OpenMsduStreamConfig,
    acks: &mut mpsc::Receiver<Frame>,
    shutdown: &Shutdown,
    sequence: u16,
    msdu: Msdu,
) -> bool {
    let threshold = config.fragment_threshold.max(1);
    let count = msdu.payload.len().div_ceil(threshold);

    for i in 0..count {
        let start = i * threshold;
        let end = ((i + 1) * threshold).min(msdu.payload.len());

        let mut frame = Frame {
            frame_type: FrameType::DATA,
            to_ds: true,
            more_frag: i + 1 < count,
            duration_id: DATA_DURATION_ID,
            addresses: vec![config.bssid, config.client, msdu.remote],
            sequence_control: Some(SequenceControl::new(sequence, i as u8)),
            payload: msdu.payload.slice(start..end),
            ..Frame::default()
        };

        loop {
            let outgoing = OutgoingFrame {
                frame: frame.encode(),
                rate: Some(config.data_rate),
            };
            let delivered = tokio::select! {
                _ = shutdown.wait() => return false,
                sent = config.stream.send(outgoing) => sent,
            };
            if delivered.is_err() {
                return false;
            }

            tokio::select! {
                _ = shutdown.wait() => return false,
                _ = sleep(DATA_RESEND_TIMEOUT) => {
                    log::debug!(
                        "no ACK for fragment {} of sequence {}, retransmitting",
                        i,
                        sequence
                    );
                    frame.retry = true;
                }
                maybe = acks.recv() => match maybe {
                    None => return false,
                    Some(_) => break,
                },
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{wait_until, MockRadio};
    use crate::WifiError;
    use bytes::Bytes;

    const BSSID: Mac = Mac([0, 0x11, 0x22, 0x33, 0x44, 0x55]);
    const CLIENT: Mac = Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    const REMOTE: Mac = Mac([2, 2, 2, 2, 2, 2]);

    fn ack_to_client() -> Vec<u8> {
        Frame {
            frame_type: FrameType::ACK,
            addresses: vec![CLIENT],
            ..Frame::default()
        }
        .encode()
    }

    fn data_from_ap(sequence: u16, fragment: u8, more_frag: bool, payload: &[u8]) -> Vec<u8> {
        Frame {
            frame_type: FrameType::DATA,
            from_ds: true,
            more_frag,
            addresses: vec![CLIENT, BSSID, REMOTE],
            sequence_control: Some(SequenceControl::new(sequence, fragment)),
            payload: Bytes::copy_from_slice(payload),
            ..Frame::default()
        }
        .encode()
    }

    fn stream_over(radio: &Arc<MockRadio>, threshold: usize) -> OpenMsduStream {
        OpenMsduStream::new(OpenMsduStreamConfig {
            fragment_threshold: threshold,
            data_rate: DataRate(0x04),
            bssid: BSSID,
            client: CLIENT,
            stream: Arc::new(RawStream::new(radio.clone())),
        })
    }

    /// The scripted access point ACKs every data frame except for
    /// transmissions listed in `drop`, counted across the whole test.
    fn acking_responder(drop: &'static [usize]) -> impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send {
        let mut data_count = 0;
        move |sent| {
            let Ok(frame) = decode_frame(sent) else {
                return Vec::new();
            };
            if frame.frame_type != FrameType::DATA {
                return Vec::new();
            }
            data_count += 1;
            if drop.contains(&(data_count - 1)) {
                return Vec::new();
            }
            vec![ack_to_client()]
        }
    }

    #[tokio::test]
    async fn test_fragmentation_identity() {
        let radio = MockRadio::new(&[1]);
        radio.set_responder(acking_responder(&[]));
        let msdu_stream = stream_over(&radio, 8);

        let payload = Bytes::from_static(b"abcdefghijklmnopqrst"); // 20 bytes
        msdu_stream
            .send(Msdu {
                remote: REMOTE,
                payload: payload.clone(),
            })
            .await
            .unwrap();

        wait_until(|| radio.sent_frames().len() >= 3).await;
        let sent: Vec<Frame> = radio
            .sent_frames()
            .iter()
            .map(|f| decode_frame(&f.frame).unwrap())
            .collect();
        assert_eq!(sent.len(), 3);

        let mut reassembled = Vec::new();
        for (i, frame) in sent.iter().enumerate() {
            assert_eq!(frame.frame_type, FrameType::DATA);
            assert!(frame.to_ds);
            assert!(!frame.from_ds);
            assert_eq!(frame.addresses, vec![BSSID, CLIENT, REMOTE]);
            let sc = frame.sequence_control.unwrap();
            assert_eq!(sc.sequence, 0);
            assert_eq!(sc.fragment, i as u8);
            assert_eq!(frame.more_frag, i < 2);
            assert_eq!(frame.duration_id, 2000);
            reassembled.extend_from_slice(&frame.payload);
        }
        assert_eq!(reassembled, payload);

        // the rate hint comes from the configuration
        assert!(radio
            .sent_frames()
            .iter()
            .all(|f| f.rate == Some(DataRate(0x04))));
    }

    #[tokio::test]
    async fn test_retry_after_lost_ack() {
        let radio = MockRadio::new(&[1]);
        // drop the first transmission of fragment 1
        radio.set_responder(acking_responder(&[1]));
        let msdu_stream = stream_over(&radio, 8);

        msdu_stream
            .send(Msdu {
                remote: REMOTE,
                payload: Bytes::from_static(b"abcdefghijklmnopqrst"),
            })
            .await
            .unwrap();

        wait_until(|| radio.sent_frames().len() >= 4).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let sent: Vec<Frame> = radio
            .sent_frames()
            .iter()
            .map(|f| decode_frame(&f.frame).unwrap())
            .collect();
        assert_eq!(sent.len(), 4);

        assert!(!sent[0].retry);
        assert!(!sent[1].retry);
        // the retransmission carries the retry flag and the same
        // sequence control as the lost transmission
        assert!(sent[2].retry);
        assert_eq!(sent[2].sequence_control, sent[1].sequence_control);
        assert_eq!(sent[2].payload, sent[1].payload);
        assert!(!sent[3].retry);

        // the stream is still usable afterwards
        msdu_stream
            .send(Msdu {
                remote: REMOTE,
                payload: Bytes::from_static(b"x"),
            })
            .await
            .unwrap();
        wait_until(|| radio.sent_frames().len() >= 5).await;
    }

    #[tokio::test]
    async fn test_sequence_numbers_advance() {
        let radio = MockRadio::new(&[1]);
        radio.set_responder(acking_responder(&[]));
        let msdu_stream = stream_over(&radio, 64);

        for _ in 0..2 {
            msdu_stream
                .send(Msdu {
                    remote: REMOTE,
                    payload: Bytes::from_static(b"packet"),
                })
                .await
                .unwrap();
        }
        wait_until(|| radio.sent_frames().len() >= 2).await;

        let sent: Vec<Frame> = radio
            .sent_frames()
            .iter()
            .map(|f| decode_frame(&f.frame).unwrap())
            .collect();
        assert_eq!(sent[0].sequence_control.unwrap().sequence, 0);
        assert_eq!(sent[1].sequence_control.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_receive_reassembles_fragments() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        radio.inject(data_from_ap(7, 0, true, b"hello ")).await;
        radio.inject(data_from_ap(7, 1, false, b"world")).await;

        let msdu = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msdu.remote, REMOTE);
        assert_eq!(msdu.payload, Bytes::from_static(b"hello world"));

        // both fragments were acknowledged towards the access point
        wait_until(|| radio.sent_frames().len() >= 2).await;
        let acks: Vec<Frame> = radio
            .sent_frames()
            .iter()
            .map(|f| decode_frame(&f.frame).unwrap())
            .collect();
        assert!(acks.iter().all(|f| f.frame_type == FrameType::ACK));
        assert!(acks.iter().all(|f| f.addresses == vec![BSSID]));
        // the mid-MSDU acknowledgement reserves the medium
        assert_eq!(acks[0].duration_id, 2000);
        assert_eq!(acks[1].duration_id, 0);
    }

    #[tokio::test]
    async fn test_new_sequence_supersedes_partial() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        // fragment 0 of sequence 5 never completes
        radio.inject(data_from_ap(5, 0, true, b"stale ")).await;
        // sequence 6 arrives whole
        radio.inject(data_from_ap(6, 0, false, b"fresh")).await;

        let msdu = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msdu.payload, Bytes::from_static(b"fresh"));
    }

    #[tokio::test]
    async fn test_receive_filter() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        // not from the distribution system
        let mut wrong_direction = Frame {
            frame_type: FrameType::DATA,
            addresses: vec![CLIENT, BSSID, REMOTE],
            sequence_control: Some(SequenceControl::new(1, 0)),
            payload: Bytes::from_static(b"nope"),
            ..Frame::default()
        };
        radio.inject(wrong_direction.encode()).await;

        // wrong BSS
        wrong_direction.from_ds = true;
        wrong_direction.addresses[1] = Mac([9; 6]);
        radio.inject(wrong_direction.encode()).await;

        // someone else's traffic
        wrong_direction.addresses[1] = BSSID;
        wrong_direction.addresses[0] = Mac([8; 6]);
        radio.inject(wrong_direction.encode()).await;

        // broadcast traffic passes
        radio
            .inject(
                Frame {
                    frame_type: FrameType::DATA,
                    from_ds: true,
                    addresses: vec![Mac::BROADCAST, BSSID, REMOTE],
                    sequence_control: Some(SequenceControl::new(2, 0)),
                    payload: Bytes::from_static(b"to everyone"),
                    ..Frame::default()
                }
                .encode(),
            )
            .await;

        let msdu = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msdu.payload, Bytes::from_static(b"to everyone"));
    }

    #[tokio::test]
    async fn test_ack_flood_does_not_wedge_receiver() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        // far more ACKs than the queue holds
        for _ in 0..100 {
            radio.inject(ack_to_client()).await;
        }
        radio.inject(data_from_ap(1, 0, false, b"still here")).await;

        let msdu = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msdu.payload, Bytes::from_static(b"still here"));
    }

    #[tokio::test]
    async fn test_force_close_terminates_everything() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        msdu_stream.force_close();
        msdu_stream.force_close(); // idempotent

        // incoming reaches its terminal state without any traffic
        let end = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap();
        assert!(end.is_none());

        // outgoing refuses new MSDUs
        wait_until(|| radio.is_closed()).await;
        let result = msdu_stream
            .send(Msdu {
                remote: REMOTE,
                payload: Bytes::from_static(b"late"),
            })
            .await;
        assert!(matches!(result, Err(WifiError::TransportClosed(_))));
    }

    #[tokio::test]
    async fn test_close_drains_and_closes_raw_stream() {
        let radio = MockRadio::new(&[1]);
        radio.set_responder(acking_responder(&[]));
        let msdu_stream = stream_over(&radio, 64);

        msdu_stream
            .send(Msdu {
                remote: REMOTE,
                payload: Bytes::from_static(b"last words"),
            })
            .await
            .unwrap();
        msdu_stream.close();

        // the queued MSDU still goes out, then the radio closes
        wait_until(|| radio.is_closed()).await;
        let sent: Vec<Frame> = radio
            .sent_frames()
            .iter()
            .map(|f| decode_frame(&f.frame).unwrap())
            .collect();
        assert!(sent
            .iter()
            .any(|f| f.frame_type == FrameType::DATA
                && f.payload == Bytes::from_static(b"last words")));
    }

    #[tokio::test]
    async fn test_transport_failure_closes_stream() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        radio.fail_receive();

        let end = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_submission_order_preserved() {
        let radio = MockRadio::new(&[1]);
        radio.set_responder(acking_responder(&[]));
        let msdu_stream = stream_over(&radio, 64);

        static LABELS: [&[u8]; 3] = [b"first", b"second", b"third"];
        for label in LABELS {
            msdu_stream
                .send(Msdu {
                    remote: REMOTE,
                    payload: Bytes::from_static(label),
                })
                .await
                .unwrap();
        }

        wait_until(|| radio.sent_frames().len() >= 3).await;
        let payloads: Vec<Vec<u8>> = radio
            .sent_frames()
            .iter()
            .map(|f| decode_frame(&f.frame).unwrap().payload.to_vec())
            .collect();
        assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[tokio::test]
    async fn test_reassembly_out_of_order_yields_one_msdu() {
        let radio = MockRadio::new(&[1]);
        let msdu_stream = stream_over(&radio, 8);

        // one MSDU, fragments delivered out of order
        radio.inject(data_from_ap(3, 2, false, b"cc")).await;
        radio.inject(data_from_ap(3, 0, true, b"aa")).await;
        radio.inject(data_from_ap(3, 1, true, b"bb")).await;

        let msdu = tokio::time::timeout(Duration::from_secs(1), msdu_stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msdu.payload, Bytes::from_static(b"aabbcc"));

        // nothing further arrives
        let extra = tokio::time::timeout(Duration::from_millis(100), msdu_stream.recv()).await;
        assert!(extra.is_err(), "unexpected extra MSDU");
    }
}
