//! Open-network connection handshake
//!
//! Connecting to an access point is a two-step exchange: an open-system
//! authentication followed by an association. The driver transmits each
//! request, waits for the matching reply while ignoring unrelated
//! traffic, and acknowledges what the access point sends back.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use crate::frames::association::{AssocRequest, AssocResponse};
use crate::frames::authentication::Authentication;
use crate::frames::bss::BssDescription;
use crate::frames::element::{Element, ElementId, Elements};
use crate::frames::frame::{decode_frame, Frame, FrameType, SequenceControl};
use crate::frames::mac::Mac;
use crate::radio::{Channel, OutgoingFrame, RadioPacket};
use crate::raw_stream::RawStream;
use crate::{Result, WifiError};

/// The 802.11 duration ID used for all authentication and association
/// frames. This value was captured from a real phone's handshake.
pub const HANDSHAKE_DURATION_ID: u16 = 60;

/// Drives the authenticate/associate exchange against an access point.
pub struct Handshaker {
    /// The stream to talk through.
    pub stream: Arc<RawStream>,
    /// The MAC address to present as this client.
    pub client: Mac,
    /// The network to connect to.
    pub bss: BssDescription,
}

impl Handshaker {
    /// Perform the handshake for an open network, bounded by a single
    /// overall timeout.
    pub async fn handshake_open(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        self.stream
            .set_channel(Channel::new(self.bss.channel))
            .await?;

        self.authenticate_open(deadline).await?;
        self.associate(deadline).await
    }

    async fn authenticate_open(&self, deadline: Instant) -> Result<()> {
        let mut frame = Authentication::new_open(self.bss.bssid, self.client).encode_to_frame();
        frame.duration_id = HANDSHAKE_DURATION_ID;
        self.stream.send(OutgoingFrame::new(frame.encode())).await?;
        log::debug!("sent open authentication to {}", self.bss.bssid);

        loop {
            let packet = self.wait_packet(deadline).await?;
            let Ok(frame) = decode_frame(&packet.frame) else {
                continue;
            };
            if frame.version != 0 || frame.frame_type != FrameType::AUTHENTICATION {
                continue;
            }
            let Ok(auth) = Authentication::decode(&frame) else {
                continue;
            };
            if auth.addresses.len() != 3
                || auth.addresses[0] != self.client
                || auth.addresses[1] != self.bss.bssid
                || auth.addresses[2] != self.bss.bssid
            {
                continue;
            }

            self.send_ack(auth.addresses[2]).await?;

            return if auth.success() {
                Ok(())
            } else {
                Err(WifiError::AuthenticationRejected(auth.status_code))
            };
        }
    }

    async fn associate(&self, deadline: Instant) -> Result<()> {
        let request = AssocRequest {
            bssid: self.bss.bssid,
            client: self.client,
            capabilities: 0,
            // the listen interval a real phone used
            interval: 3,
            elements: Elements(vec![
                Element::new(
                    ElementId::SSID,
                    self.bss.ssid.as_bytes().to_vec(),
                ),
                Element::new(
                    ElementId::SUPPORTED_RATES,
                    self.bss.basic_rates.clone(),
                ),
            ]),
        };

        let mut frame = request.encode_to_frame();
        frame.duration_id = HANDSHAKE_DURATION_ID;
        // The authentication frame used fragment zero of sequence zero,
        // so this one advances to sequence one.
        frame.sequence_control = Some(SequenceControl::new(1, 0));

        self.stream.send(OutgoingFrame::new(frame.encode())).await?;
        log::debug!("sent association request to {}", self.bss.bssid);

        loop {
            let packet = self.wait_packet(deadline).await?;
            let Ok(frame) = decode_frame(&packet.frame) else {
                continue;
            };
            if frame.version != 0 || frame.frame_type != FrameType::ASSOC_RESPONSE {
                continue;
            }
            let Ok(response) = AssocResponse::decode(&frame) else {
                continue;
            };
            if response.bssid != self.bss.bssid || response.client != self.client {
                continue;
            }

            self.send_ack(response.bssid).await?;

            return if response.success() {
                Ok(())
            } else {
                Err(WifiError::AssociationRejected(response.status_code))
            };
        }
    }

    /// Wait for the next incoming packet, but never past the deadline.
    async fn wait_packet(&self, deadline: Instant) -> Result<RadioPacket> {
        // The non-blocking check guarantees we never read another packet
        // once the deadline has expired, even when the queue is ready.
        if Instant::now() >= deadline {
            return Err(WifiError::HandshakeTimeout);
        }
        tokio::select! {
            biased;
            _ = sleep_until(deadline) => Err(WifiError::HandshakeTimeout),
            maybe = self.stream.recv() => match maybe {
                Some(packet) => Ok(packet),
                None => Err(self.stream.closed_error()),
            },
        }
    }

    async fn send_ack(&self, to: Mac) -> Result<()> {
        let ack = Frame {
            frame_type: FrameType::ACK,
            addresses: vec![to],
            ..Frame::default()
        };
        self.stream.send(OutgoingFrame::new(ack.encode())).await
    }
}
