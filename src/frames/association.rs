//! Association request and response frames

use bytes::{BufMut, BytesMut};

use crate::frames::element::Elements;
use crate::frames::frame::{Frame, FrameType, SequenceControl};
use crate::frames::mac::Mac;
use crate::{Result, WifiError};

/// An association request, sent by a client after authenticating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocRequest {
    pub bssid: Mac,
    pub client: Mac,

    /// The capability bits the client advertises.
    pub capabilities: u16,
    /// The listen interval, in beacon intervals.
    pub interval: u16,

    pub elements: Elements,
}

impl AssocRequest {
    /// Extract association request information from a frame.
    pub fn decode(frame: &Frame) -> Result<AssocRequest> {
        if frame.payload.len() < 4 {
            return Err(WifiError::BufferUnderflow);
        }
        if frame.addresses.len() < 2 {
            return Err(WifiError::BufferUnderflow);
        }

        let payload = &frame.payload;
        Ok(AssocRequest {
            bssid: frame.addresses[0],
            client: frame.addresses[1],
            capabilities: u16::from_le_bytes([payload[0], payload[1]]),
            interval: u16::from_le_bytes([payload[2], payload[3]]),
            elements: Elements::decode(&payload[4..])?,
        })
    }

    /// Generate a frame which represents this association request.
    pub fn encode_to_frame(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u16_le(self.capabilities);
        buf.put_u16_le(self.interval);
        buf.put_slice(&self.elements.encode());

        Frame {
            version: 0,
            frame_type: FrameType::ASSOC_REQUEST,
            sequence_control: Some(SequenceControl::default()),
            addresses: vec![self.bssid, self.client, self.bssid],
            payload: buf.freeze(),
            ..Frame::default()
        }
    }
}

/// An association response, sent by an access point to accept or reject
/// a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssocResponse {
    pub bssid: Mac,
    pub client: Mac,

    /// The capability bits the access point advertises.
    pub capabilities: u16,
    /// The status code; 0 indicates success.
    pub status_code: u16,
    /// The association ID assigned to the client.
    pub association_id: u16,

    pub elements: Elements,
}

impl AssocResponse {
    /// Extract association response information from a frame.
    pub fn decode(frame: &Frame) -> Result<AssocResponse> {
        if frame.payload.len() < 6 {
            return Err(WifiError::BufferUnderflow);
        }
        if frame.addresses.len() < 2 {
            return Err(WifiError::BufferUnderflow);
        }

        let payload = &frame.payload;
        Ok(AssocResponse {
            client: frame.addresses[0],
            bssid: frame.addresses[1],
            capabilities: u16::from_le_bytes([payload[0], payload[1]]),
            status_code: u16::from_le_bytes([payload[2], payload[3]]),
            association_id: u16::from_le_bytes([payload[4], payload[5]]),
            elements: Elements::decode(&payload[6..])?,
        })
    }

    /// Generate a frame which represents this association response.
    pub fn encode_to_frame(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u16_le(self.capabilities);
        buf.put_u16_le(self.status_code);
        buf.put_u16_le(self.association_id);
        buf.put_slice(&self.elements.encode());

        Frame {
            version: 0,
            frame_type: FrameType::ASSOC_RESPONSE,
            sequence_control: Some(SequenceControl::default()),
            addresses: vec![self.client, self.bssid, self.bssid],
            payload: buf.freeze(),
            ..Frame::default()
        }
    }

    /// Whether the status code indicates success.
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}
