//! Authentication frames

use bytes::{BufMut, BytesMut};

use crate::frames::element::Elements;
use crate::frames::frame::{Frame, FrameType, SequenceControl};
use crate::frames::mac::Mac;
use crate::{Result, WifiError};

/// Authentication frames are exchanged at the beginning of a new
/// client-router connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    /// The three-address tuple, carried verbatim so callers can compose
    /// it for their role in the exchange.
    pub addresses: Vec<Mac>,

    /// The authentication algorithm; 0 is open system.
    pub algorithm: u16,
    /// The position in the authentication exchange, starting at 1.
    pub sequence_number: u16,
    /// The status code; 0 indicates success.
    pub status_code: u16,

    pub elements: Elements,
}

impl Authentication {
    /// Generate the initial authentication frame for an open network.
    /// This is useful for every kind of network besides WEP networks.
    pub fn new_open(bssid: Mac, client: Mac) -> Authentication {
        Authentication {
            addresses: vec![bssid, client, bssid],
            algorithm: 0,
            sequence_number: 1,
            status_code: 0,
            elements: Elements::new(),
        }
    }

    /// Extract authentication information from a frame.
    pub fn decode(frame: &Frame) -> Result<Authentication> {
        if frame.payload.len() < 6 {
            return Err(WifiError::BufferUnderflow);
        }

        let payload = &frame.payload;
        Ok(Authentication {
            addresses: frame.addresses.clone(),
            algorithm: u16::from_le_bytes([payload[0], payload[1]]),
            sequence_number: u16::from_le_bytes([payload[2], payload[3]]),
            status_code: u16::from_le_bytes([payload[4], payload[5]]),
            elements: Elements::decode(&payload[6..])?,
        })
    }

    /// Generate a frame which represents this authentication frame.
    pub fn encode_to_frame(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u16_le(self.algorithm);
        buf.put_u16_le(self.sequence_number);
        buf.put_u16_le(self.status_code);
        buf.put_slice(&self.elements.encode());

        Frame {
            version: 0,
            frame_type: FrameType::AUTHENTICATION,
            sequence_control: Some(SequenceControl::default()),
            addresses: self.addresses.clone(),
            payload: buf.freeze(),
            ..Frame::default()
        }
    }

    /// Whether the status code indicates success.
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}
