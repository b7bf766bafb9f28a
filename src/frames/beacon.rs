//! Beacon frames

use bytes::{BufMut, BytesMut};

use crate::frames::bss::{BssDescription, BssType};
use crate::frames::element::{ElementId, Elements};
use crate::frames::frame::{Frame, FrameType, SequenceControl};
use crate::frames::mac::Mac;
use crate::{Result, WifiError};

/// A Beacon stores the information access points broadcast about their
/// network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    /// The network identifier, taken from the transmitter address.
    pub bssid: Mac,

    /// The access point's timer, in microseconds.
    pub timestamp: u64,
    /// The beacon interval, in time units.
    pub interval: u16,
    /// Capability bits.
    pub capabilities: u16,

    /// The advertised information elements.
    pub elements: Elements,
}

impl Beacon {
    /// Extract beacon information from a frame.
    pub fn decode(frame: &Frame) -> Result<Beacon> {
        if frame.payload.len() < 12 {
            return Err(WifiError::BufferUnderflow);
        }
        let bssid = *frame.addresses.get(1).ok_or(WifiError::BufferUnderflow)?;

        let payload = &frame.payload;
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&payload[..8]);

        Ok(Beacon {
            bssid,
            timestamp: u64::from_le_bytes(timestamp),
            interval: u16::from_le_bytes([payload[8], payload[9]]),
            capabilities: u16::from_le_bytes([payload[10], payload[11]]),
            elements: Elements::decode(&payload[12..])?,
        })
    }

    /// The SSID element as a string.
    pub fn ssid(&self) -> String {
        match self.elements.get(ElementId::SSID) {
            Some(value) => String::from_utf8_lossy(value).into_owned(),
            None => String::new(),
        }
    }

    /// The station's self-reported channel number.
    pub fn channel(&self) -> Option<u8> {
        match self.elements.get(ElementId::DSSS_PARAMETER_SET) {
            Some(value) if value.len() == 1 => Some(value[0]),
            _ => None,
        }
    }

    /// Build a BSS description from the information in this beacon.
    pub fn bss_description(&self) -> BssDescription {
        // Capability bit 0 advertises an infrastructure network and bit 1
        // an independent one; neither means mesh. Both set is treated as
        // infrastructure.
        let bss_type = match self.capabilities & 3 {
            0 => BssType::Mesh,
            2 => BssType::Independent,
            _ => BssType::Infrastructure,
        };

        let mut basic_rates = Vec::new();
        let mut operational_rates = Vec::new();

        // Basic rates have the highest bit set, others do not.
        for id in [ElementId::SUPPORTED_RATES, ElementId::EXTENDED_SUPPORTED_RATES] {
            for &rate in self.elements.get(id).unwrap_or_default() {
                if rate & 0x80 != 0 {
                    basic_rates.push(rate & 0x7f);
                }
                operational_rates.push(rate & 0x7f);
            }
        }

        BssDescription {
            bssid: self.bssid,
            ssid: self.ssid(),
            channel: self.channel().unwrap_or(0),
            bss_type,
            basic_rates,
            operational_rates,
        }
    }

    /// Generate an 802.11 frame which represents this beacon.
    pub fn encode_to_frame(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_u64_le(self.timestamp);
        buf.put_u16_le(self.interval);
        buf.put_u16_le(self.capabilities);
        buf.put_slice(&self.elements.encode());

        Frame {
            version: 0,
            frame_type: FrameType::BEACON,
            sequence_control: Some(SequenceControl::default()),
            addresses: vec![Mac::BROADCAST, self.bssid, self.bssid],
            payload: buf.freeze(),
            ..Frame::default()
        }
    }
}
