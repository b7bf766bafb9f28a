//! 802.11 MAC frame codec
//!
//! Frames are decoded from and encoded to complete MPDUs, including the
//! trailing 32-bit FCS. The set of header fields present after the frame
//! control and duration fields is a pure function of the frame type and
//! the ToDS/FromDS/Order flags; `header_layout` is the single place that
//! encodes those rules.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frames::mac::Mac;
use crate::{Result, WifiError};

/// A frame type is the pair of a 2-bit major type and a 4-bit subtype,
/// packed as `(major << 4) | subtype`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameType(pub u8);

impl FrameType {
    /// Management major type.
    pub const MAJOR_MANAGEMENT: u8 = 0;
    /// Control major type.
    pub const MAJOR_CONTROL: u8 = 1;
    /// Data major type.
    pub const MAJOR_DATA: u8 = 2;

    // Management frame types, IEEE 802.11-2012 page 382.
    pub const ASSOC_REQUEST: FrameType = FrameType(0x00);
    pub const ASSOC_RESPONSE: FrameType = FrameType(0x01);
    pub const REASSOC_REQUEST: FrameType = FrameType(0x02);
    pub const REASSOC_RESPONSE: FrameType = FrameType(0x03);
    pub const PROBE_REQUEST: FrameType = FrameType(0x04);
    pub const PROBE_RESPONSE: FrameType = FrameType(0x05);
    pub const BEACON: FrameType = FrameType(0x08);
    pub const ATIM: FrameType = FrameType(0x09);
    pub const DISASSOC: FrameType = FrameType(0x0a);
    pub const AUTHENTICATION: FrameType = FrameType(0x0b);
    pub const DEAUTHENTICATION: FrameType = FrameType(0x0c);
    pub const ACTION: FrameType = FrameType(0x0d);
    pub const ACTION_NO_ACK: FrameType = FrameType(0x0e);

    // Control frame types, IEEE 802.11-2012 page 383.
    pub const CONTROL_WRAPPER: FrameType = FrameType(0x17);
    pub const BLOCK_ACK_REQUEST: FrameType = FrameType(0x18);
    pub const BLOCK_ACK: FrameType = FrameType(0x19);
    pub const PS_POLL: FrameType = FrameType(0x1a);
    pub const RTS: FrameType = FrameType(0x1b);
    pub const CTS: FrameType = FrameType(0x1c);
    pub const ACK: FrameType = FrameType(0x1d);
    pub const CF_END: FrameType = FrameType(0x1e);
    pub const CF_END_CF_ACK: FrameType = FrameType(0x1f);

    // Data frame types, IEEE 802.11-2012 page 383.
    pub const DATA: FrameType = FrameType(0x20);
    pub const DATA_CF_ACK: FrameType = FrameType(0x21);
    pub const DATA_CF_POLL: FrameType = FrameType(0x22);
    pub const DATA_CF_ACK_CF_POLL: FrameType = FrameType(0x23);
    pub const NULL: FrameType = FrameType(0x24);
    pub const NULL_CF_ACK: FrameType = FrameType(0x25);
    pub const NULL_CF_POLL: FrameType = FrameType(0x26);
    pub const NULL_CF_ACK_CF_POLL: FrameType = FrameType(0x27);
    pub const QOS_DATA: FrameType = FrameType(0x28);
    pub const QOS_DATA_CF_ACK: FrameType = FrameType(0x29);
    pub const QOS_DATA_CF_POLL: FrameType = FrameType(0x2a);
    pub const QOS_DATA_CF_ACK_CF_POLL: FrameType = FrameType(0x2b);
    pub const QOS_NULL: FrameType = FrameType(0x2c);
    pub const QOS_NULL_CF_POLL: FrameType = FrameType(0x2e);
    pub const QOS_NULL_CF_ACK_CF_POLL: FrameType = FrameType(0x2f);

    /// Build a frame type from a major type and subtype.
    pub fn new(major: u8, subtype: u8) -> Self {
        FrameType(((major & 0x3) << 4) | (subtype & 0xf))
    }

    /// The 2-bit major type number.
    pub fn major(self) -> u8 {
        self.0 >> 4
    }

    /// The 4-bit subtype number.
    pub fn subtype(self) -> u8 {
        self.0 & 0xf
    }

    /// Whether this frame type is part of the recognized 802.11-2012 set.
    pub fn is_known(self) -> bool {
        self.name().is_some()
    }

    /// A long human-readable name for this frame type, if one is defined.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            FrameType::ASSOC_REQUEST => "Association Request",
            FrameType::ASSOC_RESPONSE => "Association Response",
            FrameType::REASSOC_REQUEST => "Reassociation Request",
            FrameType::REASSOC_RESPONSE => "Reassociation Response",
            FrameType::PROBE_REQUEST => "Probe Request",
            FrameType::PROBE_RESPONSE => "Probe Response",
            FrameType::BEACON => "Beacon",
            FrameType::ATIM => "Announcement Traffic Indication Message",
            FrameType::DISASSOC => "Disassociation",
            FrameType::AUTHENTICATION => "Authentication",
            FrameType::DEAUTHENTICATION => "Deauthentication",
            FrameType::ACTION => "Action",
            FrameType::ACTION_NO_ACK => "Action (No Ack)",

            FrameType::CONTROL_WRAPPER => "Control Wrapper",
            FrameType::BLOCK_ACK_REQUEST => "Block Ack Request",
            FrameType::BLOCK_ACK => "Block Ack",
            FrameType::PS_POLL => "PS-Poll",
            FrameType::RTS => "Request to Send",
            FrameType::CTS => "Clear to Send",
            FrameType::ACK => "Acknowledgement",
            FrameType::CF_END => "CF-End",
            FrameType::CF_END_CF_ACK => "CF-End + CF-Ack",

            FrameType::DATA => "Data",
            FrameType::DATA_CF_ACK => "Data + CF-Ack",
            FrameType::DATA_CF_POLL => "Data + CF-Poll",
            FrameType::DATA_CF_ACK_CF_POLL => "Data + CF-Ack + CF-Poll",
            FrameType::NULL => "Null",
            FrameType::NULL_CF_ACK => "Null + CF-Ack",
            FrameType::NULL_CF_POLL => "Null + CF-Poll",
            FrameType::NULL_CF_ACK_CF_POLL => "Null + CF-Ack + CF-Poll",
            FrameType::QOS_DATA => "QoS Data",
            FrameType::QOS_DATA_CF_ACK => "QoS Data + CF-Ack",
            FrameType::QOS_DATA_CF_POLL => "QoS Data + CF-Poll",
            FrameType::QOS_DATA_CF_ACK_CF_POLL => "QoS Data + CF-Ack + CF-Poll",
            FrameType::QOS_NULL => "QoS Null",
            FrameType::QOS_NULL_CF_POLL => "QoS Null + CF-Poll",
            FrameType::QOS_NULL_CF_ACK_CF_POLL => "QoS Null + CF-Ack + CF-Poll",
            _ => return None,
        })
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "FrameType({})", self.0),
        }
    }
}

impl fmt::Debug for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// The 16-bit sequence control field: a 4-bit fragment number in the low
/// bits and a 12-bit sequence number in the high bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceControl {
    /// Fragment number (4 bits).
    pub fragment: u8,
    /// Sequence number (12 bits).
    pub sequence: u16,
}

impl SequenceControl {
    /// Create a sequence control value, masking both fields to their
    /// on-the-wire widths.
    pub fn new(sequence: u16, fragment: u8) -> Self {
        SequenceControl {
            fragment: fragment & 0xf,
            sequence: sequence & 0xfff,
        }
    }

    /// Unpack from the wire representation.
    pub fn from_raw(raw: u16) -> Self {
        SequenceControl {
            fragment: (raw & 0xf) as u8,
            sequence: raw >> 4,
        }
    }

    /// Pack into the wire representation.
    pub fn to_raw(self) -> u16 {
        (self.sequence << 4) | self.fragment as u16
    }
}

/// A Frame is the fundamental unit of communication on WiFi networks.
///
/// Optional header fields are `Some` exactly when the frame type and
/// flags call for them; `decode_frame` upholds this, and `encode` trusts
/// the caller to supply a consistent set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Protocol version; only 0 is defined.
    pub version: u8,
    /// The frame type and subtype.
    pub frame_type: FrameType,

    pub from_ds: bool,
    pub to_ds: bool,
    pub more_frag: bool,
    pub retry: bool,
    pub power_management: bool,
    pub more_data: bool,
    pub encrypted: bool,
    pub order: bool,

    /// Present in all frames; its meaning varies across frame types.
    pub duration_id: u16,

    /// Ordered list of MAC addresses from the header. The number of
    /// addresses is determined by the frame type and flags.
    pub addresses: Vec<Mac>,

    /// Present in management and data frames.
    pub sequence_control: Option<SequenceControl>,

    /// The frame control field of the carried frame; control wrapper
    /// frames only.
    pub carried_frame_control: Option<u16>,

    /// Present in QoS data subtypes only.
    pub qos_control: Option<u16>,

    /// Present when the Order flag is set on eligible subtypes, and
    /// always on control wrapper frames.
    pub ht_control: Option<u32>,

    /// The frame body, between the header and the trailing checksum.
    pub payload: Bytes,
}

/// Which optional header fields a frame carries, and how many addresses.
#[derive(Debug, Clone, Copy, Default)]
struct HeaderLayout {
    addresses: usize,
    sequence_control: bool,
    carried_frame_control: bool,
    qos_control: bool,
    ht_control: bool,
}

fn header_layout(frame_type: FrameType, to_ds: bool, from_ds: bool, order: bool) -> HeaderLayout {
    match frame_type.major() {
        FrameType::MAJOR_MANAGEMENT => HeaderLayout {
            addresses: 3,
            sequence_control: true,
            ht_control: order,
            ..HeaderLayout::default()
        },
        FrameType::MAJOR_DATA => {
            let qos = frame_type.subtype() >= 8;
            HeaderLayout {
                addresses: if to_ds && from_ds { 4 } else { 3 },
                sequence_control: true,
                qos_control: qos,
                ht_control: qos && order,
                ..HeaderLayout::default()
            }
        }
        FrameType::MAJOR_CONTROL => match frame_type {
            FrameType::CONTROL_WRAPPER => HeaderLayout {
                addresses: 1,
                carried_frame_control: true,
                ht_control: true,
                ..HeaderLayout::default()
            },
            FrameType::CTS | FrameType::ACK => HeaderLayout {
                addresses: 1,
                ..HeaderLayout::default()
            },
            FrameType::RTS
            | FrameType::PS_POLL
            | FrameType::CF_END
            | FrameType::CF_END_CF_ACK
            | FrameType::BLOCK_ACK
            | FrameType::BLOCK_ACK_REQUEST => HeaderLayout {
                addresses: 2,
                ..HeaderLayout::default()
            },
            _ => HeaderLayout::default(),
        },
        _ => HeaderLayout::default(),
    }
}

/// Bounds-checked reader over the header bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.pos + count > self.data.len() {
            return Err(WifiError::BufferUnderflow);
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn mac(&mut self) -> Result<Mac> {
        let slice = self.take(6)?;
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(Mac(bytes))
    }

    fn u16_le(&mut self) -> Result<u16> {
        let slice = self.take(2)?;
        Ok(u16::from_le_bytes([slice[0], slice[1]]))
    }

    fn u32_le(&mut self) -> Result<u32> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

/// Compute the 32-bit frame check sequence (CRC-32, same polynomial as
/// Ethernet).
pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFFu32;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}

/// Decode a raw WiFi frame. The data must include the trailing 32-bit
/// checksum.
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    if data.len() < 8 {
        return Err(WifiError::BufferUnderflow);
    }

    let body = &data[..data.len() - 4];
    let mut sent = [0u8; 4];
    sent.copy_from_slice(&data[data.len() - 4..]);
    if crc32(body) != u32::from_le_bytes(sent) {
        return Err(WifiError::BadChecksum);
    }

    let version = data[0] & 0x3;
    if version != 0 {
        return Err(WifiError::UnknownFrameVersion);
    }

    let frame_type = FrameType::new((data[0] >> 2) & 0x3, (data[0] >> 4) & 0xf);
    if !frame_type.is_known() {
        return Err(WifiError::UnknownFrameType);
    }

    let flags = data[1];
    let mut frame = Frame {
        version,
        frame_type,
        from_ds: flags & (1 << 0) != 0,
        to_ds: flags & (1 << 1) != 0,
        more_frag: flags & (1 << 2) != 0,
        retry: flags & (1 << 3) != 0,
        power_management: flags & (1 << 4) != 0,
        more_data: flags & (1 << 5) != 0,
        encrypted: flags & (1 << 6) != 0,
        order: flags & (1 << 7) != 0,
        duration_id: u16::from_le_bytes([data[2], data[3]]),
        ..Frame::default()
    };

    let layout = header_layout(frame_type, frame.to_ds, frame.from_ds, frame.order);
    let mut reader = Reader::new(&data[4..data.len() - 4]);

    for _ in 0..layout.addresses.min(3) {
        frame.addresses.push(reader.mac()?);
    }

    if layout.sequence_control {
        frame.sequence_control = Some(SequenceControl::from_raw(reader.u16_le()?));
    }

    if layout.addresses == 4 {
        frame.addresses.push(reader.mac()?);
    }

    if layout.carried_frame_control {
        frame.carried_frame_control = Some(reader.u16_le()?);
    }

    if layout.qos_control {
        frame.qos_control = Some(reader.u16_le()?);
    }

    if layout.ht_control {
        frame.ht_control = Some(reader.u32_le()?);
    }

    frame.payload = Bytes::copy_from_slice(reader.rest());

    Ok(frame)
}

impl Frame {
    /// Whether the frame is a WiFi beacon.
    pub fn is_beacon(&self) -> bool {
        self.version == 0 && self.frame_type == FrameType::BEACON
    }

    /// Encode the frame as binary, appending a freshly computed checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(36 + self.payload.len());

        buf.put_u8((self.frame_type.subtype() << 4) | (self.frame_type.major() << 2) | self.version);

        let flags = [
            self.from_ds,
            self.to_ds,
            self.more_frag,
            self.retry,
            self.power_management,
            self.more_data,
            self.encrypted,
            self.order,
        ];
        let mut flag_byte = 0u8;
        for (i, &flag) in flags.iter().enumerate() {
            if flag {
                flag_byte |= 1 << i;
            }
        }
        buf.put_u8(flag_byte);

        buf.put_u16_le(self.duration_id);

        for address in self.addresses.iter().take(3) {
            buf.put_slice(address.as_bytes());
        }

        if let Some(sequence_control) = self.sequence_control {
            buf.put_u16_le(sequence_control.to_raw());
        }

        if self.addresses.len() == 4 {
            buf.put_slice(self.addresses[3].as_bytes());
        }

        if let Some(carried) = self.carried_frame_control {
            buf.put_u16_le(carried);
        }

        if let Some(qos) = self.qos_control {
            buf.put_u16_le(qos);
        }

        if let Some(ht) = self.ht_control {
            buf.put_u32_le(ht);
        }

        buf.put_slice(&self.payload);

        let checksum = crc32(&buf);
        buf.put_u32_le(checksum);

        buf.to_vec()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (v{}):", self.frame_type, self.version)?;
        for flag in [
            self.from_ds,
            self.to_ds,
            self.more_frag,
            self.retry,
            self.power_management,
            self.more_data,
            self.encrypted,
            self.order,
        ] {
            write!(f, "{}", flag as u8)?;
        }
        write!(f, " durID={} addrs=[", self.duration_id)?;
        for (i, address) in self.addresses.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", address)?;
        }
        write!(f, "]")?;
        if let Some(sequence_control) = self.sequence_control {
            write!(f, " seq={}", sequence_control.to_raw())?;
        }
        if let Some(carried) = self.carried_frame_control {
            write!(f, " carriedFC={}", carried)?;
        }
        if let Some(qos) = self.qos_control {
            write!(f, " qosCtl={}", qos)?;
        }
        if let Some(ht) = self.ht_control {
            write!(f, " htCtl={}", ht)?;
        }
        if !self.payload.is_empty() {
            write!(f, " payload={}B", self.payload.len())?;
        }
        Ok(())
    }
}
