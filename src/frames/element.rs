//! Information element codec
//!
//! Management frame bodies carry an ordered list of tag-length-value
//! information elements. The element IDs live in an open integer space;
//! the named subset below is taken from section 8.4.2.1 of the
//! IEEE 802.11-2012 standard.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, WifiError};

/// An element ID for fields in 802.11 management frames.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u8);

impl ElementId {
    pub const SSID: ElementId = ElementId(0);
    pub const SUPPORTED_RATES: ElementId = ElementId(1);
    pub const FH_PARAMETER_SET: ElementId = ElementId(2);
    pub const DSSS_PARAMETER_SET: ElementId = ElementId(3);
    pub const CF_PARAMETER_SET: ElementId = ElementId(4);
    pub const TIM: ElementId = ElementId(5);
    pub const IBSS_PARAMETER_SET: ElementId = ElementId(6);
    pub const COUNTRY: ElementId = ElementId(7);
    pub const HOPPING_PATTERN_PARAMS: ElementId = ElementId(8);
    pub const HOPPING_PATTERN_TABLE: ElementId = ElementId(9);
    pub const REQUEST: ElementId = ElementId(10);
    pub const BSS_LOAD: ElementId = ElementId(11);
    pub const EDCA_PARAMETER_SET: ElementId = ElementId(12);
    pub const TSPEC: ElementId = ElementId(13);
    pub const TCLAS: ElementId = ElementId(14);
    pub const SCHEDULE: ElementId = ElementId(15);
    pub const CHALLENGE_TEXT: ElementId = ElementId(16);
    pub const POWER_CONSTRAINT: ElementId = ElementId(32);
    pub const POWER_CAPABILITY: ElementId = ElementId(33);
    pub const TPC_REQUEST: ElementId = ElementId(34);
    pub const TPC_REPORT: ElementId = ElementId(35);
    pub const SUPPORTED_CHANNELS: ElementId = ElementId(36);
    pub const CHANNEL_SWITCH_ANNOUNCEMENT: ElementId = ElementId(37);
    pub const MEASUREMENT_REQUEST: ElementId = ElementId(38);
    pub const MEASUREMENT_REPORT: ElementId = ElementId(39);
    pub const QUIET: ElementId = ElementId(40);
    pub const IBSS_DFS: ElementId = ElementId(41);
    pub const ERP: ElementId = ElementId(42);
    pub const TS_DELAY: ElementId = ElementId(43);
    pub const TCLAS_PROCESSING: ElementId = ElementId(44);
    pub const HT_CAPABILITIES: ElementId = ElementId(45);
    pub const QOS_CAPABILITY: ElementId = ElementId(46);
    pub const RSN: ElementId = ElementId(48);
    pub const EXTENDED_SUPPORTED_RATES: ElementId = ElementId(50);
    pub const AP_CHANNEL_REPORT: ElementId = ElementId(51);
    pub const NEIGHBOR_REPORT: ElementId = ElementId(52);
    pub const MOBILITY_DOMAIN: ElementId = ElementId(54);
    pub const FAST_BSS_TRANSITION: ElementId = ElementId(55);
    pub const TIMEOUT_INTERVAL: ElementId = ElementId(56);
    pub const SUPPORTED_OPERATING_CLASSES: ElementId = ElementId(59);
    pub const EXTENDED_CHANNEL_SWITCH_ANNOUNCEMENT: ElementId = ElementId(60);
    pub const HT_OPERATION: ElementId = ElementId(61);
    pub const SECONDARY_CHANNEL_OFFSET: ElementId = ElementId(62);
    pub const ANTENNA: ElementId = ElementId(64);
    pub const MEASUREMENT_PILOT_TRANSMISSION: ElementId = ElementId(66);
    pub const MULTIPLE_BSSID: ElementId = ElementId(71);
    pub const SSID_LIST: ElementId = ElementId(84);
    pub const BSS_MAX_IDLE_PERIOD: ElementId = ElementId(90);
    pub const INTERWORKING: ElementId = ElementId(107);
    pub const MESH_ID: ElementId = ElementId(114);
    pub const EXTENDED_CAPABILITIES: ElementId = ElementId(127);
    pub const VENDOR_SPECIFIC: ElementId = ElementId(221);

    /// A human-readable name for this ID, if one is defined.
    pub fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "SSID",
            1 => "Supported Rates",
            2 => "FH Parameter Set",
            3 => "DSSS Parameter Set",
            4 => "CF Parameter Set",
            5 => "TIM",
            6 => "IBSS Parameter Set",
            7 => "Country",
            8 => "Hopping Pattern Parameters",
            9 => "Hopping Pattern Table",
            10 => "Request",
            11 => "BSS Load",
            12 => "EDCA Parameter Set",
            13 => "TSPEC",
            14 => "TCLAS",
            15 => "Schedule",
            16 => "Challenge Text",
            32 => "Power Constraint",
            33 => "Power Capability",
            34 => "TPC Request",
            35 => "TPC Report",
            36 => "Supported Channels",
            37 => "Channel Switch Announcement",
            38 => "Measurement Request",
            39 => "Measurement Report",
            40 => "Quiet",
            41 => "IBSS DFS",
            42 => "ERP",
            43 => "TS Delay",
            44 => "TCLAS Processing",
            45 => "HT Capabilities",
            46 => "QoS Capability",
            48 => "RSN",
            50 => "Extended Supported Rates",
            51 => "AP Channel Report",
            52 => "Neighbor Report",
            54 => "Mobility Domain",
            55 => "Fast BSS Transition",
            56 => "Timeout Interval",
            59 => "Supported Operating Classes",
            60 => "Extended Channel Switch Announcement",
            61 => "HT Operation",
            62 => "Secondary Channel Offset",
            64 => "Antenna",
            66 => "Measurement Pilot Transmission",
            71 => "Multiple BSSID",
            84 => "SSID List",
            90 => "BSS Max Idle Period",
            107 => "Interworking",
            114 => "Mesh ID",
            127 => "Extended Capabilities",
            221 => "Vendor Specific",
            _ => return None,
        })
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "ElementId({})", self.0),
        }
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// An information element from a management frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element ID.
    pub id: ElementId,
    /// Element value, at most 255 bytes.
    pub value: Bytes,
}

impl Element {
    /// Create a new element.
    pub fn new(id: ElementId, value: impl Into<Bytes>) -> Self {
        Element {
            id,
            value: value.into(),
        }
    }
}

/// An ordered list of information elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Elements(pub Vec<Element>);

impl Elements {
    /// Create an empty element list.
    pub fn new() -> Self {
        Elements(Vec::new())
    }

    /// Decode a list of elements from a management frame body.
    ///
    /// Each element is an `(id, length, value)` triple. A length that runs
    /// past the end of the buffer fails with `BufferUnderflow`; trailing
    /// bytes too short to form another element fail with `BufferOverflow`.
    pub fn decode(buf: &[u8]) -> Result<Elements> {
        let mut res = Vec::new();
        let mut i = 0;
        while i + 2 < buf.len() {
            let id = ElementId(buf[i]);
            let length = buf[i + 1] as usize;
            if i + 2 + length > buf.len() {
                return Err(WifiError::BufferUnderflow);
            }
            let value = Bytes::copy_from_slice(&buf[i + 2..i + 2 + length]);
            res.push(Element { id, value });
            i += 2 + length;
        }
        if i < buf.len() {
            return Err(WifiError::BufferOverflow);
        }
        Ok(Elements(res))
    }

    /// Encode the elements back-to-back, preserving order and duplicates.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for element in &self.0 {
            buf.put_u8(element.id.0);
            buf.put_u8(element.value.len() as u8);
            buf.put_slice(&element.value);
        }
        buf.to_vec()
    }

    /// Look up the value of the first element with the given ID.
    pub fn get(&self, id: ElementId) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|element| element.id == id)
            .map(|element| element.value.as_ref())
    }

    /// Append an element to the list.
    pub fn push(&mut self, id: ElementId, value: impl Into<Bytes>) {
        self.0.push(Element::new(id, value));
    }

    /// Number of elements in the list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.0.iter()
    }
}
