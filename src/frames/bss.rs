//! Basic service set descriptions

use serde::{Deserialize, Serialize};

use crate::frames::mac::Mac;

/// The kind of network a BSS is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BssType {
    /// An ad-hoc (IBSS) network.
    Independent,
    /// An infrastructure network with an access point.
    Infrastructure,
    /// A mesh network.
    Mesh,
}

/// A description of a basic service set, as gathered from a beacon.
///
/// The fields mirror section 6.3.3.3.2 of the IEEE 802.11-2012 standard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BssDescription {
    /// The network identifier.
    pub bssid: Mac,
    /// The human-readable network name.
    pub ssid: String,
    /// The channel the network operates on, 0 when the beacon did not
    /// advertise one.
    pub channel: u8,
    /// The kind of network.
    pub bss_type: BssType,

    /// Rates every station in the BSS must support, in 500 kb/s units.
    pub basic_rates: Vec<u8>,
    /// All rates the BSS operates with, in 500 kb/s units.
    pub operational_rates: Vec<u8>,
}
