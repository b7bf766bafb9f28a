//! Physical layer abstraction for monitor-mode radio access
//!
//! The stack drives an abstract radio handle that exchanges complete
//! 802.11 MPDUs (checksum included) and exposes channel and rate
//! control. Backends implement [`RadioHandle`] for their hardware.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelWidth {
    /// 20 MHz bandwidth.
    #[default]
    Mhz20,
    /// 40 MHz bandwidth.
    Mhz40,
    /// 80 MHz bandwidth.
    Mhz80,
    /// 160 MHz bandwidth.
    Mhz160,
}

impl ChannelWidth {
    /// The bandwidth in MHz.
    pub fn mhz(&self) -> u16 {
        match self {
            ChannelWidth::Mhz20 => 20,
            ChannelWidth::Mhz40 => 40,
            ChannelWidth::Mhz80 => 80,
            ChannelWidth::Mhz160 => 160,
        }
    }
}

/// A wireless channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel number (1-14 for the 2.4 GHz band).
    pub number: u8,
    /// Channel width.
    pub width: ChannelWidth,
}

impl Channel {
    /// Create a 20 MHz channel with the given number.
    pub fn new(number: u8) -> Self {
        Channel {
            number,
            width: ChannelWidth::default(),
        }
    }
}

/// A transmission rate in 500 kb/s units, the encoding rate values use
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataRate(pub u16);

impl DataRate {
    /// The rate in kilobits per second.
    pub fn kilobits(self) -> u32 {
        self.0 as u32 * 500
    }
}

/// Metadata the radio reports alongside a received frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioInfo {
    /// Channel frequency in MHz, if the radio reports it.
    pub frequency: Option<u16>,
    /// Signal strength in dBm.
    pub signal_dbm: Option<i8>,
    /// Noise floor in dBm.
    pub noise_dbm: Option<i8>,
}

/// A frame received from the radio, with its metadata.
#[derive(Debug, Clone)]
pub struct RadioPacket {
    /// The raw MPDU, including the trailing checksum.
    pub frame: Bytes,
    /// Radio metadata.
    pub radio: RadioInfo,
}

/// A frame to transmit, with an optional rate hint.
#[derive(Debug, Clone)]
pub struct OutgoingFrame {
    /// The raw MPDU, including the trailing checksum.
    pub frame: Vec<u8>,
    /// The rate to transmit at; the radio picks when absent.
    pub rate: Option<DataRate>,
}

impl OutgoingFrame {
    /// Create an outgoing frame with no rate hint.
    pub fn new(frame: Vec<u8>) -> Self {
        OutgoingFrame { frame, rate: None }
    }
}

/// A monitor-mode radio. Implementations are expected to be internally
/// synchronized; receive and send may be called concurrently.
#[async_trait]
pub trait RadioHandle: Send + Sync {
    /// Receive the next frame from the air.
    async fn receive(&self) -> Result<RadioPacket>;

    /// Transmit a frame, optionally at a specific rate.
    async fn send(&self, frame: &[u8], rate: Option<DataRate>) -> Result<()>;

    /// Tune the radio to a channel.
    async fn set_channel(&self, channel: Channel) -> Result<()>;

    /// The channel the radio is currently tuned to.
    async fn channel(&self) -> Channel;

    /// Every channel the radio can tune to.
    async fn supported_channels(&self) -> Vec<Channel>;

    /// Every rate the radio can transmit at.
    async fn supported_rates(&self) -> Vec<DataRate>;

    /// Shut the radio down.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_width() {
        assert_eq!(ChannelWidth::default().mhz(), 20);
        assert_eq!(ChannelWidth::Mhz160.mhz(), 160);
        assert_eq!(Channel::new(6).number, 6);
    }

    #[test]
    fn test_data_rate() {
        // 0x02 is 1 Mb/s, 0x16 is 11 Mb/s
        assert_eq!(DataRate(0x02).kilobits(), 1000);
        assert_eq!(DataRate(0x16).kilobits(), 11000);
    }
}
