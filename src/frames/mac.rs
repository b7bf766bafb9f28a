//! MAC address handling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, WifiError};

/// A 6-octet IEEE 802 MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mac(pub [u8; 6]);

impl Mac {
    /// The all-ones broadcast address.
    pub const BROADCAST: Mac = Mac([0xff; 6]);

    /// Create an address from a 6-byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 6 {
            return Err(WifiError::InvalidMac);
        }
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(Mac(bytes))
    }

    /// Get the raw octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Mac::BROADCAST
    }

    /// Check whether this is a group (multicast) address.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl FromStr for Mac {
    type Err = WifiError;

    /// Parse a colon-separated hex address such as `aa:bb:cc:dd:ee:ff`.
    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for part in s.split(':') {
            if count == 6 || part.len() != 2 {
                return Err(WifiError::InvalidMac);
            }
            bytes[count] = u8::from_str_radix(part, 16).map_err(|_| WifiError::InvalidMac)?;
            count += 1;
        }
        if count != 6 {
            return Err(WifiError::InvalidMac);
        }
        Ok(Mac(bytes))
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl From<[u8; 6]> for Mac {
    fn from(bytes: [u8; 6]) -> Self {
        Mac(bytes)
    }
}
