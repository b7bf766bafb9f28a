//! Reassembly buffer for fragmented MSDUs

use bytes::{BufMut, Bytes, BytesMut};

/// An MSDU which is arriving in pieces. Fragments may show up in any
/// order; the buffer is complete once the final fragment has been seen
/// and every slot below it is filled.
#[derive(Debug, Default)]
pub(crate) struct PartialMsdu {
    has_last_fragment: bool,
    fragments: Vec<Option<Bytes>>,
}

impl PartialMsdu {
    pub fn new() -> Self {
        PartialMsdu::default()
    }

    /// Record one fragment. `last` marks the fragment that carried a
    /// clear more-fragments flag.
    pub fn insert(&mut self, fragment: u8, payload: Bytes, last: bool) {
        let index = fragment as usize;
        if last {
            self.has_last_fragment = true;
        }
        if index >= self.fragments.len() {
            self.fragments.resize(index + 1, None);
        }
        self.fragments[index] = Some(payload);
    }

    /// Whether every piece of the underlying MSDU has been received.
    pub fn is_complete(&self) -> bool {
        self.has_last_fragment && self.fragments.iter().all(|slot| slot.is_some())
    }

    /// Reconstruct the original MSDU. Empty slots are skipped, so this
    /// is only meaningful once `is_complete` returns true.
    pub fn assemble(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for payload in self.fragments.iter().flatten() {
            buf.put_slice(payload);
        }
        buf.freeze()
    }
}
