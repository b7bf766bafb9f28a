//! Network scanning
//!
//! The scanner hops across every channel the radio supports, collects
//! the beacons it overhears and reports each network it has not seen
//! before.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::frames::beacon::Beacon;
use crate::frames::bss::BssDescription;
use crate::frames::frame::decode_frame;
use crate::frames::mac::Mac;
use crate::radio::Channel;
use crate::raw_stream::RawStream;
use crate::shutdown::Shutdown;

/// How long to listen on each channel.
pub const SCAN_CHANNEL_TIME: Duration = Duration::from_millis(200);

/// Asynchronously scan for wireless networks.
///
/// Descriptions arrive on the returned receiver in first-sight order,
/// each network at most once; the receiver closes when the scan is
/// done. Trigger the returned signal to end the scan early.
///
/// While the scan is running it continually reads from the stream, so
/// nothing else should consume the stream's incoming side.
pub fn scan_networks(stream: Arc<RawStream>) -> (mpsc::Receiver<BssDescription>, Shutdown) {
    let (descriptions_tx, descriptions_rx) = mpsc::channel(1);
    let cancel = Shutdown::new();

    let signal = cancel.clone();
    tokio::spawn(async move {
        run_scan(stream, descriptions_tx, signal).await;
    });

    (descriptions_rx, cancel)
}

async fn run_scan(stream: Arc<RawStream>, descriptions: mpsc::Sender<BssDescription>, cancel: Shutdown) {
    let mut seen = HashSet::<Mac>::new();

    for channel in scan_channels(&stream).await {
        if cancel.is_triggered() {
            return;
        }

        log::debug!("scanning channel {}", channel.number);
        if stream.set_channel(channel).await.is_err() {
            return;
        }

        let deadline = Instant::now() + SCAN_CHANNEL_TIME;
        loop {
            tokio::select! {
                _ = cancel.wait() => return,
                _ = tokio::time::sleep_until(deadline) => break,
                maybe = stream.recv() => {
                    let Some(packet) = maybe else { return };
                    let Ok(frame) = decode_frame(&packet.frame) else { continue };
                    if !frame.is_beacon() {
                        continue;
                    }
                    let Ok(beacon) = Beacon::decode(&frame) else { continue };
                    let description = beacon.bss_description();
                    if !seen.insert(description.bssid) {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.wait() => return,
                        sent = descriptions.send(description) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// The radio's channel list with duplicate channel numbers removed.
async fn scan_channels(stream: &RawStream) -> Vec<Channel> {
    let mut used = HashSet::new();
    stream
        .supported_channels()
        .await
        .into_iter()
        .filter(|channel| used.insert(channel.number))
        .collect()
}
