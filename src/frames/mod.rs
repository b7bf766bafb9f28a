//! IEEE 802.11 frame processing
//!
//! This module contains the structures and codecs for 802.11 MAC frames:
//! the generic frame header codec, the information element codec, and the
//! typed projections for beacons, authentication and association frames.

pub mod association;
pub mod authentication;
pub mod beacon;
pub mod bss;
pub mod element;
pub mod frame;
pub mod mac;

pub use association::{AssocRequest, AssocResponse};
pub use authentication::Authentication;
pub use beacon::Beacon;
pub use bss::{BssDescription, BssType};
pub use element::{Element, ElementId, Elements};
pub use frame::{decode_frame, Frame, FrameType, SequenceControl};
pub use mac::Mac;
