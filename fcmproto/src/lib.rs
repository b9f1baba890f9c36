//! Protobuf schema for the GCM checkin endpoint and the MCS wire protocol.
//!
//! Only the messages this client exchanges are declared here. Field numbers
//! follow the `checkin.proto` / `mcs.proto` definitions shipped with Chromium's
//! GCM driver and Android's GmsCore.

pub mod checkin;
pub mod mcs;
