//! Runtime-agnostic building blocks for receiving FCM pushes as an Android
//! device: device identity, GCM checkin/registration, the MCS wire codec and
//! the payload classifier.

pub mod classify;
pub mod device;
pub mod gcm;
pub mod mcs;
pub mod net;
pub mod store;
pub mod types;

pub use fcmproto as proto;
