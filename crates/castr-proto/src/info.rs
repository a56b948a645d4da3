//! Info keys.
//!
//! Server to client keys announce session state; client to server keys are
//! limited to sample-rate confirmation and admin relay.

/// Assigned track index.
pub const ID: u32 = 0x00;
/// Another data socket was already connected when this one joined.
pub const PEER_CONTINUING: u32 = 0x01;
/// Another data socket has just joined.
pub const PEER_INITIAL: u32 = 0x02;
/// Another data socket has left.
pub const PEER_LOST: u32 = 0x03;
/// Mode with its time anchor and elapsed recording time.
pub const MODE: u32 = 0x10;
pub const REC_NAME: u32 = 0x11;
pub const START_TIME: u32 = 0x12;
/// Client capture sample rate.
pub const SAMPLE_RATE: u32 = 0x20;
pub const CREDIT_COST: u32 = 0x30;
pub const CREDIT_RATE: u32 = 0x31;
/// JSON list of triggerable sounds.
pub const SOUNDS: u32 = 0x32;
/// A data socket's answer to an admin access request.
pub const ALLOW_ADMIN: u32 = 0x40;
pub const ADMIN_STATE: u32 = 0x41;
/// JSON object of peer-to-peer feature restrictions.
pub const FEATURES: u32 = 0x50;

/// Returns a human-readable name for an info key.
pub fn info_name(key: u32) -> &'static str {
    match key {
        ID => "id",
        PEER_CONTINUING => "peerContinuing",
        PEER_INITIAL => "peerInitial",
        PEER_LOST => "peerLost",
        MODE => "mode",
        REC_NAME => "recName",
        START_TIME => "startTime",
        SAMPLE_RATE => "sampleRate",
        CREDIT_COST => "creditCost",
        CREDIT_RATE => "creditRate",
        SOUNDS => "sounds",
        ALLOW_ADMIN => "allowAdmin",
        ADMIN_STATE => "adminState",
        FEATURES => "features",
        _ => "unknown",
    }
}
