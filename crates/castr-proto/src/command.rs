//! Command ids.
//!
//! 0x0_ acknowledgements, 0x1_ session, 0x2_ ping socket, 0x3_ media,
//! 0x4_ monitoring, 0x5_ peer relay, 0x6_ master control.

pub const ACK: u32 = 0x00;
pub const NACK: u32 = 0x01;

pub const LOGIN: u32 = 0x10;
pub const INFO: u32 = 0x11;
pub const ERROR: u32 = 0x12;

pub const PING: u32 = 0x20;
pub const PONG: u32 = 0x21;

pub const DATA: u32 = 0x30;
pub const TEXT: u32 = 0x31;
/// Data tagged with a sub-track id.
pub const DATAX: u32 = 0x32;
pub const CAPTION: u32 = 0x33;

pub const USER: u32 = 0x40;
pub const SPEECH: u32 = 0x41;

pub const RTC: u32 = 0x50;
pub const CTCP: u32 = 0x51;

pub const MODE: u32 = 0x60;
pub const SOUND: u32 = 0x61;
pub const ADMIN: u32 = 0x62;

/// Returns a human-readable name for a command id.
pub fn command_name(id: u32) -> &'static str {
    match id {
        ACK => "ack",
        NACK => "nack",
        LOGIN => "login",
        INFO => "info",
        ERROR => "error",
        PING => "ping",
        PONG => "pong",
        DATA => "data",
        TEXT => "text",
        DATAX => "datax",
        CAPTION => "caption",
        USER => "user",
        SPEECH => "speech",
        RTC => "rtc",
        CTCP => "ctcp",
        MODE => "mode",
        SOUND => "sound",
        ADMIN => "admin",
        _ => "unknown",
    }
}

/// Field offsets and minimum lengths for each command body.
pub mod parts {
    pub mod ack {
        pub const ACKD: usize = 4;
        pub const LENGTH: usize = 8;
    }

    pub mod nack {
        pub const ACKD: usize = 4;
        pub const CODE: usize = 8;
        pub const MSG: usize = 12;
        pub const LENGTH: usize = 12;
    }

    pub mod login {
        pub const ID: usize = 4;
        pub const KEY: usize = 8;
        pub const FLAGS: usize = 12;
        pub const NICK: usize = 16;
        pub const LENGTH: usize = 16;
    }

    pub mod info {
        pub const KEY: usize = 4;
        pub const VALUE: usize = 8;
        pub const LENGTH: usize = 12;
    }

    pub mod ping {
        pub const CLIENT_TIME: usize = 4;
        pub const LENGTH: usize = 12;
    }

    pub mod pong {
        pub const CLIENT_TIME: usize = 4;
        pub const SERVER_TIME: usize = 12;
        pub const LENGTH: usize = 20;
    }

    pub mod data {
        /// 48-bit little-endian granule position.
        pub const GRANULE_POS: usize = 4;
        pub const PACKET: usize = 10;
        pub const LENGTH: usize = 10;
    }

    pub mod datax {
        pub const GRANULE_POS: usize = 4;
        pub const TRACK: usize = 10;
        pub const PACKET: usize = 14;
        pub const LENGTH: usize = 14;
    }

    pub mod text {
        pub const RESERVED: usize = 4;
        pub const TEXT: usize = 8;
        pub const LENGTH: usize = 8;
    }

    pub mod caption {
        pub const DATA: usize = 4;
        pub const LENGTH: usize = 4;
    }

    pub mod user {
        pub const INDEX: usize = 4;
        pub const STATUS: usize = 8;
        pub const NICK: usize = 12;
        pub const LENGTH: usize = 12;
    }

    pub mod speech {
        /// `(index << 1) | speaking`
        pub const INDEX_STATUS: usize = 4;
        pub const LENGTH: usize = 8;
    }

    pub mod rtc {
        pub const PEER: usize = 4;
        pub const LENGTH: usize = 8;
    }

    pub mod ctcp {
        pub const PEER: usize = 4;
        pub const LENGTH: usize = 8;
    }

    pub mod mode {
        pub const MODE: usize = 4;
        pub const LENGTH: usize = 8;
    }

    /// Client to server sound request.
    pub mod sound_request {
        pub const STATUS: usize = 4;
        pub const ID: usize = 5;
        pub const LENGTH: usize = 5;
    }

    /// Server to client sound trigger.
    pub mod sound {
        pub const TIME: usize = 4;
        pub const STATUS: usize = 12;
        pub const URL: usize = 13;
        pub const LENGTH: usize = 13;
    }

    pub mod admin {
        pub const TARGET: usize = 4;
        pub const ACTION: usize = 8;
        pub const ARGUMENT: usize = 12;
        pub const LENGTH: usize = 12;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_known_ids() {
        assert_eq!(command_name(LOGIN), "login");
        assert_eq!(command_name(DATAX), "datax");
        assert_eq!(command_name(ADMIN), "admin");
        assert_eq!(command_name(0xdead), "unknown");
    }
}
