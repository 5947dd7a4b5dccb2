use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use strum_macros::{Display, EnumString};

use crate::store;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_BACKLOG: u32 = 5;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// How array frames are split into their elements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ParseMode {
    /// Elements are located by scanning for the next `$` marker. Each successful decode consumes
    /// everything buffered so far.
    #[default]
    Scan,
    /// Elements are located by their declared lengths, so pipelined commands are kept.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    /// Pending connections the kernel queues before `accept`.
    pub backlog: u32,
    /// Maximum number of distinct keys the store holds.
    pub capacity: usize,
    pub parse_mode: ParseMode,
    /// Buffered input a single connection may accumulate before it is rejected.
    pub max_frame_size: usize,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            capacity: store::DEFAULT_CAPACITY,
            parse_mode: ParseMode::default(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
