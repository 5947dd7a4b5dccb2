use std::net::IpAddr;

use clap::Parser;
use minidis::config::{
    Config, ParseMode, DEFAULT_BACKLOG, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT,
};
use minidis::store::DEFAULT_CAPACITY;
use minidis::{server, Error};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The address to listen on
    #[arg(short, long, env = "MINIDIS_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// The port to listen on
    #[arg(short, long, env = "MINIDIS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pending connections queued by the kernel
    #[arg(long, env = "MINIDIS_BACKLOG", default_value_t = DEFAULT_BACKLOG)]
    backlog: u32,

    /// Maximum number of distinct keys
    #[arg(short, long, env = "MINIDIS_CAPACITY", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// How array frames are parsed: `scan` or `strict`
    #[arg(long, env = "MINIDIS_PARSE_MODE", default_value_t = ParseMode::Scan)]
    parse_mode: ParseMode,

    /// Largest input a connection may buffer, in bytes
    #[arg(long, env = "MINIDIS_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            bind: args.bind,
            port: args.port,
            backlog: args.backlog,
            capacity: args.capacity,
            parse_mode: args.parse_mode,
            max_frame_size: args.max_frame_size,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(args.into()).await
}
