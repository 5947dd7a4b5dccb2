pub mod echo;
pub mod executable;
pub mod ping;
pub mod set;

use bytes::Bytes;
use itertools::Itertools;
use std::str::{self, FromStr};
use std::vec;
use strum_macros::EnumString;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::commands::executable::Executable;
use crate::frame::Reply;
use crate::store::Store;
use crate::Error;

use echo::Echo;
use ping::Ping;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Echo(Echo),
    Ping(Ping),
    Set(Set),
}

impl Executable for Command {
    fn exec(self, store: &mut Store) -> Result<Reply, Error> {
        match self {
            Command::Echo(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
enum CommandName {
    Echo,
    Ping,
    Set,
}

impl TryFrom<Vec<Bytes>> for Command {
    type Error = Error;

    fn try_from(argv: Vec<Bytes>) -> Result<Self, Self::Error> {
        let parser = &mut CommandParser {
            parts: argv.into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        match command_name {
            CommandName::Echo => Echo::try_from(parser).map(Command::Echo),
            CommandName::Ping => Ping::try_from(parser).map(Command::Ping),
            CommandName::Set => Set::try_from(parser).map(Command::Set),
        }
    }
}

/// Runs one decoded command against the store. Every failure, whatever its cause, is answered
/// with the null reply.
pub fn dispatch(argv: Vec<Bytes>, store: &mut Store) -> Reply {
    match Command::try_from(argv).and_then(|cmd| cmd.exec(store)) {
        Ok(reply) => reply,
        Err(e) => {
            debug!(error = %e, "command failed");
            Reply::Null
        }
    }
}

/// Renders argv for logs, lossily.
pub fn render(argv: &[Bytes]) -> String {
    argv.iter().map(|arg| String::from_utf8_lossy(arg)).join(" ")
}

pub struct CommandParser {
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<CommandName, CommandParserError> {
        let command_name = self
            .parts
            .next()
            .ok_or(CommandParserError::EmptyCommand)?;

        str::from_utf8(&command_name[..])
            .ok()
            .and_then(|name| CommandName::from_str(name).ok())
            .ok_or_else(|| CommandParserError::UnknownCommand {
                command: String::from_utf8_lossy(&command_name).into_owned(),
            })
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        self.parts.next().ok_or(CommandParserError::EndOfStream)
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub(crate) enum CommandParserError {
    #[error("protocol error; empty command")]
    EmptyCommand,
    #[error("protocol error; unknown command {command}")]
    UnknownCommand { command: String },
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
