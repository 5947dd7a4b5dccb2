use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::{Reply, Status};
use crate::store::Store;
use crate::Error;

/// Returns PONG. Arguments, if any, are ignored.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, PartialEq)]
pub struct Ping;

impl Executable for Ping {
    fn exec(self, _store: &mut Store) -> Result<Reply, Error> {
        Ok(Reply::Simple(Status::Pong))
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
