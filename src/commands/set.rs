use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::frame::{Reply, Status};
use crate::store::Store;
use crate::Error;

/// Set `key` to hold `value`, overwriting any previous value. Fails when the store is full and
/// `key` is new.
///
/// Ref: <https://redis.io/docs/latest/commands/set>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
}

impl Executable for Set {
    fn exec(self, store: &mut Store) -> Result<Reply, Error> {
        store.set(self.key, self.value)?;

        Ok(Reply::Simple(Status::Ok))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}
