use crate::frame::Reply;
use crate::store::Store;
use crate::Error;

pub trait Executable {
    fn exec(self, store: &mut Store) -> Result<Reply, Error>;
}
