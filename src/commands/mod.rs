pub type CmdResult<T> = conveyor::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod auth;
pub mod deploy;
