mod data_dir;
mod gateway;
mod local;
mod remote;
mod undo;

pub use data_dir::{DataDir, NoDataDir};
pub use gateway::{open, Gateway, GatewayError};
pub use local::{LocalStore, StoreError};
pub use remote::{RemoteError, RemoteStore};
pub use undo::UndoFile;
