pub mod codecs;
pub mod dispatcher;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod worker_pool;

pub use dispatcher::Dispatcher;
pub use error::{CoreError, CoreResult};
pub use peer::{EventSender, Peer, PeerState};
pub use registry::RoomRegistry;
pub use room::Room;
pub use worker_pool::WorkerPool;
