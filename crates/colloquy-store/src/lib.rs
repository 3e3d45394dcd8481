pub mod clock;
pub mod mutation;
pub mod snapshot;
pub mod state;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use mutation::Mutation;
pub use snapshot::{JsonFileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use state::{ChatState, StreamTarget};
pub use store::Store;
