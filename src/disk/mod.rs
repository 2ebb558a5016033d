pub mod block_device;
pub mod container;
pub mod engine;
pub mod layout;
pub mod runs;
pub mod session;
pub mod types;

pub use block_device::BlockDevice;
pub use engine::{Location, SuperblockDisk};
pub use layout::{ContainerPath, Layout};
pub use runs::{SubRun, SubRuns};
pub use session::{Backend, Session, SessionInfo};
pub use types::*;
