//! Server supervision: the lifecycle state machine, the observable
//! per-entity state, and the managed child process.

pub mod lifecycle;
pub mod process;
pub mod state;

pub use lifecycle::EntityLifecycle;
pub use process::{ServerProcess, SessionId};
pub use state::{EntityState, Status};
