//! Page Execution Context
//!
//! Everything that runs alongside the game page: connectivity detection, the
//! online/offline state machine, the offline overlay collaborator and the
//! pending deletion queue.
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports
//! ├── main.rs         - Binary entry point
//! ├── sync/           - Probe, status broadcaster, overlay, coordinator
//! └── offline/        - Pending deletion queue, remote client, retry policy
//! ```

pub mod offline;
pub mod sync;

pub use offline::{DeletionOutcome, DrainReport, PendingDeletionQueue};
pub use sync::status::{ConnectionStatus, StatusBroadcaster, StatusEvent};
pub use sync::{CoordinatorParts, OfflineCoordinator};
