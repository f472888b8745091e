pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod item;
pub mod local;
pub mod memory;
pub mod queue;
pub mod reconcile;
pub mod retry;
pub mod stats;
pub mod transport;

mod admission;
mod dispatcher;
mod state;
mod sweeper;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::QueueConfig;
pub use error::{ErrorKind, InventoryError, ItemError, QueueError, TransportError};
pub use events::QueueEvent;
pub use item::ItemSnapshot;
pub use queue::{SubmitOptions, UploadQueue, UploadQueueBuilder};
pub use reconcile::ReconcileReport;
pub use retry::RetryPolicy;
pub use stats::{BatchTotals, FailedItem, QueueStats, StuckItem};
pub use transport::{Inventory, ProgressHandle, Transport, UploadRequest};
