pub mod comparator;
pub mod engine;
pub mod entry;
pub mod local_walker;
pub mod remote_walker;
pub mod transfer;

pub use comparator::{ActionSummary, DiffEngine, SyncAction, SyncPlan};
pub use engine::{SyncEngine, SyncOptions, SyncPhase, SyncReport, SyncTarget, REMOTE_SCHEME};
pub use entry::{Direction, Entry, EntryKind, TreeMap};
pub use local_walker::LocalTreeWalker;
pub use remote_walker::{RemoteTreeWalker, RemoteWalkItem};
pub use transfer::{download_atomic, ActionOutcome, TransferExecutor};
