//! Multi-editor coordination: presence, advisory edit locks and clocks.

mod clock;
mod lock;
mod presence;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use lock::{EditLock, EditLockManager, LockStatus, DEFAULT_LOCK_TTL_SECS};
pub use presence::{
    ActivityUpdate, EditedItemKind, EditingItem, EditorInfo, PresenceRecord, PresenceRegistry,
    PresenceSnapshot, UserProfile, ViewLocation,
};
