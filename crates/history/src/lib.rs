// Chunk: docs/chunks/page_store - 64 KiB page store with atomic rewrites
// Chunk: docs/chunks/scrollback_window - Bounded in-memory scrollback window

//! txterm-history: durable scrollback for txterm.
//!
//! Two layers live here:
//!
//! - [`PageStore`] — append-only 64 KiB pages on disk with an O(1)
//!   global-index lookup, in-place update of committed lines, and atomic
//!   page rewrites
//! - [`Scrollback`] — the bounded in-memory window the display buffer
//!   reads from, backed by the page store for anything older
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Viewport + current line │  display buffer (txterm-term)
//! ├──────────────────────────┤
//! │ Scrollback ring (~2K ln) │  this crate, in memory
//! ├──────────────────────────┤
//! │   Page store (.page)     │  this crate, on disk
//! └──────────────────────────┘
//! ```
//!
//! Lines are immutable once committed except through [`PageStore::update`],
//! which the display buffer uses when the cursor re-enters a committed row.
//!
//! A disk failure never loses the line being committed: it stays in the
//! ring, the error is parked for the host, and the session degrades to
//! memory-only.

mod legacy;
mod meta;
mod page;
mod scrollback;
mod store;

pub use legacy::{import_legacy, LEGACY_MAGIC};
pub use meta::SessionMeta;
pub use page::{Page, PageEntry, PageState, PAGE_MAGIC, TARGET_PAGE_SIZE};
pub use scrollback::{Scrollback, ScrollbackConfig};
pub use store::{PageStore, StoreConfig};

/// Current wall-clock time in Unix nanoseconds, the timestamp unit used
/// throughout the page format.
pub(crate) fn now_nanos() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
