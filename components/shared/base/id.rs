/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Process-unique identifiers.
//!
//! Every identifier is handed out by a monotonic counter. Identifiers that are
//! decoded from persisted session state can be fed back through `reserve` so
//! that freshly generated values never collide with them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! sequential_id {
    ($(#[$attr:meta])* $name:ident, $counter:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(
            Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        pub struct $name(pub u64);

        static $counter: AtomicU64 = AtomicU64::new(1);

        #[allow(clippy::new_without_default)]
        impl $name {
            pub fn new() -> $name {
                $name($counter.fetch_add(1, Ordering::Relaxed))
            }

            /// Make sure that later calls to `new` never return this value.
            pub fn reserve(self) {
                $counter.fetch_max(self.0.saturating_add(1), Ordering::Relaxed);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "{}{}", $prefix, self.0)
            }
        }
    };
}

sequential_id!(
    /// Identifies a `Page`, the top-level container of a frame tree.
    PageId,
    NEXT_PAGE_ID,
    "page#"
);

sequential_id!(
    /// Identifies a frame (browsing context) for its whole lifetime, including
    /// while it sits detached inside a cached page.
    FrameId,
    NEXT_FRAME_ID,
    "frame#"
);

sequential_id!(DocumentId, NEXT_DOCUMENT_ID, "document#");

sequential_id!(DocumentLoaderId, NEXT_DOCUMENT_LOADER_ID, "loader#");

sequential_id!(
    /// Object identity of a history entry. Unlike the sequence numbers below it
    /// never changes while the entry is alive.
    HistoryEntryId,
    NEXT_HISTORY_ENTRY_ID,
    "entry#"
);

sequential_id!(
    /// Regenerated whenever a history entry is reset for a new navigation.
    /// Entries created as clones of an unchanged subframe keep the number of the
    /// entry they were cloned from.
    ItemSequenceNumber,
    NEXT_ITEM_SEQUENCE_NUMBER,
    "isn#"
);

sequential_id!(
    /// Shared by every history entry that points at the same loaded document.
    DocumentSequenceNumber,
    NEXT_DOCUMENT_SEQUENCE_NUMBER,
    "dsn#"
);
