/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! Session history and the back/forward page cache.
//!
//! A [`Page`] owns a tree of [`Frame`]s and a [`BackForwardList`] of
//! [`HistoryEntry`] trees. Navigating away from a page that passes the
//! [`PageCacheStore`] eligibility checks suspends it into a [`PageSnapshot`]
//! instead of destroying it, and going back to its entry restores the very
//! same documents.

mod back_forward_list;
mod delegate;
mod document;
mod document_loader;
mod eligibility;
mod frame;
mod frame_loader;
mod history;
mod history_entry;
mod page;
mod session_state;
mod snapshot;
mod store;
mod timer_scheduler;

pub use crate::back_forward_list::BackForwardList;
pub use crate::delegate::{LoaderDelegate, PageCachePolicy};
pub use crate::document::{Document, PageCacheState, UnloadHandler};
pub use crate::document_loader::{
    DocumentLoader, FormData, LoadError, LoadRequest, ResourceResponse, SubstituteData,
};
pub use crate::eligibility::{
    CacheBlockers, DeviceSensors, FrameLoadState, FrameTreeView, PageConditions,
    frame_tree_blockers, page_blockers,
};
pub use crate::frame::{Frame, FrameView};
pub use crate::frame_loader::{FrameLoadType, FrameLoader, FrameState};
pub use crate::history::HistoryController;
pub use crate::history_entry::HistoryEntry;
pub use crate::page::Page;
pub use crate::session_state::{
    HistoryEntryState, SessionHistoryState, SessionStateError, decode_session_state,
    encode_session_state,
};
pub use crate::snapshot::{DeferredRecalc, PageSnapshot};
pub use crate::store::PageCacheStore;
