/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::document_loader::{LoadError, LoadRequest};
use crate::frame::Frame;

/// Hooks through which the embedder fetches resources and follows the
/// progress of loads. Every method has an empty default implementation.
///
/// Callbacks run synchronously in the middle of a load and may start, stop,
/// or replace loads of any frame.
pub trait LoaderDelegate {
    /// Fetch the main resource of a provisional load. The response is reported
    /// back through [`crate::FrameLoader::did_receive_response`] and friends.
    fn fetch(&self, _frame: &Frame, _request: &LoadRequest) {}

    fn did_start_provisional_load(&self, _frame: &Frame) {}

    fn did_commit_load(&self, _frame: &Frame) {}

    /// The committed load showed a page from the page cache instead of a new
    /// document.
    fn did_restore_from_page_cache(&self, _frame: &Frame) {}

    fn did_finish_load(&self, _frame: &Frame) {}

    /// A load failed or was cancelled.
    fn did_fail_load(&self, _frame: &Frame, _error: &LoadError) {}

    fn did_navigate_in_same_document(&self, _frame: &Frame) {}
}

pub(crate) struct DefaultLoaderDelegate;

impl LoaderDelegate for DefaultLoaderDelegate {}

/// The embedder's veto over putting pages into the page cache.
pub trait PageCachePolicy {
    fn can_cache_frame(&self, frame: &Frame) -> bool;
}
