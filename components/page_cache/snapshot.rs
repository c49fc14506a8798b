/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use base::id::PageId;
use bitflags::bitflags;
use log::debug;
use url::Url;

use crate::document::{Document, PageCacheState};
use crate::document_loader::DocumentLoader;
use crate::frame::{Frame, FrameView};
use crate::frame_loader::FrameState;
use crate::page::Page;

bitflags! {
    /// Recalculations that were requested while a page sat in the cache and
    /// that run once when it is restored.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct DeferredRecalc: u8 {
        const VISITED_LINK_STYLE = 1 << 0;
        const FULL_STYLE = 1 << 1;
        const DEVICE_SCALE = 1 << 2;
        const CAPTION_PREFERENCES = 1 << 3;
    }
}

/// One frame of a cached page, detached from the live frame tree.
struct CachedFrame {
    /// The detached subframe. `None` for the main frame, which stays in its page.
    frame: Option<Frame>,
    url: Url,
    document: Rc<Document>,
    document_loader: Rc<DocumentLoader>,
    view: FrameView,
    children: Vec<CachedFrame>,
}

impl CachedFrame {
    fn is_capturable(frame: &Frame) -> bool {
        frame.document().is_some() &&
            frame.loader().document_loader().is_some() &&
            frame.children().iter().all(CachedFrame::is_capturable)
    }

    /// Pull `frame` and its subtree out of the live tree.
    fn capture(frame: &Frame) -> Option<CachedFrame> {
        let document = frame.document()?;
        let document_loader = frame.loader().document_loader()?;
        document.set_page_cache_state(PageCacheState::AboutToEnterCache);

        let children = frame
            .children()
            .iter()
            .filter_map(CachedFrame::capture)
            .collect();

        document.suspend_for_page_cache();
        let view = frame.set_view(None).unwrap_or_default();
        frame.set_document(None);
        frame.loader().set_document_loader(None);

        let detached = if frame.is_main_frame() {
            None
        } else {
            if let Some(parent) = frame.parent() {
                parent.remove_child(frame);
            }
            frame.set_page(Weak::new());
            Some(frame.clone())
        };

        Some(CachedFrame {
            frame: detached,
            url: document.url(),
            document,
            document_loader,
            view,
            children,
        })
    }

    /// Make the captured objects live again inside `frame`.
    fn restore(self, frame: &Frame, page: &Weak<Page>, recalc: DeferredRecalc) {
        frame.set_document(Some(self.document.clone()));
        frame.set_view(Some(self.view));
        if !frame.is_main_frame() {
            frame.loader().set_document_loader(Some(self.document_loader));
            frame.loader().set_state(FrameState::Complete);
        }

        for child in self.children {
            let Some(child_frame) = child.frame.clone() else {
                continue;
            };
            frame.append_child(child_frame.clone());
            child_frame.set_page(page.clone());
            child.restore(&child_frame, page, recalc);
        }

        self.document.resume_from_page_cache();
        self.document.apply_deferred_recalc(recalc);
    }

    /// Tear the captured subtree down without restoring it.
    fn destroy(self) {
        for child in self.children {
            child.destroy();
        }
        self.document.prepare_for_destruction();
        if let Some(frame) = self.frame {
            frame.history().clear();
        }
    }

    fn frame_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(CachedFrame::frame_count)
            .sum::<usize>()
    }
}

/// A page captured when it was navigated away from, ready to be restored when
/// the user goes back to it.
///
/// A snapshot is consumed by [`PageSnapshot::restore`]. If it is dropped
/// without being restored, every captured document is destroyed.
pub struct PageSnapshot {
    page_id: PageId,
    time_stamp: Instant,
    cached_main_frame: Option<CachedFrame>,
    needs_recalc: DeferredRecalc,
}

impl PageSnapshot {
    /// Capture the whole frame tree of `page`. Returns `None`, leaving the page
    /// untouched, if some frame has no document to capture.
    pub(crate) fn capture(page: &Page) -> Option<PageSnapshot> {
        let main_frame = page.main_frame();
        if !CachedFrame::is_capturable(main_frame) {
            return None;
        }
        let cached_main_frame = CachedFrame::capture(main_frame)?;
        debug!(
            "Captured {} frame(s) of {} at {}",
            cached_main_frame.frame_count(),
            page.id(),
            cached_main_frame.url
        );
        Some(PageSnapshot {
            page_id: page.id(),
            time_stamp: Instant::now(),
            cached_main_frame: Some(cached_main_frame),
            needs_recalc: DeferredRecalc::empty(),
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn time_stamp(&self) -> Instant {
        self.time_stamp
    }

    /// Whether the snapshot is at least `expiration` old at `now`. Without an
    /// expiration a snapshot never expires.
    pub fn has_expired(&self, expiration: Option<Duration>, now: Instant) -> bool {
        expiration.is_some_and(|expiration| {
            now.saturating_duration_since(self.time_stamp) >= expiration
        })
    }

    pub fn url(&self) -> Option<Url> {
        self.cached_main_frame
            .as_ref()
            .map(|cached| cached.url.clone())
    }

    pub fn document(&self) -> Option<Rc<Document>> {
        self.cached_main_frame
            .as_ref()
            .map(|cached| cached.document.clone())
    }

    pub fn document_loader(&self) -> Option<Rc<DocumentLoader>> {
        self.cached_main_frame
            .as_ref()
            .map(|cached| cached.document_loader.clone())
    }

    /// The main frame plus every captured subframe.
    pub fn frame_count(&self) -> usize {
        self.cached_main_frame
            .as_ref()
            .map_or(0, CachedFrame::frame_count)
    }

    pub fn needs_recalc(&self) -> DeferredRecalc {
        self.needs_recalc
    }

    pub(crate) fn mark(&mut self, recalc: DeferredRecalc) {
        self.needs_recalc |= recalc;
    }

    /// Make the captured tree the live content of `main_frame`, and return the
    /// restored main document.
    pub(crate) fn restore(mut self, main_frame: &Frame) -> Option<Rc<Document>> {
        let cached_main_frame = self.cached_main_frame.take()?;
        let document = cached_main_frame.document.clone();
        let page = main_frame
            .page()
            .map(|page| Rc::downgrade(&page))
            .unwrap_or_default();
        debug!(
            "Restoring {} frame(s) of {} (deferred recalc {:?})",
            cached_main_frame.frame_count(),
            self.page_id,
            self.needs_recalc
        );
        cached_main_frame.restore(main_frame, &page, self.needs_recalc);
        Some(document)
    }
}

impl Drop for PageSnapshot {
    fn drop(&mut self) {
        if let Some(cached_main_frame) = self.cached_main_frame.take() {
            debug!("Destroying cached {} at {}", self.page_id, cached_main_frame.url);
            cached_main_frame.destroy();
        }
    }
}

impl fmt::Debug for PageSnapshot {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("PageSnapshot")
            .field("page_id", &self.page_id)
            .field("url", &self.url().as_ref().map(Url::as_str))
            .field("frames", &self.frame_count())
            .field("needs_recalc", &self.needs_recalc)
            .finish()
    }
}
