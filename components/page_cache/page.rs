/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::{Duration, Instant};

use base::id::{FrameId, PageId};
use log::{debug, warn};
use servo_config::prefs::{self, Preferences};
use url::Url;

use crate::back_forward_list::BackForwardList;
use crate::delegate::{DefaultLoaderDelegate, LoaderDelegate, PageCachePolicy};
use crate::document_loader::LoadRequest;
use crate::eligibility::{DeviceSensors, PageConditions};
use crate::frame::Frame;
use crate::frame_loader::FrameLoadType;
use crate::history_entry::HistoryEntry;
use crate::session_state::{SessionHistoryState, SessionStateError};
use crate::snapshot::DeferredRecalc;
use crate::store::PageCacheStore;
use crate::timer_scheduler::{TimerId, TimerScheduler, TimerTask};

/// A top-level browsing context: the main frame and its subframes, the
/// session history, and the page cache shared with other pages.
pub struct Page {
    id: PageId,
    main_frame: Frame,
    page_cache: Rc<RefCell<PageCacheStore>>,
    back_forward_list: RefCell<BackForwardList>,
    delegate: RefCell<Rc<dyn LoaderDelegate>>,
    cache_policy: RefCell<Option<Rc<dyn PageCachePolicy>>>,
    defers_loading: Cell<bool>,
    device_sensors: Cell<DeviceSensors>,
    timers: RefCell<TimerScheduler>,
}

impl Page {
    pub fn new(
        page_cache: Rc<RefCell<PageCacheStore>>,
        back_forward_list: BackForwardList,
    ) -> Rc<Page> {
        Rc::new_cyclic(|page| Page {
            id: PageId::new(),
            main_frame: Frame::new_main_frame(page.clone()),
            page_cache,
            back_forward_list: RefCell::new(back_forward_list),
            delegate: RefCell::new(Rc::new(DefaultLoaderDelegate)),
            cache_policy: RefCell::new(None),
            defers_loading: Cell::new(false),
            device_sensors: Cell::new(DeviceSensors::empty()),
            timers: RefCell::new(TimerScheduler::default()),
        })
    }

    pub fn from_preferences(
        page_cache: Rc<RefCell<PageCacheStore>>,
        preferences: &Preferences,
    ) -> Rc<Page> {
        Page::new(page_cache, BackForwardList::from_preferences(preferences))
    }

    /// A page whose session history follows the process-wide preferences.
    pub fn from_current_preferences(page_cache: Rc<RefCell<PageCacheStore>>) -> Rc<Page> {
        Page::from_preferences(page_cache, &prefs::get())
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn main_frame(&self) -> &Frame {
        &self.main_frame
    }

    pub fn frame_by_id(&self, id: FrameId) -> Option<Frame> {
        self.main_frame.find_descendant(id)
    }

    pub fn page_cache(&self) -> &Rc<RefCell<PageCacheStore>> {
        &self.page_cache
    }

    pub fn back_forward_list(&self) -> Ref<'_, BackForwardList> {
        self.back_forward_list.borrow()
    }

    pub(crate) fn back_forward_list_mut(&self) -> RefMut<'_, BackForwardList> {
        self.back_forward_list.borrow_mut()
    }

    pub(crate) fn add_history_entry(&self, entry: Rc<HistoryEntry>) {
        let mut page_cache = self.page_cache.borrow_mut();
        self.back_forward_list
            .borrow_mut()
            .add_item(entry, &mut page_cache);
    }

    pub fn set_back_forward_list_capacity(&self, capacity: usize) {
        let mut page_cache = self.page_cache.borrow_mut();
        self.back_forward_list
            .borrow_mut()
            .set_capacity(capacity, &mut page_cache);
    }

    pub fn set_back_forward_list_enabled(&self, enabled: bool) {
        let mut page_cache = self.page_cache.borrow_mut();
        self.back_forward_list
            .borrow_mut()
            .set_enabled(enabled, &mut page_cache);
    }

    pub fn session_state(&self) -> SessionHistoryState {
        self.back_forward_list.borrow().session_state()
    }

    pub fn restore_session_state(&self, state: &SessionHistoryState) -> Result<(), SessionStateError> {
        let mut page_cache = self.page_cache.borrow_mut();
        self.back_forward_list
            .borrow_mut()
            .restore_session_state(state, &mut page_cache)
    }

    pub fn delegate(&self) -> Rc<dyn LoaderDelegate> {
        self.delegate.borrow().clone()
    }

    pub fn set_delegate(&self, delegate: Rc<dyn LoaderDelegate>) {
        *self.delegate.borrow_mut() = delegate;
    }

    pub fn cache_policy(&self) -> Option<Rc<dyn PageCachePolicy>> {
        self.cache_policy.borrow().clone()
    }

    pub fn set_cache_policy(&self, policy: Option<Rc<dyn PageCachePolicy>>) {
        *self.cache_policy.borrow_mut() = policy;
    }

    pub fn device_sensors(&self) -> DeviceSensors {
        self.device_sensors.get()
    }

    pub fn set_device_sensors(&self, sensors: DeviceSensors) {
        self.device_sensors.set(sensors);
    }

    pub(crate) fn conditions(&self, cache_capacity: usize) -> PageConditions {
        let back_forward_list = self.back_forward_list.borrow();
        PageConditions {
            cache_capacity,
            back_forward_list_enabled: back_forward_list.enabled(),
            back_forward_list_capacity: back_forward_list.capacity(),
            device_sensors: self.device_sensors.get(),
            load_type: self.main_frame.loader().load_type(),
        }
    }

    pub fn can_cache(&self) -> bool {
        self.page_cache.borrow().can_cache(self)
    }

    /// Whether timers and history traversals are held back.
    pub fn defers_loading(&self) -> bool {
        self.defers_loading.get()
    }

    /// Holding back loads also holds back timers. Releasing them starts a
    /// history traversal that was requested in the meantime.
    pub fn set_defers_loading(&self, defers: bool) {
        if self.defers_loading.replace(defers) == defers {
            return;
        }
        debug!("{} defers loading: {}", self.id, defers);
        if !defers {
            self.main_frame.history().resume_deferred_traversal();
        }
    }

    pub(crate) fn queue_timer(&self, delay: Duration, task: TimerTask) -> TimerId {
        self.timers
            .borrow_mut()
            .queue_timer(Instant::now() + delay, task)
    }

    pub(crate) fn cancel_timer(&self, timer: TimerId) {
        self.timers.borrow_mut().cancel_timer(timer);
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.borrow().is_empty()
    }

    /// How long until the next timer is due.
    pub fn timer_timeout(&self, now: Instant) -> Option<Duration> {
        self.timers.borrow().timer_timeout(now)
    }

    /// Run every timer due at `now`, unless loading is deferred. Returns the
    /// number of timers that fired.
    pub fn run_timers(&self, now: Instant) -> usize {
        let mut fired = 0;
        while !self.defers_loading.get() {
            let Some(task) = self.timers.borrow_mut().pop_due(now) else {
                break;
            };
            fired += 1;
            self.run_timer_task(task);
        }
        fired
    }

    fn run_timer_task(&self, task: TimerTask) {
        match task {
            TimerTask::DeliverSubstituteData { frame, loader } => {
                if let Some(frame) = self.frame_by_id(frame) {
                    frame.loader().deliver_substitute_data(loader);
                }
            },
            TimerTask::CheckLoadComplete { frame } => {
                if let Some(frame) = self.frame_by_id(frame) {
                    frame.loader().check_load_complete_timer_fired();
                }
            },
            TimerTask::Redirect { frame } => {
                if let Some(frame) = self.frame_by_id(frame) {
                    frame.loader().redirect_timer_fired();
                }
            },
        }
    }

    pub fn load_url(&self, url: Url) {
        self.load(LoadRequest::new(url));
    }

    pub fn load(&self, request: LoadRequest) {
        self.main_frame
            .loader()
            .load(request, FrameLoadType::Standard);
    }

    pub fn reload(&self, from_origin: bool) {
        self.main_frame.loader().reload(from_origin);
    }

    pub fn can_go_back(&self) -> bool {
        self.back_forward_list.borrow().back_item().is_some()
    }

    pub fn can_go_forward(&self) -> bool {
        self.back_forward_list.borrow().forward_item().is_some()
    }

    pub fn go_back(&self) -> bool {
        let Some(item) = self.back_forward_list.borrow().back_item() else {
            return false;
        };
        self.main_frame
            .history()
            .go_to_item(&item, FrameLoadType::Back)
    }

    pub fn go_forward(&self) -> bool {
        let Some(item) = self.back_forward_list.borrow().forward_item() else {
            return false;
        };
        self.main_frame
            .history()
            .go_to_item(&item, FrameLoadType::Forward)
    }

    /// Traverse `distance` entries away from the current one. A distance of
    /// zero reloads.
    pub fn go(&self, distance: i32) -> bool {
        if distance == 0 {
            self.reload(false);
            return true;
        }
        let Some(item) = self.back_forward_list.borrow().item_at_index(distance) else {
            return false;
        };
        self.main_frame
            .history()
            .go_to_item(&item, FrameLoadType::IndexedBackForward)
    }

    pub fn go_to_entry(&self, entry: &Rc<HistoryEntry>) -> bool {
        self.main_frame
            .history()
            .go_to_item(entry, FrameLoadType::IndexedBackForward)
    }

    /// The device scale factor changed: recompute the live documents now and
    /// the cached pages of this page when they are restored.
    pub fn device_scale_factor_changed(&self) {
        for frame in self.main_frame.self_and_descendants() {
            if let Some(document) = frame.document() {
                document.apply_deferred_recalc(DeferredRecalc::DEVICE_SCALE);
            }
        }
        self.page_cache
            .borrow()
            .mark_pages_for_device_scale_changed(self.id);
    }

    /// Stop all loads and drop the session history with its cached pages.
    pub fn close(&self) {
        debug!("Closing {}", self.id);
        self.main_frame.loader().stop_all_loaders();
        {
            let mut page_cache = self.page_cache.borrow_mut();
            self.back_forward_list
                .borrow_mut()
                .close(&mut page_cache);
        }
        self.main_frame.detach_children();
        if let Some(document) = self.main_frame.set_document(None) {
            document.prepare_for_destruction();
        }
        self.main_frame.history().clear();
        self.timers.replace(TimerScheduler::default());
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // The store outlives the page; its snapshots of this page must not.
        let Ok(mut page_cache) = self.page_cache.try_borrow_mut() else {
            warn!("Page cache busy while dropping {}", self.id);
            return;
        };
        self.back_forward_list.get_mut().close(&mut page_cache);
    }
}
