/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Decides whether a page may be captured into the page cache.
//!
//! The decision is a pure function of the frame tree and a few page level
//! conditions. Every reason a page is rejected is reported as a flag so that
//! callers can log the full set instead of the first failure.

use bitflags::bitflags;

use crate::frame_loader::FrameLoadType;

bitflags! {
    /// Reasons a page cannot enter the page cache.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct CacheBlockers: u32 {
        const NO_COMMITTED_LOAD = 1 << 0;
        const INITIAL_EMPTY_DOCUMENT = 1 << 1;
        const NO_HISTORY_ENTRY = 1 << 2;
        const MAIN_RESOURCE_ERROR = 1 << 3;
        const SUBSTITUTE_DATA = 1 << 4;
        const HAS_PLUGINS = 1 << 5;
        /// An https document was served with `Cache-Control: no-store`.
        const SECURE_NO_STORE = 1 << 6;
        const UNLOAD_LISTENER = 1 << 7;
        const OPEN_DATABASES = 1 << 8;
        const SHARED_WORKERS = 1 << 9;
        const QUICK_REDIRECT_COMING = 1 << 10;
        const IS_LOADING = 1 << 11;
        const IS_STOPPING = 1 << 12;
        const CANNOT_SUSPEND_ACTIVE_DOM_OBJECTS = 1 << 13;
        const APPLICATION_CACHE = 1 << 14;
        /// The embedder's page cache policy refused a frame.
        const CLIENT_DENIED = 1 << 15;
        const CACHE_DISABLED = 1 << 16;
        const BACK_FORWARD_LIST_DISABLED = 1 << 17;
        const DEVICE_SENSORS_ACTIVE = 1 << 18;
        const RELOAD = 1 << 19;
        const NO_PAGE = 1 << 20;
    }
}

bitflags! {
    /// Device sensors a page is listening to.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct DeviceSensors: u8 {
        const MOTION = 1 << 0;
        const ORIENTATION = 1 << 1;
        const PROXIMITY = 1 << 2;
    }
}

/// Load progress of a single frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FrameLoadState {
    pub has_page: bool,
    pub has_committed_load: bool,
    pub is_initial_empty_document: bool,
    pub has_history_entry: bool,
    pub main_resource_failed: bool,
    pub is_loading: bool,
    pub is_stopping: bool,
    pub quick_redirect_coming: bool,
}

/// The view of a frame tree needed to decide whether it can be cached.
pub trait FrameTreeView: Sized {
    fn children(&self) -> Vec<Self>;

    fn load_state(&self) -> FrameLoadState;

    /// Blockers that come from the frame's document and response rather than
    /// from its load progress.
    fn exclusion_flags(&self) -> CacheBlockers;
}

/// Conditions that apply to the page as a whole.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageConditions {
    pub cache_capacity: usize,
    pub back_forward_list_enabled: bool,
    pub back_forward_list_capacity: usize,
    pub device_sensors: DeviceSensors,
    /// The type of the navigation that would take the page out of view.
    pub load_type: FrameLoadType,
}

/// Collect the blockers of `frame` and all of its descendants.
pub fn frame_tree_blockers<F: FrameTreeView>(frame: &F) -> CacheBlockers {
    let state = frame.load_state();
    let mut blockers = frame.exclusion_flags();

    if !state.has_page {
        blockers |= CacheBlockers::NO_PAGE;
    }
    if !state.has_committed_load {
        blockers |= CacheBlockers::NO_COMMITTED_LOAD;
    }
    if state.is_initial_empty_document {
        blockers |= CacheBlockers::INITIAL_EMPTY_DOCUMENT;
    }
    if !state.has_history_entry {
        blockers |= CacheBlockers::NO_HISTORY_ENTRY;
    }
    if state.main_resource_failed {
        blockers |= CacheBlockers::MAIN_RESOURCE_ERROR;
    }
    if state.is_loading {
        blockers |= CacheBlockers::IS_LOADING;
    }
    if state.is_stopping {
        blockers |= CacheBlockers::IS_STOPPING;
    }
    if state.quick_redirect_coming {
        blockers |= CacheBlockers::QUICK_REDIRECT_COMING;
    }

    frame
        .children()
        .iter()
        .fold(blockers, |blockers, child| {
            blockers | frame_tree_blockers(child)
        })
}

pub fn page_blockers(conditions: &PageConditions) -> CacheBlockers {
    let mut blockers = CacheBlockers::empty();
    if conditions.cache_capacity == 0 {
        blockers |= CacheBlockers::CACHE_DISABLED;
    }
    if !conditions.back_forward_list_enabled || conditions.back_forward_list_capacity == 0 {
        blockers |= CacheBlockers::BACK_FORWARD_LIST_DISABLED;
    }
    if !conditions.device_sensors.is_empty() {
        blockers |= CacheBlockers::DEVICE_SENSORS_ACTIVE;
    }
    if conditions.load_type.is_reload() || conditions.load_type == FrameLoadType::Same {
        blockers |= CacheBlockers::RELOAD;
    }
    blockers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FakeFrame {
        state: FrameLoadState,
        flags: CacheBlockers,
        children: Vec<FakeFrame>,
    }

    impl FakeFrame {
        fn cacheable() -> FakeFrame {
            FakeFrame {
                state: FrameLoadState {
                    has_page: true,
                    has_committed_load: true,
                    has_history_entry: true,
                    ..FrameLoadState::default()
                },
                flags: CacheBlockers::empty(),
                children: vec![],
            }
        }
    }

    impl FrameTreeView for FakeFrame {
        fn children(&self) -> Vec<Self> {
            self.children.clone()
        }

        fn load_state(&self) -> FrameLoadState {
            self.state
        }

        fn exclusion_flags(&self) -> CacheBlockers {
            self.flags
        }
    }

    fn conditions() -> PageConditions {
        PageConditions {
            cache_capacity: 3,
            back_forward_list_enabled: true,
            back_forward_list_capacity: 100,
            device_sensors: DeviceSensors::empty(),
            load_type: FrameLoadType::Standard,
        }
    }

    #[test]
    fn a_loaded_tree_has_no_blockers() {
        let mut main = FakeFrame::cacheable();
        main.children.push(FakeFrame::cacheable());
        assert!(frame_tree_blockers(&main).is_empty());
        assert!(page_blockers(&conditions()).is_empty());
    }

    #[test]
    fn blockers_of_every_descendant_are_collected() {
        let mut grandchild = FakeFrame::cacheable();
        grandchild.flags = CacheBlockers::UNLOAD_LISTENER;
        let mut child = FakeFrame::cacheable();
        child.state.is_loading = true;
        child.children.push(grandchild);
        let mut main = FakeFrame::cacheable();
        main.children.push(child);

        assert_eq!(
            frame_tree_blockers(&main),
            CacheBlockers::IS_LOADING | CacheBlockers::UNLOAD_LISTENER
        );
    }

    #[test]
    fn load_state_predicates_map_to_blockers() {
        let frame = FakeFrame {
            state: FrameLoadState {
                has_page: false,
                has_committed_load: false,
                is_initial_empty_document: true,
                has_history_entry: false,
                main_resource_failed: true,
                is_loading: false,
                is_stopping: true,
                quick_redirect_coming: true,
            },
            flags: CacheBlockers::empty(),
            children: vec![],
        };
        assert_eq!(
            frame_tree_blockers(&frame),
            CacheBlockers::NO_PAGE |
                CacheBlockers::NO_COMMITTED_LOAD |
                CacheBlockers::INITIAL_EMPTY_DOCUMENT |
                CacheBlockers::NO_HISTORY_ENTRY |
                CacheBlockers::MAIN_RESOURCE_ERROR |
                CacheBlockers::IS_STOPPING |
                CacheBlockers::QUICK_REDIRECT_COMING
        );
    }

    #[test]
    fn page_conditions_map_to_blockers() {
        let disabled = PageConditions {
            cache_capacity: 0,
            back_forward_list_enabled: true,
            back_forward_list_capacity: 0,
            device_sensors: DeviceSensors::ORIENTATION,
            load_type: FrameLoadType::ReloadFromOrigin,
        };
        assert_eq!(
            page_blockers(&disabled),
            CacheBlockers::CACHE_DISABLED |
                CacheBlockers::BACK_FORWARD_LIST_DISABLED |
                CacheBlockers::DEVICE_SENSORS_ACTIVE |
                CacheBlockers::RELOAD
        );

        let list_disabled = PageConditions {
            back_forward_list_enabled: false,
            ..conditions()
        };
        assert_eq!(
            page_blockers(&list_disabled),
            CacheBlockers::BACK_FORWARD_LIST_DISABLED
        );

        let back = PageConditions {
            load_type: FrameLoadType::Back,
            ..conditions()
        };
        assert!(page_blockers(&back).is_empty());

        let same = PageConditions {
            load_type: FrameLoadType::Same,
            ..conditions()
        };
        assert_eq!(page_blockers(&same), CacheBlockers::RELOAD);
    }
}
