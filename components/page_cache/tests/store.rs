/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use page_cache::{DeferredRecalc, PageCacheStore};
use servo_config::prefs::Preferences;

use crate::common::{Event, commit_traversal, current_url, navigate, new_page, new_page_with_store, url};

#[test]
fn navigating_away_captures_the_page() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");

    let entry = page.back_forward_list().entries()[0].clone();
    assert!(entry.is_in_page_cache());
    assert!(page.page_cache().borrow().contains(&entry));
    assert!(!document.is_destroyed());
    assert_eq!(page.page_cache().borrow().page_count(), 1);
    assert_eq!(page.page_cache().borrow().frame_count(), 1);
}

#[test]
fn the_oldest_snapshot_is_evicted_first() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let a_document = page.main_frame().document().unwrap();
    for address in ["http://b.test/", "http://c.test/", "http://d.test/"] {
        navigate(&page, address);
    }
    assert_eq!(page.page_cache().borrow().page_count(), 3);
    assert!(!a_document.is_destroyed());

    navigate(&page, "http://e.test/");
    let cached: Vec<String> = page
        .page_cache()
        .borrow()
        .entries()
        .iter()
        .map(|entry| entry.url().to_string())
        .collect();
    assert_eq!(cached, ["http://d.test/", "http://c.test/", "http://b.test/"]);
    assert!(a_document.is_destroyed());
    assert!(!page.back_forward_list().entries()[0].is_in_page_cache());
}

#[test]
fn reading_a_snapshot_does_not_change_eviction_order() {
    let (page, _network) = new_page(2, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    navigate(&page, "http://c.test/");

    let a_entry = page.back_forward_list().entries()[0].clone();
    assert!(page.page_cache().borrow_mut().get(&a_entry).is_some());

    navigate(&page, "http://d.test/");
    assert!(!page.page_cache().borrow().contains(&a_entry));
    assert_eq!(page.page_cache().borrow().page_count(), 2);
}

#[test]
fn every_entry_has_at_most_one_snapshot() {
    let (page, _network) = new_page(5, 10);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    assert!(page.go_back());
    assert!(page.go_forward());
    assert!(page.go_back());

    let store = page.page_cache().borrow();
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].url(), url("http://b.test/"));
    assert_eq!(store.page_count(), 1);
}

#[test]
fn removing_a_snapshot_twice_is_harmless() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");

    let entry = page.back_forward_list().entries()[0].clone();
    page.page_cache().borrow_mut().remove(&entry);
    assert!(document.is_destroyed());
    assert!(!entry.is_in_page_cache());
    page.page_cache().borrow_mut().remove(&entry);
    assert_eq!(page.page_cache().borrow().page_count(), 0);
}

#[test]
fn lowering_the_capacity_prunes() {
    let (page, _network) = new_page(3, 10);
    for address in ["http://a.test/", "http://b.test/", "http://c.test/", "http://d.test/"] {
        navigate(&page, address);
    }
    page.page_cache().borrow_mut().set_capacity(1);

    let store = page.page_cache().borrow();
    assert_eq!(store.page_count(), 1);
    assert_eq!(store.entries()[0].url(), url("http://c.test/"));
}

#[test]
fn expired_snapshots_are_loaded_from_the_network() {
    let (page, network) = new_page(3, 10);
    page.page_cache()
        .borrow_mut()
        .set_expiration(Some(Duration::ZERO));
    navigate(&page, "http://a.test/");
    let a_document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");
    network.take_events();

    assert!(page.go_back());
    assert!(a_document.is_destroyed());
    assert_eq!(network.fetched_urls(), [url("http://a.test/")]);

    commit_traversal(&page);
    assert_eq!(current_url(&page), url("http://a.test/"));
    assert!(!Rc::ptr_eq(&page.main_frame().document().unwrap(), &a_document));
    assert!(
        !network
            .events()
            .contains(&Event::RestoreFromPageCache(page.main_frame().id()))
    );
}

#[test]
fn no_expiration_keeps_snapshots() {
    let (page, network) = new_page(3, 10);
    page.page_cache().borrow_mut().set_expiration(None);
    navigate(&page, "http://a.test/");
    navigate(&page, "http://b.test/");
    network.take_events();

    assert!(page.go_back());
    assert!(network.fetched_urls().is_empty());
}

#[test]
fn preferences_configure_the_store() {
    let preferences = Preferences::from_json_str(
        r#"{ "page_cache_capacity": 7, "page_cache_expiration_ms": 0, "page_cache_supports_plugins": true }"#,
    )
    .unwrap();
    let store = PageCacheStore::from_preferences(&preferences);
    assert_eq!(store.capacity(), 7);
    assert_eq!(store.expiration(), None);
    assert!(store.supports_plugins());

    let store = PageCacheStore::from_preferences(&Preferences::default());
    assert_eq!(store.expiration(), Some(Duration::from_secs(30 * 60)));
}

#[test]
fn style_recalc_marks_apply_on_restore() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");

    page.page_cache()
        .borrow()
        .mark_pages_for_full_style_recalc();
    page.page_cache()
        .borrow()
        .mark_pages_for_caption_preferences_changed();
    assert_eq!(document.style_recalc_count(), 0);

    assert!(page.go_back());
    assert!(Rc::ptr_eq(&page.main_frame().document().unwrap(), &document));
    assert_eq!(document.style_recalc_count(), 1);
    assert_eq!(document.caption_preferences_change_count(), 1);
    assert_eq!(document.visited_link_recalc_count(), 0);
}

#[test]
fn device_scale_changes_only_mark_the_pages_of_that_page() {
    let store = Rc::new(RefCell::new(PageCacheStore::new(4)));
    let (first, _first_network) = new_page_with_store(store.clone(), 10);
    let (second, _second_network) = new_page_with_store(store.clone(), 10);
    navigate(&first, "http://a.test/");
    navigate(&first, "http://b.test/");
    navigate(&second, "http://x.test/");
    navigate(&second, "http://y.test/");
    assert_eq!(store.borrow().page_count(), 2);

    first.device_scale_factor_changed();
    assert_eq!(
        first
            .main_frame()
            .document()
            .unwrap()
            .device_scale_change_count(),
        1
    );

    let first_entry = first.back_forward_list().entries()[0].clone();
    let second_entry = second.back_forward_list().entries()[0].clone();
    let mut store = store.borrow_mut();
    assert_eq!(
        store.get(&first_entry).unwrap().needs_recalc(),
        DeferredRecalc::DEVICE_SCALE
    );
    assert_eq!(
        store.get(&second_entry).unwrap().needs_recalc(),
        DeferredRecalc::empty()
    );
}

#[test]
fn snapshots_remember_what_they_captured() {
    let (page, _network) = new_page(3, 10);
    navigate(&page, "http://a.test/");
    let document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");

    let entry = page.back_forward_list().entries()[0].clone();
    let mut store = page.page_cache().borrow_mut();
    let snapshot = store.get(&entry).unwrap();
    assert_eq!(snapshot.page_id(), page.id());
    assert_eq!(snapshot.url(), Some(url("http://a.test/")));
    assert!(Rc::ptr_eq(&snapshot.document().unwrap(), &document));
    assert_eq!(snapshot.frame_count(), 1);
    assert!(!snapshot.has_expired(None, snapshot.time_stamp() + Duration::from_secs(3600)));
    assert!(snapshot.has_expired(
        Some(Duration::from_secs(1)),
        snapshot.time_stamp() + Duration::from_secs(1)
    ));
}

#[test]
fn dropping_a_page_drops_its_snapshots() {
    let store = Rc::new(RefCell::new(PageCacheStore::new(3)));
    let (other, _other_network) = new_page_with_store(store.clone(), 10);
    navigate(&other, "http://x.test/");
    navigate(&other, "http://y.test/");

    let (page, _network) = new_page_with_store(store.clone(), 10);
    navigate(&page, "http://a.test/");
    let a_document = page.main_frame().document().unwrap();
    navigate(&page, "http://b.test/");
    assert_eq!(store.borrow().page_count(), 2);

    drop(page);
    assert!(a_document.is_destroyed());
    let store = store.borrow();
    assert_eq!(store.page_count(), 1);
    assert_eq!(store.frame_count(), 1);
    assert_eq!(store.entries()[0].url(), url("http://x.test/"));
}
