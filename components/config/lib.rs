/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

pub mod prefs;

/// Read the current value of a single preference by field name.
///
/// ```
/// let capacity = servo_config::pref!(page_cache_capacity);
/// assert!(capacity >= 0);
/// ```
#[macro_export]
macro_rules! pref {
    ($name:ident) => {
        $crate::prefs::get().$name.clone()
    };
}
