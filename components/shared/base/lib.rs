/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

#![deny(unsafe_code)]

//! A crate to hold very common types shared between the history and page cache
//! components.
//!
//! You should almost never need to add a data type to this crate. Instead look for
//! a more specific crate that has fewer dependents.

pub mod id;

use serde::{Deserialize, Serialize};

/// A struct for denoting the age of loader state; prevents race conditions when
/// a callback re-enters the loader and replaces the state that an operation
/// started with.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Epoch(pub u32);

impl Epoch {
    pub fn next(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// The unit of CSS pixels, used to tag scroll offsets stored in history entries.
#[derive(Clone, Copy, Debug)]
pub enum CSSPixel {}
