/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serializable session history, for restoring a page's back/forward list
//! after a restart. Cached pages are never part of it.

use std::fmt;
use std::rc::Rc;

use base::id::{DocumentSequenceNumber, ItemSequenceNumber};
use euclid::Point2D;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::document_loader::FormData;
use crate::history_entry::HistoryEntry;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HistoryEntryState {
    pub item_sequence_number: ItemSequenceNumber,
    pub document_sequence_number: DocumentSequenceNumber,
    pub url: Url,
    pub original_url: Url,
    #[serde(default)]
    pub referrer: Option<Url>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub scroll_x: f32,
    #[serde(default)]
    pub scroll_y: f32,
    #[serde(default = "default_page_scale_factor")]
    pub page_scale_factor: f32,
    #[serde(default)]
    pub form_data: Option<FormData>,
    #[serde(default)]
    pub state_object: Option<Vec<u8>>,
    #[serde(default)]
    pub document_state: Vec<String>,
    #[serde(default)]
    pub last_visit_was_failure: bool,
    #[serde(default)]
    pub children: Vec<HistoryEntryState>,
}

fn default_page_scale_factor() -> f32 {
    1.0
}

impl HistoryEntryState {
    pub fn from_entry(entry: &HistoryEntry) -> HistoryEntryState {
        let scroll_position = entry.scroll_position();
        HistoryEntryState {
            item_sequence_number: entry.item_sequence_number(),
            document_sequence_number: entry.document_sequence_number(),
            url: entry.url(),
            original_url: entry.original_url(),
            referrer: entry.referrer(),
            title: entry.title(),
            target: entry.target(),
            scroll_x: scroll_position.x,
            scroll_y: scroll_position.y,
            page_scale_factor: entry.page_scale_factor(),
            form_data: entry.form_data(),
            state_object: entry.state_object(),
            document_state: entry.document_state(),
            last_visit_was_failure: entry.last_visit_was_failure(),
            children: entry
                .children()
                .iter()
                .map(|child| HistoryEntryState::from_entry(child))
                .collect(),
        }
    }

    /// Build a new entry tree. The decoded sequence numbers are kept, and new
    /// sequence numbers are generated past them.
    pub fn to_entry(&self) -> Rc<HistoryEntry> {
        self.item_sequence_number.reserve();
        self.document_sequence_number.reserve();

        let entry = HistoryEntry::new_with_target(self.url.clone(), self.target.clone());
        entry.set_item_sequence_number(self.item_sequence_number);
        entry.set_document_sequence_number(self.document_sequence_number);
        entry.set_original_url(self.original_url.clone());
        entry.set_referrer(self.referrer.clone());
        entry.set_title(self.title.clone());
        entry.set_scroll_position(Point2D::new(self.scroll_x, self.scroll_y));
        entry.set_page_scale_factor(self.page_scale_factor);
        entry.set_form_data(self.form_data.clone());
        entry.set_state_object(self.state_object.clone());
        entry.set_document_state(self.document_state.clone());
        entry.set_last_visit_was_failure(self.last_visit_was_failure);
        for child in &self.children {
            entry.add_child(child.to_entry());
        }
        entry
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SessionHistoryState {
    pub entries: Vec<HistoryEntryState>,
    pub current_index: Option<usize>,
}

impl SessionHistoryState {
    pub(crate) fn from_entries(entries: &[Rc<HistoryEntry>], current: Option<usize>) -> Self {
        SessionHistoryState {
            entries: entries
                .iter()
                .map(|entry| HistoryEntryState::from_entry(entry))
                .collect(),
            current_index: current,
        }
    }

    /// Decode the entries. A missing current index selects the last entry.
    pub(crate) fn to_entries(
        &self,
    ) -> Result<(Vec<Rc<HistoryEntry>>, Option<usize>), SessionStateError> {
        let current = match self.current_index {
            Some(index) if index >= self.entries.len() => {
                return Err(SessionStateError::CurrentIndexOutOfRange {
                    index,
                    length: self.entries.len(),
                });
            },
            Some(index) => Some(index),
            None => self.entries.len().checked_sub(1),
        };
        let entries = self
            .entries
            .iter()
            .map(HistoryEntryState::to_entry)
            .collect();
        Ok((entries, current))
    }
}

#[derive(Debug)]
pub enum SessionStateError {
    Json(serde_json::Error),
    CurrentIndexOutOfRange { index: usize, length: usize },
}

impl fmt::Display for SessionStateError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionStateError::Json(error) => write!(formatter, "invalid session state: {error}"),
            SessionStateError::CurrentIndexOutOfRange { index, length } => write!(
                formatter,
                "current index {index} is out of range for {length} entries"
            ),
        }
    }
}

impl std::error::Error for SessionStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionStateError::Json(error) => Some(error),
            SessionStateError::CurrentIndexOutOfRange { .. } => None,
        }
    }
}

impl From<serde_json::Error> for SessionStateError {
    fn from(error: serde_json::Error) -> Self {
        SessionStateError::Json(error)
    }
}

pub fn encode_session_state(state: &SessionHistoryState) -> Result<String, SessionStateError> {
    Ok(serde_json::to_string(state)?)
}

pub fn decode_session_state(json: &str) -> Result<SessionHistoryState, SessionStateError> {
    Ok(serde_json::from_str(json)?)
}
