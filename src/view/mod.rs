//! Front-end state of the document list: preferences, filters, paging and dialogs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::models::{FileQuery, SavedSearchCondition, SortBy, SortOrder, DEFAULT_PAGE_SIZE};

pub mod store;
pub mod upload;

pub use store::{JsonFileStore, MemoryStore, PreferenceStore, StoreError};
pub use upload::{SubmitOutcome, UploadDialog, UploadPhase};

pub const VIEW_MODE_KEY: &str = "documentViewPreference";
pub const SORT_BY_KEY: &str = "documentSortBy";
pub const SORT_ORDER_KEY: &str = "documentSortOrder";
pub const PAGE_SIZE_KEY: &str = "documentPageSize";
pub const SESSION_COOKIE_KEY: &str = "sessionCookie";

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Grid,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::List => "list",
            ViewMode::Grid => "grid",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(ViewMode::List),
            "grid" => Ok(ViewMode::Grid),
            other => Err(format!("unknown view mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DialogFlags {
    pub tag_manager: bool,
    pub save_search: bool,
    /// File whose detail panel is open.
    pub detail: Option<String>,
}

/// Document list state. Preferences are written through to `store` as they change.
pub struct ViewState<S: PreferenceStore> {
    store: S,
    pub view_mode: ViewMode,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page_size: u32,
    pub page: u32,
    pub search_query: String,
    pub selected_tags: BTreeSet<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub dialogs: DialogFlags,
}

fn stored<T: FromStr>(store: &impl PreferenceStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("ignoring stored {}={}", key, raw);
            None
        }
    }
}

impl<S: PreferenceStore> ViewState<S> {
    /// Restores preferences from `store`; unusable values fall back to defaults.
    pub fn load(store: S) -> Self {
        let page_size = stored::<u32>(&store, PAGE_SIZE_KEY)
            .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self {
            view_mode: stored(&store, VIEW_MODE_KEY).unwrap_or_default(),
            sort_by: stored(&store, SORT_BY_KEY).unwrap_or_default(),
            sort_order: stored(&store, SORT_ORDER_KEY).unwrap_or_default(),
            page_size,
            page: 1,
            search_query: String::new(),
            selected_tags: BTreeSet::new(),
            date_from: None,
            date_to: None,
            dialogs: DialogFlags::default(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), StoreError> {
        self.view_mode = mode;
        self.store.set(VIEW_MODE_KEY, mode.as_str())
    }

    pub fn set_sort_by(&mut self, sort_by: SortBy) -> Result<(), StoreError> {
        self.sort_by = sort_by;
        self.store.set(SORT_BY_KEY, sort_by.as_str())
    }

    pub fn set_sort_order(&mut self, order: SortOrder) -> Result<(), StoreError> {
        self.sort_order = order;
        self.store.set(SORT_ORDER_KEY, order.as_str())
    }

    /// Clamped to `1..=MAX_PAGE_SIZE`; goes back to the first page.
    pub fn set_page_size(&mut self, size: u32) -> Result<(), StoreError> {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self.page = 1;
        self.store.set(PAGE_SIZE_KEY, &self.page_size.to_string())
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.page = 1;
    }

    /// Adds the tag if absent, removes it if present.
    pub fn toggle_tag(&mut self, tag_id: &str) {
        if !self.selected_tags.remove(tag_id) {
            self.selected_tags.insert(tag_id.to_string());
        }
        self.page = 1;
    }

    pub fn set_date_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.date_from = from;
        self.date_to = to;
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.search_query.clear();
        self.selected_tags.clear();
        self.date_from = None;
        self.date_to = None;
        self.page = 1;
    }

    /// Replaces every filter with the saved condition's.
    pub fn apply_saved_search(&mut self, condition: &SavedSearchCondition) {
        self.search_query = condition.keyword.clone().unwrap_or_default();
        self.selected_tags = condition
            .tag_ids
            .iter()
            .flatten()
            .cloned()
            .collect();
        self.date_from = condition.date_from;
        self.date_to = condition.date_to;
        self.page = 1;
    }

    pub fn has_filters(&self) -> bool {
        !self.search_query.trim().is_empty()
            || !self.selected_tags.is_empty()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    pub fn file_query(&self) -> FileQuery {
        let search = self.search_query.trim();
        FileQuery {
            search: (!search.is_empty()).then(|| search.to_string()),
            tag_ids: self.selected_tags.iter().cloned().collect(),
            page: self.page,
            limit: self.page_size,
            sort_by: Some(self.sort_by),
            sort_order: Some(self.sort_order),
            date_from: self.date_from,
            date_to: self.date_to,
        }
    }

    pub fn open_detail(&mut self, file_id: &str) {
        self.dialogs.detail = Some(file_id.to_string());
    }

    pub fn close_dialogs(&mut self) {
        self.dialogs = DialogFlags::default();
    }
}
