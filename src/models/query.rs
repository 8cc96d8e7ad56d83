use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::timestamp::format_date;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortBy {
    #[default]
    #[serde(rename = "uploadedAt")]
    UploadedAt,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "size")]
    Size,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::UploadedAt => "uploadedAt",
            SortBy::Name => "name",
            SortBy::Size => "size",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploadedAt" => Ok(SortBy::UploadedAt),
            "name" => Ok(SortBy::Name),
            "size" => Ok(SortBy::Size),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Filter and paging parameters of the document list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FileQuery {
    pub search: Option<String>,
    pub tag_ids: Vec<String>,
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for FileQuery {
    fn default() -> Self {
        Self {
            search: None,
            tag_ids: Vec::new(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort_by: None,
            sort_order: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl FileQuery {
    /// Query string pairs; `tagIds` is repeated once per tag.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search".to_string(), search.to_string()));
        }
        for tag_id in &self.tag_ids {
            pairs.push(("tagIds".to_string(), tag_id.clone()));
        }
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("limit".to_string(), self.limit.to_string()));
        if let Some(sort_by) = self.sort_by {
            pairs.push(("sortBy".to_string(), sort_by.to_string()));
        }
        if let Some(order) = self.sort_order {
            pairs.push(("sortOrder".to_string(), order.to_string()));
        }
        if let Some(from) = &self.date_from {
            pairs.push(("dateFrom".to_string(), format_date(from)));
        }
        if let Some(to) = &self.date_to {
            pairs.push(("dateTo".to_string(), format_date(to)));
        }
        pairs
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrashQuery {
    pub page: u32,
    pub limit: u32,
}

impl Default for TrashQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TrashQuery {
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ]
    }
}

/// One page of a server-ordered list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages()
    }
}
