use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::query::FileQuery;

/// A named filter the user can re-apply to the document list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchCondition {
    pub id: String,
    pub user_id: String,
    pub condition_name: String,
    pub keyword: Option<String>,
    pub tag_ids: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl SavedSearchCondition {
    pub fn has_filters(&self) -> bool {
        self.keyword.as_deref().is_some_and(|k| !k.is_empty())
            || self.tag_ids.as_ref().is_some_and(|t| !t.is_empty())
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    /// First page of the document list narrowed by this condition.
    pub fn to_file_query(&self, limit: u32) -> FileQuery {
        FileQuery {
            search: self.keyword.clone().filter(|k| !k.is_empty()),
            tag_ids: self.tag_ids.clone().unwrap_or_default(),
            date_from: self.date_from,
            date_to: self.date_to,
            limit,
            ..FileQuery::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchInput {
    pub condition_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}
