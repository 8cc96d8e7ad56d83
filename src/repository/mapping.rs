use chrono::{DateTime, NaiveDate, Utc};

use crate::api::wire::{WireFile, WireFileList, WireSavedSearch, WireSession, WireTag};
use crate::error::ApiError;
use crate::models::{Document, FileStatus, Page, SavedSearchCondition, SessionUser, Tag, TagColor};
use crate::utils::timestamp::{parse_date, parse_timestamp};

fn timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_timestamp(raw).map_err(|e| ApiError::Decode(format!("{} '{}': {}", field, raw, e)))
}

fn date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    raw.map(|value| {
        parse_date(value).map_err(|e| ApiError::Decode(format!("{} '{}': {}", field, value, e)))
    })
    .transpose()
}

pub fn document_from_wire(wire: WireFile) -> Result<Document, ApiError> {
    let uploaded_at = timestamp("uploadedAt", &wire.uploaded_at)?;
    let status = match wire.deleted_at.as_deref() {
        Some(raw) => FileStatus::Trashed {
            deleted_at: timestamp("deletedAt", raw)?,
        },
        None => FileStatus::Active,
    };
    Ok(Document {
        id: wire.id,
        name: wire.name,
        size: wire.size,
        mime_type: wire.mime_type,
        description: wire.description,
        uploaded_at,
        download_url: wire.download_url,
        tag_ids: wire.tag_ids.unwrap_or_default(),
        status,
    })
}

/// Keeps the server's ordering and paging metadata as-is.
pub fn page_from_wire(list: WireFileList) -> Result<Page<Document>, ApiError> {
    let items = list
        .files
        .into_iter()
        .map(document_from_wire)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page {
        items,
        total: list.total,
        page: list.page,
        limit: list.limit,
    })
}

pub fn tag_from_wire(wire: WireTag) -> Result<Tag, ApiError> {
    let color = wire
        .color
        .parse::<TagColor>()
        .map_err(ApiError::Decode)?;
    Ok(Tag {
        created_at: timestamp("createdAt", &wire.created_at)?,
        updated_at: timestamp("updatedAt", &wire.updated_at)?,
        id: wire.id,
        name: wire.name,
        color,
    })
}

pub fn tags_from_wire(tags: Vec<WireTag>) -> Result<Vec<Tag>, ApiError> {
    tags.into_iter().map(tag_from_wire).collect()
}

pub fn saved_search_from_wire(wire: WireSavedSearch) -> Result<SavedSearchCondition, ApiError> {
    Ok(SavedSearchCondition {
        date_from: date("dateFrom", wire.date_from.as_deref())?,
        date_to: date("dateTo", wire.date_to.as_deref())?,
        id: wire.id,
        user_id: wire.user_id,
        condition_name: wire.condition_name,
        keyword: wire.keyword,
        tag_ids: wire.tag_ids,
    })
}

pub fn session_from_wire(wire: WireSession) -> SessionUser {
    SessionUser {
        user_id: wire.user_id,
        display_name: wire.display_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::timestamp::format_timestamp;
    use serde_json::json;

    fn wire_file(extra: serde_json::Value) -> WireFile {
        let mut base = json!({
            "id": "f1",
            "name": "document.pdf",
            "size": 2048,
            "mimeType": "application/pdf",
            "uploadedAt": "2024-01-15T10:30:00.000Z",
            "downloadUrl": "/api/files/f1/download"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn description_missing_null_and_present() {
        let missing = document_from_wire(wire_file(json!({}))).unwrap();
        assert_eq!(missing.description, None);

        let null = document_from_wire(wire_file(json!({ "description": null }))).unwrap();
        assert_eq!(null.description, None);

        let present = document_from_wire(wire_file(json!({ "description": "Q1 numbers" }))).unwrap();
        assert_eq!(present.description.as_deref(), Some("Q1 numbers"));

        let empty = document_from_wire(wire_file(json!({ "description": "" }))).unwrap();
        assert_eq!(empty.description.as_deref(), Some(""));
    }

    #[test]
    fn timestamps_round_trip_through_the_adapter() {
        let doc = document_from_wire(wire_file(json!({}))).unwrap();
        assert_eq!(format_timestamp(&doc.uploaded_at), "2024-01-15T10:30:00.000Z");

        let tag = tag_from_wire(WireTag {
            id: "t1".into(),
            name: "finance".into(),
            color: "green".into(),
            created_at: "2023-11-02T08:15:30.250Z".into(),
            updated_at: "2024-02-29T23:59:59.999Z".into(),
        })
        .unwrap();
        assert_eq!(format_timestamp(&tag.created_at), "2023-11-02T08:15:30.250Z");
        assert_eq!(format_timestamp(&tag.updated_at), "2024-02-29T23:59:59.999Z");
    }

    #[test]
    fn deleted_at_marks_trashed() {
        let doc = document_from_wire(wire_file(json!({ "deletedAt": "2024-02-01T00:00:00.000Z" })))
            .unwrap();
        assert!(doc.status.is_trashed());
        assert_eq!(
            format_timestamp(&doc.status.purge_at().unwrap()),
            "2024-03-02T00:00:00.000Z"
        );
        assert_eq!(document_from_wire(wire_file(json!({}))).unwrap().status, FileStatus::Active);
    }

    #[test]
    fn missing_tag_ids_become_empty() {
        let doc = document_from_wire(wire_file(json!({ "tagIds": null }))).unwrap();
        assert!(doc.tag_ids.is_empty());
        let tagged = document_from_wire(wire_file(json!({ "tagIds": ["b", "a"] }))).unwrap();
        assert_eq!(tagged.tag_ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn bad_timestamp_is_a_decode_error() {
        let err = document_from_wire(wire_file(json!({ "uploadedAt": "not a date" }))).unwrap_err();
        assert!(matches!(err, ApiError::Decode(ref m) if m.contains("uploadedAt")));
    }

    #[test]
    fn page_keeps_order_and_metadata() {
        let list = WireFileList {
            files: vec![
                wire_file(json!({ "id": "z", "name": "z.pdf" })),
                wire_file(json!({ "id": "a", "name": "a.pdf" })),
            ],
            total: 57,
            page: 3,
            limit: 2,
        };
        let page = page_from_wire(list).unwrap();
        let ids: Vec<_> = page.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
        assert_eq!((page.total, page.page, page.limit), (57, 3, 2));
    }

    #[test]
    fn unknown_tag_color_is_rejected() {
        let err = tag_from_wire(WireTag {
            id: "t".into(),
            name: "x".into(),
            color: "chartreuse".into(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn saved_search_dates() {
        let condition = saved_search_from_wire(WireSavedSearch {
            id: "s".into(),
            user_id: "u".into(),
            condition_name: "recent".into(),
            keyword: None,
            tag_ids: None,
            date_from: Some("2024-01-01".into()),
            date_to: None,
        })
        .unwrap();
        assert_eq!(condition.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(condition.date_to, None);
    }
}
