use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::validation::FileCandidate;

/// Days a trashed file stays recoverable before it is purged.
pub const TRASH_RETENTION_DAYS: i64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub download_url: String,
    pub tag_ids: Vec<String>,
    pub status: FileStatus,
}

impl Document {
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tag_ids.iter().any(|t| t == tag_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FileStatus {
    Uploading,
    Active,
    #[serde(rename_all = "camelCase")]
    Trashed { deleted_at: DateTime<Utc> },
    PermanentlyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEvent {
    UploadCompleted,
    MoveToTrash { at: DateTime<Utc> },
    Restore,
    Purge,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("file cannot go from {from} via {event}")]
pub struct LifecycleError {
    pub from: &'static str,
    pub event: &'static str,
}

impl FileStatus {
    pub fn name(&self) -> &'static str {
        match self {
            FileStatus::Uploading => "uploading",
            FileStatus::Active => "active",
            FileStatus::Trashed { .. } => "trashed",
            FileStatus::PermanentlyDeleted => "permanently deleted",
        }
    }

    pub fn apply(&self, event: FileEvent) -> Result<FileStatus, LifecycleError> {
        match (self, event) {
            (FileStatus::Uploading, FileEvent::UploadCompleted) => Ok(FileStatus::Active),
            (FileStatus::Active, FileEvent::MoveToTrash { at }) => {
                Ok(FileStatus::Trashed { deleted_at: at })
            }
            (FileStatus::Trashed { .. }, FileEvent::Restore) => Ok(FileStatus::Active),
            (FileStatus::Trashed { .. }, FileEvent::Purge) => Ok(FileStatus::PermanentlyDeleted),
            (from, event) => Err(LifecycleError {
                from: from.name(),
                event: event.name(),
            }),
        }
    }

    pub fn is_trashed(&self) -> bool {
        matches!(self, FileStatus::Trashed { .. })
    }

    pub fn purge_at(&self) -> Option<DateTime<Utc>> {
        match self {
            FileStatus::Trashed { deleted_at } => {
                Some(*deleted_at + Duration::days(TRASH_RETENTION_DAYS))
            }
            _ => None,
        }
    }

    pub fn is_purge_due(&self, now: DateTime<Utc>) -> bool {
        self.purge_at().is_some_and(|at| now >= at)
    }
}

impl FileEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FileEvent::UploadCompleted => "upload completed",
            FileEvent::MoveToTrash { .. } => "move to trash",
            FileEvent::Restore => "restore",
            FileEvent::Purge => "purge",
        }
    }
}

/// A local file ready to be sent as multipart form data.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub description: Option<String>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn candidate(&self) -> FileCandidate {
        FileCandidate::new(&self.file_name, &self.mime_type, self.data.len() as u64)
    }
}

/// Partial update; `None` fields are left untouched. An empty description clears it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
}

impl UpdateFileRequest {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn describe(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn retag(tag_ids: Vec<String>) -> Self {
        Self {
            tag_ids: Some(tag_ids),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}
