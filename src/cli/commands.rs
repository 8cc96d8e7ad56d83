use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use log::info;

use super::{Commands, SearchCommand, TagCommand};
use crate::cache::QueryKey;
use crate::models::{
    CreateTagRequest, Document, LoginRequest, Page, SavedSearchInput, Tag, TrashQuery,
    UpdateFileRequest, UpdateTagRequest, UploadRequest,
};
use crate::repository::Repository;
use crate::services::{keys, Query, QueryClient, QueryStatus};
use crate::utils::mime::guess_mime_type;
use crate::utils::timestamp::{format_date, format_timestamp};
use crate::utils::validation::{
    validate_date_range, validate_description, validate_file_name, validate_files,
    validate_keyword, validate_tag_name, FileCandidate,
};
use crate::view::{PreferenceStore, SubmitOutcome, UploadDialog, ViewState, SESSION_COOKIE_KEY};

/// Everything one CLI session works with.
pub struct App<R: Repository + 'static, S: PreferenceStore> {
    pub client: QueryClient<R>,
    pub view: ViewState<S>,
    upload: UploadDialog,
    list: Query<Page<Document>>,
    detail: Query<Document>,
}

impl<R: Repository + 'static, S: PreferenceStore> App<R, S> {
    pub fn new(client: QueryClient<R>, view: ViewState<S>) -> Self {
        Self {
            client,
            view,
            upload: UploadDialog::new(),
            list: Query::new(QueryKey::resource(keys::FILES)),
            detail: Query::new(QueryKey::resource(keys::FILE_DETAIL)),
        }
    }

    /// The file list as last shown by `list`.
    pub fn list(&self) -> &Query<Page<Document>> {
        &self.list
    }

    pub fn detail(&self) -> &Query<Document> {
        &self.detail
    }

    /// Hands a stored session cookie back to the repository.
    pub async fn restore_session(&self) {
        if let Some(cookie) = self.view.store().get(SESSION_COOKIE_KEY) {
            self.client.repository().restore_session_token(Some(cookie)).await;
        }
    }

    async fn persist_session(&mut self) -> Result<()> {
        match self.client.repository().session_token().await {
            Some(token) => self.view.store_mut().set(SESSION_COOKIE_KEY, &token)?,
            None => self.view.store_mut().remove(SESSION_COOKIE_KEY)?,
        }
        Ok(())
    }

    /// Accepts tag ids or case-insensitive tag names.
    async fn resolve_tags(&self, wanted: &[String]) -> Result<Vec<String>> {
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let tags = self.client.tags().await?;
        wanted
            .iter()
            .map(|w| {
                tags.iter()
                    .find(|t| &t.id == w || t.same_name(w))
                    .map(|t| t.id.clone())
                    .ok_or_else(|| anyhow!("Unknown tag '{}'", w))
            })
            .collect()
    }

    pub async fn handle(&mut self, cmd: Commands) -> Result<()> {
        match cmd {
            Commands::Login { user, password, remember } => {
                let session = self
                    .client
                    .login(&LoginRequest {
                        user_id: user,
                        password,
                        remember_me: remember,
                    })
                    .await?;
                self.persist_session().await?;
                println!("Logged in as {}", display_user(&session.user_id, session.display_name.as_deref()));
            }
            Commands::Logout => {
                let result = self.client.logout().await;
                self.persist_session().await?;
                result?;
                println!("Logged out.");
            }
            Commands::Whoami => {
                let session = self.client.session().await?;
                println!("Logged in as {}", display_user(&session.user_id, session.display_name.as_deref()));
            }
            Commands::List { search, tags, from, to, page, clear } => {
                if clear {
                    self.view.clear_filters();
                }
                if let Some(search) = search {
                    validate_keyword(&search).map_err(|e| anyhow!(e))?;
                    self.view.set_search_query(search);
                }
                for tag in self.resolve_tags(&tags).await? {
                    self.view.toggle_tag(&tag);
                }
                if from.is_some() || to.is_some() {
                    validate_date_range(from, to).map_err(|e| anyhow!(e))?;
                    self.view.set_date_range(from, to);
                }
                if let Some(page) = page {
                    self.view.set_page(page);
                }
                self.print_list().await?;
            }
            Commands::Show { id } => {
                let status = self.client.load_file(&mut self.detail, &id).await?;
                let document = settled(status)?;
                let tags = self.client.tags().await?;
                print_document(document, &tags);
            }
            Commands::Upload { paths, description } => {
                self.upload_paths(paths, description).await?;
            }
            Commands::Download { id, output } => {
                let file = self.client.download(&id).await?;
                let target = output.unwrap_or_else(|| PathBuf::from(&file.file_name));
                tokio::fs::write(&target, &file.data)
                    .await
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                println!("Downloaded {} ({}) to {}", file.file_name, file.mime_type, target.display());
            }
            Commands::Rename { id, name } => {
                validate_file_name(&name).map_err(|e| anyhow!(e))?;
                let document = self.client.update_file(&id, &UpdateFileRequest::rename(name)).await?;
                println!("Renamed to {}", document.name);
            }
            Commands::Describe { id, description } => {
                validate_description(&description).map_err(|e| anyhow!(e))?;
                self.client
                    .update_file(&id, &UpdateFileRequest::describe(description))
                    .await?;
                println!("Description updated.");
            }
            Commands::Retag { id, tags } => {
                let tag_ids = self.resolve_tags(&tags).await?;
                self.client
                    .update_file(&id, &UpdateFileRequest::retag(tag_ids))
                    .await?;
                println!("Tags updated.");
            }
            Commands::Delete { id } => {
                self.client.delete_file(&id).await?;
                println!("Moved {} to the trash.", id);
            }
            Commands::Trash { page } => {
                let query = TrashQuery {
                    page: page.max(1),
                    limit: self.view.page_size,
                };
                let trash = self.client.trash(&query).await?;
                if trash.items.is_empty() {
                    println!("Trash is empty.");
                }
                for document in &trash.items {
                    let purge = document
                        .status
                        .purge_at()
                        .map(|at| format_date(&at.date_naive()))
                        .unwrap_or_else(|| "-".to_string());
                    println!("{}  {}  purged on {}", document.id, document.name, purge);
                }
                print_paging(trash.page, trash.total_pages(), trash.total);
            }
            Commands::Restore { id } => {
                let document = self.client.restore_file(&id).await?;
                println!("Restored {}", document.name);
            }
            Commands::Purge { id } => {
                self.client.permanently_delete_file(&id).await?;
                println!("Permanently deleted {}", id);
            }
            Commands::Tag(cmd) => self.handle_tag(cmd).await?,
            Commands::Search(cmd) => self.handle_search(cmd).await?,
            Commands::View { mode, sort_by, order, page_size } => {
                if let Some(mode) = mode {
                    self.view.set_view_mode(mode)?;
                }
                if let Some(sort_by) = sort_by {
                    self.view.set_sort_by(sort_by)?;
                }
                if let Some(order) = order {
                    self.view.set_sort_order(order)?;
                }
                if let Some(size) = page_size {
                    self.view.set_page_size(size)?;
                }
                println!(
                    "view={} sort={} {} page-size={}",
                    self.view.view_mode, self.view.sort_by, self.view.sort_order, self.view.page_size
                );
            }
            Commands::Shell => bail!("Already in the shell."),
        }
        Ok(())
    }

    async fn upload_paths(&mut self, paths: Vec<PathBuf>, description: Option<String>) -> Result<()> {
        if let Some(description) = &description {
            validate_description(description).map_err(|e| anyhow!(e))?;
        }
        // Sizes come from metadata so refused files are never read.
        let mut candidates = Vec::with_capacity(paths.len());
        for path in &paths {
            let metadata = tokio::fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            let name = file_name_of(path)?;
            let mime_type = guess_mime_type(&name);
            candidates.push(FileCandidate::new(name, mime_type, metadata.len()));
        }
        let checked = validate_files(&candidates, self.client.rules());
        if !checked.valid {
            bail!(checked.errors.join("\n"));
        }

        let mut requests = Vec::with_capacity(paths.len());
        for (path, candidate) in paths.iter().zip(candidates) {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            let mut request = UploadRequest::new(candidate.name, candidate.mime_type, data);
            if let Some(description) = &description {
                request = request.with_description(description.clone());
            }
            requests.push(request);
        }

        self.upload.close()?;
        self.upload.open()?;
        self.upload.select_files(requests, self.client.rules())?;
        if !self.upload.errors().is_empty() {
            let errors = self.upload.errors().join("\n");
            self.upload.close()?;
            bail!(errors);
        }
        match self.upload.submit(&self.client).await? {
            SubmitOutcome::Uploaded(documents) => {
                for document in documents {
                    println!("Uploaded: {} ({})", document.id, document.name);
                }
                Ok(())
            }
            SubmitOutcome::Failed(errors) => {
                self.upload.close()?;
                bail!(errors.join("\n"))
            }
        }
    }

    async fn print_list(&mut self) -> Result<()> {
        let params = self.view.file_query();
        let status = self.client.load_files(&mut self.list, &params).await?;
        let page = settled(status)?;
        let tags = self.client.tags().await?;
        if page.items.is_empty() {
            println!("No documents.");
        }
        for document in &page.items {
            let names = tag_names(document, &tags);
            match self.view.view_mode {
                crate::view::ViewMode::List => println!(
                    "{}  {:<32} {:>10}  {}  {}",
                    document.id,
                    document.name,
                    format_size(document.size),
                    format_timestamp(&document.uploaded_at),
                    names.join(",")
                ),
                crate::view::ViewMode::Grid => println!("[{}] {}", document.name, names.join(",")),
            }
        }
        print_paging(page.page, page.total_pages(), page.total);
        Ok(())
    }

    async fn handle_tag(&mut self, cmd: TagCommand) -> Result<()> {
        match cmd {
            TagCommand::List => {
                let tags = self.client.tags().await?;
                if tags.is_empty() {
                    println!("No tags.");
                }
                for tag in tags {
                    println!("{}  {} ({})", tag.id, tag.name, tag.color);
                }
            }
            TagCommand::Create { name, color } => {
                validate_tag_name(&name).map_err(|e| anyhow!(e))?;
                let tag = self
                    .client
                    .create_tag(&CreateTagRequest {
                        name: name.trim().to_string(),
                        color,
                    })
                    .await?;
                println!("Created tag {} ({})", tag.name, tag.id);
            }
            TagCommand::Update { id, name, color } => {
                if let Some(name) = &name {
                    validate_tag_name(name).map_err(|e| anyhow!(e))?;
                }
                let tag = self
                    .client
                    .update_tag(&id, &UpdateTagRequest { name, color })
                    .await?;
                println!("Updated tag {} ({})", tag.name, tag.color);
            }
            TagCommand::Delete { id } => {
                self.client.delete_tag(&id).await?;
                self.view.selected_tags.remove(&id);
                println!("Deleted tag {}", id);
            }
        }
        Ok(())
    }

    async fn handle_search(&mut self, cmd: SearchCommand) -> Result<()> {
        match cmd {
            SearchCommand::List => {
                for condition in self.client.saved_searches().await? {
                    println!(
                        "{}  {}  {}",
                        condition.id,
                        condition.condition_name,
                        describe_filters(
                            condition.keyword.as_deref(),
                            condition.tag_ids.as_deref().unwrap_or_default(),
                            condition.date_from,
                            condition.date_to
                        )
                    );
                }
            }
            SearchCommand::Save { name, keyword, tags, from, to } => {
                if let Some(keyword) = &keyword {
                    validate_keyword(keyword).map_err(|e| anyhow!(e))?;
                }
                validate_date_range(from, to).map_err(|e| anyhow!(e))?;
                let tag_ids = self.resolve_tags(&tags).await?;
                let input = SavedSearchInput {
                    condition_name: name,
                    keyword,
                    tag_ids: (!tag_ids.is_empty()).then_some(tag_ids),
                    date_from: from,
                    date_to: to,
                };
                let condition = self.client.create_saved_search(&input).await?;
                println!("Saved search {} ({})", condition.condition_name, condition.id);
            }
            SearchCommand::Apply { id } => {
                let conditions = self.client.saved_searches().await?;
                let condition = conditions
                    .iter()
                    .find(|c| c.id == id || c.condition_name == id)
                    .ok_or_else(|| anyhow!("Unknown saved search '{}'", id))?;
                self.view.apply_saved_search(condition);
                info!("Applied saved search {}", condition.condition_name);
                self.print_list().await?;
            }
            SearchCommand::Delete { id } => {
                self.client.delete_saved_search(&id).await?;
                println!("Deleted saved search {}", id);
            }
        }
        Ok(())
    }
}

fn settled<T>(status: &QueryStatus<T>) -> Result<&T> {
    match status {
        QueryStatus::Success(data) => Ok(data),
        QueryStatus::Error(err) => Err(err.clone().into()),
        other => bail!("read is still {}", other.name()),
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("'{}' has no file name", path.display()))
}

fn display_user(user_id: &str, display_name: Option<&str>) -> String {
    match display_name {
        Some(name) => format!("{} ({})", name, user_id),
        None => user_id.to_string(),
    }
}

fn tag_names(document: &Document, tags: &[Tag]) -> Vec<String> {
    document
        .tag_ids
        .iter()
        .map(|id| {
            tags.iter()
                .find(|t| &t.id == id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| id.clone())
        })
        .collect()
}

fn print_document(document: &Document, tags: &[Tag]) {
    println!("Id:          {}", document.id);
    println!("Name:        {}", document.name);
    println!("Type:        {}", document.mime_type);
    println!("Size:        {}", format_size(document.size));
    println!("Uploaded:    {}", format_timestamp(&document.uploaded_at));
    println!("Description: {}", document.description.as_deref().unwrap_or("-"));
    println!("Tags:        {}", tag_names(document, tags).join(", "));
    println!("Status:      {}", document.status.name());
}

fn print_paging(page: u32, pages: u64, total: u64) {
    println!("-- page {} of {} ({} total)", page, pages.max(1), total);
}

fn describe_filters(
    keyword: Option<&str>,
    tag_ids: &[String],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> String {
    let mut parts = Vec::new();
    if let Some(keyword) = keyword {
        parts.push(format!("keyword={}", keyword));
    }
    if !tag_ids.is_empty() {
        parts.push(format!("tags={}", tag_ids.join(",")));
    }
    if let Some(from) = from {
        parts.push(format!("from={}", format_date(&from)));
    }
    if let Some(to) = to {
        parts.push(format!("to={}", format_date(&to)));
    }
    parts.join(" ")
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
