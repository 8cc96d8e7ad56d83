use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::models::{SortBy, SortOrder, TagColor};
use crate::view::ViewMode;

pub mod commands;

#[derive(Parser)]
#[command(name = "docs-cli")]
#[command(about = "A CLI for the document manager", long_about = None)]
pub struct Cli {
    /// Use the in-memory service instead of the HTTP API.
    #[arg(long)]
    pub mock: bool,
    /// Overrides DOCS_API_URL.
    #[arg(long)]
    pub api_url: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

/// One line typed into the interactive shell.
#[derive(Parser)]
#[command(name = "docs", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Login {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        remember: bool,
    },
    Logout,
    Whoami,
    /// List documents with the current filters.
    List {
        #[arg(short, long)]
        search: Option<String>,
        /// Tag id or name; toggles it in the filter.
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(short, long)]
        page: Option<u32>,
        /// Drop all filters first.
        #[arg(long)]
        clear: bool,
    },
    Show {
        id: String,
    },
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(short, long)]
        description: Option<String>,
    },
    Download {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Rename {
        id: String,
        name: String,
    },
    Describe {
        id: String,
        description: String,
    },
    /// Replace the tags of a document.
    Retag {
        id: String,
        tags: Vec<String>,
    },
    /// Move a document to the trash.
    Delete {
        id: String,
    },
    Trash {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    Restore {
        id: String,
    },
    /// Delete a trashed document for good.
    Purge {
        id: String,
    },
    #[command(subcommand)]
    Tag(TagCommand),
    #[command(subcommand)]
    Search(SearchCommand),
    /// Show or change list preferences.
    View {
        #[arg(long)]
        mode: Option<ViewMode>,
        #[arg(long)]
        sort_by: Option<SortBy>,
        #[arg(long)]
        order: Option<SortOrder>,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Interactive shell.
    Shell,
}

#[derive(Subcommand)]
pub enum TagCommand {
    List,
    Create {
        name: String,
        #[arg(short, long, default_value = "blue")]
        color: TagColor,
    },
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        color: Option<TagColor>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SearchCommand {
    List,
    Save {
        name: String,
        #[arg(short, long)]
        keyword: Option<String>,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Load a saved search into the list filters.
    Apply {
        id: String,
    },
    Delete {
        id: String,
    },
}
