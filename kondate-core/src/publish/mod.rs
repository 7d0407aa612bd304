//! Publishing finished recipes as notes.
//!
//! [`NoteRenderer`] turns a [`Recipe`](crate::Recipe) into a [`NoteDocument`];
//! a [`Publisher`] stores it. Two publishers ship: the remote
//! [`NoteServiceClient`] and the local [`EnexExporter`].

mod enex;
mod notes_service;
mod render;

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use minijinja::{Environment, ErrorKind};

use crate::error::PublishError;

pub use enex::EnexExporter;
pub use notes_service::NoteServiceClient;
pub use render::{note_tags, note_title, Attachment, NoteDocument, NoteRenderer};

pub(crate) fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Template environment whose output is XML-escaped unless marked `safe`.
pub(crate) fn xml_environment() -> Environment<'static> {
    let mut environment = Environment::new();
    environment.set_formatter(|out, _state, value| {
        let text = value.to_string();
        let rendered = if value.is_safe() {
            text
        } else {
            xml_escape(&text)
        };
        out.write_str(&rendered)
            .map_err(|_| minijinja::Error::new(ErrorKind::WriteFailure, "failed to write output"))
    });
    environment
}

/// A notes store the crawler can publish into.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Id of a note with exactly this title, if one exists.
    async fn find_existing(&self, title: &str) -> Result<Option<String>, PublishError>;

    /// Create a note and return its id.
    async fn create(&self, note: &NoteDocument) -> Result<String, PublishError>;

    async fn update(&self, note_id: &str, note: &NoteDocument) -> Result<(), PublishError>;
}

/// In-memory publisher for testing. Records every call.
#[derive(Default)]
pub struct RecordingPublisher {
    existing: HashSet<String>,
    failing: HashSet<String>,
    created: Mutex<Vec<NoteDocument>>,
    updated: Mutex<Vec<(String, NoteDocument)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a note with this title already exists.
    pub fn with_existing(mut self, title: impl Into<String>) -> Self {
        self.existing.insert(title.into());
        self
    }

    /// Fail every create or update of a note with this title.
    pub fn failing_on(mut self, title: impl Into<String>) -> Self {
        self.failing.insert(title.into());
        self
    }

    pub fn created(&self) -> Vec<NoteDocument> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.created().into_iter().map(|n| n.title).collect()
    }

    pub fn updated(&self) -> Vec<(String, NoteDocument)> {
        self.updated.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn check(&self, note: &NoteDocument) -> Result<(), PublishError> {
        if self.failing.contains(&note.title) {
            return Err(PublishError::Status {
                status: 500,
                body: format!("rejected {}", note.title),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn find_existing(&self, title: &str) -> Result<Option<String>, PublishError> {
        if self.existing.contains(title) {
            return Ok(Some(format!("existing:{}", title)));
        }
        let created = self.created();
        Ok(created
            .iter()
            .position(|n| n.title == title)
            .map(|i| i.to_string()))
    }

    async fn create(&self, note: &NoteDocument) -> Result<String, PublishError> {
        self.check(note)?;
        let mut created = self
            .created
            .lock()
            .map_err(|_| PublishError::Status {
                status: 500,
                body: "poisoned".to_string(),
            })?;
        created.push(note.clone());
        Ok((created.len() - 1).to_string())
    }

    async fn update(&self, note_id: &str, note: &NoteDocument) -> Result<(), PublishError> {
        self.check(note)?;
        if let Ok(mut updated) = self.updated.lock() {
            updated.push((note_id.to_string(), note.clone()));
        }
        Ok(())
    }
}
