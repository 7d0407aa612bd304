//! JSON-over-HTTP notes service.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST notes/search` with `{notebook, title}` returns `{notes: [{id, title}]}`
//! - `POST notes` with a note body returns `{id}`
//! - `PUT notes/{id}` with a note body

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

use super::{NoteDocument, Publisher};

/// Notes service client, bound to one notebook.
#[derive(Debug)]
pub struct NoteServiceClient {
    endpoint: String,
    token: String,
    notebook_name: String,
    client: reqwest::Client,
}

impl NoteServiceClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        notebook_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            notebook_name: notebook_name.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn notebook_name(&self) -> &str {
        &self.notebook_name
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, PublishError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(PublishError::Status { status, body });
        }
        Ok(body)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    notebook: &'a str,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    notes: Vec<NoteSummary>,
}

#[derive(Debug, Deserialize)]
struct NoteSummary {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct ResourceBody<'a> {
    mime: &'a str,
    hash: &'a str,
    file_name: &'a str,
    source_url: &'a str,
    /// Base64.
    data: String,
}

#[derive(Debug, Serialize)]
struct NoteBody<'a> {
    notebook: &'a str,
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
    source_url: &'a str,
    resources: Vec<ResourceBody<'a>>,
}

impl<'a> NoteBody<'a> {
    fn new(notebook: &'a str, note: &'a NoteDocument) -> Self {
        Self {
            notebook,
            title: &note.title,
            content: &note.body,
            tags: &note.tags,
            source_url: &note.source_url,
            resources: note
                .attachments
                .iter()
                .map(|a| ResourceBody {
                    mime: &a.mime,
                    hash: &a.hash,
                    file_name: &a.file_name,
                    source_url: &a.source_url,
                    data: BASE64.encode(&a.data),
                })
                .collect(),
        }
    }
}

/// The search is fuzzy on the service side; only an exact title counts.
fn exact_match(response: SearchResponse, title: &str) -> Option<String> {
    response
        .notes
        .into_iter()
        .find(|n| n.title == title)
        .map(|n| n.id)
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, PublishError> {
    serde_json::from_str(body).map_err(|e| PublishError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl Publisher for NoteServiceClient {
    async fn find_existing(&self, title: &str) -> Result<Option<String>, PublishError> {
        let request = SearchRequest {
            notebook: &self.notebook_name,
            title,
        };
        let body = self
            .send(self.client.post(self.url("notes/search")).json(&request))
            .await?;
        Ok(exact_match(parse(&body)?, title))
    }

    async fn create(&self, note: &NoteDocument) -> Result<String, PublishError> {
        let request = NoteBody::new(&self.notebook_name, note);
        let body = self
            .send(self.client.post(self.url("notes")).json(&request))
            .await?;
        let created: CreateResponse = parse(&body)?;
        tracing::debug!(note_id = %created.id, title = %note.title, "created note");
        Ok(created.id)
    }

    async fn update(&self, note_id: &str, note: &NoteDocument) -> Result<(), PublishError> {
        let request = NoteBody::new(&self.notebook_name, note);
        self.send(
            self.client
                .put(self.url(&format!("notes/{}", note_id)))
                .json(&request),
        )
        .await?;
        tracing::debug!(note_id, title = %note.title, "updated note");
        Ok(())
    }
}
