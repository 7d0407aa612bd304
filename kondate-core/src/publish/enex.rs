use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use minijinja::Environment;
use serde::Serialize;

use crate::error::{PublishError, StoreError};

use super::{xml_environment, NoteDocument, Publisher};

const ENEX_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE en-export SYSTEM "http://xml.evernote.com/pub/evernote-export3.dtd">
<en-export export-date="{{ exported }}" application="kondate" version="{{ version }}">
{%- for note in notes %}
<note>
<title>{{ note.title }}</title>
<content><![CDATA[{{ note.content|safe }}]]></content>
<created>{{ exported }}</created>
{%- for tag in note.tags %}
<tag>{{ tag }}</tag>
{%- endfor %}
<note-attributes><source-url>{{ note.source_url }}</source-url></note-attributes>
{%- for r in note.resources %}
<resource>
<data encoding="base64">{{ r.data }}</data>
<mime>{{ r.mime }}</mime>
<resource-attributes><source-url>{{ r.source_url }}</source-url><file-name>{{ r.file_name }}</file-name></resource-attributes>
</resource>
{%- endfor %}
</note>
{%- endfor %}
</en-export>
"#;

#[derive(Serialize)]
struct ResourceView<'a> {
    data: String,
    mime: &'a str,
    source_url: &'a str,
    file_name: &'a str,
}

#[derive(Serialize)]
struct NoteView<'a> {
    title: &'a str,
    content: String,
    tags: &'a [String],
    source_url: &'a str,
    resources: Vec<ResourceView<'a>>,
}

#[derive(Serialize)]
struct ExportView<'a> {
    exported: String,
    version: &'static str,
    notes: Vec<NoteView<'a>>,
}

/// `]]>` cannot appear inside a CDATA section, so split it across two.
fn cdata_safe(body: &str) -> String {
    body.replace("]]>", "]]]]><![CDATA[>")
}

/// Collects notes in memory and keeps one merged `.enex` file on disk.
///
/// The file is rewritten after every create or update, so everything the
/// ledger has marked is always in the export. Note ids are positions in the
/// collected list.
pub struct EnexExporter {
    path: PathBuf,
    exported_at: DateTime<Utc>,
    environment: Environment<'static>,
    notes: Mutex<Vec<NoteDocument>>,
}

impl EnexExporter {
    pub const DIR_NAME: &'static str = "_enex";

    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PublishError> {
        let mut environment = xml_environment();
        environment.add_template("enex", ENEX_TEMPLATE)?;
        Ok(Self {
            path: path.into(),
            exported_at: Utc::now(),
            environment,
            notes: Mutex::new(Vec::new()),
        })
    }

    /// Export to `{work_dir}/_enex/{program_name}.{YYYYMMDD}.enex`.
    pub fn for_program(
        work_dir: &Path,
        program_name: &str,
        date: NaiveDate,
    ) -> Result<Self, PublishError> {
        let file_name = format!("{}.{}.enex", program_name, date.format("%Y%m%d"));
        Self::new(work_dir.join(Self::DIR_NAME).join(file_name))
    }

    pub fn with_exported_at(mut self, exported_at: DateTime<Utc>) -> Self {
        self.exported_at = exported_at;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NoteDocument>> {
        self.notes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Render every collected note as one ENEX document.
    pub fn render(&self, notes: &[NoteDocument]) -> Result<String, PublishError> {
        let view = ExportView {
            exported: self.exported_at.format("%Y%m%dT%H%M%SZ").to_string(),
            version: env!("CARGO_PKG_VERSION"),
            notes: notes
                .iter()
                .map(|note| NoteView {
                    title: &note.title,
                    content: cdata_safe(&note.body),
                    tags: &note.tags,
                    source_url: &note.source_url,
                    resources: note
                        .attachments
                        .iter()
                        .map(|a| ResourceView {
                            data: BASE64.encode(&a.data),
                            mime: &a.mime,
                            source_url: &a.source_url,
                            file_name: &a.file_name,
                        })
                        .collect(),
                })
                .collect(),
        };
        Ok(self.environment.get_template("enex")?.render(&view)?)
    }

    fn write(&self, notes: &[NoteDocument]) -> Result<(), PublishError> {
        let xml = self.render(notes)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&tmp, xml).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        tracing::debug!(file = %self.path.display(), notes = notes.len(), "wrote enex export");
        Ok(())
    }
}

#[async_trait]
impl Publisher for EnexExporter {
    async fn find_existing(&self, title: &str) -> Result<Option<String>, PublishError> {
        Ok(self
            .lock()
            .iter()
            .position(|n| n.title == title)
            .map(|i| i.to_string()))
    }

    async fn create(&self, note: &NoteDocument) -> Result<String, PublishError> {
        let mut notes = self.lock();
        notes.push(note.clone());
        if let Err(e) = self.write(&notes) {
            notes.pop();
            return Err(e);
        }
        Ok((notes.len() - 1).to_string())
    }

    async fn update(&self, note_id: &str, note: &NoteDocument) -> Result<(), PublishError> {
        let mut notes = self.lock();
        let slot = note_id
            .parse::<usize>()
            .ok()
            .filter(|&i| i < notes.len())
            .ok_or_else(|| PublishError::Status {
                status: 404,
                body: format!("no exported note {}", note_id),
            })?;
        let previous = std::mem::replace(&mut notes[slot], note.clone());
        if let Err(e) = self.write(&notes) {
            notes[slot] = previous;
            return Err(e);
        }
        Ok(())
    }
}
