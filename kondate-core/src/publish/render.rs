//! Recipe to note conversion.

use std::collections::{BTreeSet, HashMap};

use minijinja::Environment;
use serde::Serialize;

use crate::error::PublishError;
use crate::http::{file_name_of, HttpClient};
use crate::recipe::{Recipe, RecipeText};

use super::xml_environment;

const DEFAULT_TAGS: [&str; 2] = ["recipe", "レシピ"];

const NOTE_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">
<en-note>
<h1><a href="{{ detail_url }}">{{ cooking_name }}</a></h1>
{%- if cooking_name_sub %}
{{ cooking_name_sub }}<br />
{%- endif %}
{%- for m in media %}
<en-media type="{{ m.mime }}" hash="{{ m.hash }}" /><br />
{%- endfor %}
{%- if materials %}
<h2>材料</h2>
<ul>
{%- for line in materials %}
    <li>
{%- for l in line.lines %}
        <div>{{ l }}</div>
{%- endfor %}
{%- for m in line.media %}
        <br /><en-media type="{{ m.mime }}" hash="{{ m.hash }}" />
{%- endfor %}
{%- for point in line.points %}
        <br /><strong>{{ point }}</strong>
{%- endfor %}
    </li>
{%- endfor %}
</ul>
{%- endif %}
{%- if steps %}
<h2>作り方</h2>
{%- for point in important_points %}
<strong>{{ point }}</strong><br />
{%- endfor %}
<ul>
{%- for line in steps %}
    <li>
{%- for l in line.lines %}
        <div>{{ l }}</div>
{%- endfor %}
{%- for m in line.media %}
        <br /><en-media type="{{ m.mime }}" hash="{{ m.hash }}" />
{%- endfor %}
{%- for point in line.points %}
        <br /><strong>{{ point }}</strong>
{%- endfor %}
    </li>
{%- endfor %}
</ul>
{%- endif %}
</en-note>
"#;

/// A fetched image embedded in a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub source_url: String,
    pub file_name: String,
    pub mime: String,
    /// MD5 hex of `data`, referenced from the body's `en-media` tags.
    pub hash: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(source_url: impl Into<String>, data: Vec<u8>) -> Self {
        let source_url = source_url.into();
        let file_name = file_name_of(&source_url).unwrap_or_else(|| "image".to_string());
        let mime = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            hash: format!("{:x}", md5::compute(&data)),
            source_url,
            file_name,
            mime,
            data,
        }
    }
}

/// A rendered note, ready for any [`super::Publisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDocument {
    pub title: String,
    /// ENML markup.
    pub body: String,
    /// Sorted and unique.
    pub tags: Vec<String>,
    pub source_url: String,
    pub attachments: Vec<Attachment>,
}

/// `{program_name}「{cooking_name}」 YYYY.MM.DD`
pub fn note_title(recipe: &Recipe) -> String {
    let mut title = format!("{}「{}」", recipe.program_name, recipe.display_name());
    if let Some(date) = recipe.program_date {
        title.push_str(&date.format(" %Y.%m.%d").to_string());
    }
    title
}

pub fn note_tags(recipe: &Recipe, site_tags: &[String]) -> Vec<String> {
    let mut tags: BTreeSet<String> = DEFAULT_TAGS.iter().map(|t| t.to_string()).collect();
    tags.insert(recipe.program_name.clone());
    if let Some(date) = recipe.program_date {
        tags.insert(date.format("%Y.%m").to_string());
        tags.insert(date.format("%Y").to_string());
    }
    tags.extend(site_tags.iter().cloned());
    tags.into_iter().collect()
}

#[derive(Serialize)]
struct MediaRef<'a> {
    mime: &'a str,
    hash: &'a str,
}

#[derive(Serialize)]
struct LineView<'a> {
    lines: Vec<&'a str>,
    media: Vec<MediaRef<'a>>,
    points: &'a [String],
}

#[derive(Serialize)]
struct NoteView<'a> {
    detail_url: &'a str,
    cooking_name: &'a str,
    cooking_name_sub: Option<&'a str>,
    media: Vec<MediaRef<'a>>,
    materials: Vec<LineView<'a>>,
    steps: Vec<LineView<'a>>,
    important_points: Vec<&'a str>,
}

fn media_for<'a>(urls: &[String], by_url: &HashMap<&str, &'a Attachment>) -> Vec<MediaRef<'a>> {
    urls.iter()
        .filter_map(|url| by_url.get(url.as_str()).copied())
        .map(|a| MediaRef {
            mime: &a.mime,
            hash: &a.hash,
        })
        .collect()
}

/// A blank line still renders as an empty separator.
fn line_view<'a>(line: &'a RecipeText, by_url: &HashMap<&str, &'a Attachment>) -> LineView<'a> {
    LineView {
        lines: if line.text.is_empty() {
            vec![""]
        } else {
            line.text.lines().collect()
        },
        media: media_for(&line.image_urls, by_url),
        points: &line.important_points,
    }
}

/// Renders recipes as ENML notes with their images attached.
pub struct NoteRenderer {
    environment: Environment<'static>,
    tag_names: Vec<String>,
}

impl NoteRenderer {
    pub fn new(tag_names: Vec<String>) -> Result<Self, PublishError> {
        let mut environment = xml_environment();
        environment.add_template("note", NOTE_TEMPLATE)?;
        Ok(Self {
            environment,
            tag_names,
        })
    }

    /// Fetch every image the recipe references and render the note.
    ///
    /// Images that fail to download are left out of the note.
    pub async fn render(
        &self,
        recipe: &Recipe,
        client: &dyn HttpClient,
    ) -> Result<NoteDocument, PublishError> {
        let mut attachments = Vec::new();
        for url in recipe.all_image_urls() {
            match client.fetch_bytes(url).await {
                Ok(data) => attachments.push(Attachment::new(url, data)),
                Err(e) => tracing::warn!(id = %recipe.id, url, error = %e, "skip image"),
            }
        }
        self.render_with(recipe, attachments)
    }

    /// Render with already fetched attachments.
    pub fn render_with(
        &self,
        recipe: &Recipe,
        attachments: Vec<Attachment>,
    ) -> Result<NoteDocument, PublishError> {
        let cooking_name = recipe
            .cooking_name
            .as_deref()
            .ok_or_else(|| PublishError::Untitled(recipe.id.clone()))?;

        let by_url: HashMap<&str, &Attachment> = attachments
            .iter()
            .map(|a| (a.source_url.as_str(), a))
            .collect();

        let view = NoteView {
            detail_url: &recipe.detail_url,
            cooking_name,
            cooking_name_sub: recipe.cooking_name_sub.as_deref(),
            media: media_for(&recipe.image_urls, &by_url),
            materials: recipe
                .materials
                .iter()
                .map(|line| line_view(line, &by_url))
                .collect(),
            steps: recipe
                .recipe_steps
                .iter()
                .map(|line| line_view(line, &by_url))
                .collect(),
            important_points: recipe
                .important_points
                .iter()
                .map(|p| p.text.as_str())
                .collect(),
        };

        let body = self.environment.get_template("note")?.render(&view)?;

        Ok(NoteDocument {
            title: note_title(recipe),
            body,
            tags: note_tags(recipe, &self.tag_names),
            source_url: recipe.detail_url.clone(),
            attachments,
        })
    }
}
