//! Decoded page content handed to site adapters.

use scraper::Html;

use crate::error::ExtractError;
use crate::http::decode_bytes_to_utf8;

/// How a site serves a given kind of page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFormat {
    #[default]
    Html,
    Json,
}

/// A listing or detail page, parsed according to its [`ContentFormat`].
pub enum Document {
    Html(Html),
    Json(serde_json::Value),
}

impl Document {
    /// Decode raw bytes (from the network or the detail cache).
    pub fn decode(
        bytes: &[u8],
        content_type: Option<&str>,
        format: ContentFormat,
    ) -> Result<Self, ExtractError> {
        let text = decode_bytes_to_utf8(bytes, content_type);
        match format {
            ContentFormat::Html => Ok(Document::Html(Html::parse_document(&text))),
            ContentFormat::Json => serde_json::from_str(&text)
                .map(Document::Json)
                .map_err(|e| ExtractError::InvalidJson(e.to_string())),
        }
    }

    pub fn html(&self) -> Result<&Html, ExtractError> {
        match self {
            Document::Html(html) => Ok(html),
            Document::Json(_) => Err(ExtractError::UnexpectedFormat { expected: "HTML" }),
        }
    }

    pub fn json(&self) -> Result<&serde_json::Value, ExtractError> {
        match self {
            Document::Json(value) => Ok(value),
            Document::Html(_) => Err(ExtractError::UnexpectedFormat { expected: "JSON" }),
        }
    }
}

impl From<Html> for Document {
    fn from(html: Html) -> Self {
        Document::Html(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_html() {
        let html = "<h4>肉じゃが</h4>";
        let doc = Document::decode(html.as_bytes(), None, ContentFormat::Html).unwrap();
        assert!(doc.html().is_ok());
        assert_eq!(
            doc.json().unwrap_err(),
            ExtractError::UnexpectedFormat { expected: "JSON" }
        );
    }

    #[test]
    fn decode_json() {
        let doc = Document::decode(br#"{"result": []}"#, None, ContentFormat::Json).unwrap();
        assert!(doc.json().unwrap()["result"].is_array());
    }

    #[test]
    fn decode_broken_json() {
        let err = Document::decode(b"{", None, ContentFormat::Json).err().unwrap();
        assert!(matches!(err, ExtractError::InvalidJson(_)));
    }
}
