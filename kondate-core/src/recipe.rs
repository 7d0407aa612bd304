//! The common recipe record every site adapter produces.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One cooking recipe.
///
/// Adapters create an overview stub from a listing page and then derive one
/// or more finished records from it with [`Recipe::derive`]. Both types are
/// plain owned values, so a derived record never shares state with its stub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Unique within a site. A stub's id is the detail cache key; a derived
    /// record's id is its ledger entry.
    pub id: String,
    pub detail_url: String,
    /// Absolute image URLs in display order.
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub cooking_name: Option<String>,
    /// Episode or segment title.
    pub cooking_name_sub: Option<String>,
    pub program_name: String,
    /// Broadcast date, only when the source states one.
    pub program_date: Option<NaiveDate>,
    #[serde(default)]
    pub materials: Vec<RecipeText>,
    #[serde(default)]
    pub recipe_steps: Vec<RecipeText>,
    #[serde(default)]
    pub important_points: Vec<RecipeText>,
}

impl Recipe {
    /// Create an overview stub with only the cheap listing fields set.
    pub fn overview(
        id: impl Into<String>,
        detail_url: impl Into<String>,
        program_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            detail_url: detail_url.into(),
            image_urls: Vec::new(),
            cooking_name: None,
            cooking_name_sub: None,
            program_name: program_name.into(),
            program_date: None,
            materials: Vec::new(),
            recipe_steps: Vec::new(),
            important_points: Vec::new(),
        }
    }

    /// Copy this stub into the `index`-th record yielded from its detail page.
    ///
    /// Every record gets `"{id}-{index + 1}"`, so no record shares an id with
    /// the page it came from.
    pub fn derive(&self, index: usize) -> Recipe {
        let mut recipe = self.clone();
        recipe.id = format!("{}-{}", self.id, index + 1);
        recipe
    }

    pub fn with_cooking_name(mut self, name: impl Into<String>) -> Self {
        self.cooking_name = Some(name.into());
        self
    }

    pub fn with_cooking_name_sub(mut self, sub: Option<String>) -> Self {
        self.cooking_name_sub = sub;
        self
    }

    pub fn with_program_date(mut self, date: Option<NaiveDate>) -> Self {
        self.program_date = date;
        self
    }

    /// Display name, falling back to the id for untitled stubs.
    pub fn display_name(&self) -> &str {
        self.cooking_name.as_deref().unwrap_or(&self.id)
    }

    /// Every image URL on the record, recipe-level first, without duplicates.
    pub fn all_image_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = Vec::new();
        let lines = self
            .materials
            .iter()
            .chain(&self.recipe_steps)
            .chain(&self.important_points);
        for url in self
            .image_urls
            .iter()
            .chain(lines.flat_map(|line| line.image_urls.iter()))
        {
            if !urls.contains(&url.as_str()) {
                urls.push(url.as_str());
            }
        }
        urls
    }
}

/// One line of ingredient, step, or note content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeText {
    pub text: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub important_points: Vec<String>,
}

impl RecipeText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_urls: Vec::new(),
            important_points: Vec::new(),
        }
    }

    /// An empty separator line.
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.image_urls.is_empty() && self.important_points.is_empty()
    }
}
