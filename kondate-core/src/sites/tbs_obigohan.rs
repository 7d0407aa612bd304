//! TBS 「おびゴハン！」
//!
//! The listing links each day's page from a `div.waku` tile. Detail URLs end
//! in the broadcast date (`.../20200101.html`), which doubles as the id.
//! Older listings are reachable through the `#backBtn` link.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::adapter::{RecipeStream, SiteAdapter, SiteSettings};
use crate::document::Document;
use crate::error::ExtractError;
use crate::http::resolve_url;
use crate::recipe::{Recipe, RecipeText};
use crate::text::{
    element_text, full_width_parens, numbered_step, parse_compact_date, select_required,
};

use super::failed;

pub const SITE_NAME: &str = "tbs_obigohan";

static DETAIL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\D*(\d+)\D*$").expect("Invalid detail id regex"));

static WAKU: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.waku").expect("Invalid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid selector"));
static BACK_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#backBtn a[href]").expect("Invalid selector"));
static RECIPE_AREA: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section.recipe_area").expect("Invalid selector"));
static H4: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h4").expect("Invalid selector"));
static PIC_SUB: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.pic_sub").expect("Invalid selector"));
static MATERIAL_BOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.material_box").expect("Invalid selector"));
static PEOPLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.people").expect("Invalid selector"));
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("Invalid selector"));
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("Invalid selector"));
static RECIPE_MAIN_BOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.recipe_main_box").expect("Invalid selector"));
static RECIPE_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.recipe_text").expect("Invalid selector"));
static POINT_BOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.point_box_wide").expect("Invalid selector"));
static POINT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.point").expect("Invalid selector"));

pub struct TbsObigohan {
    settings: SiteSettings,
}

impl TbsObigohan {
    pub fn new(settings: SiteSettings) -> Self {
        Self { settings }
    }

    pub fn factory(settings: SiteSettings) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(settings))
    }
}

impl SiteAdapter for TbsObigohan {
    fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    fn previous_listing_url(&self, listing: &Document, page_url: &str) -> Option<String> {
        let html = listing.html().ok()?;
        let href = html.select(&BACK_LINK).next()?.value().attr("href")?;
        resolve_url(page_url, href)
    }

    fn get_recipe_overviews(
        &self,
        listing: &Document,
        source_url: &str,
    ) -> Result<IndexMap<String, Recipe>, ExtractError> {
        let html = listing.html()?;
        let mut recipes = IndexMap::new();

        for waku in html.select(&WAKU) {
            let Some(link) = waku.select(&LINK).next() else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or_default();
            let detail_url = resolve_url(source_url, href)
                .ok_or_else(|| ExtractError::invalid("href", href))?;
            let id = DETAIL_ID_REGEX
                .captures(&detail_url)
                .map(|caps| caps[1].to_string())
                .ok_or_else(|| ExtractError::invalid("detail_url", detail_url.as_str()))?;

            let recipe = Recipe::overview(id.as_str(), detail_url, self.program_name())
                .with_program_date(parse_compact_date(&id));
            recipes.insert(id, recipe);
        }

        Ok(recipes)
    }

    fn parse_recipe_details<'a>(
        &'a self,
        detail: &'a Document,
        overview: &'a Recipe,
    ) -> RecipeStream<'a> {
        let html = match detail.html() {
            Ok(html) => html,
            Err(e) => return failed(e),
        };

        Box::new(
            html.select(&RECIPE_AREA)
                .filter(|area| area.select(&H4).next().is_some())
                .enumerate()
                .map(move |(i, area)| parse_recipe_area(area, overview, overview.derive(i))),
        )
    }
}

fn parse_recipe_area(
    area: ElementRef<'_>,
    overview: &Recipe,
    mut recipe: Recipe,
) -> Result<Recipe, ExtractError> {
    let names: Vec<String> = area
        .select(&H4)
        .map(|h4| element_text(h4).trim().to_string())
        .collect();
    recipe.cooking_name = Some(names.join("/"));

    if let Some(pic_sub) = area.select(&PIC_SUB).next() {
        let classes = pic_sub.value().attr("class").unwrap_or_default();
        for class in classes.split_whitespace() {
            if class.to_lowercase().starts_with("photo") {
                let path = format!("../img/recipe/{}/{}.jpg", overview.id, class);
                if let Some(url) = resolve_url(&overview.detail_url, &path) {
                    recipe.image_urls.push(url);
                }
            }
        }
    }

    let material_box = select_required(area, &MATERIAL_BOX, "div.material_box")?;
    if let Some(people) = material_box.select(&PEOPLE).next() {
        let title = full_width_parens(&element_text(people));
        recipe.materials.push(RecipeText::new(title.trim()));
    }
    for tr in material_box.select(&TR) {
        let cells: Vec<String> = tr
            .select(&TD)
            .map(|td| element_text(td).trim().to_string())
            .collect();
        recipe.materials.push(RecipeText::new(cells.join(": ")));
    }

    let main_box = select_required(area, &RECIPE_MAIN_BOX, "div.recipe_main_box")?;
    for (i, step) in main_box.select(&RECIPE_TEXT).enumerate() {
        let text = element_text(step);
        let text = text.trim();
        if !text.is_empty() {
            recipe.recipe_steps.push(RecipeText::new(numbered_step(i + 1, text)));
        }
    }

    if let Some(point_box) = area.select(&POINT_BOX).next() {
        let point = select_required(point_box, &POINT, "span.point")?;
        recipe.important_points.extend(
            element_text(point)
                .trim()
                .lines()
                .map(|line| RecipeText::new(line.trim())),
        );
    }

    Ok(recipe)
}
