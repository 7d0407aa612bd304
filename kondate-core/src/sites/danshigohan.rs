//! 「男子ごはん」
//!
//! Listing items carry the dish name and broadcast date, so the detail page
//! only contributes ingredients and steps. A detail page lists all material
//! headings (`h6`) first and then the same number of step headings.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::adapter::{RecipeStream, SiteAdapter, SiteSettings};
use crate::document::Document;
use crate::error::ExtractError;
use crate::http::resolve_url;
use crate::recipe::{Recipe, RecipeText};
use crate::text::{
    attr_required, element_text, ingredient_line, next_sibling_named, numbered_step,
    parse_loose_date, select_required,
};

use super::failed;

pub const SITE_NAME: &str = "danshigohan";

static DETAIL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)\.html").expect("Invalid detail id regex"));

static ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.item").expect("Invalid selector"));
static A: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("Invalid selector"));
static H4: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h4").expect("Invalid selector"));
static DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.date").expect("Invalid selector"));
static H6: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h6").expect("Invalid selector"));
static MAIN_IMAGE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.common_contents_box_mini img").expect("Invalid selector")
});
static LI: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").expect("Invalid selector"));
static SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("Invalid selector"));

pub struct Danshigohan {
    settings: SiteSettings,
}

impl Danshigohan {
    pub fn new(settings: SiteSettings) -> Self {
        Self { settings }
    }

    pub fn factory(settings: SiteSettings) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(settings))
    }
}

impl SiteAdapter for Danshigohan {
    fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    fn get_recipe_overviews(
        &self,
        listing: &Document,
        source_url: &str,
    ) -> Result<IndexMap<String, Recipe>, ExtractError> {
        let html = listing.html()?;
        let mut recipes = IndexMap::new();

        for item in html.select(&ITEM) {
            let link = select_required(item, &A, "div.item a")?;
            let href = attr_required(link, "href")?;
            let detail_url =
                resolve_url(source_url, href).ok_or_else(|| ExtractError::invalid("href", href))?;
            let id = DETAIL_ID_REGEX
                .captures(&detail_url)
                .map(|caps| caps[1].to_string())
                .ok_or_else(|| ExtractError::invalid("detail_url", detail_url.as_str()))?;
            let name = element_text(select_required(item, &H4, "div.item h4")?);
            let date_text = element_text(select_required(item, &DATE, "div.date")?);
            let program_date = parse_loose_date(&date_text)
                .ok_or_else(|| ExtractError::invalid("div.date", date_text.trim()))?;

            let recipe = Recipe::overview(id.as_str(), detail_url, self.program_name())
                .with_cooking_name(name.trim())
                .with_program_date(Some(program_date));
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

        let headings: Vec<ElementRef<'a>> = html.select(&H6).collect();
        let half = headings.len() / 2;
        let pairs: Vec<(ElementRef<'a>, ElementRef<'a>)> = headings[..half]
            .iter()
            .copied()
            .zip(headings[half..].iter().copied())
            .collect();

        Box::new(
            pairs
                .into_iter()
                .enumerate()
                .map(move |(i, (material, steps))| {
                    parse_pair(html, i, material, steps, overview.derive(i))
                }),
        )
    }
}

fn parse_pair(
    html: &Html,
    index: usize,
    material_heading: ElementRef<'_>,
    steps_heading: ElementRef<'_>,
    mut recipe: Recipe,
) -> Result<Recipe, ExtractError> {
    let image = html
        .select(&MAIN_IMAGE)
        .next()
        .ok_or_else(|| ExtractError::missing("div.common_contents_box_mini img"))?;
    let src = attr_required(image, "src")?;
    recipe
        .image_urls
        .push(resolve_url(&recipe.detail_url, src).unwrap_or_else(|| src.to_string()));

    let title = element_text(material_heading).replace("材料", "");
    let title = title.trim();
    if !title.is_empty() {
        if index > 0 {
            let name = recipe.cooking_name.take().unwrap_or_default();
            recipe.cooking_name = Some(format!("{} / {}", name, title));
        }
        recipe.materials.push(RecipeText::new(title));
    }

    let materials = next_sibling_named(material_heading, "ul")
        .ok_or_else(|| ExtractError::missing("ul after material h6"))?;
    for li in materials.select(&LI) {
        let spans: Vec<String> = li.select(&SPAN).map(element_text).collect();
        recipe
            .materials
            .push(RecipeText::new(ingredient_line(spans.iter().map(String::as_str))));
    }

    let steps = next_sibling_named(steps_heading, "ul")
        .ok_or_else(|| ExtractError::missing("ul after step h6"))?;
    for (j, li) in steps.select(&LI).enumerate() {
        recipe
            .recipe_steps
            .push(RecipeText::new(numbered_step(j + 1, element_text(li).trim())));
    }

    Ok(recipe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const LISTING_URL: &str = "https://www.tv-tokyo.co.jp/danshigohan/";

    fn adapter() -> Danshigohan {
        Danshigohan::new(SiteSettings::new(
            SITE_NAME,
            "男子ごはん",
            "/tmp/work",
            vec![LISTING_URL.to_string()],
        ))
    }

    fn doc(html: &str) -> Document {
        Html::parse_document(html).into()
    }

    #[test]
    fn overviews_carry_name_and_date() {
        let listing = doc(r#"
            <div class="item">
              <a href="recipe/detail_700.html"><img src="t.jpg"></a>
              <h4>チキン南蛮</h4>
              <div class="date">2020.01.05</div>
            </div>
        "#);
        let recipes = adapter().get_recipe_overviews(&listing, LISTING_URL).unwrap();
        let recipe = &recipes["700"];

        assert_eq!(
            recipe.detail_url,
            "https://www.tv-tokyo.co.jp/danshigohan/recipe/detail_700.html"
        );
        assert_eq!(recipe.cooking_name.as_deref(), Some("チキン南蛮"));
        assert_eq!(recipe.program_date, NaiveDate::from_ymd_opt(2020, 1, 5));
    }

    #[test]
    fn overview_without_date_fails() {
        let listing = doc(r#"<div class="item"><a href="detail_1.html">x</a><h4>x</h4></div>"#);
        let err = adapter().get_recipe_overviews(&listing, LISTING_URL).unwrap_err();
        assert_eq!(err, ExtractError::MissingElement("div.date".to_string()));
    }

    #[test]
    fn detail_pairs_material_and_step_headings() {
        let detail = doc(r#"
            <div class="common_contents_box_mini"><img src="/img/700.jpg"></div>
            <h6>材料（2人分）</h6>
            <ul><li><span>鶏もも肉</span><span>1枚</span></li><li><span>卵</span><span>1個</span></li></ul>
            <h6>タルタルソース材料</h6>
            <ul><li><span>マヨネーズ</span><span>大さじ3</span></li></ul>
            <h6>作り方</h6>
            <ul><li>鶏肉を揚げる。</li><li>甘酢に浸す。</li></ul>
            <h6>作り方</h6>
            <ul><li> 卵を刻んで混ぜる。 </li></ul>
        "#);
        let overview = Recipe::overview(
            "700",
            "https://www.tv-tokyo.co.jp/danshigohan/recipe/detail_700.html",
            "男子ごはん",
        )
        .with_cooking_name("チキン南蛮");
        let adapter = adapter();
        let recipes: Vec<Recipe> = adapter
            .parse_recipe_details(&detail, &overview)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].id, "700-1");
        assert_eq!(recipes[0].cooking_name.as_deref(), Some("チキン南蛮"));
        assert_eq!(
            recipes[0].materials,
            vec![
                RecipeText::new("（2人分）"),
                RecipeText::new("鶏もも肉: 1枚"),
                RecipeText::new("卵: 1個"),
            ]
        );
        assert_eq!(
            recipes[0].recipe_steps,
            vec![RecipeText::new("（1）鶏肉を揚げる。"), RecipeText::new("（2）甘酢に浸す。")]
        );
        assert_eq!(
            recipes[0].image_urls,
            vec!["https://www.tv-tokyo.co.jp/img/700.jpg"]
        );

        assert_eq!(recipes[1].id, "700-2");
        assert_eq!(
            recipes[1].cooking_name.as_deref(),
            Some("チキン南蛮 / タルタルソース")
        );
        assert_eq!(recipes[1].recipe_steps, vec![RecipeText::new("（1）卵を刻んで混ぜる。")]);
        assert_eq!(overview.cooking_name.as_deref(), Some("チキン南蛮"));
    }
}
