//! NHK 「うまいッ！」
//!
//! Listing tiles are `<a href="...?id=NNN"><img src="..._yymmdd_...jpg"></a>`.
//! Detail pages are loose prose: each `h4` names a dish and the text up to
//! the next `h4` holds its 材料 and 作り方 sections.

use std::sync::LazyLock;

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::adapter::{is_digits, RecipeStream, SiteAdapter, SiteSettings};
use crate::document::Document;
use crate::error::ExtractError;
use crate::http::{file_name_of, resolve_url};
use crate::recipe::{Recipe, RecipeText};
use crate::text::{element_text, numbered_step, parent_element, text_until_next};

use super::failed;

pub const SITE_NAME: &str = "nhk_umai";

static YYMMDD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{6})").expect("Invalid yymmdd regex"));
static STEP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[）．](.*)$").expect("Invalid step regex"));

static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("Invalid selector"));
static IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("Invalid selector"));
static JPG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"img[src$="jpg"]"#).expect("Invalid selector"));
static H4: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h4").expect("Invalid selector"));

pub struct NhkUmai {
    settings: SiteSettings,
}

impl NhkUmai {
    pub fn new(settings: SiteSettings) -> Self {
        Self { settings }
    }

    pub fn factory(settings: SiteSettings) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(settings))
    }
}

impl SiteAdapter for NhkUmai {
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

        for link in html.select(&LINK) {
            let Some(img) = link.select(&IMG).next() else {
                continue;
            };
            let href = link.value().attr("href").unwrap_or_default();
            let Some(detail_url) = resolve_url(source_url, href) else {
                continue;
            };
            let id = match detail_url.rsplit_once('=') {
                Some((_, id)) if is_digits(id) => id.to_string(),
                _ => {
                    tracing::debug!(site = SITE_NAME, url = %detail_url, "skip non-recipe link");
                    continue;
                }
            };

            let program_date = img
                .value()
                .attr("src")
                .and_then(|src| resolve_url(source_url, src))
                .and_then(|src| file_name_of(&src))
                .and_then(|name| date_from_file_name(&name));

            let recipe = Recipe::overview(id.as_str(), detail_url, self.program_name())
                .with_program_date(program_date);
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
            html.select(&H4)
                .filter_map(move |h4| parse_dish(h4, &overview.detail_url).transpose())
                .enumerate()
                .map(move |(i, dish)| dish.map(|dish| dish.into_recipe(overview.derive(i)))),
        )
    }
}

/// `recipe_190830_a.jpg` -> 2019-08-30
fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let caps = YYMMDD_REGEX.captures(name)?;
    let yymmdd = &caps[1];
    NaiveDate::from_ymd_opt(
        2000 + yymmdd[0..2].parse::<i32>().ok()?,
        yymmdd[2..4].parse().ok()?,
        yymmdd[4..6].parse().ok()?,
    )
}

struct Dish {
    name: String,
    image_urls: Vec<String>,
    materials: Vec<RecipeText>,
    steps: Vec<RecipeText>,
}

impl Dish {
    fn into_recipe(self, mut recipe: Recipe) -> Recipe {
        recipe.cooking_name = Some(self.name);
        recipe.image_urls = self.image_urls;
        recipe.materials = self.materials;
        recipe.recipe_steps = self.steps;
        recipe
    }
}

#[derive(PartialEq)]
enum Area {
    None,
    Materials,
    Steps,
}

/// Dishes without any material or step line are not recipes.
fn parse_dish(h4: ElementRef<'_>, detail_url: &str) -> Result<Option<Dish>, ExtractError> {
    let container = parent_element(h4)
        .and_then(parent_element)
        .ok_or_else(|| ExtractError::missing("h4 container"))?;
    let image_urls = container
        .select(&JPG)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| resolve_url(detail_url, src))
        .collect();

    let body = text_until_next(h4, |el| el.value().name() == "h4")
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut area = Area::None;
    let mut materials = Vec::new();
    let mut steps = Vec::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.contains("材料") && area != Area::Steps {
            area = Area::Materials;
            continue;
        }
        if line.contains("作り方") {
            area = Area::Steps;
            continue;
        }

        match area {
            Area::Materials => {
                let line = line.strip_prefix('・').unwrap_or(line);
                materials.push(RecipeText::new(line.replace('：', ": ")));
            }
            Area::Steps => {
                let text = match STEP_REGEX.captures(line) {
                    Some(caps) => numbered_step(caps[1].parse().unwrap_or(0), &caps[2]),
                    None => line.to_string(),
                };
                steps.push(RecipeText::new(text));
            }
            Area::None => {}
        }
    }

    if materials.is_empty() && steps.is_empty() {
        return Ok(None);
    }
    Ok(Some(Dish {
        name: element_text(h4).trim().to_string(),
        image_urls,
        materials,
        steps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    const LISTING_URL: &str = "https://www.nhk.or.jp/umai/recipe/";

    fn adapter() -> NhkUmai {
        NhkUmai::new(SiteSettings::new(
            SITE_NAME,
            "きょうの料理",
            "/tmp/work",
            vec![LISTING_URL.to_string()],
        ))
    }

    fn doc(html: &str) -> Document {
        Html::parse_document(html).into()
    }

    #[test]
    fn overviews_from_image_links() {
        let listing = doc(r#"
            <a href="/"><span>home</span></a>
            <a href="/"><img src="/logo.png"></a>
            <a href="detail.html?id=120"><img src="/img/recipe_190830_1.jpg"></a>
            <a href="detail.html?id=121"><img src="/img/noday.jpg"></a>
        "#);
        let recipes = adapter().get_recipe_overviews(&listing, LISTING_URL).unwrap();

        assert_eq!(recipes.keys().collect::<Vec<_>>(), vec!["120", "121"]);
        assert_eq!(
            recipes["120"].detail_url,
            "https://www.nhk.or.jp/umai/recipe/detail.html?id=120"
        );
        assert_eq!(
            recipes["120"].program_date,
            NaiveDate::from_ymd_opt(2019, 8, 30)
        );
        assert_eq!(recipes["121"].program_date, None);
    }

    #[test]
    fn detail_sections_split_on_h4() {
        let detail = doc(r#"
            <div id="main"><div class="box">
              <img src="/img/dish1.jpg"><img src="/img/icon.gif">
              <h4>鶏の照り焼き</h4>
              <p>材料（2人分）</p>
              <p>・鶏もも肉：1枚<br>・しょうゆ：大さじ2</p>
              <p>作り方</p>
              <p>1）鶏肉を焼く。<br>2．たれを絡める。<br>器に盛る。</p>
              <h4>ひとこと</h4>
              <p>ごはんに合います。</p>
              <h4>みそ汁</h4>
              作り方
              <p>1）だしを取る。</p>
            </div></div>
        "#);
        let overview = Recipe::overview(
            "120",
            "https://www.nhk.or.jp/umai/recipe/detail.html?id=120",
            "きょうの料理",
        )
        .with_program_date(NaiveDate::from_ymd_opt(2019, 8, 30));
        let adapter = adapter();
        let recipes: Vec<Recipe> = adapter
            .parse_recipe_details(&detail, &overview)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(recipes.len(), 2);
        let first = &recipes[0];
        assert_eq!(first.id, "120-1");
        assert_eq!(first.cooking_name.as_deref(), Some("鶏の照り焼き"));
        assert_eq!(first.image_urls, vec!["https://www.nhk.or.jp/img/dish1.jpg"]);
        assert_eq!(
            first.materials,
            vec![
                RecipeText::new("鶏もも肉: 1枚"),
                RecipeText::new("しょうゆ: 大さじ2"),
            ]
        );
        assert_eq!(
            first.recipe_steps,
            vec![
                RecipeText::new("（1）鶏肉を焼く。"),
                RecipeText::new("（2）たれを絡める。"),
                RecipeText::new("器に盛る。"),
            ]
        );
        assert_eq!(first.program_date, NaiveDate::from_ymd_opt(2019, 8, 30));

        assert_eq!(recipes[1].id, "120-2");
        assert_eq!(recipes[1].cooking_name.as_deref(), Some("みそ汁"));
        assert!(recipes[1].materials.is_empty());
        assert_eq!(recipes[1].recipe_steps, vec![RecipeText::new("（1）だしを取る。")]);
    }

    #[test]
    fn file_name_dates() {
        assert_eq!(date_from_file_name("a_200101.jpg"), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(date_from_file_name("a_209999.jpg"), None);
        assert_eq!(date_from_file_name("a.jpg"), None);
    }
}
