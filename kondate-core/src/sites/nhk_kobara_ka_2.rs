//! NHK 「小腹すいてませんか？」 episode pages found through the JSON broadcast API.
//!
//! The listing is JSON: every item has a page URL, an item id, an episode
//! name and its broadcast events. Ids combine the original broadcast date
//! with the item id (`2020-06-10_abc123`), so cache files are not numeric.

use std::sync::LazyLock;

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde_json::Value;

use crate::adapter::{CacheKey, RecipeStream, SiteAdapter, SiteSettings};
use crate::document::{ContentFormat, Document};
use crate::error::ExtractError;
use crate::recipe::{Recipe, RecipeText};
use crate::text::{
    element_lines, element_text, full_width_parens, next_sibling_named, parent_element,
    strip_kagikakko,
};

use super::failed;

pub const SITE_NAME: &str = "nhk_kobara_ka_2";

static TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"「.*」").expect("Invalid title regex"));
static RECIPE_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*レシピ").expect("Invalid label regex"));

static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("Invalid selector"));
static SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("Invalid selector"));
static ANSWERS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.answers").expect("Invalid selector"));

/// Section markers used by one page layout.
struct Markers {
    materials: &'static str,
    steps: &'static str,
}

const ANSWER_MARKERS: Markers = Markers {
    materials: "■材料",
    steps: "■作り方",
};

const LABEL_MARKERS: Markers = Markers {
    materials: "◎材料",
    steps: "◎作り方",
};

pub struct NhkKobaraKa2 {
    settings: SiteSettings,
    today: NaiveDate,
}

impl NhkKobaraKa2 {
    pub fn new(settings: SiteSettings) -> Self {
        Self {
            settings,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Broadcasts on or after `today` are not published yet.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn factory(settings: SiteSettings) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(settings))
    }

    fn overview_from_item(&self, item: &Value) -> Result<Option<Recipe>, ExtractError> {
        let url = json_str(item, &["url"])?;
        let item_id = json_id(item)?;
        let episode = json_str(item, &["identifierGroup", "episodeName"])?;

        let events = item
            .get("broadcastEvent")
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractError::MissingField("broadcastEvent".to_string()))?;
        let original = events.iter().find(|event| {
            event.pointer("/misc/releaseLevel").and_then(Value::as_str) == Some("original")
        });
        let Some(event) = original else {
            tracing::debug!(site = SITE_NAME, id = %item_id, "no original broadcast");
            return Ok(None);
        };
        let date_str = json_str(event, &["identifierGroup", "date"])?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| ExtractError::invalid("identifierGroup.date", date_str))?;

        if date >= self.today {
            tracing::debug!(site = SITE_NAME, id = %item_id, %date, "not yet broadcast");
            return Ok(None);
        }

        let id = format!("{}_{}", date_str, item_id);
        Ok(Some(
            Recipe::overview(id, url, self.program_name())
                .with_cooking_name_sub(Some(strip_outer_chars(episode)))
                .with_program_date(Some(date)),
        ))
    }
}

impl SiteAdapter for NhkKobaraKa2 {
    fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    fn listing_format(&self) -> ContentFormat {
        ContentFormat::Json
    }

    fn get_recipe_overviews(
        &self,
        listing: &Document,
        _source_url: &str,
    ) -> Result<IndexMap<String, Recipe>, ExtractError> {
        let items = listing
            .json()?
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| ExtractError::MissingField("result".to_string()))?;

        let mut recipes = IndexMap::new();
        for item in items {
            if let Some(recipe) = self.overview_from_item(item)? {
                recipes.insert(recipe.id.clone(), recipe);
            }
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

        let answers = html
            .select(&H1)
            .filter(|h1| TITLE_REGEX.is_match(&element_text(*h1)))
            .map(|h1| {
                let name = strip_kagikakko(&element_text(h1)).trim().to_string();
                parent_element(h1)
                    .and_then(parent_element)
                    .and_then(|block| block.select(&ANSWERS).next())
                    .map(|ul| (name, ul, &ANSWER_MARKERS))
                    .ok_or_else(|| ExtractError::missing("ul.answers"))
            });

        let labels = html
            .select(&SPAN)
            .filter(|span| RECIPE_LABEL_REGEX.is_match(&element_text(*span)))
            .map(|span| {
                let name = element_text(span).replace("レシピ", "").trim().to_string();
                parent_element(span)
                    .and_then(|parent| next_sibling_named(parent, "ul"))
                    .map(|ul| (name, ul, &LABEL_MARKERS))
                    .ok_or_else(|| ExtractError::missing("ul after recipe label"))
            });

        Box::new(answers.chain(labels).enumerate().map(move |(i, section)| {
            section.map(|(name, ul, markers)| {
                fill_recipe(overview.derive(i).with_cooking_name(name), ul, markers)
            })
        }))
    }

    fn is_cache_file_valid(&self, _name: &str) -> bool {
        true
    }

    fn cache_sort_key(&self, name: &str) -> CacheKey {
        CacheKey::Text(name.to_string())
    }
}

fn fill_recipe(mut recipe: Recipe, ul: ElementRef<'_>, markers: &Markers) -> Recipe {
    let mut in_materials = false;
    let mut in_steps = false;

    for line in element_lines(ul) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(markers.materials) {
            in_materials = true;
            let title = full_width_parens(&line.replace(markers.materials, ""));
            if !title.trim().is_empty() {
                recipe.materials.push(RecipeText::new(title.trim()));
            }
            continue;
        }
        if line.contains(markers.steps) {
            in_materials = false;
            in_steps = true;
            continue;
        }

        if in_materials {
            recipe.materials.extend(
                line.split_whitespace()
                    .map(|part| RecipeText::new(part.replace(':', ": "))),
            );
        } else if in_steps {
            recipe.recipe_steps.push(RecipeText::new(line.replace('\t', " ")));
        }
    }
    recipe
}

/// `「肉じゃが」` -> `肉じゃが`, whatever the bracket characters are.
fn strip_outer_chars(s: &str) -> String {
    let mut chars = s.chars();
    chars.next();
    chars.next_back();
    chars.as_str().to_string()
}

fn json_str<'v>(value: &'v Value, path: &[&str]) -> Result<&'v str, ExtractError> {
    let mut current = value;
    for key in path {
        current = current
            .get(key)
            .ok_or_else(|| ExtractError::MissingField(path.join(".")))?;
    }
    current
        .as_str()
        .ok_or_else(|| ExtractError::invalid(path.join("."), current.to_string()))
}

/// Item ids are strings in current responses and numbers in older ones.
fn json_id(item: &Value) -> Result<String, ExtractError> {
    match item.get("id") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ExtractError::invalid("id", other.to_string())),
        None => Err(ExtractError::MissingField("id".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Html;
    use serde_json::json;

    fn adapter() -> NhkKobaraKa2 {
        NhkKobaraKa2::new(SiteSettings::new(
            SITE_NAME,
            "きょうの料理",
            "/tmp/work",
            vec!["https://api.example.com/list.json".to_string()],
        ))
        .with_today(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap())
    }

    fn item(id: Value, date: &str) -> Value {
        json!({
            "id": id,
            "url": format!("https://www.nhk.jp/p/kobara/ts/{}/", date),
            "identifierGroup": {"episodeName": "「夏のそうめん」"},
            "broadcastEvent": [
                {"misc": {"releaseLevel": "rerun"}, "identifierGroup": {"date": "2023-01-01"}},
                {"misc": {"releaseLevel": "original"}, "identifierGroup": {"date": date}}
            ]
        })
    }

    #[test]
    fn overview_ids_combine_date_and_item_id() {
        let listing = Document::Json(json!({
            "result": [
                item(json!("ABC"), "2020-06-10"),
                item(json!(42), "2020-06-01"),
                item(json!("FUTURE"), "2020-06-15"),
            ]
        }));
        let recipes = adapter().get_recipe_overviews(&listing, "").unwrap();

        assert_eq!(
            recipes.keys().collect::<Vec<_>>(),
            vec!["2020-06-10_ABC", "2020-06-01_42"]
        );
        let recipe = &recipes["2020-06-10_ABC"];
        assert_eq!(recipe.cooking_name_sub.as_deref(), Some("夏のそうめん"));
        assert_eq!(recipe.program_date, NaiveDate::from_ymd_opt(2020, 6, 10));
        assert_eq!(recipe.detail_url, "https://www.nhk.jp/p/kobara/ts/2020-06-10/");
    }

    #[test]
    fn overview_without_original_broadcast_is_skipped() {
        let listing = Document::Json(json!({
            "result": [{
                "id": "X",
                "url": "https://www.nhk.jp/x/",
                "identifierGroup": {"episodeName": "「x」"},
                "broadcastEvent": []
            }]
        }));
        assert!(adapter().get_recipe_overviews(&listing, "").unwrap().is_empty());
    }

    #[test]
    fn overview_missing_result_fails() {
        let listing = Document::Json(json!({"items": []}));
        assert_eq!(
            adapter().get_recipe_overviews(&listing, "").unwrap_err(),
            ExtractError::MissingField("result".to_string())
        );
    }

    #[test]
    fn detail_answer_and_label_layouts() {
        let detail: Document = Html::parse_document(r#"
            <article><div><h1>「冷やしそうめん」</h1></div>
              <ul class="answers">
                <li>■材料(1人分)</li>
                <li>そうめん:2束 きゅうり:1本</li>
                <li>■作り方</li>
                <li>1.	ゆでる</li>
              </ul>
            </article>
            <div><p><span>薬味だれレシピ</span></p>
              <ul><li>◎材料</li><li>ねぎ:少々</li><li>◎作り方</li><li>刻む</li></ul>
            </div>
        "#)
        .into();
        let overview = Recipe::overview(
            "2020-06-10_ABC",
            "https://www.nhk.jp/p/kobara/ts/2020-06-10/",
            "きょうの料理",
        );
        let adapter = adapter();
        let recipes: Vec<Recipe> = adapter
            .parse_recipe_details(&detail, &overview)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].id, "2020-06-10_ABC-1");
        assert_eq!(recipes[0].cooking_name.as_deref(), Some("冷やしそうめん"));
        assert_eq!(
            recipes[0].materials,
            vec![
                RecipeText::new("（1人分）"),
                RecipeText::new("そうめん: 2束"),
                RecipeText::new("きゅうり: 1本"),
            ]
        );
        assert_eq!(recipes[0].recipe_steps, vec![RecipeText::new("1. ゆでる")]);

        assert_eq!(recipes[1].id, "2020-06-10_ABC-2");
        assert_eq!(recipes[1].cooking_name.as_deref(), Some("薬味だれ"));
        assert_eq!(recipes[1].materials, vec![RecipeText::new("ねぎ: 少々")]);
        assert_eq!(recipes[1].recipe_steps, vec![RecipeText::new("刻む")]);
    }

    #[test]
    fn detail_title_without_answers_fails() {
        let detail: Document = Html::parse_document("<div><div><h1>「謎」</h1></div></div>").into();
        let overview = Recipe::overview("2020-06-10_ABC", "https://www.nhk.jp/", "p");
        let adapter = adapter();
        let first = adapter.parse_recipe_details(&detail, &overview).next();
        assert_eq!(first, Some(Err(ExtractError::missing("ul.answers"))));
    }

    #[test]
    fn any_cache_name_is_valid_and_sorted_as_text() {
        let adapter = adapter();
        assert!(adapter.is_cache_file_valid("2020-06-10_ABC"));
        assert!(adapter.cache_sort_key("2020-06-01_9") < adapter.cache_sort_key("2020-06-10_1"));
    }
}
