//! NHK 「小腹がすいたら」
//!
//! Everything lives on the listing page: `h2` sections open an episode and
//! the sections after it hold one dish each. There is no per-dish URL or
//! number, so the id is the MD5 hex digest of `"{subtitle}/{name}"` (or of
//! the name alone). Rewording a dish upstream therefore yields a new id.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::adapter::{CacheKey, RecipeStream, SiteAdapter, SiteSettings};
use crate::document::Document;
use crate::error::ExtractError;
use crate::http::resolve_url;
use crate::recipe::{Recipe, RecipeText};
use crate::text::{element_lines, element_text, full_width_parens, numbered_step, strip_kagikakko};

pub const SITE_NAME: &str = "nhk_kobara_ta";

static STEP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+).\s*(.*)$").expect("Invalid step regex"));

static SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section").expect("Invalid selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("Invalid selector"));
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("Invalid selector"));
static H2: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("Invalid selector"));
static H3: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").expect("Invalid selector"));
static P: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").expect("Invalid selector"));
static IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("Invalid selector"));

const MATERIALS_MARKER: &str = "◎材料";
const STEPS_MARKER: &str = "＜作り方＞";

pub struct NhkKobaraTa {
    settings: SiteSettings,
}

impl NhkKobaraTa {
    pub fn new(settings: SiteSettings) -> Self {
        Self { settings }
    }

    pub fn factory(settings: SiteSettings) -> Box<dyn SiteAdapter> {
        Box::new(Self::new(settings))
    }
}

/// `md5("{sub}/{name}")` or `md5(name)`, lowercase hex.
pub fn content_id(name: &str, sub: Option<&str>) -> String {
    let key = match sub {
        Some(sub) => format!("{}/{}", sub, name),
        None => name.to_string(),
    };
    format!("{:x}", md5::compute(key.as_bytes()))
}

impl SiteAdapter for NhkKobaraTa {
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
        let mut subtitle: Option<String> = None;
        let mut points: Vec<RecipeText> = Vec::new();

        for section in html.select(&SECTION).skip(1) {
            if section.select(&TABLE).next().is_some() || section.select(&H1).next().is_some() {
                continue;
            }
            if let Some(h2) = section.select(&H2).next() {
                subtitle = Some(strip_kagikakko(&element_text(h2)).trim().to_string());
                points.clear();
                continue;
            }
            let Some(p) = section.select(&P).next() else {
                continue;
            };
            let Some(img) = section.select(&IMG).next() else {
                points.extend(
                    element_lines(p)
                        .iter()
                        .map(|l| l.trim())
                        .filter(|l| !l.is_empty())
                        .map(RecipeText::new),
                );
                continue;
            };

            // Several dishes per episode carry an h3; a lone dish is named by the episode.
            let (name, sub) = match section.select(&H3).next() {
                Some(h3) => (element_text(h3).trim().to_string(), subtitle.clone()),
                None => match &subtitle {
                    Some(subtitle) => (subtitle.clone(), None),
                    None => {
                        tracing::debug!(
                            site = SITE_NAME,
                            "dish section before any episode heading"
                        );
                        continue;
                    }
                },
            };

            let id = content_id(&name, sub.as_deref());
            let mut recipe = Recipe::overview(id.as_str(), source_url, self.program_name())
                .with_cooking_name(name)
                .with_cooking_name_sub(sub);
            recipe.important_points = points.clone();
            if let Some(url) = img
                .value()
                .attr("src")
                .and_then(|src| resolve_url(source_url, src))
            {
                recipe.image_urls.push(url);
            }
            fill_lines(&mut recipe, p);

            recipes.insert(id, recipe);
        }

        Ok(recipes)
    }

    /// The listing already holds the whole dish.
    fn parse_recipe_details<'a>(
        &'a self,
        _detail: &'a Document,
        overview: &'a Recipe,
    ) -> RecipeStream<'a> {
        Box::new(std::iter::once(Ok(overview.derive(0))))
    }

    fn is_cache_file_valid(&self, name: &str) -> bool {
        name.len() == 32 && name.bytes().all(|b| b.is_ascii_hexdigit())
    }

    fn cache_sort_key(&self, name: &str) -> CacheKey {
        CacheKey::Text(name.to_string())
    }
}

fn fill_lines(recipe: &mut Recipe, p: ElementRef<'_>) {
    let mut in_materials = false;
    let mut in_steps = false;

    for line in element_lines(p) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains(MATERIALS_MARKER) {
            in_materials = true;
            let title = full_width_parens(&line.replace(MATERIALS_MARKER, ""));
            if !title.trim().is_empty() {
                recipe.materials.push(RecipeText::new(title.trim()));
            }
            continue;
        }
        if line.contains(STEPS_MARKER) {
            in_materials = false;
            in_steps = true;
            continue;
        }

        if in_materials {
            let line = line.replace(" 本", "本").replace(" 個", "個");
            recipe.materials.extend(
                line.split_whitespace()
                    .map(|part| RecipeText::new(part.replace(':', ": "))),
            );
        } else if in_steps {
            let text = match STEP_REGEX.captures(line) {
                Some(caps) => match caps[1].parse() {
                    Ok(n) => numbered_step(n, &caps[2]),
                    Err(_) => line.to_string(),
                },
                None => line.to_string(),
            };
            recipe.recipe_steps.push(RecipeText::new(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    const LISTING_URL: &str = "https://www.nhk.or.jp/kobara/recipe/";

    fn adapter() -> NhkKobaraTa {
        NhkKobaraTa::new(SiteSettings::new(
            SITE_NAME,
            "小腹がすいたら",
            "/tmp/work",
            vec![LISTING_URL.to_string()],
        ))
    }

    const LISTING: &str = r#"
        <section><p>header</p></section>
        <section><h1>ページタイトル</h1></section>
        <section><h2>「春の小皿」</h2></section>
        <section><p>旬の野菜で。<br>手早く作る。</p></section>
        <section><h3>菜の花のおひたし</h3><img src="img/a.jpg">
          <p>◎材料(2人分)<br>菜の花 1 束 しょうゆ:小さじ1<br>＜作り方＞<br>1. ゆでる<br>2.　しぼる</p>
        </section>
        <section><table><tr><td>x</td></tr></table></section>
        <section><h2>「ホットサンド」</h2></section>
        <section><img src="/img/b.jpg"><p>◎材料<br>卵 2 個<br>＜作り方＞<br>焼く</p></section>
    "#;

    #[test]
    fn overviews_built_from_listing_sections() {
        let listing: Document = Html::parse_document(LISTING).into();
        let recipes = adapter().get_recipe_overviews(&listing, LISTING_URL).unwrap();
        let all: Vec<&Recipe> = recipes.values().collect();
        assert_eq!(all.len(), 2);

        let first = all[0];
        assert_eq!(first.id, content_id("菜の花のおひたし", Some("春の小皿")));
        assert_eq!(first.cooking_name.as_deref(), Some("菜の花のおひたし"));
        assert_eq!(first.cooking_name_sub.as_deref(), Some("春の小皿"));
        assert_eq!(first.detail_url, LISTING_URL);
        assert_eq!(first.program_date, None);
        assert_eq!(first.image_urls, vec!["https://www.nhk.or.jp/kobara/recipe/img/a.jpg"]);
        assert_eq!(
            first.important_points,
            vec![RecipeText::new("旬の野菜で。"), RecipeText::new("手早く作る。")]
        );
        assert_eq!(
            first.materials,
            vec![
                RecipeText::new("（2人分）"),
                RecipeText::new("菜の花"),
                RecipeText::new("1"),
                RecipeText::new("束"),
                RecipeText::new("しょうゆ: 小さじ1"),
            ]
        );
        assert_eq!(
            first.recipe_steps,
            vec![RecipeText::new("（1）ゆでる"), RecipeText::new("（2）しぼる")]
        );

        let second = all[1];
        assert_eq!(second.id, content_id("ホットサンド", None));
        assert_eq!(second.cooking_name.as_deref(), Some("ホットサンド"));
        assert_eq!(second.cooking_name_sub, None);
        assert!(second.important_points.is_empty());
        assert_eq!(
            second.materials,
            vec![RecipeText::new("卵"), RecipeText::new("2個")]
        );
        assert_eq!(second.recipe_steps, vec![RecipeText::new("焼く")]);
    }

    #[test]
    fn content_id_is_md5_of_sub_and_name() {
        assert_eq!(content_id("", None), "d41d8cd98f00b204e9800998ecf8427e");
        assert_ne!(content_id("a", Some("b")), content_id("a", None));
        assert_eq!(content_id("a", Some("b")), content_id("b/a", None));
    }

    #[test]
    fn detail_is_a_copy_of_the_stub() {
        let overview =
            Recipe::overview(content_id("x", None), LISTING_URL, "p").with_cooking_name("x");
        let detail: Document = Html::parse_document("").into();
        let adapter = adapter();
        let recipes: Vec<_> = adapter.parse_recipe_details(&detail, &overview).collect();
        assert_eq!(recipes, vec![Ok(overview.derive(0))]);
        assert_eq!(recipes[0].as_ref().unwrap().id, format!("{}-1", overview.id));
    }

    #[test]
    fn cache_names_are_md5_hex() {
        let adapter = adapter();
        assert!(adapter.is_cache_file_valid(&content_id("x", None)));
        assert!(!adapter.is_cache_file_valid("20200101"));
    }
}
