//! Text normalization shared by the site adapters.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Selector};

use crate::error::ExtractError;

static DATE_PARTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\D+(\d{1,2})\D+(\d{1,2})").expect("Invalid date regex"));

static COMPACT_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("Invalid compact date regex"));

/// `(2人分)` -> `（2人分）`
pub fn full_width_parens(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => '（',
            ')' => '）',
            c => c,
        })
        .collect()
}

/// `「肉じゃが」` -> `肉じゃが`
pub fn strip_kagikakko(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '「' | '」')).collect()
}

/// Render a numbered step as `（n）text`.
pub fn numbered_step(n: usize, text: &str) -> String {
    format!("（{}）{}", n, text)
}

/// Join non-empty parts as `name: amount`.
pub fn ingredient_line<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(": ")
}

/// All text inside an element, concatenated.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Text nodes of an element joined by newlines, split back into lines.
pub fn element_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .collect::<Vec<_>>()
        .join("\n")
        .lines()
        .map(|l| l.to_string())
        .collect()
}

/// Text of the siblings that follow `element`, up to the next sibling that
/// matches `stop`. Text nodes and elements are both included; the text nodes
/// inside one element are joined by newlines.
pub fn text_until_next(
    element: ElementRef<'_>,
    stop: impl Fn(ElementRef<'_>) -> bool,
) -> Vec<String> {
    let mut parts = Vec::new();
    for sibling in element.next_siblings() {
        match sibling.value() {
            Node::Text(text) => parts.push(text.to_string()),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(sibling) {
                    if stop(el) {
                        break;
                    }
                    parts.push(el.text().collect::<Vec<_>>().join("\n"));
                }
            }
            _ => {}
        }
    }
    parts
}

/// First following sibling element with the given tag name.
pub fn next_sibling_named<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == name)
}

/// Parent element, skipping the document root.
pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

/// First descendant matching `selector`, or a structural error naming it.
pub fn select_required<'a>(
    element: ElementRef<'a>,
    selector: &Selector,
    what: &str,
) -> Result<ElementRef<'a>, ExtractError> {
    element
        .select(selector)
        .next()
        .ok_or_else(|| ExtractError::missing(what))
}

/// Attribute value, or a structural error naming it.
pub fn attr_required<'a>(element: ElementRef<'a>, attr: &str) -> Result<&'a str, ExtractError> {
    element
        .value()
        .attr(attr)
        .ok_or_else(|| ExtractError::missing(format!("{}[{}]", element.value().name(), attr)))
}

/// Find `y m d` with any separators: `2019.08.30`, `2019年8月30日(金)`.
pub fn parse_loose_date(s: &str) -> Option<NaiveDate> {
    let caps = DATE_PARTS_REGEX.captures(s)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `20200101` -> 2020-01-01
pub fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    let caps = COMPACT_DATE_REGEX.captures(s.trim())?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn parens_become_full_width() {
        assert_eq!(full_width_parens("(2人分)"), "（2人分）");
        assert_eq!(full_width_parens("（4人分）"), "（4人分）");
    }

    #[test]
    fn kagikakko_removed() {
        assert_eq!(strip_kagikakko("「豚汁」"), "豚汁");
    }

    #[test]
    fn ingredient_parts_joined() {
        assert_eq!(ingredient_line([" 豚肉 ", "200g"]), "豚肉: 200g");
        assert_eq!(ingredient_line(["塩", " "]), "塩");
    }

    #[test]
    fn loose_dates() {
        assert_eq!(
            parse_loose_date("2019.08.30"),
            NaiveDate::from_ymd_opt(2019, 8, 30)
        );
        assert_eq!(
            parse_loose_date("2019年8月3日(土)放送"),
            NaiveDate::from_ymd_opt(2019, 8, 3)
        );
        assert_eq!(parse_loose_date("2019.13.40"), None);
        assert_eq!(parse_loose_date("no date"), None);
    }

    #[test]
    fn compact_dates() {
        assert_eq!(parse_compact_date("20200101"), NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(parse_compact_date("2020011"), None);
        assert_eq!(parse_compact_date("20201301"), None);
    }

    #[test]
    fn siblings_until_next_heading() {
        let html = Html::parse_fragment(
            "<div><h4>A</h4>材料<p>塩</p><h4>B</h4><p>砂糖</p></div>",
        );
        let h4 = Selector::parse("h4").unwrap();
        let first = html.select(&h4).next().unwrap();
        let parts = text_until_next(first, |el| el.value().name() == "h4");
        assert_eq!(parts, vec!["材料".to_string(), "塩".to_string()]);
    }

    #[test]
    fn next_sibling_by_name() {
        let html = Html::parse_fragment("<div><h6>材料</h6><p>x</p><ul><li>y</li></ul></div>");
        let h6 = Selector::parse("h6").unwrap();
        let title = html.select(&h6).next().unwrap();
        let ul = next_sibling_named(title, "ul").unwrap();
        assert_eq!(element_text(ul), "y");
    }

    #[test]
    fn lines_from_text_nodes() {
        let html = Html::parse_fragment("<p>◎材料<br>塩<br>砂糖</p>");
        let p = Selector::parse("p").unwrap();
        let lines = element_lines(html.select(&p).next().unwrap());
        assert_eq!(lines, vec!["◎材料", "塩", "砂糖"]);
    }
}
