//! Shared extraction helpers over parsed HTML.
//!
//! Every helper tolerates missing markup: absent elements give `None` or an
//! empty list, never an error.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:\d+D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:\d+S)?$").expect("valid duration regex")
});

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid json-ld selector")
});

/// Attributes that may carry an image url, lazy loaders included.
const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];

/// Parse a selector from configuration, logging and skipping invalid ones.
pub fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("Ignoring invalid selector {:?}: {}", css, e);
            None
        }
    }
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first element matching any selector, in selector order.
pub fn safe_text<S: AsRef<str>>(document: &Html, selectors: &[S]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| parse_selector(css.as_ref()))
        .find_map(|selector| {
            document
                .select(&selector)
                .map(element_text)
                .find(|t| !t.is_empty())
        })
}

/// An attribute of the first element matching any selector.
pub fn safe_attr<S: AsRef<str>>(document: &Html, selectors: &[S], attr: &str) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| parse_selector(css.as_ref()))
        .find_map(|selector| {
            document.select(&selector).find_map(|el| {
                el.value()
                    .attr(attr)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
        })
}

/// Image url of the first matching element, honoring lazy-load attributes.
pub fn safe_image<S: AsRef<str>>(document: &Html, selectors: &[S]) -> Option<String> {
    IMAGE_ATTRS.iter().find_map(|attr| {
        safe_attr(document, selectors, attr).filter(|src| !src.starts_with("data:"))
    })
}

/// Non-empty texts of every element matching `css`.
pub fn text_list(document: &Html, css: &str) -> Vec<String> {
    let Some(selector) = parse_selector(css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// The first selector that yields a non-empty list wins.
pub fn first_non_empty_list<S: AsRef<str>>(document: &Html, selectors: &[S]) -> Vec<String> {
    selectors
        .iter()
        .map(|css| text_list(document, css.as_ref()))
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

/// `<meta property=... content=...>` or `<meta name=... content=...>`.
pub fn meta_content(document: &Html, key: &str) -> Option<String> {
    let css = format!(r#"meta[property="{key}"], meta[name="{key}"]"#);
    safe_attr(document, &[css], "content")
}

/// Resolve `href` against `base`, dropping the fragment.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let mut url = base.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn is_heading(element: &ElementRef<'_>) -> bool {
    matches!(element.value().name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn heading_level(element: &ElementRef<'_>) -> u8 {
    element
        .value()
        .name()
        .strip_prefix('h')
        .and_then(|n| n.parse().ok())
        .unwrap_or(7)
}

/// First heading whose text contains any of `keywords`, case-insensitively.
pub fn find_heading<'a>(document: &'a Html, keywords: &[&str]) -> Option<ElementRef<'a>> {
    let selector = parse_selector("h1, h2, h3, h4, h5, h6")?;
    document.select(&selector).find(|h| {
        let text = element_text(*h).to_lowercase();
        keywords.iter().any(|k| text.contains(k))
    })
}

/// Element siblings after `heading` up to the next heading of the same or a
/// higher level.
pub fn section_after<'a>(heading: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let level = heading_level(&heading);
    heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|el| !(is_heading(el) && heading_level(el) <= level))
        .collect()
}

/// Split an element's text on `<br>` boundaries into trimmed lines.
pub fn br_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            current.push_str(text);
        } else if node.value().as_element().map(|e| e.name()) == Some("br") {
            lines.push(clean_text(&current));
            current.clear();
        }
    }
    lines.push(clean_text(&current));
    lines.retain(|l| !l.is_empty());
    lines
}

static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li").expect("valid li selector"));

static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid p selector"));

/// Lines of a content block: its list items if it has any, else its
/// paragraphs split on `<br>`, else its own text split on `<br>`.
pub fn block_lines(element: ElementRef<'_>) -> Vec<String> {
    let items: Vec<String> = element
        .select(&LIST_ITEM)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }
    let paragraphs: Vec<String> = element.select(&PARAGRAPH).flat_map(br_lines).collect();
    if !paragraphs.is_empty() {
        return paragraphs;
    }
    br_lines(element)
}

/// Recipe fields read from a schema.org `Recipe` JSON-LD block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredRecipe {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<String>,
}

/// Find the first schema.org `Recipe` in the page's JSON-LD scripts.
pub fn structured_recipe(document: &Html) -> Option<StructuredRecipe> {
    document.select(&JSON_LD).find_map(|script| {
        let json: Value = serde_json::from_str(&sanitize_json(&script.inner_html())).ok()?;
        find_recipe(&json).map(read_recipe)
    })
}

/// Escape raw control characters that some sites leave inside strings.
fn sanitize_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in json.chars() {
        if in_string {
            match c {
                _ if escaped => {
                    escaped = false;
                    out.push(c);
                }
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

fn is_recipe_type(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "Recipe",
        Value::Array(items) => items.iter().any(|v| v == "Recipe"),
        _ => false,
    }
}

fn find_recipe(json: &Value) -> Option<&Value> {
    match json {
        Value::Object(obj) => {
            if obj.get("@type").is_some_and(is_recipe_type) {
                return Some(json);
            }
            obj.values().find_map(find_recipe)
        }
        Value::Array(items) => items.iter().find_map(find_recipe),
        _ => None,
    }
}

fn string_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(string_of),
        Value::Object(obj) => obj.get("url").and_then(string_of),
        _ => None,
    }
}

fn collect_steps(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            out.extend(s.lines().map(clean_text).filter(|l| !l.is_empty()));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_steps(v, out)),
        Value::Object(obj) => {
            if let Some(items) = obj.get("itemListElement") {
                collect_steps(items, out);
            } else if let Some(text) = obj.get("text").or_else(|| obj.get("name")) {
                collect_steps(text, out);
            }
        }
        _ => {}
    }
}

/// `PT1H30M` -> `1 h 30 min`. Unparseable values are kept as they are.
pub fn humanize_duration(iso: &str) -> String {
    let Some(caps) = ISO_DURATION.captures(iso.trim()) else {
        return iso.trim().to_string();
    };
    let hours: u32 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let minutes: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    match (hours, minutes) {
        (0, 0) => iso.trim().to_string(),
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h} h"),
        (h, m) => format!("{h} h {m} min"),
    }
}

fn read_recipe(recipe: &Value) -> StructuredRecipe {
    let mut steps = Vec::new();
    if let Some(instructions) = recipe.get("recipeInstructions") {
        collect_steps(instructions, &mut steps);
    }
    let ingredients = recipe
        .get("recipeIngredient")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(string_of).collect())
        .unwrap_or_default();

    StructuredRecipe {
        title: recipe.get("name").and_then(string_of),
        description: recipe.get("description").and_then(string_of),
        image_url: recipe.get("image").and_then(string_of),
        ingredients,
        steps,
        prep_time: recipe.get("prepTime").and_then(string_of).map(|d| humanize_duration(&d)),
        cook_time: recipe.get("cookTime").and_then(string_of).map(|d| humanize_duration(&d)),
        servings: recipe.get("recipeYield").and_then(string_of),
    }
}
