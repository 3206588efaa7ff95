//! Markup helpers shared by the scraping providers.
//!
//! Storefront HTML drifts constantly, so these are forgiving:
//! attribute order, quoting style and case do not matter, and every helper
//! returns `None` rather than failing on odd input.

use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;
use serde_json::Value;

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

static JSON_LD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script\b[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenGraph {
    pub title: Option<String>,
    pub image: Option<String>,
}

pub fn open_graph(html: &str) -> OpenGraph {
    OpenGraph {
        title: meta_content(html, "og:title"),
        image: meta_content(html, "og:image"),
    }
}

/// `content` of the first `<meta property=key>` (or `name=key`) tag.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG.find_iter(html).find_map(|tag| {
        let mut matches_key = false;
        let mut content = None;

        for cap in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = cap[1].to_ascii_lowercase();
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            match name.as_str() {
                "property" | "name" if value.eq_ignore_ascii_case(key) => matches_key = true,
                "content" => content = Some(value),
                _ => {}
            }
        }

        if !matches_key {
            return None;
        }
        content
            .map(|c| decode_html_entities(c).trim().to_string())
            .filter(|c| !c.is_empty())
    })
}

/// Every JSON-LD object on the page; arrays and `@graph` wrappers are flattened.
pub fn json_ld(html: &str) -> Vec<Value> {
    let mut objects = Vec::new();

    for cap in JSON_LD.captures_iter(html) {
        let Ok(value) = serde_json::from_str::<Value>(cap[1].trim()) else {
            tracing::debug!("Skipping malformed JSON-LD block");
            continue;
        };
        flatten_ld(value, &mut objects);
    }

    objects
}

fn flatten_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_ld(v, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_ld(graph, out);
            }
            if map.contains_key("@type") {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// First JSON-LD object whose `@type` is one of `types`.
pub fn find_typed<'a>(objects: &'a [Value], types: &[&str]) -> Option<&'a Value> {
    objects.iter().find(|obj| match obj.get("@type") {
        Some(Value::String(t)) => types.contains(&t.as_str()),
        Some(Value::Array(ts)) => ts
            .iter()
            .filter_map(Value::as_str)
            .any(|t| types.contains(&t)),
        _ => false,
    })
}

/// A schema.org offer reduced to the fields we display.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub price: String,
    pub currency: Option<String>,
}

impl Offer {
    pub fn is_zero(&self) -> bool {
        self.price
            .trim()
            .parse::<f64>()
            .map(|p| p == 0.0)
            .unwrap_or(false)
    }

    pub fn display(&self) -> String {
        match &self.currency {
            Some(currency) => format!("{} {}", self.price, currency).trim().to_string(),
            None => self.price.clone(),
        }
    }
}

/// `offers` may be a single object or a list; the first priced one wins.
pub fn first_offer(product: &Value) -> Option<Offer> {
    let offers = product.get("offers")?;
    let candidates: Vec<&Value> = match offers {
        Value::Array(list) => list.iter().collect(),
        other => vec![other],
    };

    candidates.into_iter().find_map(|offer| {
        let price = match offer.get("price").or_else(|| offer.get("lowPrice"))? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let currency = offer
            .get("priceCurrency")
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|c| !c.is_empty());
        Some(Offer { price, currency })
    })
}

/// `image` in JSON-LD is a string, a list of strings, or an ImageObject.
pub fn ld_image(product: &Value) -> Option<String> {
    match product.get("image")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(list) => list.iter().find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            other => other.get("url").and_then(Value::as_str).map(str::to_string),
        }),
        other => other.get("url").and_then(Value::as_str).map(str::to_string),
    }
}

/// Whether any element's whole text content is exactly one of `labels`.
pub fn has_text_node(html: &str, labels: &[&str]) -> bool {
    labels.iter().any(|label| {
        let pattern = format!(r">\s*{}\s*<", regex::escape(label));
        Regex::new(&pattern)
            .map(|re| re.is_match(html))
            .unwrap_or(false)
    })
}

/// Text of the first element carrying `class`, tags stripped.
pub fn text_by_class(html: &str, class: &str) -> Option<String> {
    let pattern = format!(
        r#"(?is)<([a-z0-9]+)\b[^>]*class\s*=\s*["'][^"']*\b{}\b[^"']*["'][^>]*>(.*?)</"#,
        regex::escape(class)
    );
    let re = Regex::new(&pattern).ok()?;
    let cap = re.captures(html)?;
    let text = strip_tags(&cap[2]);
    (!text.is_empty()).then_some(text)
}

pub fn strip_tags(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, " ");
    decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
