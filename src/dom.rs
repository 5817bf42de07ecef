use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

/// One interactive element the agent can address by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageElement {
    pub index: usize,
    pub tag_name: String,
    pub attributes: HashMap<String, String>,
    pub text_content: Option<String>,
    pub css_selector: String,
    pub label: String,
}

impl PageElement {
    pub fn is_file_input(&self) -> bool {
        self.tag_name == "input"
            && self.attributes.get("type").map(String::as_str) == Some("file")
    }
}

/// Indexed snapshot of a page's interactive elements, rebuilt before every
/// agent decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub url: String,
    pub elements: Vec<PageElement>,
}

impl DomSnapshot {
    pub fn get(&self, index: usize) -> Option<&PageElement> {
        self.elements.get(index)
    }

    /// Compact numbered listing handed to the model.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for element in &self.elements {
            let _ = writeln!(out, "[{}] {}", element.index, element.label);
        }
        out
    }
}

const INTERACTIVE_SELECTOR: &str = "a, button, input, select, textarea";

/// Extracts the interactive elements from rendered page HTML.
pub fn snapshot_from_html(url: &str, html: &str) -> DomSnapshot {
    let document = Html::parse_document(html);
    let selector = Selector::parse(INTERACTIVE_SELECTOR).expect("static selector");

    let mut elements = Vec::new();
    for element_ref in document.select(&selector) {
        let el = element_ref.value();
        if el.attr("type") == Some("hidden") {
            continue;
        }

        let attributes: HashMap<String, String> = el
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let text = element_ref
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let text_content = if text.is_empty() { None } else { Some(text) };

        let index = elements.len();
        let mut element = PageElement {
            index,
            tag_name: el.name().to_string(),
            attributes,
            text_content,
            css_selector: css_path(element_ref),
            label: String::new(),
        };
        element.label = describe(&element);
        elements.push(element);
    }

    DomSnapshot {
        url: url.to_string(),
        elements,
    }
}

/// Human-readable element description used inside the model prompt.
fn describe(element: &PageElement) -> String {
    let mut parts = Vec::new();

    match element.tag_name.as_str() {
        "input" => {
            let input_type = element
                .attributes
                .get("type")
                .map(String::as_str)
                .unwrap_or("text");
            parts.push(format!("{input_type} input field"));
        }
        "button" => parts.push("button".to_string()),
        "a" => parts.push("link".to_string()),
        "select" => parts.push("dropdown menu".to_string()),
        "textarea" => parts.push("text area".to_string()),
        other => parts.push(format!("{other} element")),
    }

    if let Some(name) = element.attributes.get("name") {
        parts.push(format!("named '{name}'"));
    }
    if let Some(id) = element.attributes.get("id") {
        parts.push(format!("with ID '{id}'"));
    }
    if let Some(placeholder) = element.attributes.get("placeholder") {
        parts.push(format!("placeholder '{placeholder}'"));
    }
    if let Some(aria) = element.attributes.get("aria-label") {
        parts.push(format!("labeled '{aria}'"));
    }
    if let Some(text) = &element.text_content {
        let clean = text.trim();
        if !clean.is_empty() && clean.len() < 100 {
            parts.push(format!("containing '{clean}'"));
        }
    }
    if element.is_file_input() {
        parts.push("(accepts file upload)".to_string());
    }

    parts.join(" ")
}

/// Builds a CSS path the browser can resolve the element with again. Anchors
/// on the nearest ancestor carrying an id, otherwise walks up to <html>.
fn css_path(element: ElementRef) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current = Some(*element);

    while let Some(node) = current {
        let el = match node.value().as_element() {
            Some(el) => el,
            None => break,
        };

        if let Some(id) = el.attr("id") {
            segments.push(format!("{}#{}", el.name(), id));
            break;
        }

        if el.name() == "html" {
            segments.push("html".to_string());
            break;
        }

        let position = node
            .parent()
            .map(|parent| {
                parent
                    .children()
                    .filter(|c| c.value().is_element())
                    .take_while(|c| c.id() != node.id())
                    .count()
                    + 1
            })
            .unwrap_or(1);
        segments.push(format!("{}:nth-child({})", el.name(), position));

        current = node.parent();
    }

    segments.reverse();
    segments.join(" > ")
}
