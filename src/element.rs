//! Host element contract
//!
//! The extractor never walks markup itself. Anything that can answer these
//! questions about an element can carry metadata; `scraper::ElementRef` is
//! supported out of the box.

use scraper::node::Element;
use scraper::ElementRef;
use std::hash::{Hash, Hasher};
use std::ptr;

/// Element abstraction consumed by [`MetadataExtractor`](crate::MetadataExtractor)
pub trait HostElement {
    /// Identity of the element, used as the side-table key
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;

    /// Value of the named attribute, if present
    fn attribute(&self, name: &str) -> Option<String>;

    /// Raw text of the class attribute
    fn class_name(&self) -> Option<String> {
        self.attribute("class")
    }

    /// Trimmed text content of the first descendant element with the given tag
    fn descendant_text(&self, tag: &str) -> Option<String>;

    /// Short human-readable description for error messages
    fn describe(&self) -> String;
}

/// Identity of a `scraper` element: the address of its node inside the
/// document tree, valid for as long as the document is borrowed.
#[derive(Debug, Clone, Copy)]
pub struct ElementKey<'a>(&'a Element);

impl PartialEq for ElementKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.0, other.0)
    }
}

impl Eq for ElementKey<'_> {}

impl Hash for ElementKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self.0, state);
    }
}

impl<'a> HostElement for ElementRef<'a> {
    type Key = ElementKey<'a>;

    fn key(&self) -> Self::Key {
        ElementKey(self.value())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(String::from)
    }

    fn descendant_text(&self, tag: &str) -> Option<String> {
        self.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map(|el| el.text().collect::<String>().trim().to_string())
    }

    fn describe(&self) -> String {
        let element = self.value();
        match element.id() {
            Some(id) => format!("<{} id=\"{}\">", element.name(), id),
            None => format!("<{}>", element.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(document: &'a Html, selector: &str) -> ElementRef<'a> {
        let selector = Selector::parse(selector).unwrap();
        document.select(&selector).next().unwrap()
    }

    #[test]
    fn test_attribute_and_class() {
        let document = Html::parse_fragment(r#"<p id="one" class="a {x: 1}" data="y: 2">p</p>"#);
        let p = first(&document, "p");
        assert_eq!(p.attribute("data").as_deref(), Some("y: 2"));
        assert_eq!(p.class_name().as_deref(), Some("a {x: 1}"));
        assert!(p.attribute("missing").is_none());
        assert_eq!(p.describe(), "<p id=\"one\">");
    }

    #[test]
    fn test_descendant_text_is_trimmed_and_skips_self() {
        let document = Html::parse_fragment(
            "<div><span>outer</span><div><script>\n  {a: 1}\n</script></div></div>",
        );
        let div = first(&document, "div");
        assert_eq!(div.descendant_text("script").as_deref(), Some("{a: 1}"));
        assert_eq!(div.descendant_text("SPAN").as_deref(), Some("outer"));

        let inner = first(&document, "div div");
        assert!(inner.descendant_text("div").is_none());
    }

    #[test]
    fn test_keys_identify_elements() {
        let document = Html::parse_fragment("<ul><li>a</li><li>a</li></ul>");
        let selector = Selector::parse("li").unwrap();
        let items: Vec<_> = document.select(&selector).collect();
        assert_eq!(items[0].key(), items[0].key());
        assert_ne!(items[0].key(), items[1].key());

        let again = first(&document, "li");
        assert_eq!(again.key(), items[0].key());
    }
}
