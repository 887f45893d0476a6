use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::LazyLock;

use crate::config::{MetadataConfig, Mode};
use crate::element::{ElementKey, HostElement};
use crate::literal::{parse_object_literal, LiteralError};
use crate::MetadataError;

/// First greedy brace span inside a class attribute, within one line
static CLASS_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{.*\}").expect("class fragment pattern is valid"));

const EMPTY_FRAGMENT: &str = "{}";

/// Locate the raw metadata fragment of `element` for the given configuration.
///
/// Returns `"{}"` when the element carries nothing in the configured place.
pub fn locate_fragment<E: HostElement>(config: &MetadataConfig, element: &E) -> String {
    let found = match config.mode {
        Mode::Class => element
            .class_name()
            .and_then(|class| CLASS_FRAGMENT.find(&class).map(|m| m.as_str().to_string())),
        Mode::Elem => config
            .name
            .as_deref()
            .and_then(|tag| element.descendant_text(tag)),
        Mode::Attr => config
            .name
            .as_deref()
            .and_then(|name| element.attribute(name))
            .filter(|value| !value.is_empty()),
    };

    found.unwrap_or_else(|| EMPTY_FRAGMENT.to_string())
}

/// Wrap a fragment written without its outer braces
pub fn normalize_fragment(fragment: &str) -> Cow<'_, str> {
    if fragment.starts_with('{') {
        Cow::Borrowed(fragment)
    } else {
        Cow::Owned(format!("{{{}}}", fragment))
    }
}

/// Normalize and parse a raw fragment into a mapping
pub fn parse_fragment(fragment: &str) -> Result<Map<String, Value>, LiteralError> {
    parse_object_literal(&normalize_fragment(fragment))
}

/// One element that could not be extracted during a batch
#[derive(Debug)]
pub struct ElementFailure {
    pub element: String,
    pub error: MetadataError,
}

/// Outcome of extracting a batch of elements
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Elements processed by this batch
    pub extracted: usize,
    /// Elements that had already been processed
    pub skipped: usize,
    pub failures: Vec<ElementFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Side-table entry of a processed element
#[derive(Debug)]
struct ElementMetadata {
    /// Single property in effect when the element was extracted
    single_property: Option<String>,
    properties: Map<String, Value>,
}

/// Extracts element metadata once per element and keeps the results in a
/// side table keyed by element identity.
///
/// An element is processed when it has an entry in the table. The entry is the
/// element's property set: either every parsed key, or a single key holding the
/// whole mapping when `single_property` is configured. Changing the
/// configuration later does not reshape entries already recorded.
#[derive(Debug)]
pub struct MetadataExtractor<K> {
    config: MetadataConfig,
    store: HashMap<K, ElementMetadata>,
}

impl<K> Default for MetadataExtractor<K> {
    fn default() -> Self {
        Self::new(MetadataConfig::default())
    }
}

impl<K> MetadataExtractor<K> {
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            config,
            store: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Change the extraction mode for elements not yet processed
    pub fn set_mode(&mut self, mode: Mode, name: Option<&str>) {
        debug!("Metadata mode set to {} (name: {:?})", mode, name);
        self.config.set_mode(mode, name);
    }

    pub fn set_single_property(&mut self, property: Option<&str>) {
        self.config.set_single_property(property);
    }

    /// Number of elements processed so far
    pub fn processed_count(&self) -> usize {
        self.store.len()
    }
}

impl<K: Eq + Hash + Clone> MetadataExtractor<K> {
    /// Extract and record the metadata of `element`.
    ///
    /// Does nothing if the element was already processed. On a parse error the
    /// element stays unprocessed so a later call can retry.
    pub fn extract<E: HostElement<Key = K>>(&mut self, element: &E) -> Result<(), MetadataError> {
        let key = element.key();
        if self.store.contains_key(&key) {
            debug!("Skipping {}: metadata already extracted", element.describe());
            return Ok(());
        }

        let raw = locate_fragment(&self.config, element);
        let fragment = normalize_fragment(&raw);
        debug!(
            "Found metadata fragment for {} using {} mode: {}",
            element.describe(),
            self.config.mode,
            fragment
        );

        let mapping = parse_object_literal(&fragment).map_err(|source| MetadataError::Parse {
            element: element.describe(),
            fragment: fragment.to_string(),
            source,
        })?;

        let single_property = self.config.single_property.clone();
        let properties = match single_property.as_deref() {
            Some(property) => {
                let mut properties = Map::new();
                properties.insert(property.to_string(), Value::Object(mapping));
                properties
            }
            None => mapping,
        };

        debug!(
            "Extracted {} metadata properties for {}",
            properties.len(),
            element.describe()
        );
        self.store.insert(
            key,
            ElementMetadata {
                single_property,
                properties,
            },
        );
        Ok(())
    }

    /// Extract every element, continuing past per-element failures
    pub fn extract_all<E, I>(&mut self, elements: I) -> BatchReport
    where
        E: HostElement<Key = K>,
        I: IntoIterator<Item = E>,
    {
        let mut report = BatchReport::default();

        for element in elements {
            if self.is_processed(&element) {
                report.skipped += 1;
                continue;
            }
            match self.extract(&element) {
                Ok(()) => report.extracted += 1,
                Err(error) => {
                    warn!("Failed to extract metadata: {}", error);
                    report.failures.push(ElementFailure {
                        element: element.describe(),
                        error,
                    });
                }
            }
        }

        debug!(
            "Batch finished: {} extracted, {} skipped, {} failed",
            report.extracted,
            report.skipped,
            report.failures.len()
        );
        report
    }

    pub fn is_processed<E: HostElement<Key = K>>(&self, element: &E) -> bool {
        self.store.contains_key(&element.key())
    }

    /// The whole mapping of an element extracted with a single property.
    ///
    /// `None` when the element has not been processed, or was processed while
    /// flattening. Uses the single property in effect at extraction time.
    pub fn metadata_mapping<E: HostElement<Key = K>>(&self, element: &E) -> Option<&Value> {
        let entry = self.store.get(&element.key())?;
        entry.properties.get(entry.single_property.as_deref()?)
    }

    /// The element's full property set as recorded at extraction time
    pub fn flattened_element<E: HostElement<Key = K>>(
        &self,
        element: &E,
    ) -> Option<&Map<String, Value>> {
        self.store.get(&element.key()).map(|entry| &entry.properties)
    }

    /// A single property of a processed element
    pub fn property<E: HostElement<Key = K>>(&self, element: &E, name: &str) -> Option<&Value> {
        self.flattened_element(element)?.get(name)
    }
}

impl<'a> MetadataExtractor<ElementKey<'a>> {
    /// Extract every element of `document` matching a CSS selector
    pub fn extract_matching(
        &mut self,
        document: &'a Html,
        selector: &str,
    ) -> Result<BatchReport, MetadataError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| MetadataError::Selector(format!("'{}': {}", selector, e)))?;
        Ok(self.extract_all(document.select(&parsed)))
    }
}
