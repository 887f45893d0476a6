//! Extract object-literal metadata embedded in markup elements.
//!
//! An element can carry its metadata in one of three places:
//!
//! - `class`: inside `{ }` in the class attribute (default)
//! - `attr`: in an attribute, `data` unless configured otherwise
//! - `elem`: as the text of a child element, e.g. a `<script>`
//!
//! ```
//! use markup_metadata::{MetadataExtractor, Mode};
//! use scraper::{Html, Selector};
//!
//! let document = Html::parse_fragment(r#"<p data="item_id: 1, item_label: 'Label'">p</p>"#);
//! let p = document.select(&Selector::parse("p").unwrap()).next().unwrap();
//!
//! let mut extractor = MetadataExtractor::default();
//! extractor.set_mode(Mode::Attr, Some("data"));
//! extractor.extract(&p).unwrap();
//!
//! assert_eq!(extractor.property(&p, "item_id"), Some(&serde_json::json!(1)));
//! ```

pub mod config;
pub mod element;
pub mod error;
pub mod extractor;
pub mod literal;

pub use config::{load_config, MetadataConfig, Mode};
pub use element::{ElementKey, HostElement};
pub use error::MetadataError;
pub use extractor::{
    locate_fragment, normalize_fragment, parse_fragment, BatchReport, ElementFailure,
    MetadataExtractor,
};
pub use literal::{parse_object_literal, LiteralError, LiteralErrorKind};
