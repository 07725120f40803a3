//! Product record assembly
//!
//! Combines the page-injected product data (identifiers, stock flag,
//! category) with fields read from the document. A record is produced only
//! when every required section is present; otherwise the page is reported
//! as [`Incomplete`] with the first missing section.

use super::images::extract_images;
use super::locator::{text_content, Field, PageLocators};
use crate::render::PageModel;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Currency of every catalog price
pub const CURRENCY: &str = "USD";

/// The review average is rendered as the width of a filled star bar
static STAR_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"width:\s*([\d.]+)%").expect("STAR_WIDTH: hardcoded regex is valid")
});

/// A product image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    pub is_main: bool,
    pub is_thumbnail: bool,
}

/// A numeric-looking field as the page rendered it
///
/// The catalog shows counts and prices either as plain numbers or as
/// formatted text ("1.2K", "$38.00"). Text is kept as-is instead of being
/// coerced; a missing value is the number zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Self::Number(0.0)
        } else {
            Self::Text(text.to_string())
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub current: FieldValue,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reviews {
    /// Star bar fill percentage
    pub average: f64,
    pub count: FieldValue,
}

/// A fully populated product record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    pub sku_id: String,
    pub name: String,
    pub brand: String,
    pub url: String,
    pub images: Vec<ProductImage>,
    pub price: Price,
    pub reviews: Reviews,
    pub likes: FieldValue,
    pub category: String,
    pub is_out_of_stock: bool,
    pub highlights: Vec<String>,
    pub ingredients: String,
    pub description: String,
    pub how_to_use: String,
    pub size: String,
}

/// A document section without which no record is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    ReviewCount,
    Likes,
    Highlights,
    Description,
    Ingredients,
    HowToUse,
    Size,
}

impl Section {
    /// All required sections, in the order they are checked
    pub const REQUIRED: [Section; 7] = [
        Section::ReviewCount,
        Section::Likes,
        Section::Highlights,
        Section::Description,
        Section::Ingredients,
        Section::HowToUse,
        Section::Size,
    ];

    pub fn field(&self) -> Field {
        match self {
            Self::ReviewCount => Field::ReviewCount,
            Self::Likes => Field::Likes,
            Self::Highlights => Field::Highlights,
            Self::Description => Field::Description,
            Self::Ingredients => Field::Ingredients,
            Self::HowToUse => Field::HowToUse,
            Self::Size => Field::Size,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReviewCount => "reviews",
            Self::Likes => "likes",
            Self::Highlights => "highlights",
            Self::Description => "description",
            Self::Ingredients => "ingredients",
            Self::HowToUse => "how to use",
            Self::Size => "size",
        };
        write!(f, "{}", name)
    }
}

/// Why a page did not yield a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Incomplete {
    #[error("embedded product data not found")]
    PageData,

    #[error("{0} section not found")]
    Section(Section),
}

/// Extracts a product record from a rendered product page
///
/// # Errors
///
/// Returns `Incomplete::PageData` if the page carries no product data object
/// and `Incomplete::Section` naming the first required section that is
/// absent from the document.
pub fn extract_product(
    page: &PageModel,
    product_id: &str,
    locators: &PageLocators,
) -> Result<ProductRecord, Incomplete> {
    let product = page.product_data().ok_or(Incomplete::PageData)?;
    let document = page.document();

    if let Some(missing) = Section::REQUIRED
        .into_iter()
        .find(|section| locators.find(&document, section.field()).is_none())
    {
        return Err(Incomplete::Section(missing));
    }

    let text = |field: Field| locators.text(&document, field).unwrap_or_default();
    let attributes = product.get("attributes");

    Ok(ProductRecord {
        id: product_id.to_string(),
        sku_id: string_at(attributes, "skuId"),
        name: string_at(product.get("productInfo"), "productName"),
        brand: text(Field::Brand),
        url: page.url().to_string(),
        images: extract_images(&document, locators),
        price: Price {
            current: FieldValue::from_text(&text(Field::Price)),
            currency: CURRENCY.to_string(),
        },
        reviews: Reviews {
            average: review_average(&document, locators),
            count: FieldValue::from_text(&text(Field::ReviewCount)),
        },
        likes: FieldValue::from_text(&text(Field::Likes)),
        category: string_at(attributes, "nthLevelCategory"),
        is_out_of_stock: bool_at(attributes, "isOutOfStock"),
        highlights: highlights(&document, locators),
        ingredients: text(Field::Ingredients),
        description: text(Field::Description),
        how_to_use: text(Field::HowToUse),
        size: text(Field::Size),
    })
}

/// Reads the review average from the star bar's style attribute
fn review_average(document: &Html, locators: &PageLocators) -> f64 {
    locators
        .find(document, Field::ReviewAverage)
        .and_then(|bar| bar.value().attr("style"))
        .and_then(|style| STAR_WIDTH.captures(style))
        .and_then(|captures| captures.get(1))
        .and_then(|width| width.as_str().parse().ok())
        .unwrap_or(0.0)
}

fn highlights(document: &Html, locators: &PageLocators) -> Vec<String> {
    locators
        .find(document, Field::Highlights)
        .map(|container| {
            locators
                .find_within(container, Field::HighlightItem)
                .into_iter()
                .map(text_content)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn string_at(object: Option<&Value>, key: &str) -> String {
    match object.and_then(|object| object.get(key)) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn bool_at(object: Option<&Value>, key: &str) -> bool {
    match object.and_then(|object| object.get(key)) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
