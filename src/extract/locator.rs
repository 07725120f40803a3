//! Page field locators
//!
//! Every logical field of a catalog page is found through exactly one
//! compiled selector. The extraction code only ever asks for a [`Field`],
//! never for a raw selector string.

use crate::config::SelectorConfig;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::fmt;

/// A logical field of a catalog page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    BrandLink,
    ProductLink,
    NextPage,
    Brand,
    ReviewCount,
    ReviewAverage,
    Likes,
    Price,
    Highlights,
    HighlightItem,
    Description,
    Ingredients,
    HowToUse,
    Size,
    Image,
}

impl Field {
    /// Returns the configuration key for this field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrandLink => "brand-link",
            Self::ProductLink => "product-link",
            Self::NextPage => "next-page",
            Self::Brand => "brand",
            Self::ReviewCount => "review-count",
            Self::ReviewAverage => "review-average",
            Self::Likes => "likes",
            Self::Price => "price",
            Self::Highlights => "highlights",
            Self::HighlightItem => "highlight-item",
            Self::Description => "description",
            Self::Ingredients => "ingredients",
            Self::HowToUse => "how-to-use",
            Self::Size => "size",
            Self::Image => "image",
        }
    }

    fn source(self, config: &SelectorConfig) -> &str {
        match self {
            Self::BrandLink => &config.brand_link,
            Self::ProductLink => &config.product_link,
            Self::NextPage => &config.next_page,
            Self::Brand => &config.brand,
            Self::ReviewCount => &config.review_count,
            Self::ReviewAverage => &config.review_average,
            Self::Likes => &config.likes,
            Self::Price => &config.price,
            Self::Highlights => &config.highlights,
            Self::HighlightItem => &config.highlight_item,
            Self::Description => &config.description,
            Self::Ingredients => &config.ingredients,
            Self::HowToUse => &config.how_to_use,
            Self::Size => &config.size,
            Self::Image => &config.image,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiled selectors, one per [`Field`]
#[derive(Debug, Clone)]
pub struct PageLocators {
    brand_link: Selector,
    product_link: Selector,
    next_page: Selector,
    brand: Selector,
    review_count: Selector,
    review_average: Selector,
    likes: Selector,
    price: Selector,
    highlights: Selector,
    highlight_item: Selector,
    description: Selector,
    ingredients: Selector,
    how_to_use: Selector,
    size: Selector,
    image: Selector,
}

impl PageLocators {
    /// Compiles every configured selector
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSelector` naming the first field whose
    /// selector does not parse.
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        let compile = |field: Field| {
            let source = field.source(config);
            Selector::parse(source).map_err(|_| ConfigError::InvalidSelector {
                field: field.as_str().to_string(),
                selector: source.to_string(),
            })
        };

        Ok(Self {
            brand_link: compile(Field::BrandLink)?,
            product_link: compile(Field::ProductLink)?,
            next_page: compile(Field::NextPage)?,
            brand: compile(Field::Brand)?,
            review_count: compile(Field::ReviewCount)?,
            review_average: compile(Field::ReviewAverage)?,
            likes: compile(Field::Likes)?,
            price: compile(Field::Price)?,
            highlights: compile(Field::Highlights)?,
            highlight_item: compile(Field::HighlightItem)?,
            description: compile(Field::Description)?,
            ingredients: compile(Field::Ingredients)?,
            how_to_use: compile(Field::HowToUse)?,
            size: compile(Field::Size)?,
            image: compile(Field::Image)?,
        })
    }

    pub fn selector(&self, field: Field) -> &Selector {
        match field {
            Field::BrandLink => &self.brand_link,
            Field::ProductLink => &self.product_link,
            Field::NextPage => &self.next_page,
            Field::Brand => &self.brand,
            Field::ReviewCount => &self.review_count,
            Field::ReviewAverage => &self.review_average,
            Field::Likes => &self.likes,
            Field::Price => &self.price,
            Field::Highlights => &self.highlights,
            Field::HighlightItem => &self.highlight_item,
            Field::Description => &self.description,
            Field::Ingredients => &self.ingredients,
            Field::HowToUse => &self.how_to_use,
            Field::Size => &self.size,
            Field::Image => &self.image,
        }
    }

    /// First element matching the field, in document order
    pub fn find<'a>(&self, document: &'a Html, field: Field) -> Option<ElementRef<'a>> {
        document.select(self.selector(field)).next()
    }

    /// Every element matching the field, in document order
    pub fn find_all<'a>(&self, document: &'a Html, field: Field) -> Vec<ElementRef<'a>> {
        document.select(self.selector(field)).collect()
    }

    /// Every element matching the field below `parent`
    pub fn find_within<'a>(&self, parent: ElementRef<'a>, field: Field) -> Vec<ElementRef<'a>> {
        parent.select(self.selector(field)).collect()
    }

    /// Trimmed text content of the first element matching the field
    pub fn text(&self, document: &Html, field: Field) -> Option<String> {
        self.find(document, field).map(text_content)
    }
}

/// Trimmed text content of an element and all its descendants
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
