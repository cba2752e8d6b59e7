//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use novare_core::checkout::CatalogProduct;
use novare_core::{Category, LookbookId, ProductId, Size};

use super::HostedImage;

/// Page size when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A catalog product (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    /// Sellable units on hand. Only checkout decrements this.
    pub stock: i32,
    pub category: Category,
    pub sizes: Vec<Size>,
    pub images: Vec<HostedImage>,
    pub lookbook_id: Option<LookbookId>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product is sold in `size`.
    #[must_use]
    pub fn offers_size(&self, size: Size) -> bool {
        self.sizes.contains(&size)
    }

    /// The fields checkout snapshots and checks.
    #[must_use]
    pub fn catalog_entry(&self) -> CatalogProduct {
        CatalogProduct {
            name: self.name.clone(),
            price: self.price,
            stock: self.stock,
        }
    }
}

/// Catalog listing filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<Category>,
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
    pub featured: Option<bool>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            search: None,
            featured: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ProductFilter {
    /// Clamp page and limit into their valid ranges.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.search = self
            .search
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        self
    }

    /// Rows to skip for the current page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

/// One page of a product listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub current_page: u32,
    pub total_pages: u32,
}

impl ProductPage {
    #[must_use]
    pub fn new(products: Vec<Product>, total: i64, filter: &ProductFilter) -> Self {
        let limit = i64::from(filter.limit.max(1));
        let pages = (total.max(0) + limit - 1) / limit;
        Self {
            products,
            total,
            current_page: filter.page,
            total_pages: u32::try_from(pages).unwrap_or(u32::MAX),
        }
    }
}

/// Fields for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: Category,
    pub sizes: Vec<Size>,
    pub images: Vec<HostedImage>,
    pub lookbook_id: Option<LookbookId>,
    pub is_featured: bool,
}

impl ProductInput {
    /// Check the invariants the database would otherwise reject.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        if self.slug.is_empty() {
            return Err("slug is required".to_owned());
        }
        if self.price.is_sign_negative() {
            return Err("price must not be negative".to_owned());
        }
        if self.price.scale() > 2 && self.price.round_dp(2) != self.price {
            return Err("price must have at most two decimal places".to_owned());
        }
        if self.stock < 0 {
            return Err("stock must not be negative".to_owned());
        }
        Ok(())
    }
}

/// Derive a URL slug from a product or look name.
///
/// Lowercases ASCII letters and digits and joins every other run of characters
/// with a single hyphen.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Essential Tee"), "essential-tee");
        assert_eq!(slugify("  Heavy -- Hoodie (Black) "), "heavy-hoodie-black");
        assert_eq!(slugify("Café"), "caf");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_filter_normalization() {
        let filter = ProductFilter {
            page: 0,
            limit: 1_000,
            search: Some("   ".to_owned()),
            ..ProductFilter::default()
        }
        .normalized();

        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, MAX_PAGE_SIZE);
        assert_eq!(filter.search, None);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_offset_for_later_pages() {
        let filter = ProductFilter {
            page: 3,
            limit: 10,
            ..ProductFilter::default()
        };
        assert_eq!(filter.offset(), 20);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let filter = ProductFilter::default();
        assert_eq!(ProductPage::new(vec![], 0, &filter).total_pages, 0);
        assert_eq!(ProductPage::new(vec![], 10, &filter).total_pages, 1);
        assert_eq!(ProductPage::new(vec![], 11, &filter).total_pages, 2);
    }

    #[test]
    fn test_input_validation() {
        let input = ProductInput {
            name: "Cap".to_owned(),
            slug: "cap".to_owned(),
            description: String::new(),
            price: Decimal::new(1999, 2),
            stock: 3,
            category: Category::Accessories,
            sizes: vec![Size::Medium],
            images: vec![],
            lookbook_id: None,
            is_featured: false,
        };
        assert!(input.validate().is_ok());

        let negative = ProductInput {
            stock: -1,
            ..input.clone()
        };
        assert!(negative.validate().is_err());

        let fractional = ProductInput {
            price: Decimal::new(10_005, 3),
            ..input
        };
        assert!(fractional.validate().is_err());
    }
}
