//! Catalog enumerations: product categories and garment sizes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a category or size label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCatalogError {
    #[error("unknown category: {0}")]
    Category(String),
    #[error("unknown size: {0}")]
    Size(String),
}

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.product_category", rename_all = "PascalCase")
)]
pub enum Category {
    Tees,
    Hoodies,
    Pants,
    Accessories,
}

impl Category {
    pub const ALL: [Self; 4] = [Self::Tees, Self::Hoodies, Self::Pants, Self::Accessories];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tees => "Tees",
            Self::Hoodies => "Hoodies",
            Self::Pants => "Pants",
            Self::Accessories => "Accessories",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = ParseCatalogError;

    /// Case-insensitive, so `?category=tees` works from query strings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseCatalogError::Category(s.to_owned()))
    }
}

/// Garment size label.
///
/// This is the single canonical size scale; every product variant offers a
/// subset of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Size {
    #[serde(rename = "XS")]
    ExtraSmall,
    #[serde(rename = "S")]
    Small,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Large,
    #[serde(rename = "XL")]
    ExtraLarge,
    #[serde(rename = "XXL")]
    DoubleExtraLarge,
}

impl Size {
    pub const ALL: [Self; 6] = [
        Self::ExtraSmall,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::ExtraLarge,
        Self::DoubleExtraLarge,
    ];

    /// The label shown to shoppers and stored in the database.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ExtraSmall => "XS",
            Self::Small => "S",
            Self::Medium => "M",
            Self::Large => "L",
            Self::ExtraLarge => "XL",
            Self::DoubleExtraLarge => "XXL",
        }
    }

    /// Parse a list of labels, sorting and de-duplicating the result.
    ///
    /// # Errors
    ///
    /// Returns the first label that is not a known size.
    pub fn parse_list<I, S>(labels: I) -> Result<Vec<Self>, ParseCatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sizes = labels
            .into_iter()
            .map(|label| label.as_ref().parse::<Self>())
            .collect::<Result<Vec<_>, _>>()?;
        sizes.sort();
        sizes.dedup();
        Ok(sizes)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Size {
    type Err = ParseCatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|size| size.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseCatalogError::Size(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!("hoodies".parse::<Category>().unwrap(), Category::Hoodies);
        assert_eq!(
            "Shoes".parse::<Category>(),
            Err(ParseCatalogError::Category("Shoes".to_owned()))
        );
    }

    #[test]
    fn test_size_labels() {
        assert_eq!("xl".parse::<Size>().unwrap(), Size::ExtraLarge);
        assert_eq!(Size::DoubleExtraLarge.to_string(), "XXL");
        assert_eq!(serde_json::to_string(&Size::Small).unwrap(), "\"S\"");
    }

    #[test]
    fn test_parse_list_sorts_and_dedups() {
        let sizes = Size::parse_list(["XL", "s", "M", "S"]).unwrap();
        assert_eq!(sizes, vec![Size::Small, Size::Medium, Size::ExtraLarge]);
    }

    #[test]
    fn test_parse_list_reports_unknown_label() {
        assert_eq!(
            Size::parse_list(["M", "XXXL"]),
            Err(ParseCatalogError::Size("XXXL".to_owned()))
        );
    }
}
