//! Request types for listing operations.

use serde::Serialize;

use crate::entities::{Listing, ListingCategory, ListingStatus};

/// Partial listing change; only the fields that are set are written
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ListingCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
}

impl ListingUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Criteria for browsing listings. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub category: Option<ListingCategory>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive match against title and description
    pub text: Option<String>,
    pub status: Option<ListingStatus>,
    pub limit: Option<usize>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        if self.category.is_some_and(|category| listing.category != category) {
            return false;
        }
        if self.status.is_some_and(|status| listing.status != status) {
            return false;
        }
        if self.min_price.is_some_and(|min| listing.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| listing.price > max) {
            return false;
        }

        match self.text.as_deref().map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => {
                let needle = text.to_lowercase();
                listing.title.to_lowercase().contains(&needle)
                    || listing.description.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}
