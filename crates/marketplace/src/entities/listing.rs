use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing category enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ListingCategory {
    BrandIdentity,
    Logo,
    Typography,
    Trademark,
    Domain,
    Other,
}

impl ListingCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingCategory::BrandIdentity => "brand-identity",
            ListingCategory::Logo => "logo",
            ListingCategory::Typography => "typography",
            ListingCategory::Trademark => "trademark",
            ListingCategory::Domain => "domain",
            ListingCategory::Other => "other",
        }
    }
}

impl fmt::Display for ListingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "brand-identity" => Ok(ListingCategory::BrandIdentity),
            "logo" => Ok(ListingCategory::Logo),
            "typography" => Ok(ListingCategory::Typography),
            "trademark" => Ok(ListingCategory::Trademark),
            "domain" => Ok(ListingCategory::Domain),
            "other" => Ok(ListingCategory::Other),
            other => Err(format!("unknown category {other}")),
        }
    }
}

/// Listing status enumeration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Pending,
    Sold,
}

/// A brand asset offered for sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Document id, not stored as a field
    #[serde(skip)]
    pub id: String,
    /// Short headline shown on cards
    pub title: String,
    /// Full description
    #[serde(default)]
    pub description: String,
    /// Asking price, never negative
    pub price: f64,
    /// Listing category
    pub category: ListingCategory,
    /// Included deliverables
    #[serde(default)]
    pub features: Vec<String>,
    /// Download URLs of uploaded images
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Identity id of the seller
    pub seller_id: String,
    /// When the listing was created
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Listing status
    #[serde(default)]
    pub status: ListingStatus,
}

/// Seller input for a new listing
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category: ListingCategory,
    pub features: Vec<String>,
}

/// An image attached to a new listing
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// Fixed-width RFC 3339 timestamps, so that stored values order correctly
/// as strings.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_uses_stored_field_names() {
        let listing: Listing = serde_json::from_value(json!({
            "title": "Northwind identity",
            "description": "Full brand kit",
            "price": 1200,
            "category": "brand-identity",
            "features": ["logo", "palette"],
            "imageUrls": [],
            "sellerId": "u1",
            "createdAt": "2024-05-01T10:00:00Z",
            "status": "sold"
        }))
        .unwrap();

        assert_eq!(listing.category, ListingCategory::BrandIdentity);
        assert_eq!(listing.status, ListingStatus::Sold);
        assert_eq!(listing.price, 1200.0);

        let stored = serde_json::to_value(&listing).unwrap();
        assert_eq!(stored["createdAt"], "2024-05-01T10:00:00.000000Z");
        assert_eq!(stored["sellerId"], "u1");
        assert!(stored.get("id").is_none());
    }

    #[test]
    fn status_defaults_to_active() {
        let listing: Listing = serde_json::from_value(json!({
            "title": "Mono",
            "price": 10.5,
            "category": "typography",
            "sellerId": "u1",
            "createdAt": "2024-05-01T10:00:00+02:00"
        }))
        .unwrap();
        assert_eq!(listing.status, ListingStatus::Active);
        assert!(listing.features.is_empty());
    }

    #[test]
    fn categories_parse_case_insensitively() {
        assert_eq!("Logo".parse::<ListingCategory>(), Ok(ListingCategory::Logo));
        assert!("poster".parse::<ListingCategory>().is_err());
        assert_eq!(ListingCategory::BrandIdentity.to_string(), "brand-identity");
    }
}
