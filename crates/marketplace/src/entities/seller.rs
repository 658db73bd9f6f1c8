use brandmarket_auth::UserProfile;
use serde::Serialize;

use super::listing::Listing;

/// What a listing card shows about its seller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSummary {
    pub uid: String,
    pub display_name: String,
    pub listing_count: usize,
}

impl From<&UserProfile> for SellerSummary {
    fn from(profile: &UserProfile) -> Self {
        Self {
            uid: profile.uid.clone(),
            display_name: profile.display_name.clone(),
            listing_count: profile.listings.len(),
        }
    }
}

/// A seller's public page: their profile and every listing they own
#[derive(Debug, Clone, PartialEq)]
pub struct SellerProfile {
    pub profile: UserProfile,
    pub listings: Vec<Listing>,
}
