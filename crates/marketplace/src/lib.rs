//! # Brand Marketplace Listings
//!
//! Listings of brand assets and the public pages of their sellers.
//!
//! - **Entities**: listings, seller summaries and public seller profiles
//! - **Services**: [`ListingService`], generic over the document and blob stores
//! - **Types**: errors, partial updates and browse filters
//!
//! Ownership is checked against the [`brandmarket_auth::SessionUser`] making
//! the change; anonymous sessions can browse but not manage listings.

pub mod entities;
pub mod services;
pub mod types;

pub use entities::{
    ImageUpload, Listing, ListingCategory, ListingStatus, NewListing, SellerProfile,
    SellerSummary,
};
pub use services::{ListingService, ListingsPage};
pub use types::{ListingError, ListingFilter, ListingResult, ListingUpdate};
