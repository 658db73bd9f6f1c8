pub mod listing;
pub mod seller;

pub use listing::{ImageUpload, Listing, ListingCategory, ListingStatus, NewListing};
pub use seller::{SellerProfile, SellerSummary};
