pub mod errors;
pub mod requests;

pub use errors::{ListingError, ListingResult};
pub use requests::{ListingFilter, ListingUpdate};
