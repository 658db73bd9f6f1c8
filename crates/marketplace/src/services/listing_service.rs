//! Listing service for creating, browsing and managing listings.

use std::collections::BTreeMap;
use std::sync::Arc;

use brandmarket_auth::{AuthError, ProfileRepository, Session, SessionUser};
use brandmarket_backend::{
    to_fields, BlobStore, Document, DocumentStore, Filter, Order, Query, WriteMode,
};
use brandmarket_config::CollectionsConfig;
use chrono::{SubsecRound, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::entities::{
    ImageUpload, Listing, ListingStatus, NewListing, SellerProfile, SellerSummary,
};
use crate::types::{ListingError, ListingFilter, ListingResult, ListingUpdate};

const MAX_IMAGES: usize = 5;
const MAX_TITLE_LENGTH: usize = 100;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

/// Listings together with a summary of every seller that appears in them
#[derive(Debug, Clone, PartialEq)]
pub struct ListingsPage {
    pub listings: Vec<Listing>,
    /// Keyed by seller id; sellers without a profile are absent
    pub sellers: BTreeMap<String, SellerSummary>,
}

/// Service for managing listings
pub struct ListingService<S, B> {
    store: Arc<S>,
    blobs: Arc<B>,
    profiles: ProfileRepository<S>,
    collection: String,
}

impl<S, B> Clone for ListingService<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            blobs: Arc::clone(&self.blobs),
            profiles: self.profiles.clone(),
            collection: self.collection.clone(),
        }
    }
}

impl<S, B> ListingService<S, B>
where
    S: DocumentStore,
    B: BlobStore,
{
    pub fn new(store: Arc<S>, blobs: Arc<B>, collections: &CollectionsConfig) -> Self {
        Self {
            profiles: ProfileRepository::new(Arc::clone(&store), collections.users.clone()),
            store,
            blobs,
            collection: collections.listings.clone(),
        }
    }

    /// Create a listing owned by `seller`, uploading its images first
    pub async fn create_listing(
        &self,
        seller: &SessionUser,
        listing: NewListing,
        images: Vec<ImageUpload>,
    ) -> ListingResult<Listing> {
        validate_new_listing(&listing)?;
        validate_images(&images)?;

        let id = CUID.create_id();
        let seller_id = seller.uid().to_string();

        let mut image_urls = Vec::with_capacity(images.len());
        for (index, image) in images.into_iter().enumerate() {
            let path = format!(
                "listings/{seller_id}/{id}/{index}-{}",
                sanitize_file_name(&image.file_name)
            );
            let url = self
                .blobs
                .upload(&path, image.bytes, &image.content_type)
                .await?;
            debug!(listing_id = %id, %path, "listing image uploaded");
            image_urls.push(url);
        }

        let listing = Listing {
            id: id.clone(),
            title: listing.title.trim().to_string(),
            description: listing.description.trim().to_string(),
            price: listing.price,
            category: listing.category,
            features: clean_features(listing.features),
            image_urls,
            seller_id: seller_id.clone(),
            created_at: Utc::now().trunc_subsecs(6),
            status: ListingStatus::Active,
        };

        self.store
            .put_document(&self.collection, &id, to_fields(&listing)?, WriteMode::Replace)
            .await?;

        match self.profiles.append_listing(&seller_id, &id).await {
            Ok(()) => {}
            Err(AuthError::NotFound(_)) => {
                warn!(%seller_id, listing_id = %id, "seller has no profile to record the listing on");
            }
            Err(error) => return Err(error.into()),
        }

        info!(%seller_id, listing_id = %id, "listing created");
        Ok(listing)
    }

    /// Get a listing by id
    pub async fn get_listing(&self, id: &str) -> ListingResult<Listing> {
        self.store
            .get_document(&self.collection, id)
            .await?
            .map(decode_listing)
            .transpose()?
            .ok_or_else(|| ListingError::NotFound(format!("listing {id}")))
    }

    /// All listings matching `filter`, newest first
    pub async fn browse(&self, filter: &ListingFilter) -> ListingResult<Vec<Listing>> {
        let query = Query::new().order_by(Order::descending("createdAt"));
        let documents = self.store.query_documents(&self.collection, &query).await?;

        let mut listings = Vec::new();
        for document in documents {
            if filter.limit.is_some_and(|limit| listings.len() >= limit) {
                break;
            }
            let listing = decode_listing(document)?;
            if filter.matches(&listing) {
                listings.push(listing);
            }
        }
        Ok(listings)
    }

    /// Like [`ListingService::browse`], plus the seller of each listing
    pub async fn browse_with_sellers(&self, filter: &ListingFilter) -> ListingResult<ListingsPage> {
        let listings = self.browse(filter).await?;

        let mut sellers = BTreeMap::new();
        for listing in &listings {
            if sellers.contains_key(&listing.seller_id) {
                continue;
            }
            match self.profiles.get(&listing.seller_id).await? {
                Some(profile) => {
                    sellers.insert(listing.seller_id.clone(), SellerSummary::from(&profile));
                }
                None => debug!(seller_id = %listing.seller_id, "listing seller has no profile"),
            }
        }

        Ok(ListingsPage { listings, sellers })
    }

    /// Every listing of one seller, newest first
    pub async fn seller_listings(&self, seller_id: &str) -> ListingResult<Vec<Listing>> {
        let query = Query::new().filter(Filter::eq("sellerId", seller_id));
        let documents = self.store.query_documents(&self.collection, &query).await?;

        let mut listings = documents
            .into_iter()
            .map(decode_listing)
            .collect::<ListingResult<Vec<_>>>()?;
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    /// The signed-in user's own listings
    pub async fn my_listings(&self, session: &Session) -> ListingResult<Vec<Listing>> {
        let user = session.user().ok_or(ListingError::NotAuthenticated)?;
        self.seller_listings(user.uid()).await
    }

    /// Change a listing owned by `seller`
    pub async fn update_listing(
        &self,
        seller: &SessionUser,
        id: &str,
        update: ListingUpdate,
    ) -> ListingResult<Listing> {
        let existing = self.get_listing(id).await?;
        ensure_owner(seller, &existing)?;
        validate_update(&update)?;

        if !update.is_empty() {
            self.store
                .put_document(&self.collection, id, to_fields(&update)?, WriteMode::Merge)
                .await?;
            info!(listing_id = %id, "listing updated");
        }

        self.get_listing(id).await
    }

    /// Delete a listing owned by `seller` and drop it from their profile
    pub async fn delete_listing(&self, seller: &SessionUser, id: &str) -> ListingResult<()> {
        let existing = self.get_listing(id).await?;
        ensure_owner(seller, &existing)?;

        self.store.delete_document(&self.collection, id).await?;
        self.profiles.remove_listing(seller.uid(), id).await?;

        info!(listing_id = %id, seller_id = %seller.uid(), "listing deleted");
        Ok(())
    }

    /// A seller's public page
    pub async fn public_profile(&self, user_id: &str) -> ListingResult<SellerProfile> {
        let profile = self.profiles.require(user_id).await?;
        let listings = self.seller_listings(user_id).await?;
        Ok(SellerProfile { profile, listings })
    }
}

fn decode_listing(document: Document) -> ListingResult<Listing> {
    let mut listing: Listing = document.decode()?;
    listing.id = document.id;
    Ok(listing)
}

fn ensure_owner(seller: &SessionUser, listing: &Listing) -> ListingResult<()> {
    if listing.seller_id != seller.uid() {
        warn!(listing_id = %listing.id, uid = %seller.uid(), "refusing change to another seller's listing");
        return Err(ListingError::NotOwner(listing.id.clone()));
    }
    Ok(())
}

fn validate_title(title: &str) -> ListingResult<()> {
    if title.trim().is_empty() {
        return Err(ListingError::Validation("title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ListingError::Validation(format!(
            "title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: f64) -> ListingResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(ListingError::Validation(
            "price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

fn validate_new_listing(listing: &NewListing) -> ListingResult<()> {
    validate_title(&listing.title)?;
    if listing.description.trim().is_empty() {
        return Err(ListingError::Validation(
            "description cannot be empty".to_string(),
        ));
    }
    validate_price(listing.price)
}

fn validate_update(update: &ListingUpdate) -> ListingResult<()> {
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }
    Ok(())
}

fn validate_images(images: &[ImageUpload]) -> ListingResult<()> {
    if images.len() > MAX_IMAGES {
        return Err(ListingError::Validation(format!(
            "at most {MAX_IMAGES} images can be uploaded"
        )));
    }
    if let Some(image) = images.iter().find(|image| !image.content_type.starts_with("image/")) {
        return Err(ListingError::Validation(format!(
            "{} is not an image",
            image.file_name
        )));
    }
    Ok(())
}

fn clean_features(features: Vec<String>) -> Vec<String> {
    features
        .into_iter()
        .map(|feature| feature.trim().to_string())
        .filter(|feature| !feature.is_empty())
        .collect()
}

/// Keep object names to one path segment of safe characters.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(['.', '_']).is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
