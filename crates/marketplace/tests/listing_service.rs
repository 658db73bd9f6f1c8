use std::sync::Arc;

use brandmarket_auth::{Session, SessionManager, SessionUser};
use brandmarket_backend::memory::{MemoryBlobStore, MemoryDocumentStore, MemoryIdentityClient};
use brandmarket_backend::{to_fields, DocumentStore, WriteMode};
use brandmarket_config::AppConfig;
use brandmarket_marketplace::{
    ImageUpload, ListingCategory, ListingError, ListingFilter, ListingService, ListingStatus,
    ListingUpdate, NewListing,
};
use serde_json::json;

type Service = ListingService<MemoryDocumentStore, MemoryBlobStore>;

struct TestContext {
    identity: Arc<MemoryIdentityClient>,
    store: Arc<MemoryDocumentStore>,
    blobs: Arc<MemoryBlobStore>,
    sessions: SessionManager<MemoryIdentityClient, MemoryDocumentStore>,
    service: Service,
}

impl TestContext {
    async fn new() -> Self {
        let config = AppConfig::default();
        let identity = Arc::new(MemoryIdentityClient::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStore::new("https://cdn.test"));

        let sessions = SessionManager::start(Arc::clone(&identity), Arc::clone(&store), &config);
        sessions.observe_session().next().await;
        let service = ListingService::new(Arc::clone(&store), Arc::clone(&blobs), &config.collections);

        Self {
            identity,
            store,
            blobs,
            sessions,
            service,
        }
    }

    /// A verified seller with a profile, signed in.
    async fn seller(&self, email: &str, display_name: &str) -> SessionUser {
        self.sessions
            .sign_up(email, "secret1", display_name, "555-1111")
            .await
            .unwrap();
        self.identity.mark_verified(email).await;
        self.sessions.sign_in(email, "secret1").await.unwrap()
    }

    /// Store a listing document directly, with a fixed creation time.
    async fn seed_listing(&self, id: &str, seller_id: &str, created_at: &str, fields: serde_json::Value) {
        let mut document = json!({
            "title": "Seeded",
            "description": "Seeded listing",
            "price": 100.0,
            "category": "logo",
            "features": [],
            "imageUrls": [],
            "sellerId": seller_id,
            "createdAt": created_at,
            "status": "active"
        });
        if let (Some(base), Some(extra)) = (document.as_object_mut(), fields.as_object()) {
            base.extend(extra.clone());
        }
        self.store
            .put_document("listings", id, to_fields(&document).unwrap(), WriteMode::Replace)
            .await
            .unwrap();
    }
}

fn new_listing(title: &str, price: f64) -> NewListing {
    NewListing {
        title: title.to_string(),
        description: "Logo, palette and typography guide".to_string(),
        price,
        category: ListingCategory::BrandIdentity,
        features: vec!["Vector files".to_string(), "Style guide".to_string()],
    }
}

#[tokio::test]
async fn create_listing_uploads_images_and_records_on_profile() {
    let context = TestContext::new().await;
    let seller = context.seller("a@x.com", "Alice").await;

    let listing = context
        .service
        .create_listing(
            &seller,
            new_listing("Northwind", 1200.0),
            vec![
                ImageUpload::new("mark.png", "image/png", b"png".to_vec()),
                ImageUpload::new("board.jpg", "image/jpeg", b"jpg".to_vec()),
            ],
        )
        .await
        .unwrap();

    assert_eq!(listing.status, ListingStatus::Active);
    assert_eq!(listing.seller_id, seller.uid());
    assert_eq!(
        listing.image_urls,
        vec![
            format!("https://cdn.test/listings/{}/{}/0-mark.png", seller.uid(), listing.id),
            format!("https://cdn.test/listings/{}/{}/1-board.jpg", seller.uid(), listing.id),
        ]
    );
    assert_eq!(context.blobs.paths().await.len(), 2);

    let stored = context.service.get_listing(&listing.id).await.unwrap();
    assert_eq!(stored, listing);

    let profile = context.sessions.profiles().require(seller.uid()).await.unwrap();
    assert_eq!(profile.listings, vec![listing.id.clone()]);
}

#[tokio::test]
async fn invalid_listing_is_rejected_before_upload() {
    let context = TestContext::new().await;
    let seller = context.seller("a@x.com", "Alice").await;

    let result = context
        .service
        .create_listing(
            &seller,
            new_listing("Northwind", -5.0),
            vec![ImageUpload::new("mark.png", "image/png", b"png".to_vec())],
        )
        .await;

    assert!(matches!(result, Err(ListingError::Validation(_))));
    assert!(context.blobs.paths().await.is_empty());
    assert_eq!(context.store.document_count("listings").await, 0);
}

#[tokio::test]
async fn missing_listing_is_not_found() {
    let context = TestContext::new().await;
    let result = context.service.get_listing("nope").await;
    assert!(matches!(result, Err(ListingError::NotFound(_))));
}

#[tokio::test]
async fn browse_orders_newest_first_and_filters() {
    let context = TestContext::new().await;
    context
        .seed_listing("old", "s1", "2024-01-01T00:00:00.000000Z", json!({ "title": "Acme logo" }))
        .await;
    context
        .seed_listing(
            "mid",
            "s2",
            "2024-02-01T00:00:00.000000Z",
            json!({ "category": "domain", "price": 40.0 }),
        )
        .await;
    context
        .seed_listing(
            "new",
            "s1",
            "2024-03-01T00:00:00.000000Z",
            json!({ "price": 900.0, "status": "sold" }),
        )
        .await;

    let all = context.service.browse(&ListingFilter::default()).await.unwrap();
    let ids: Vec<_> = all.iter().map(|listing| listing.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);

    let logos_under_500 = context
        .service
        .browse(&ListingFilter {
            category: Some(ListingCategory::Logo),
            max_price: Some(500.0),
            ..ListingFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(logos_under_500.len(), 1);
    assert_eq!(logos_under_500[0].id, "old");

    let searched = context
        .service
        .browse(&ListingFilter {
            text: Some("acme".to_string()),
            ..ListingFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);

    let active = context
        .service
        .browse(&ListingFilter {
            status: Some(ListingStatus::Active),
            limit: Some(1),
            ..ListingFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "mid");
}

#[tokio::test]
async fn browse_with_sellers_summarizes_each_seller_once() {
    let context = TestContext::new().await;
    let alice = context.seller("a@x.com", "Alice").await;
    context
        .service
        .create_listing(&alice, new_listing("One", 10.0), Vec::new())
        .await
        .unwrap();
    context
        .service
        .create_listing(&alice, new_listing("Two", 20.0), Vec::new())
        .await
        .unwrap();
    context
        .seed_listing("orphan", "ghost", "2024-01-01T00:00:00.000000Z", json!({}))
        .await;

    let page = context
        .service
        .browse_with_sellers(&ListingFilter::default())
        .await
        .unwrap();

    assert_eq!(page.listings.len(), 3);
    assert_eq!(page.sellers.len(), 1);
    let summary = &page.sellers[alice.uid()];
    assert_eq!(summary.display_name, "Alice");
    assert_eq!(summary.listing_count, 2);
}

#[tokio::test]
async fn my_listings_requires_a_session() {
    let context = TestContext::new().await;
    let result = context.service.my_listings(&Session::Anonymous).await;
    assert!(matches!(result, Err(ListingError::NotAuthenticated)));
}

#[tokio::test]
async fn my_listings_returns_only_own_listings() {
    let context = TestContext::new().await;
    let alice = context.seller("a@x.com", "Alice").await;
    context
        .service
        .create_listing(&alice, new_listing("Mine", 10.0), Vec::new())
        .await
        .unwrap();
    context
        .seed_listing("theirs", "someone-else", "2024-01-01T00:00:00.000000Z", json!({}))
        .await;

    let listings = context
        .service
        .my_listings(&context.sessions.current())
        .await
        .unwrap();

    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].title, "Mine");
}

#[tokio::test]
async fn only_the_owner_can_update_or_delete() {
    let context = TestContext::new().await;
    let alice = context.seller("a@x.com", "Alice").await;
    let listing = context
        .service
        .create_listing(&alice, new_listing("Northwind", 100.0), Vec::new())
        .await
        .unwrap();

    context.sessions.sign_out().await.unwrap();
    let bob = context.seller("b@x.com", "Bob").await;

    let update = ListingUpdate {
        price: Some(1.0),
        ..ListingUpdate::default()
    };
    assert!(matches!(
        context.service.update_listing(&bob, &listing.id, update).await,
        Err(ListingError::NotOwner(_))
    ));
    assert!(matches!(
        context.service.delete_listing(&bob, &listing.id).await,
        Err(ListingError::NotOwner(_))
    ));
    assert_eq!(context.service.get_listing(&listing.id).await.unwrap().price, 100.0);
}

#[tokio::test]
async fn owner_update_merges_fields() {
    let context = TestContext::new().await;
    let alice = context.seller("a@x.com", "Alice").await;
    let listing = context
        .service
        .create_listing(&alice, new_listing("Northwind", 100.0), Vec::new())
        .await
        .unwrap();

    let updated = context
        .service
        .update_listing(
            &alice,
            &listing.id,
            ListingUpdate {
                price: Some(150.0),
                status: Some(ListingStatus::Pending),
                ..ListingUpdate::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.price, 150.0);
    assert_eq!(updated.status, ListingStatus::Pending);
    assert_eq!(updated.title, "Northwind");
    assert_eq!(updated.features, listing.features);
}

#[tokio::test]
async fn delete_removes_listing_from_profile() {
    let context = TestContext::new().await;
    let alice = context.seller("a@x.com", "Alice").await;
    let listing = context
        .service
        .create_listing(&alice, new_listing("Northwind", 100.0), Vec::new())
        .await
        .unwrap();

    context.service.delete_listing(&alice, &listing.id).await.unwrap();

    assert!(matches!(
        context.service.get_listing(&listing.id).await,
        Err(ListingError::NotFound(_))
    ));
    let profile = context.sessions.profiles().require(alice.uid()).await.unwrap();
    assert!(profile.listings.is_empty());
}

#[tokio::test]
async fn public_profile_lists_seller_listings() {
    let context = TestContext::new().await;
    let alice = context.seller("a@x.com", "Alice").await;
    context
        .service
        .create_listing(&alice, new_listing("Northwind", 100.0), Vec::new())
        .await
        .unwrap();

    let page = context.service.public_profile(alice.uid()).await.unwrap();
    assert_eq!(page.profile.display_name, "Alice");
    assert_eq!(page.listings.len(), 1);

    assert!(matches!(
        context.service.public_profile("ghost").await,
        Err(ListingError::NotFound(_))
    ));
}

#[tokio::test]
async fn unavailable_store_is_transient() {
    let context = TestContext::new().await;
    context.store.set_unavailable(true);

    let error = context
        .service
        .browse(&ListingFilter::default())
        .await
        .unwrap_err();
    assert!(error.is_transient());
}
