//! User profile documents.

use std::sync::Arc;

use brandmarket_backend::{to_fields, DocumentStore, IdentityHandle, WriteMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::AuthError;

/// Profile record stored in the users collection, keyed by identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub listings: Vec<String>,
}

impl UserProfile {
    /// Initial profile written at sign-up, before the email is verified.
    pub fn for_new_account(handle: &IdentityHandle, display_name: &str, mobile_number: &str) -> Self {
        Self {
            uid: handle.uid.clone(),
            email: handle.email.clone(),
            display_name: display_name.to_string(),
            mobile_number: mobile_number.to_string(),
            created_at: Some(Utc::now()),
            email_verified: false,
            listings: Vec::new(),
        }
    }
}

/// Partial profile change. Only the fields that are set are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
}

impl ProfileUpdate {
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn mobile_number(mut self, mobile_number: impl Into<String>) -> Self {
        self.mobile_number = Some(mobile_number.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.mobile_number.is_none()
    }
}

/// Typed access to the users collection.
pub struct ProfileRepository<S> {
    store: Arc<S>,
    collection: String,
}

impl<S> Clone for ProfileRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
        }
    }
}

impl<S: DocumentStore> ProfileRepository<S> {
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub async fn get(&self, uid: &str) -> Result<Option<UserProfile>, AuthError> {
        let document = self
            .store
            .get_document(&self.collection, uid)
            .await
            .map_err(AuthError::from_backend)?;

        let Some(document) = document else {
            return Ok(None);
        };

        let mut profile: UserProfile = document.decode().map_err(AuthError::from_backend)?;
        if profile.uid.is_empty() {
            profile.uid = document.id;
        }
        Ok(Some(profile))
    }

    pub async fn require(&self, uid: &str) -> Result<UserProfile, AuthError> {
        self.get(uid)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("profile {uid}")))
    }

    pub async fn create(&self, profile: &UserProfile) -> Result<(), AuthError> {
        let fields = to_fields(profile).map_err(AuthError::from_backend)?;
        self.store
            .put_document(&self.collection, &profile.uid, fields, WriteMode::Replace)
            .await
            .map_err(AuthError::from_backend)?;
        debug!(uid = %profile.uid, "profile created");
        Ok(())
    }

    /// Write only the fields set in `update`, keeping everything else.
    pub async fn merge(&self, uid: &str, update: &ProfileUpdate) -> Result<(), AuthError> {
        if update.is_empty() {
            return Ok(());
        }

        let fields = to_fields(update).map_err(AuthError::from_backend)?;
        self.store
            .put_document(&self.collection, uid, fields, WriteMode::Merge)
            .await
            .map_err(AuthError::from_backend)
    }

    /// Record a listing id on the seller's profile. Appending an id that is
    /// already present leaves the profile unchanged.
    pub async fn append_listing(&self, uid: &str, listing_id: &str) -> Result<(), AuthError> {
        let profile = self.require(uid).await?;
        if profile.listings.iter().any(|id| id == listing_id) {
            return Ok(());
        }

        let mut listings = profile.listings;
        listings.push(listing_id.to_string());
        self.write_listings(uid, listings).await
    }

    pub async fn remove_listing(&self, uid: &str, listing_id: &str) -> Result<(), AuthError> {
        let Some(profile) = self.get(uid).await? else {
            return Ok(());
        };

        let before = profile.listings.len();
        let listings: Vec<String> = profile
            .listings
            .into_iter()
            .filter(|id| id != listing_id)
            .collect();
        if listings.len() == before {
            return Ok(());
        }
        self.write_listings(uid, listings).await
    }

    async fn write_listings(&self, uid: &str, listings: Vec<String>) -> Result<(), AuthError> {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "listings".to_string(),
            Value::Array(listings.into_iter().map(Value::String).collect()),
        );
        self.store
            .put_document(&self.collection, uid, fields, WriteMode::Merge)
            .await
            .map_err(AuthError::from_backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandmarket_backend::memory::MemoryDocumentStore;

    fn repository() -> (Arc<MemoryDocumentStore>, ProfileRepository<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let repository = ProfileRepository::new(Arc::clone(&store), "users");
        (store, repository)
    }

    fn alice() -> UserProfile {
        let handle = IdentityHandle::new("u1", "a@x.com");
        UserProfile::for_new_account(&handle, "Alice", "555-1111")
    }

    #[tokio::test]
    async fn created_profile_round_trips_with_camel_case_fields() {
        let (store, repository) = repository();
        repository.create(&alice()).await.unwrap();

        let document = store.get_document("users", "u1").await.unwrap().unwrap();
        assert_eq!(document.fields["displayName"], "Alice");
        assert_eq!(document.fields["mobileNumber"], "555-1111");
        assert_eq!(document.fields["emailVerified"], false);
        assert_eq!(document.fields["listings"], serde_json::json!([]));

        let profile = repository.require("u1").await.unwrap();
        assert_eq!(profile, alice_with_created_at(&profile));
    }

    fn alice_with_created_at(stored: &UserProfile) -> UserProfile {
        UserProfile {
            created_at: stored.created_at,
            ..alice()
        }
    }

    #[tokio::test]
    async fn merge_only_touches_given_fields() {
        let (_, repository) = repository();
        repository.create(&alice()).await.unwrap();

        repository
            .merge("u1", &ProfileUpdate::default().display_name("X"))
            .await
            .unwrap();

        let profile = repository.require("u1").await.unwrap();
        assert_eq!(profile.display_name, "X");
        assert_eq!(profile.mobile_number, "555-1111");
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let (_, repository) = repository();
        assert!(repository.get("ghost").await.unwrap().is_none());
        assert!(matches!(
            repository.require("ghost").await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_ids_are_appended_once_and_removed() {
        let (_, repository) = repository();
        repository.create(&alice()).await.unwrap();

        repository.append_listing("u1", "l1").await.unwrap();
        repository.append_listing("u1", "l1").await.unwrap();
        repository.append_listing("u1", "l2").await.unwrap();
        assert_eq!(repository.require("u1").await.unwrap().listings, vec!["l1", "l2"]);

        repository.remove_listing("u1", "l1").await.unwrap();
        assert_eq!(repository.require("u1").await.unwrap().listings, vec!["l2"]);
    }
}
