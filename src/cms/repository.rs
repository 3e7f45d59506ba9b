use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::client::{ApiClient, ApiError};

/// A record type managed by one admin screen.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Path segment under `/admin/`.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<&str>;
}

/// Data access shared by every admin screen. Mutations return the
/// collection as the backend sees it afterwards, so every screen re-syncs
/// the same way.
#[async_trait]
pub trait Repository<T: Resource>: Send + Sync {
    async fn list(&self) -> Result<Vec<T>, ApiError>;

    async fn get(&self, id: &str) -> Result<T, ApiError>;

    async fn create(&self, item: &T) -> Result<Vec<T>, ApiError>;

    async fn update(&self, id: &str, item: &T) -> Result<Vec<T>, ApiError>;

    async fn delete(&self, id: &str) -> Result<Vec<T>, ApiError>;
}

pub struct HttpRepository<T> {
    client: ApiClient,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Resource> HttpRepository<T> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            _marker: PhantomData,
        }
    }

    fn collection_path() -> String {
        format!("/admin/{}", T::COLLECTION)
    }

    fn item_path(id: &str) -> String {
        format!("/admin/{}/{}", T::COLLECTION, id)
    }
}

impl<T> Clone for HttpRepository<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Resource> Repository<T> for HttpRepository<T> {
    async fn list(&self) -> Result<Vec<T>, ApiError> {
        let items = self
            .client
            .get::<Vec<T>>(&Self::collection_path())
            .await
            .into_result()?;
        Ok(items.unwrap_or_default())
    }

    async fn get(&self, id: &str) -> Result<T, ApiError> {
        self.client.get::<T>(&Self::item_path(id)).await.into_data()
    }

    async fn create(&self, item: &T) -> Result<Vec<T>, ApiError> {
        self.client
            .post::<serde_json::Value, T>(&Self::collection_path(), item)
            .await
            .into_result()?;
        info!(collection = T::COLLECTION, "record created");
        self.list().await
    }

    async fn update(&self, id: &str, item: &T) -> Result<Vec<T>, ApiError> {
        self.client
            .put::<serde_json::Value, T>(&Self::item_path(id), item)
            .await
            .into_result()?;
        info!(collection = T::COLLECTION, id, "record updated");
        self.list().await
    }

    async fn delete(&self, id: &str) -> Result<Vec<T>, ApiError> {
        self.client
            .delete::<serde_json::Value>(&Self::item_path(id))
            .await
            .into_result()?;
        info!(collection = T::COLLECTION, id, "record deleted");
        self.list().await
    }
}
