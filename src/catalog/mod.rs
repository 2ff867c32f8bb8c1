//! Typed client for the catalog API.
//!
//! Reads go through the query cache with per-resource staleness windows;
//! mutations live in [`mutations`] and are responsible for keeping the
//! cache coherent afterwards.

pub mod mutations;
pub mod types;

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::cache::{QueryCache, QueryKey};
use crate::config::CacheConfig;
use crate::gateway::{ApiGateway, GatewayError};
use crate::session::SessionStore;

pub use mutations::MutationError;
pub use types::{AuthResponse, Category, Product, ProductDraft, ProductPage, ProductPatch};

pub const LOGIN_FAILED_MESSAGE: &str = "Failed to authenticate. Please try again.";

/// Errors from cache-backed reads.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The API (or a cached payload) did not match the expected shape.
    #[error("Unexpected response from the server")]
    Decode(#[from] serde_json::Error),
}

/// Cache key builders. All product-related keys share the `products` root so
/// a single prefix invalidation covers listings, searches, and single items.
pub mod keys {
    use super::QueryKey;

    pub fn products_root() -> QueryKey {
        QueryKey::new(["products"])
    }

    pub fn categories() -> QueryKey {
        QueryKey::new(["categories"])
    }

    pub fn listing(offset: u32, limit: u32, category_id: Option<&str>) -> QueryKey {
        QueryKey::new([
            "products".to_string(),
            "list".to_string(),
            offset.to_string(),
            limit.to_string(),
            category_id.unwrap_or("-").to_string(),
        ])
    }

    pub fn search(text: &str) -> QueryKey {
        QueryKey::new(["products", "search", text])
    }

    pub fn by_slug(slug: &str) -> QueryKey {
        QueryKey::new(["products", "slug", slug])
    }
}

/// Cache-backed view of the remote catalog.
pub struct CatalogClient {
    gateway: Arc<ApiGateway>,
    cache: Arc<QueryCache>,
    session: Arc<SessionStore>,
    staleness: CacheConfig,
}

impl CatalogClient {
    pub fn new(
        gateway: Arc<ApiGateway>,
        cache: Arc<QueryCache>,
        session: Arc<SessionStore>,
        staleness: CacheConfig,
    ) -> Self {
        Self {
            gateway,
            cache,
            session,
            staleness,
        }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Authenticate by email. On success the token is stored in the session;
    /// on any failure the session stays unauthenticated and records a
    /// user-facing error.
    pub async fn login(&self, email: &str) -> Result<(), CatalogError> {
        self.session.begin_login();

        let body = serde_json::json!({ "email": email });
        match self.gateway.post::<Value, AuthResponse>("/auth", &body).await {
            Ok(auth) => {
                info!(email, "Authenticated");
                self.session.establish(auth.token, email.to_string());
                Ok(())
            }
            Err(e) => {
                self.session.fail_login(LOGIN_FAILED_MESSAGE);
                Err(e.into())
            }
        }
    }

    /// All categories, cached for the category staleness window.
    pub async fn categories(&self) -> Result<Vec<Category>, CatalogError> {
        let gateway = self.gateway.clone();
        let value = self
            .cache
            .get_or_fetch(&keys::categories(), self.staleness.categories_stale(), || async move {
                gateway.get::<Value>("/categories").await
            })
            .await?;
        Ok(serde_json::from_value((*value).clone())?)
    }

    /// One page of the product listing, optionally filtered by category.
    pub async fn products_page(
        &self,
        offset: u32,
        limit: u32,
        category_id: Option<&str>,
    ) -> Result<ProductPage, CatalogError> {
        let key = keys::listing(offset, limit, category_id);
        let gateway = self.gateway.clone();
        let mut query = vec![
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(category_id) = category_id {
            query.push(("categoryId", category_id.to_string()));
        }

        let value = self
            .cache
            .get_or_fetch(&key, self.staleness.listing_stale(), || async move {
                gateway.get_with_query::<Value>("/products", &query).await
            })
            .await?;
        Ok(serde_json::from_value((*value).clone())?)
    }

    /// Free-text search results, cached per search string.
    pub async fn search(&self, text: &str) -> Result<Vec<Product>, CatalogError> {
        let key = keys::search(text);
        let gateway = self.gateway.clone();
        let query = vec![("searchedText", text.to_string())];

        let value = self
            .cache
            .get_or_fetch(&key, self.staleness.search_stale(), || async move {
                gateway.get_with_query::<Value>("/products/search", &query).await
            })
            .await?;
        Ok(serde_json::from_value((*value).clone())?)
    }

    /// A single product by its server-assigned slug.
    pub async fn product_by_slug(&self, slug: &str) -> Result<Product, CatalogError> {
        let key = keys::by_slug(slug);
        let gateway = self.gateway.clone();
        let path = format!("/products/{}", slug);

        let value = self
            .cache
            .get_or_fetch(&key, self.staleness.product_stale(), || async move {
                gateway.get::<Value>(&path).await
            })
            .await?;
        Ok(serde_json::from_value((*value).clone())?)
    }
}
