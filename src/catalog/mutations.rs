//! Create/update/delete operations and their cache side effects.
//!
//! On success, a create or delete invalidates every `products` key so the
//! next read reflects the change; an update additionally writes the
//! canonical returned resource into the by-slug key so the detail view
//! needs no round trip. On failure the cache is left exactly as it was.

use tracing::info;

use super::{keys, CatalogClient, CatalogError, Product, ProductDraft, ProductPatch};

/// Terminal outcome of a failed mutation, named after the attempted action.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("Failed to create product")]
    Create(#[source] CatalogError),

    #[error("Failed to update product")]
    Update(#[source] CatalogError),

    #[error("Failed to delete product")]
    Delete(#[source] CatalogError),
}

impl MutationError {
    /// Whether the underlying failure invalidated the session.
    pub fn is_auth(&self) -> bool {
        let (MutationError::Create(e) | MutationError::Update(e) | MutationError::Delete(e)) =
            self;
        matches!(e, CatalogError::Gateway(g) if g.is_auth())
    }
}

impl CatalogClient {
    /// Create a product. The new item is not inserted optimistically; the
    /// listing invalidation makes it appear on the next read.
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, MutationError> {
        let product: Product = self
            .gateway
            .post("/products", draft)
            .await
            .map_err(|e| MutationError::Create(e.into()))?;

        info!(id = %product.id, slug = %product.slug, "Created product");
        self.cache.invalidate_prefix(&keys::products_root());
        Ok(product)
    }

    /// Update a product and seed the cache with the canonical response.
    pub async fn update_product(
        &self,
        id: &str,
        patch: &ProductPatch,
    ) -> Result<Product, MutationError> {
        let path = format!("/products/{}", id);
        let product: Product = self
            .gateway
            .put(&path, patch)
            .await
            .map_err(|e| MutationError::Update(e.into()))?;

        info!(id = %product.id, slug = %product.slug, "Updated product");

        // Listings and searches go stale; the by-slug entry is overwritten
        // afterwards so it stays fresh with the returned resource.
        self.cache.invalidate_prefix(&keys::products_root());
        match serde_json::to_value(&product) {
            Ok(value) => self.cache.set(
                keys::by_slug(&product.slug),
                value,
                self.staleness.product_stale(),
            ),
            Err(e) => return Err(MutationError::Update(e.into())),
        }

        Ok(product)
    }

    /// Delete a product. Returns the deleted id so the caller can navigate
    /// away from its detail view.
    pub async fn delete_product(&self, id: &str) -> Result<String, MutationError> {
        let path = format!("/products/{}", id);
        self.gateway
            .delete(&path)
            .await
            .map_err(|e| MutationError::Delete(e.into()))?;

        info!(id, "Deleted product");
        self.cache.invalidate_prefix(&keys::products_root());
        Ok(id.to_string())
    }
}
