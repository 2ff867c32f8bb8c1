//! Wire types for the catalog API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product category. Read-only from this client's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A product as returned by the API. The server is the system of record;
/// cached copies may be stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub price: f64,
    pub slug: String,
    pub category: Category,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of the paginated product listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub data: Vec<Product>,
    pub total: u32,
    pub offset: u32,
    pub limit: u32,
}

/// Payload for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub price: f64,
    #[serde(rename = "categoryId")]
    pub category_id: String,
}

/// Partial payload for updating a product. `None` fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "categoryId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}
