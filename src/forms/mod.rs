//! Client-side validation for the product form.
//!
//! Rules run on blur, re-run on every change once a field has been touched,
//! and all run together on submit. A submit marks every field touched so all
//! errors surface at once. Validation failures never reach the network.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::catalog::{Category, ProductDraft};

lazy_static! {
    /// Regex for a syntactically valid HTTP/HTTPS URL
    static ref IMAGE_URL_REGEX: Regex = Regex::new(
        r"^https?://[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)*(:\d+)?(/[-a-zA-Z0-9_%&=+@~.,]*)*(\?[-a-zA-Z0-9_%&=+@~.,/]*)?$"
    ).unwrap();
}

/// The form's fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Description,
    Price,
    Image,
    Category,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Description,
        Field::Price,
        Field::Image,
        Field::Category,
    ];
}

/// Validate the product name
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Product name is required".to_string());
    }
    if trimmed.len() < 3 {
        return Err("Product name must be at least 3 characters".to_string());
    }
    Ok(())
}

/// Validate the product description
pub fn validate_description(description: &str) -> Result<(), String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err("Description is required".to_string());
    }
    if trimmed.len() < 10 {
        return Err("Description must be at least 10 characters".to_string());
    }
    Ok(())
}

/// Validate the price field (raw text from the form)
pub fn validate_price(price: &str) -> Result<(), String> {
    if price.is_empty() {
        return Err("Price is required".to_string());
    }
    let parsed: f64 = price
        .parse()
        .map_err(|_| "Price must be a valid number".to_string())?;
    if parsed <= 0.0 {
        return Err("Price must be greater than 0".to_string());
    }
    Ok(())
}

/// Validate the image URL field
pub fn validate_image_url(url: &str) -> Result<(), String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err("Image URL is required".to_string());
    }
    if !IMAGE_URL_REGEX.is_match(trimmed) {
        return Err("Please enter a valid URL".to_string());
    }
    Ok(())
}

/// Validate the selected category against the known category list
pub fn validate_category(category_id: &str, categories: &[Category]) -> Result<(), String> {
    if category_id.is_empty() {
        return Err("Category is required".to_string());
    }
    if !categories.iter().any(|c| c.id == category_id) {
        return Err("Category does not exist".to_string());
    }
    Ok(())
}

/// Collects field-level validation errors.
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: HashMap<Field, String>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, field: Field, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.errors.insert(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), HashMap<Field, String>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Raw form state as the user types it.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub image: String,
    pub category_id: String,
    touched: HashMap<Field, bool>,
    errors: HashMap<Field, String>,
}

impl ProductForm {
    /// A form with every field filled in, nothing touched yet.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: impl Into<String>,
        image: impl Into<String>,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price: price.into(),
            image: image.into(),
            category_id: category_id.into(),
            ..Self::default()
        }
    }

    /// Pre-fill the form for editing an existing product.
    pub fn from_product(product: &crate::catalog::Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            image: product.images.first().cloned().unwrap_or_default(),
            category_id: product.category.id.clone(),
            ..Self::default()
        }
    }

    /// Update a field value. Re-validates only if the field was touched.
    pub fn handle_change(&mut self, field: Field, value: &str, categories: &[Category]) {
        self.set_value(field, value);
        if self.touched.get(&field).copied().unwrap_or(false) {
            self.validate_field(field, categories);
        }
    }

    /// Mark a field touched and validate it.
    pub fn handle_blur(&mut self, field: Field, categories: &[Category]) {
        self.touched.insert(field, true);
        self.validate_field(field, categories);
    }

    pub fn error(&self, field: Field) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    /// Validate every field, marking them all touched, and build the draft
    /// if the form passes.
    pub fn submit(&mut self, categories: &[Category]) -> Result<ProductDraft, HashMap<Field, String>> {
        let mut builder = ValidationErrorBuilder::new();
        for field in Field::ALL {
            self.touched.insert(field, true);
            builder.check(field, self.run_rule(field, categories));
        }

        match builder.finish() {
            Ok(()) => self.errors.clear(),
            Err(errors) => {
                self.errors = errors.clone();
                return Err(errors);
            }
        }

        // The rules above guarantee the price parses.
        let price = self.price.parse().unwrap_or_default();
        Ok(ProductDraft {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            images: vec![self.image.trim().to_string()],
            price,
            category_id: self.category_id.clone(),
        })
    }

    fn set_value(&mut self, field: Field, value: &str) {
        match field {
            Field::Name => self.name = value.to_string(),
            Field::Description => self.description = value.to_string(),
            Field::Price => self.price = value.to_string(),
            Field::Image => self.image = value.to_string(),
            Field::Category => self.category_id = value.to_string(),
        }
    }

    fn validate_field(&mut self, field: Field, categories: &[Category]) {
        match self.run_rule(field, categories) {
            Ok(()) => {
                self.errors.remove(&field);
            }
            Err(message) => {
                self.errors.insert(field, message);
            }
        }
    }

    fn run_rule(&self, field: Field, categories: &[Category]) -> Result<(), String> {
        match field {
            Field::Name => validate_name(&self.name),
            Field::Description => validate_description(&self.description),
            Field::Price => validate_price(&self.price),
            Field::Image => validate_image_url(&self.image),
            Field::Category => validate_category(&self.category_id, categories),
        }
    }
}
