//! Listing controller: merges the paginated/filtered listing with the
//! debounced free-text search into a single "what to display" decision.
//!
//! A non-empty debounced search drives the view and suppresses pagination;
//! clearing it falls back to the paginated listing with the offset and
//! category filter retained from before the search.

pub mod debounce;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{CatalogClient, CatalogError, Product};

pub use debounce::Debouncer;

/// Which fetch produced the displayed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSource {
    Listing,
    Search,
}

/// One render-ready view decision.
#[derive(Debug, Clone)]
pub struct ListingView {
    pub source: ViewSource,
    pub items: Vec<Product>,
    /// Total item count, known only in listing mode.
    pub total: Option<u32>,
    pub can_go_prev: bool,
    pub can_go_next: bool,
}

#[derive(Debug, Clone)]
struct ListingState {
    offset: u32,
    limit: u32,
    category_filter: Option<String>,
    search_text: String,
}

/// Drives the product listing page.
pub struct ListingController {
    catalog: Arc<CatalogClient>,
    state: Mutex<ListingState>,
    debouncer: Debouncer,
}

impl ListingController {
    pub fn new(catalog: Arc<CatalogClient>, page_limit: u32, debounce_delay: Duration) -> Self {
        Self {
            catalog,
            state: Mutex::new(ListingState {
                offset: 0,
                limit: page_limit,
                category_filter: None,
                search_text: String::new(),
            }),
            debouncer: Debouncer::new(debounce_delay),
        }
    }

    /// Record a keystroke in the search box. Resets to the first page and
    /// restarts the debounce timer; the actual search fires only once the
    /// text has been quiet for the full delay.
    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut state = self.state.lock();
            if state.search_text == text {
                return;
            }
            state.search_text = text.clone();
            state.offset = 0;
        }

        if text.is_empty() {
            // Clearing the box returns to the listing without waiting.
            self.debouncer.commit_now("");
        } else {
            self.debouncer.input(text);
        }
    }

    /// Empty the search box, returning to the listing immediately.
    pub fn clear_search(&self) {
        self.set_search_text("");
    }

    pub fn set_category_filter(&self, category_id: Option<String>) {
        let mut state = self.state.lock();
        if state.category_filter == category_id {
            return;
        }
        state.category_filter = category_id;
        state.offset = 0;
    }

    pub fn next_page(&self) {
        let mut state = self.state.lock();
        state.offset += state.limit;
    }

    pub fn prev_page(&self) {
        let mut state = self.state.lock();
        state.offset = state.offset.saturating_sub(state.limit);
    }

    pub fn offset(&self) -> u32 {
        self.state.lock().offset
    }

    pub fn search_text(&self) -> String {
        self.state.lock().search_text.clone()
    }

    pub fn debounced_search(&self) -> String {
        self.debouncer.current()
    }

    /// Decide what to display and fetch it (through the cache).
    ///
    /// Search mode ignores offset and category filter for display but keeps
    /// them in state for when the search is cleared. In listing mode the
    /// "next" control is enabled only while more items exist past the
    /// current page, judged from the server's total count.
    pub async fn current_view(&self) -> Result<ListingView, CatalogError> {
        let debounced = self.debouncer.current();

        if !debounced.is_empty() {
            let items = self.catalog.search(&debounced).await?;
            return Ok(ListingView {
                source: ViewSource::Search,
                items,
                total: None,
                can_go_prev: false,
                can_go_next: false,
            });
        }

        let (offset, limit, category_filter) = {
            let state = self.state.lock();
            (state.offset, state.limit, state.category_filter.clone())
        };

        let page = self
            .catalog
            .products_page(offset, limit, category_filter.as_deref())
            .await?;

        Ok(ListingView {
            source: ViewSource::Listing,
            items: page.data,
            total: Some(page.total),
            can_go_prev: offset > 0,
            can_go_next: offset + limit < page.total,
        })
    }
}
