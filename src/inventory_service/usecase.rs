use crate::model::{Product, ProductCreate, ProductFilter, ProductId, ProductPatch, ProductUpdate};
use serde::{Deserialize, Serialize};
use storefront_kit::{
    CacheKey, Document, IdentifierAllocator, Page, ReadThroughCache, ServiceError, StoreClient,
};
use tracing::{debug, info, instrument, warn};

pub(crate) fn product_key(id: ProductId) -> CacheKey {
    CacheKey::new(Product::KIND, id)
}

/// Listing request. `page` is 1-indexed; both `page` and `limit` must be at least 1.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: u64,
}

#[derive(Clone)]
pub struct ProductUsecase {
    products: StoreClient<Product>,
    ids: IdentifierAllocator,
    cache: ReadThroughCache,
}

impl ProductUsecase {
    pub fn new(products: StoreClient<Product>, ids: IdentifierAllocator, cache: ReadThroughCache) -> Self {
        Self { products, ids, cache }
    }

    #[instrument(skip(self, params), fields(name = %params.name))]
    pub async fn create_product(&self, params: ProductCreate) -> Result<Product, ServiceError> {
        debug!(?params, "create_product called");
        require("name", &params.name)?;
        require("description", &params.description)?;
        require("category", &params.category)?;
        validate_price(params.price)?;

        let id = ProductId(self.ids.next(Product::KIND).await?);
        let product = Product::new(id, params);
        self.products.insert(product.clone()).await?;
        info!(%id, stock = product.stock, "Product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.cache
            .get_or_fetch(&product_key(id), || async {
                self.products
                    .get(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(Product::KIND, id))
            })
            .await
    }

    /// Reads straight from the store; listings aren't cached.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: ProductQuery) -> Result<ProductPage, ServiceError> {
        if query.page < 1 || query.limit < 1 {
            return Err(ServiceError::validation("page and limit must be at least 1"));
        }
        let filter = ProductFilter {
            category: query.category.filter(|c| !c.trim().is_empty()),
            ..Default::default()
        };
        let (items, total) = self
            .products
            .find(filter, Page::new(query.page, query.limit))
            .await?;
        Ok(ProductPage { items, total })
    }

    #[instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, ServiceError> {
        if update.is_empty() {
            return Err(ServiceError::validation("nothing to update"));
        }
        for (field, value) in [
            ("name", &update.name),
            ("description", &update.description),
            ("category", &update.category),
        ] {
            if let Some(value) = value {
                require(field, value)?;
            }
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }

        let updated = self
            .products
            .update_one(Product::by_id(id), ProductPatch::Fields(update))
            .await?
            .ok_or_else(|| ServiceError::not_found(Product::KIND, id))?;
        self.cache.invalidate(&product_key(id)).await;
        info!(%id, "Product updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        let deleted = self
            .products
            .delete_one(Product::by_id(id))
            .await?
            .ok_or_else(|| ServiceError::not_found(Product::KIND, id))?;
        self.cache.invalidate(&product_key(id)).await;
        info!(%id, "Product deleted");
        Ok(deleted)
    }

    /// Takes `quantity` units out of stock in one guarded write.
    ///
    /// Fails without changing anything if the product has fewer than
    /// `quantity` units.
    #[instrument(skip(self))]
    pub async fn decrease_stock(&self, id: ProductId, quantity: u32) -> Result<Product, ServiceError> {
        if quantity == 0 {
            return Err(ServiceError::validation("quantity must be at least 1"));
        }

        let guard = ProductFilter {
            id: Some(id),
            min_stock: Some(quantity),
            ..Default::default()
        };
        match self
            .products
            .update_one(guard, ProductPatch::DecrementStock(quantity))
            .await?
        {
            Some(updated) => {
                self.cache.invalidate(&product_key(id)).await;
                info!(%id, quantity, stock = updated.stock, "Stock decreased");
                Ok(updated)
            }
            None => {
                let current = self
                    .products
                    .get(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(Product::KIND, id))?;
                warn!(%id, quantity, stock = current.stock, "Insufficient stock");
                Err(ServiceError::validation(format!(
                    "insufficient stock for product {id}: have {}, need {quantity}",
                    current.stock
                )))
            }
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ServiceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ServiceError::validation("price cannot be negative"));
    }
    Ok(())
}
