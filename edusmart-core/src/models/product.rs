use serde::{Deserialize, Serialize};

/// A catalog entry as stored alongside its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: String,
    #[serde(alias = "product_name")]
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub stock: i32,
    pub age_range: String,
    pub brand: String,
    #[serde(default)]
    pub features: String,
}

impl ProductRecord {
    /// Text that gets embedded for this product.
    pub fn embedding_document(&self) -> String {
        format!(
            "Product: {}\nCategory: {}\nDescription: {}\nFeatures: {}\nAge Range: {}\nBrand: {}\nPrice: ${:.2}\nStock: {} units",
            self.name,
            self.category,
            self.description,
            self.features,
            self.age_range,
            self.brand,
            self.price,
            self.stock,
        )
    }
}
