use std::collections::HashSet;
use std::path::Path;

use edusmart_core::{EduSmartError, ProductRecord};

/// Read and validate a JSON array of products.
pub fn load_catalog(path: &Path) -> Result<Vec<ProductRecord>, EduSmartError> {
    let raw = std::fs::read_to_string(path)?;
    let products = parse_catalog(&raw)?;
    tracing::info!(path = %path.display(), products = products.len(), "Loaded catalog");
    Ok(products)
}

/// Parse a catalog document. `product_name` is accepted for `name`.
/// Ids must be non-empty and unique; stock must not be negative.
pub fn parse_catalog(raw: &str) -> Result<Vec<ProductRecord>, EduSmartError> {
    let products: Vec<ProductRecord> = serde_json::from_str(raw)
        .map_err(|e| EduSmartError::Catalog(format!("invalid catalog JSON: {e}")))?;

    let mut seen = HashSet::new();
    for p in &products {
        if p.id.trim().is_empty() {
            return Err(EduSmartError::Catalog(format!("product '{}' has an empty id", p.name)));
        }
        if !seen.insert(p.id.as_str()) {
            return Err(EduSmartError::Catalog(format!("duplicate product id '{}'", p.id)));
        }
        if p.stock < 0 {
            return Err(EduSmartError::Catalog(format!(
                "product '{}' has negative stock {}",
                p.id, p.stock
            )));
        }
    }

    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_product_name_alias_and_missing_features() {
        let products = parse_catalog(
            r#"[{
                "id": "7", "product_name": "Watercolor Set", "description": "24 colours",
                "price": 12, "category": "Art", "stock": 40,
                "age_range": "6+ years", "brand": "ArtCo"
            }]"#,
        )
        .unwrap();

        assert_eq!(products[0].name, "Watercolor Set");
        assert_eq!(products[0].price, 12.0);
        assert_eq!(products[0].features, "");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let one = r#"{"id": "1", "name": "A", "description": "", "price": 1.0, "category": "",
                      "stock": 1, "age_range": "", "brand": ""}"#;
        let err = parse_catalog(&format!("[{one}, {one}]")).unwrap_err();
        assert!(err.to_string().contains("duplicate product id '1'"));
    }

    #[test]
    fn rejects_negative_stock_and_bad_json() {
        let bad_stock = r#"[{"id": "1", "name": "A", "description": "", "price": 1.0,
                             "category": "", "stock": -3, "age_range": "", "brand": ""}]"#;
        assert!(matches!(parse_catalog(bad_stock), Err(EduSmartError::Catalog(_))));
        assert!(matches!(parse_catalog("{}"), Err(EduSmartError::Catalog(_))));
    }

    #[test]
    fn bundled_catalog_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/products.json");
        let products = load_catalog(&path).unwrap();
        assert_eq!(products.len(), 50);
        assert!(products.iter().any(|p| p.name == "Digital Microscope Pro"));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_catalog(Path::new("/nonexistent/products.json")),
            Err(EduSmartError::Io(_))
        ));
    }
}
