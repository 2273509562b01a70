use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fields of interest of one upstream product.
///
/// Values are kept as raw JSON, so an absent field serializes as `null` rather than a made-up default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    // Top level fields
    pub product_id: Option<Value>,
    pub title: Option<Value>,
    pub authors: Option<Value>,
    pub description: Option<Value>,
    pub language: Option<Value>,
    pub categories: Option<Value>,
    pub url: Option<Value>,
    pub cover_image: Option<Value>,
    // `custom_attributes` fields
    pub publication_date: Option<Value>,
    pub publishers: Option<Value>,
    pub page_count: Option<Value>,
    pub average_rating: Option<Value>,
}

impl BookRecord {
    /// Extracts a record from one entry of `data.products`.
    pub fn from_product(product: &Value) -> Self {
        let top = |field: &str| present(product.get(field));
        let custom = |field: &str| {
            present(
                product
                    .get("custom_attributes")
                    .and_then(|attrs| attrs.get(field)),
            )
        };

        Self {
            product_id: top("product_id"),
            title: top("title"),
            authors: top("authors"),
            description: top("description"),
            language: top("language"),
            categories: top("categories"),
            url: top("url"),
            cover_image: top("cover_image"),
            publication_date: custom("publication_date"),
            publishers: custom("publishers"),
            page_count: custom("page_count"),
            average_rating: custom("average_rating"),
        }
    }

    /// Base URL of the cover, without the size suffix.
    pub fn cover_base_url(&self) -> Option<&str> {
        self.cover_image
            .as_ref()
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// File stem for the cover image: the ISBN segment of the cover URL,
    /// falling back to the product id.
    pub fn cover_file_stem(&self) -> Option<String> {
        let from_url = self.cover_base_url().and_then(|url| {
            let path = url.split(['?', '#']).next()?;
            let mut segments = path.rsplit('/');
            // ".../{isbn}/" leaves an empty last segment.
            let last = segments.next()?;
            let isbn = if last.is_empty() {
                segments.next()?
            } else {
                last
            };
            (!isbn.is_empty() && !isbn.contains(':')).then(|| isbn.to_string())
        });

        from_url.or_else(|| match self.product_id.as_ref()? {
            Value::String(id) if !id.is_empty() => Some(sanitize_stem(id)),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
    }
}

/// Reads `data.products` out of a search response, in response order.
/// Returns `None` if the response doesn't have a product list.
pub fn parse_products(content: &Value) -> Option<Vec<BookRecord>> {
    let products = content.get("data")?.get("products")?.as_array()?;
    Some(products.iter().map(BookRecord::from_product).collect())
}

/// Reads `data.total`, the number of results the query matches.
pub fn parse_total(content: &Value) -> Option<u64> {
    content.get("data")?.get("total")?.as_u64()
}

#[inline]
fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

#[inline]
fn sanitize_stem(id: &str) -> String {
    id.replace(['/', '\\', ':'], "_")
}
