//! Resolving a database id from the vendor's product name.
//!
//! Statements can be declared per database vendor; the database id chosen
//! here selects among them.

use crate::error::Result;

/// Something that can report the database product it connects to.
pub trait DataSource {
    /// The vendor's product name, e.g. `"PostgreSQL"` or `"MySQL"`.
    fn product_name(&self) -> Result<String>;
}

/// Maps a data source to a database id.
pub trait DatabaseIdProvider {
    fn database_id(&self, source: &dyn DataSource) -> Option<String>;
}

/// Resolves the id from the product name.
///
/// Without mappings the product name itself is the id. With mappings, the
/// first mapping whose key occurs in the product name supplies the id, and
/// an unmatched product resolves to `None`.
#[derive(Debug, Clone, Default)]
pub struct VendorDatabaseIdProvider {
    mappings: Option<Vec<(String, String)>>,
}

impl VendorDatabaseIdProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map products whose name contains `product` to `database_id`.
    #[must_use]
    pub fn with_mapping(
        mut self,
        product: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        self.mappings
            .get_or_insert_with(Vec::new)
            .push((product.into(), database_id.into()));
        self
    }

    fn resolve(&self, source: &dyn DataSource) -> Result<Option<String>> {
        let product = source.product_name()?;
        let Some(mappings) = &self.mappings else {
            return Ok(Some(product));
        };
        Ok(mappings
            .iter()
            .find(|(key, _)| product.contains(key.as_str()))
            .map(|(_, id)| id.clone()))
    }
}

impl DatabaseIdProvider for VendorDatabaseIdProvider {
    fn database_id(&self, source: &dyn DataSource) -> Option<String> {
        match self.resolve(source) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    target: "sqlmapper::database_id",
                    error = %e,
                    "Could not get a databaseId from dataSource"
                );
                None
            }
        }
    }
}
