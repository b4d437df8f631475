//! Composite keys for the session's local cache.
//!
//! A [`CacheKey`] is built by feeding it an ordered sequence of components.
//! Every component updates a running multiplicative hash, a checksum and a
//! count, so two keys that differ anywhere almost always differ in one of
//! those three numbers and equality can bail out before comparing the
//! components themselves.
//!
//! Keys for query results always use the component order produced by
//! [`CacheKey::for_statement`]: statement id, offset, limit, SQL text, each
//! input parameter value, and finally the environment id when one is
//! configured.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use sqlmapper_core::{RowBounds, Value};

const DEFAULT_MULTIPLIER: i32 = 37;
const DEFAULT_HASHCODE: i32 = 17;

/// Identity of one query execution inside a session.
#[derive(Debug, Clone)]
pub struct CacheKey {
    multiplier: i32,
    hashcode: i32,
    checksum: i64,
    count: usize,
    components: Vec<Value>,
}

impl CacheKey {
    /// An empty key.
    pub fn new() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            hashcode: DEFAULT_HASHCODE,
            checksum: 0,
            count: 0,
            components: Vec::new(),
        }
    }

    /// Build the key for one execution of a statement.
    pub fn for_statement<I>(
        statement_id: &str,
        bounds: RowBounds,
        sql: &str,
        parameter_values: I,
        environment_id: Option<&str>,
    ) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut key = Self::new();
        key.update(statement_id);
        key.update(bounds.offset);
        key.update(bounds.limit);
        key.update(sql);
        key.update_all(parameter_values);
        if let Some(id) = environment_id {
            key.update(id);
        }
        key
    }

    /// Append one component.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, component: impl Into<Value>) {
        let component = component.into();
        let base = component_hash(&component);

        self.count += 1;
        self.checksum = self.checksum.wrapping_add(i64::from(base));
        let base = base.wrapping_mul(self.count as i32);
        self.hashcode = self.multiplier.wrapping_mul(self.hashcode).wrapping_add(base);

        self.components.push(component);
    }

    /// Append every component of `components`, in order.
    pub fn update_all<I, V>(&mut self, components: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        for component in components {
            self.update(component);
        }
    }

    /// Number of components fed so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn components(&self) -> &[Value] {
        &self.components
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn component_hash(component: &Value) -> i32 {
    if component.is_null() {
        return 1;
    }
    let mut hasher = DefaultHasher::new();
    component.hash_into(&mut hasher);
    let h = hasher.finish();
    (h ^ (h >> 32)) as i32
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a.identical(b))
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hashcode);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for component in &self.components {
            write!(f, ":{component}")?;
        }
        Ok(())
    }
}
