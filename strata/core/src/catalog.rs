//! The catalog and connector registry (§4.2, §6.2): maps a dataset reference
//! to a registered connector by exact match, then longest dotted prefix,
//! then a default fallback, and always carries the built-in `$planets`
//! virtual dataset. Grounded on
//! `examples/apache-arrow-datafusion/datafusion/core/src/catalog/catalog.rs`'s
//! `MemoryCatalogList` for the read-mostly locking shape (`parking_lot`, a
//! write lock for registration and a read lock for every query-time lookup,
//! §5's "connector registry and catalog... register_store uses a write
//! lock, query-time lookups take a read lock").

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use parking_lot::RwLock;
use strata_common::{Batch, Field, LogicalType, Result, Schema, StrataError};
use strata_connectors::{Connector, ConnectorLookup, ConnectorRegistry, MemoryConnector, SharedConnector};

const PLANETS_KEY: &str = "$planets";

struct Registration {
    connector_key: String,
    remove_prefix: bool,
}

struct Inner {
    registry: ConnectorRegistry,
    registrations: HashMap<String, Registration>,
}

/// The catalog a `Session` holds for its lifetime. Connector instances are
/// reused across queries (§5); registration is rare and query-time lookup is
/// frequent, hence the read-mostly lock rather than a plain `Mutex`.
pub struct Catalog {
    inner: RwLock<Inner>,
}

/// A resolved dataset: the connector to scan, the key it was found under
/// (used by the physical planner's own `ConnectorLookup` to look it back
/// up), and the remainder of the name after any stripped prefix.
pub struct Resolved {
    pub connector: SharedConnector,
    pub connector_key: String,
    pub inner_name: String,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        let mut registry = ConnectorRegistry::new();
        let mut registrations = HashMap::new();
        registry.register(PLANETS_KEY, planets_connector());
        registrations.insert(
            PLANETS_KEY.to_string(),
            Registration { connector_key: PLANETS_KEY.to_string(), remove_prefix: false },
        );
        Self { inner: RwLock::new(Inner { registry, registrations }) }
    }

    /// `register_store(prefix, connector, remove_prefix)` (§6.2). The caller
    /// builds the connector (what the spec calls a "connector factory") up
    /// front rather than handing the catalog a factory closure: every
    /// built-in connector here is already bound to one dataset or one
    /// prefix root, so there is nothing left for the catalog to construct
    /// lazily.
    pub fn register_store(&self, prefix: impl Into<String>, connector: Arc<dyn Connector>, remove_prefix: bool) {
        let prefix = prefix.into();
        let mut inner = self.inner.write();
        inner.registry.register(prefix.clone(), connector);
        inner.registrations.insert(prefix.clone(), Registration { connector_key: prefix, remove_prefix });
    }

    /// `register_arrow(name, table)` (§6.2): an in-memory dataset from
    /// already-materialized batches.
    pub fn register_arrow(&self, name: impl Into<String>, schema: Schema, batches: Vec<Batch>) {
        let connector: Arc<dyn Connector> = Arc::new(MemoryConnector::new(schema, batches));
        self.register_store(name, connector, false);
    }

    /// `register_df(name, frame)` (§6.2): alias for `register_arrow` — any
    /// source convertible to Arrow batches lands here the same way once
    /// converted by the caller.
    pub fn register_df(&self, name: impl Into<String>, schema: Schema, batches: Vec<Batch>) {
        self.register_arrow(name, schema, batches);
    }

    pub fn remove(&self, prefix: &str) {
        self.inner.write().registrations.remove(prefix);
    }

    /// Resolves `a.b.c` by exact match, then longest dotted prefix, then the
    /// default fallback registered under the empty prefix (a local-disk
    /// blob connector, if one was registered). Unmatched references raise
    /// `DatasetNotFound` (§4.2).
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        let inner = self.inner.read();
        if let Some(reg) = inner.registrations.get(name) {
            return Self::resolved(&inner, reg, name, name);
        }
        let parts: Vec<&str> = name.split('.').collect();
        for split in (1..parts.len()).rev() {
            let candidate = parts[..split].join(".");
            if let Some(reg) = inner.registrations.get(&candidate) {
                let remainder = parts[split..].join(".");
                return Self::resolved(&inner, reg, name, &remainder);
            }
        }
        if let Some(reg) = inner.registrations.get("") {
            return Self::resolved(&inner, reg, name, name);
        }
        Err(StrataError::DatasetNotFound(name.to_string()))
    }

    fn resolved(inner: &Inner, reg: &Registration, full_name: &str, remainder: &str) -> Result<Resolved> {
        let connector = inner.registry.lookup(&reg.connector_key)?;
        let inner_name = if reg.remove_prefix { remainder.to_string() } else { full_name.to_string() };
        Ok(Resolved { connector, connector_key: reg.connector_key.clone(), inner_name })
    }

    /// `list_datasets(prefix)` (§4.2), used by `SHOW`.
    pub fn list_datasets(&self, prefix: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner.registrations.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        names.sort();
        names
    }
}

impl ConnectorLookup for Catalog {
    fn lookup(&self, key: &str) -> Result<SharedConnector> {
        self.inner.read().registry.lookup(key)
    }
}

/// The built-in `$planets` dataset (§4.2's worked example): the nine
/// classical solar-system planets with their well-known physical and
/// orbital properties, matching the scenario in §8.4 ("1 row, 20 columns,
/// row `{id:3, name:"Earth", …}`").
fn planets_connector() -> Arc<dyn Connector> {
    let schema = Schema::new(vec![
        Field::new("id", LogicalType::Int64, false),
        Field::new("name", LogicalType::Varchar, false),
        Field::new("mass", LogicalType::Double, false),
        Field::new("diameter", LogicalType::Double, false),
        Field::new("density", LogicalType::Double, false),
        Field::new("gravity", LogicalType::Double, false),
        Field::new("escapeVelocity", LogicalType::Double, false),
        Field::new("rotationPeriod", LogicalType::Double, false),
        Field::new("lengthOfDay", LogicalType::Double, false),
        Field::new("distanceFromSun", LogicalType::Double, false),
        Field::new("perihelion", LogicalType::Double, false),
        Field::new("aphelion", LogicalType::Double, false),
        Field::new("orbitalPeriod", LogicalType::Double, false),
        Field::new("orbitalVelocity", LogicalType::Double, false),
        Field::new("orbitalInclination", LogicalType::Double, false),
        Field::new("orbitalEccentricity", LogicalType::Double, false),
        Field::new("obliquityToOrbit", LogicalType::Double, false),
        Field::new("meanTemperature", LogicalType::Double, false),
        Field::new("surfacePressure", LogicalType::Double, false),
        Field::new("numberOfMoons", LogicalType::Int64, false),
    ]);

    // (name, mass 10^24 kg, diameter km, density kg/m3, gravity m/s2, escape velocity km/s,
    //  rotation period hours, length of day hours, distance from sun 10^6 km, perihelion 10^6 km,
    //  aphelion 10^6 km, orbital period days, orbital velocity km/s, orbital inclination deg,
    //  orbital eccentricity, obliquity to orbit deg, mean temperature C, surface pressure bars, moons)
    const ROWS: [(&str, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, f64, i64); 9] = [
        ("Mercury", 0.330, 4879.0, 5427.0, 3.7, 4.3, 1407.6, 4222.6, 57.9, 46.0, 69.8, 88.0, 47.4, 7.0, 0.205, 0.034, 167.0, 0.0, 0),
        ("Venus", 4.87, 12104.0, 5243.0, 8.9, 10.4, -5832.5, 2802.0, 108.2, 107.5, 108.9, 224.7, 35.0, 3.4, 0.007, 177.4, 464.0, 92.0, 0),
        ("Earth", 5.97, 12756.0, 5514.0, 9.8, 11.2, 23.9, 24.0, 149.6, 147.1, 152.1, 365.2, 29.8, 0.0, 0.017, 23.4, 15.0, 1.0, 1),
        ("Mars", 0.642, 6792.0, 3933.0, 3.7, 5.0, 24.6, 24.7, 227.9, 206.6, 249.2, 687.0, 24.1, 1.9, 0.094, 25.2, -65.0, 0.01, 2),
        ("Jupiter", 1898.0, 142984.0, 1326.0, 23.1, 59.5, 9.9, 9.9, 778.6, 740.5, 816.6, 4331.0, 13.1, 1.3, 0.049, 3.1, -110.0, 0.0, 95),
        ("Saturn", 568.0, 120536.0, 687.0, 9.0, 35.5, 10.7, 10.7, 1433.5, 1352.6, 1514.5, 10747.0, 9.7, 2.5, 0.052, 26.7, -140.0, 0.0, 146),
        ("Uranus", 86.8, 51118.0, 1271.0, 8.7, 21.3, -17.2, 17.2, 2872.5, 2741.3, 3003.6, 30589.0, 6.8, 0.8, 0.047, 97.8, -195.0, 0.0, 27),
        ("Neptune", 102.0, 49528.0, 1638.0, 11.0, 23.5, 16.1, 16.1, 4495.1, 4444.5, 4545.7, 59800.0, 5.4, 1.8, 0.010, 28.3, -200.0, 0.0, 14),
        ("Pluto", 0.0130, 2376.0, 1850.0, 0.7, 1.3, -153.3, 153.3, 5906.4, 4436.8, 7375.9, 90560.0, 4.7, 17.2, 0.244, 122.5, -225.0, 0.00001, 5),
    ];

    let id: Vec<i64> = (1..=9).collect();
    let name: Vec<&str> = ROWS.iter().map(|r| r.0).collect();
    let cols: Vec<arrow::array::ArrayRef> = vec![
        Arc::new(Int64Array::from(id)),
        Arc::new(StringArray::from(name)),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.1).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.2).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.3).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.4).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.5).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.6).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.7).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.8).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.9).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.10).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.11).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.12).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.13).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.14).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.15).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.16).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(ROWS.iter().map(|r| r.17).collect::<Vec<_>>())),
        Arc::new(Int64Array::from(ROWS.iter().map(|r| r.18).collect::<Vec<_>>())),
    ];

    let arrow_schema = Arc::new(schema.to_arrow());
    let record_batch = arrow::record_batch::RecordBatch::try_new(arrow_schema, cols).expect("planets batch is well-formed");
    let batch = Batch::new(Arc::new(schema.clone()), record_batch);
    Arc::new(MemoryConnector::new(schema, vec![batch]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planets_resolves_by_exact_match() {
        let catalog = Catalog::new();
        let resolved = catalog.resolve("$planets").unwrap();
        assert_eq!(resolved.connector_key, "$planets");
        assert_eq!(resolved.connector.get_schema().unwrap().len(), 20);
    }

    #[test]
    fn longest_dotted_prefix_wins_over_a_shorter_one() {
        let catalog = Catalog::new();
        catalog.register_arrow("a", Schema::new(vec![Field::new("x", LogicalType::Int64, false)]), vec![]);
        catalog.register_arrow("a.b", Schema::new(vec![Field::new("y", LogicalType::Int64, false)]), vec![]);
        let resolved = catalog.resolve("a.b.c").unwrap();
        assert_eq!(resolved.connector_key, "a.b");
        assert_eq!(resolved.inner_name, "a.b.c");
    }

    #[test]
    fn remove_prefix_strips_the_matched_prefix_from_inner_name() {
        let catalog = Catalog::new();
        catalog.register_store(
            "s3",
            Arc::new(MemoryConnector::new(Schema::new(vec![]), vec![])),
            true,
        );
        let resolved = catalog.resolve("s3.bucket.key").unwrap();
        assert_eq!(resolved.inner_name, "bucket.key");
    }

    #[test]
    fn unknown_dataset_is_not_found() {
        let catalog = Catalog::new();
        assert!(matches!(catalog.resolve("does.not.exist"), Err(StrataError::DatasetNotFound(_))));
    }

    #[test]
    fn list_datasets_filters_by_prefix() {
        let catalog = Catalog::new();
        catalog.register_arrow("sales.orders", Schema::new(vec![]), vec![]);
        catalog.register_arrow("sales.returns", Schema::new(vec![]), vec![]);
        let names = catalog.list_datasets("sales.");
        assert_eq!(names, vec!["sales.orders".to_string(), "sales.returns".to_string()]);
    }
}
