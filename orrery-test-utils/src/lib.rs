//! Orrery Test Utilities
//!
//! Shared test infrastructure for the orrery workspace:
//! - The solar-system schema fixture and record fixtures
//! - Proptest generators for identities and schema-valid operations
//! - Invariant checks and custom assertions
//! - Tracing initialisation for tests

pub use orrery_cache::{MemoryCache, SyncRecordCache, TransformBuffer};
pub use orrery_core::{
    AttributeKind, CacheSettings, CacheSnapshot, InboundEdgePolicy, ModelDefinition, OrreryError,
    OrreryResult, Record, RecordChangeset, RecordIdentity, RecordOperation, RecordRelationship,
    RelationshipDefinition, Schema, TransformBuilder,
};

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG` (default `warn`).
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Schema and record fixtures.

    use super::*;

    /// Schema for a small astronomy domain.
    ///
    /// ```text
    /// solarSystem.stars  <-> star.solarSystem
    /// star.planets       <-> planet.star
    /// planet.moons       <-> moon.planet
    /// planet.neighbors   (one-way)
    /// ```
    pub fn solar_system_schema() -> Schema {
        Schema::new()
            .model(
                "solarSystem",
                ModelDefinition::new()
                    .attribute("name", AttributeKind::String)
                    .relationship(
                        "stars",
                        RelationshipDefinition::has_many("star").with_inverse("solarSystem"),
                    ),
            )
            .model(
                "star",
                ModelDefinition::new()
                    .attribute("name", AttributeKind::String)
                    .attribute("mass", AttributeKind::Number)
                    .key("remoteId")
                    .relationship(
                        "planets",
                        RelationshipDefinition::has_many("planet").with_inverse("star"),
                    )
                    .relationship(
                        "solarSystem",
                        RelationshipDefinition::has_one("solarSystem").with_inverse("stars"),
                    ),
            )
            .model(
                "planet",
                ModelDefinition::new()
                    .attribute("name", AttributeKind::String)
                    .attribute("classification", AttributeKind::String)
                    .attribute("order", AttributeKind::Number)
                    .attribute("atmosphere", AttributeKind::Boolean)
                    .key("remoteId")
                    .relationship(
                        "star",
                        RelationshipDefinition::has_one("star").with_inverse("planets"),
                    )
                    .relationship(
                        "moons",
                        RelationshipDefinition::has_many("moon").with_inverse("planet"),
                    )
                    .relationship("neighbors", RelationshipDefinition::has_many("planet")),
            )
            .model(
                "moon",
                ModelDefinition::new()
                    .attribute("name", AttributeKind::String)
                    .relationship(
                        "planet",
                        RelationshipDefinition::has_one("planet").with_inverse("moons"),
                    ),
            )
    }

    pub fn schema() -> Arc<Schema> {
        Arc::new(solar_system_schema())
    }

    pub fn memory_cache() -> MemoryCache {
        MemoryCache::new(schema())
    }

    pub fn memory_cache_with(settings: CacheSettings) -> MemoryCache {
        MemoryCache::with_settings(schema(), settings)
    }

    pub fn planet(id: &str) -> RecordIdentity {
        RecordIdentity::new("planet", id)
    }

    pub fn star(id: &str) -> RecordIdentity {
        RecordIdentity::new("star", id)
    }

    pub fn moon(id: &str) -> RecordIdentity {
        RecordIdentity::new("moon", id)
    }

    pub fn jupiter() -> Record {
        Record::new("planet", "jupiter")
            .with_attribute("name", "Jupiter")
            .with_attribute("classification", "gas giant")
            .with_attribute("order", 5)
    }

    pub fn earth() -> Record {
        Record::new("planet", "earth")
            .with_attribute("name", "Earth")
            .with_attribute("classification", "terrestrial")
            .with_attribute("order", 3)
            .with_attribute("atmosphere", true)
    }

    pub fn sol() -> Record {
        Record::new("star", "sol")
            .with_attribute("name", "Sol")
            .with_key("remoteId", "s-1")
    }

    /// Sol with earth and jupiter, earth with the moon.
    pub fn populated_cache() -> MemoryCache {
        let t = TransformBuilder;
        let mut cache = memory_cache();
        cache
            .patch(&[
                t.add_record(sol()),
                t.add_record(earth().with_has_one("star", Some(star("sol")))),
                t.add_record(jupiter().with_has_one("star", Some(star("sol")))),
                t.add_record(
                    Record::new("moon", "luna")
                        .with_attribute("name", "Luna")
                        .with_has_one("planet", Some(planet("earth"))),
                ),
            ])
            .expect("fixture operations are valid");
        cache
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies producing operations that always pass validation
    //! against [`fixtures::solar_system_schema`](super::fixtures::solar_system_schema).
    //!
    //! Ids come from small pools so generated operations collide often.

    use super::*;
    use proptest::prelude::*;
    use serde_json::Value;

    pub fn arb_planet() -> impl Strategy<Value = RecordIdentity> {
        prop::sample::select(vec!["mercury", "venus", "earth", "mars"])
            .prop_map(|id| RecordIdentity::new("planet", id))
    }

    pub fn arb_star() -> impl Strategy<Value = RecordIdentity> {
        prop::sample::select(vec!["sol", "alpha"]).prop_map(|id| RecordIdentity::new("star", id))
    }

    pub fn arb_moon() -> impl Strategy<Value = RecordIdentity> {
        prop::sample::select(vec!["luna", "phobos", "deimos"])
            .prop_map(|id| RecordIdentity::new("moon", id))
    }

    pub fn arb_any_identity() -> impl Strategy<Value = RecordIdentity> {
        prop_oneof![arb_planet(), arb_star(), arb_moon()]
    }

    /// A planet name, or `null` to unset it.
    pub fn arb_name() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            "[A-Z][a-z]{2,6}".prop_map(Value::from),
        ]
    }

    pub fn arb_order() -> impl Strategy<Value = Value> {
        prop_oneof![Just(Value::Null), (1u32..10).prop_map(Value::from)]
    }

    pub fn arb_planet_record() -> impl Strategy<Value = Record> {
        (
            arb_planet(),
            arb_name(),
            arb_order(),
            prop::option::of(arb_star()),
            prop::collection::vec(arb_moon(), 0..3),
            prop::collection::vec(arb_planet(), 0..2),
        )
            .prop_map(|(identity, name, order, star, moons, neighbors)| {
                Record::from_identity(identity)
                    .with_attribute("name", name)
                    .with_attribute("order", order)
                    .with_has_one("star", star)
                    .with_has_many("moons", moons)
                    .with_has_many("neighbors", neighbors)
            })
    }

    pub fn arb_star_record() -> impl Strategy<Value = Record> {
        (
            arb_star(),
            arb_name(),
            prop::collection::vec(arb_planet(), 0..3),
        )
            .prop_map(|(identity, name, planets)| {
                Record::from_identity(identity)
                    .with_attribute("name", name)
                    .with_has_many("planets", planets)
            })
    }

    /// Record-level operations: add, update, remove, attributes and keys.
    pub fn arb_record_operation() -> impl Strategy<Value = RecordOperation> {
        let t = TransformBuilder;
        prop_oneof![
            arb_planet_record().prop_map(move |record| t.add_record(record)),
            arb_star_record().prop_map(move |record| t.add_record(record)),
            arb_planet_record().prop_map(move |record| t.update_record(record)),
            arb_any_identity().prop_map(move |identity| t.remove_record(identity)),
            (arb_planet(), arb_name())
                .prop_map(move |(planet, name)| t.replace_attribute(planet, "name", name)),
            (arb_planet(), prop::option::of("p-[0-9]"))
                .prop_map(move |(planet, key)| t.replace_key(planet, "remoteId", key)),
        ]
    }

    /// Relationship operations over every relationship of the schema.
    pub fn arb_relationship_operation() -> impl Strategy<Value = RecordOperation> {
        let t = TransformBuilder;
        prop_oneof![
            (arb_planet(), prop::option::of(arb_star()))
                .prop_map(move |(planet, star)| t.replace_related_record(planet, "star", star)),
            (arb_moon(), prop::option::of(arb_planet()))
                .prop_map(move |(moon, planet)| t.replace_related_record(moon, "planet", planet)),
            (arb_star(), prop::collection::vec(arb_planet(), 0..4)).prop_map(
                move |(star, planets)| t.replace_related_records(star, "planets", planets)
            ),
            (arb_star(), arb_planet())
                .prop_map(move |(star, planet)| t.add_to_related_records(star, "planets", planet)),
            (arb_planet(), arb_moon())
                .prop_map(move |(planet, moon)| t.add_to_related_records(planet, "moons", moon)),
            (arb_planet(), arb_planet()).prop_map(move |(planet, other)| {
                t.add_to_related_records(planet, "neighbors", other)
            }),
            (arb_star(), arb_planet()).prop_map(move |(star, planet)| {
                t.remove_from_related_records(star, "planets", planet)
            }),
            (arb_planet(), arb_moon()).prop_map(move |(planet, moon)| {
                t.remove_from_related_records(planet, "moons", moon)
            }),
        ]
    }

    /// Any schema-valid operation.
    pub fn arb_operation() -> impl Strategy<Value = RecordOperation> {
        prop_oneof![arb_record_operation(), arb_relationship_operation()]
    }

    pub fn arb_operations(max: usize) -> impl Strategy<Value = Vec<RecordOperation>> {
        prop::collection::vec(arb_operation(), 0..max)
    }
}

// ============================================================================
// INVARIANT CHECKS
// ============================================================================

pub mod invariants {
    //! Whole-cache consistency checks used by property tests.

    use super::*;

    /// Every stored relationship member must have its edge in the inverse
    /// index, and every materialized inverse must mirror it.
    pub fn check_consistency<C: SyncRecordCache>(cache: &C, records: &[Record]) -> Result<(), String> {
        let schema = cache.schema();
        for record in records {
            for edge in record.outbound_edges() {
                if !cache
                    .get_inverse_relationships(&edge.related_record)
                    .contains(&edge)
                {
                    return Err(format!(
                        "edge {} -{}-> {} is not indexed",
                        edge.record, edge.relationship, edge.related_record
                    ));
                }
                let Some(inverse) = schema.materialized_inverse(
                    &edge.record.record_type,
                    &edge.relationship,
                    &edge.related_record.record_type,
                ) else {
                    continue;
                };
                let mirrored = cache
                    .get_record(&edge.related_record)
                    .and_then(|related| related.relationship(inverse))
                    .is_some_and(|data| data.contains(&edge.record));
                if !mirrored {
                    return Err(format!(
                        "{} -{}-> {} has no mirror on {}",
                        edge.record, edge.relationship, edge.related_record, inverse
                    ));
                }
            }
        }
        Ok(())
    }

    /// Every indexed edge must be backed by a stored relationship member.
    pub fn check_index_backed<C: SyncRecordCache>(
        cache: &C,
        edges: &[RecordRelationship],
    ) -> Result<(), String> {
        for edge in edges {
            let backed = cache
                .get_record(&edge.record)
                .and_then(|record| record.relationship(&edge.relationship))
                .is_some_and(|data| data.contains(&edge.related_record));
            if !backed {
                return Err(format!(
                    "indexed edge {} -{}-> {} has no stored member",
                    edge.record, edge.relationship, edge.related_record
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for orrery-specific results.

    use super::*;

    /// Assert that a result is a `RecordNotFound` for `identity`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &OrreryResult<T>, identity: &RecordIdentity) {
        match result {
            Err(OrreryError::RecordNotFound { identity: missing }) => {
                assert_eq!(missing, identity, "Wrong identity in RecordNotFound error");
            }
            other => panic!("Expected RecordNotFound for {}, got: {:?}", identity, other),
        }
    }

    /// Assert that a result is a validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &OrreryResult<T>) {
        match result {
            Err(OrreryError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert two snapshots hold the same records and edges.
    #[track_caller]
    pub fn assert_same_state(actual: &CacheSnapshot, expected: &CacheSnapshot) {
        assert_eq!(actual.records, expected.records, "records differ");
        assert_eq!(
            actual.inverse_relationships, expected.inverse_relationships,
            "inverse relationships differ"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_solar_system_schema_is_valid() {
        assert!(fixtures::solar_system_schema().validate().is_ok());
    }

    #[test]
    fn test_populated_cache_fixture() {
        let cache = fixtures::populated_cache();
        let sol = cache.get_record(&fixtures::star("sol")).unwrap();
        assert_eq!(sol.has_many("planets").len(), 2);
        let earth = cache.get_record(&fixtures::planet("earth")).unwrap();
        assert_eq!(earth.has_many("moons"), &[fixtures::moon("luna")]);

        let snapshot = cache.snapshot();
        assert!(invariants::check_consistency(&cache, &snapshot.records).is_ok());
        assert!(invariants::check_index_backed(&cache, &snapshot.inverse_relationships).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Generated operations always pass validation.
        #[test]
        fn prop_generated_operations_are_valid(operation in generators::arb_operation()) {
            let cache = fixtures::memory_cache();
            prop_assert!(orrery_cache::validate_operation(
                cache.schema(),
                cache.settings(),
                &operation
            )
            .is_ok());
        }
    }
}
