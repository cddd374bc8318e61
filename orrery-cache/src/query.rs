//! Query evaluation against a record cache.

use crate::traits::SyncRecordCache;
use orrery_core::{
    compare_values, ComparisonOperator, FilterSpecifier, OrreryError, OrreryResult,
    PageSpecifier, QueryExpression, QueryResult, Record, RecordIdentity, RecordSelection,
    RelationshipKind, RequestOptions, SetComparisonOperator, SortOrder, SortSpecifier,
};
use std::cmp::Ordering;

/// Evaluate one expression. Read-only.
///
/// Misses resolve to absent (or are skipped in collections) unless strict
/// not-found is in effect, either from `options` or the cache settings.
pub fn evaluate<C: SyncRecordCache + ?Sized>(
    cache: &C,
    expression: &QueryExpression,
    options: &RequestOptions,
) -> OrreryResult<QueryResult> {
    let strict = options
        .raise_not_found
        .unwrap_or(cache.settings().raise_not_found);
    let schema = cache.schema();

    match expression {
        QueryExpression::FindRecord { record } => {
            schema.validate_identity(record)?;
            lookup(cache, record, strict).map(QueryResult::Record)
        }
        QueryExpression::FindRecords {
            records,
            filter,
            sort,
            page,
        } => {
            let found = match records {
                RecordSelection::OfType(record_type) => {
                    schema.get_model(record_type)?;
                    cache.get_records(records)
                }
                RecordSelection::Identities(identities) => {
                    let mut found = Vec::with_capacity(identities.len());
                    for identity in identities {
                        schema.validate_identity(identity)?;
                        found.extend(lookup(cache, identity, strict)?);
                    }
                    found
                }
            };
            Ok(QueryResult::Records(refine(found, filter, sort, page.as_ref())))
        }
        QueryExpression::FindRelatedRecord {
            record,
            relationship,
        } => {
            schema.validate_identity(record)?;
            schema.validate_relationship(
                &record.record_type,
                relationship,
                Some(RelationshipKind::HasOne),
                [],
            )?;
            let Some(primary) = lookup(cache, record, strict)? else {
                return Ok(QueryResult::Record(None));
            };
            match primary.has_one(relationship) {
                Some(related) => lookup(cache, related, strict).map(QueryResult::Record),
                None => Ok(QueryResult::Record(None)),
            }
        }
        QueryExpression::FindRelatedRecords {
            record,
            relationship,
            filter,
            sort,
            page,
        } => {
            schema.validate_identity(record)?;
            schema.validate_relationship(
                &record.record_type,
                relationship,
                Some(RelationshipKind::HasMany),
                [],
            )?;
            let Some(primary) = lookup(cache, record, strict)? else {
                return Ok(QueryResult::Records(Vec::new()));
            };
            let mut found = Vec::new();
            for related in primary.has_many(relationship) {
                found.extend(lookup(cache, related, strict)?);
            }
            Ok(QueryResult::Records(refine(found, filter, sort, page.as_ref())))
        }
    }
}

fn lookup<C: SyncRecordCache + ?Sized>(
    cache: &C,
    identity: &RecordIdentity,
    strict: bool,
) -> OrreryResult<Option<Record>> {
    match cache.get_record(identity) {
        Some(record) => Ok(Some(record.clone())),
        None if strict => Err(OrreryError::not_found(identity.clone())),
        None => Ok(None),
    }
}

/// Filter, then sort, then page.
pub fn refine(
    records: Vec<Record>,
    filter: &[FilterSpecifier],
    sort: &[SortSpecifier],
    page: Option<&PageSpecifier>,
) -> Vec<Record> {
    let mut records: Vec<Record> = records
        .into_iter()
        .filter(|record| filter.iter().all(|specifier| matches_filter(record, specifier)))
        .collect();

    if !sort.is_empty() {
        records.sort_by(|a, b| compare_records(a, b, sort));
    }

    match page {
        Some(page) => records
            .into_iter()
            .skip(page.offset)
            .take(page.limit.unwrap_or(usize::MAX))
            .collect(),
        None => records,
    }
}

fn matches_filter(record: &Record, specifier: &FilterSpecifier) -> bool {
    match specifier {
        FilterSpecifier::Attribute {
            attribute,
            op,
            value,
        } => {
            let Some(actual) = record.attribute(attribute) else {
                return false;
            };
            let Some(ordering) = compare_values(actual, value) else {
                return false;
            };
            match op {
                ComparisonOperator::Equal => ordering == Ordering::Equal,
                ComparisonOperator::Gt => ordering == Ordering::Greater,
                ComparisonOperator::Gte => ordering != Ordering::Less,
                ComparisonOperator::Lt => ordering == Ordering::Less,
                ComparisonOperator::Lte => ordering != Ordering::Greater,
            }
        }
        FilterSpecifier::RelatedRecord {
            relationship,
            op,
            records,
        }
        | FilterSpecifier::RelatedRecords {
            relationship,
            op,
            records,
        } => {
            let members: Vec<&RecordIdentity> = record
                .relationship(relationship)
                .map(|data| data.members().collect())
                .unwrap_or_default();
            match op {
                SetComparisonOperator::Equal => {
                    members.iter().all(|member| records.contains(*member))
                        && records.iter().all(|wanted| members.contains(&wanted))
                }
                SetComparisonOperator::All => records.iter().all(|wanted| members.contains(&wanted)),
                SetComparisonOperator::Some => records.iter().any(|wanted| members.contains(&wanted)),
                SetComparisonOperator::None if records.is_empty() => members.is_empty(),
                SetComparisonOperator::None => !records.iter().any(|wanted| members.contains(&wanted)),
            }
        }
    }
}

/// Multi-key comparison. Records missing a sort attribute go last whatever
/// the order; incomparable values tie.
fn compare_records(a: &Record, b: &Record, sort: &[SortSpecifier]) -> Ordering {
    for specifier in sort {
        let ordering = match (a.attribute(&specifier.attribute), b.attribute(&specifier.attribute)) {
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y).unwrap_or(Ordering::Equal);
                match specifier.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;
    use orrery_core::{
        AttributeKind, CacheSettings, ModelDefinition, Query, QueryBuilder, RelationshipDefinition,
        Schema, TransformBuilder, ValidationError,
    };
    use std::sync::Arc;

    fn cache(settings: CacheSettings) -> MemoryCache {
        let schema = Schema::new()
            .model(
                "star",
                ModelDefinition::new().relationship(
                    "planets",
                    RelationshipDefinition::has_many("planet").with_inverse("star"),
                ),
            )
            .model(
                "planet",
                ModelDefinition::new()
                    .attribute("name", AttributeKind::String)
                    .attribute("order", AttributeKind::Number)
                    .relationship(
                        "star",
                        RelationshipDefinition::has_one("star").with_inverse("planets"),
                    ),
            );
        let mut cache = MemoryCache::with_settings(Arc::new(schema), settings);
        let t = TransformBuilder;
        let sol = RecordIdentity::new("star", "sol");
        let planets = [("mercury", 1), ("venus", 2), ("earth", 3), ("mars", 4)];
        let mut operations = Vec::new();
        for (name, order) in planets {
            operations.push(t.add_record(
                Record::new("planet", name)
                    .with_attribute("name", name)
                    .with_attribute("order", order),
            ));
            operations.push(t.add_to_related_records(
                sol.clone(),
                "planets",
                RecordIdentity::new("planet", name),
            ));
        }
        operations.push(t.add_record(Record::new("planet", "pluto")));
        cache.patch(&operations).unwrap();
        cache
    }

    fn ids(result: &QueryResult) -> Vec<&str> {
        result.as_records().iter().map(Record::id).collect()
    }

    #[test]
    fn test_find_record_strict_and_tolerant() {
        let tolerant = cache(CacheSettings::default());
        let q = QueryBuilder;
        let vulcan = RecordIdentity::new("planet", "vulcan");

        let result = tolerant.query_expression(&q.find_record(vulcan.clone())).unwrap();
        assert_eq!(result, QueryResult::Record(None));

        let err = evaluate(&tolerant, &q.find_record(vulcan.clone()), &RequestOptions::strict())
            .unwrap_err();
        assert_eq!(err, OrreryError::not_found(vulcan.clone()));

        let strict = cache(CacheSettings::new().with_raise_not_found(true));
        let err = strict.query_expression(&q.find_record(vulcan.clone())).unwrap_err();
        assert_eq!(err, OrreryError::not_found(vulcan));
    }

    #[test]
    fn test_find_records_filter_sort_page() {
        let cache = cache(CacheSettings::default());
        let q = QueryBuilder;

        let expression = q
            .find_records("planet")
            .filter_attribute("order", ComparisonOperator::Gte, 2)
            .sort("order", SortOrder::Descending)
            .page(1, Some(2));
        let result = cache.query_expression(&expression).unwrap();
        assert_eq!(ids(&result), vec!["earth", "venus"]);
    }

    #[test]
    fn test_sort_puts_missing_values_last() {
        let cache = cache(CacheSettings::default());
        let q = QueryBuilder;

        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let result = cache
                .query_expression(&q.find_records("planet").sort("order", order))
                .unwrap();
            assert_eq!(ids(&result).last(), Some(&"pluto"));
        }
    }

    #[test]
    fn test_related_filters() {
        let cache = cache(CacheSettings::default());
        let q = QueryBuilder;
        let sol = RecordIdentity::new("star", "sol");

        let expression = q.find_records("planet").filter(FilterSpecifier::RelatedRecord {
            relationship: "star".to_string(),
            op: SetComparisonOperator::None,
            records: vec![],
        });
        assert_eq!(ids(&cache.query_expression(&expression).unwrap()), vec!["pluto"]);

        let expression = q.find_records("star").filter(FilterSpecifier::RelatedRecords {
            relationship: "planets".to_string(),
            op: SetComparisonOperator::All,
            records: vec![
                RecordIdentity::new("planet", "earth"),
                RecordIdentity::new("planet", "mars"),
            ],
        });
        assert_eq!(ids(&cache.query_expression(&expression).unwrap()), vec!["sol"]);

        let related = cache
            .query_expression(
                &q.find_related_records(sol, "planets")
                    .filter_attribute("name", ComparisonOperator::Equal, "earth"),
            )
            .unwrap();
        assert_eq!(ids(&related), vec!["earth"]);
    }

    #[test]
    fn test_find_related_record() {
        let cache = cache(CacheSettings::default());
        let q = QueryBuilder;

        let result = cache
            .query_expression(&q.find_related_record(RecordIdentity::new("planet", "earth"), "star"))
            .unwrap();
        assert_eq!(result.as_record().map(Record::id), Some("sol"));

        let err = cache
            .query_expression(&q.find_related_record(RecordIdentity::new("planet", "earth"), "moons"))
            .unwrap_err();
        assert!(matches!(
            err,
            OrreryError::Validation(ValidationError::UnknownRelationship { .. })
        ));
    }

    #[test]
    fn test_query_returns_one_result_per_expression() {
        let cache = cache(CacheSettings::default());
        let query = Query::new(vec![
            QueryBuilder.find_record(RecordIdentity::new("planet", "mars")),
            QueryBuilder.find_records_of(vec![
                RecordIdentity::new("planet", "venus"),
                RecordIdentity::new("planet", "vulcan"),
            ]),
        ]);
        let results = cache.query(&query).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_record().map(Record::id), Some("mars"));
        assert_eq!(ids(&results[1]), vec!["venus"]);
    }
}
