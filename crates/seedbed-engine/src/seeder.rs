use rand::seq::{SliceRandom, index};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{debug, warn};

use seedbed_core::record::is_system_field;
use seedbed_core::{CollectionDefinition, Record};

use crate::engine::EngineShared;
use crate::errors::Result;
use crate::model::SeedIssue;
use crate::synth::{SynthesisContext, hash_seed};

/// Parent key values eligible as foreign keys for one relation.
#[derive(Debug, Clone, PartialEq)]
pub struct FkValuePool {
    values: Vec<Value>,
}

impl FkValuePool {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Foreign key values for `count` child records.
    ///
    /// With at least as many children as parents, values are handed out
    /// round-robin so every parent is referenced. With fewer children, the
    /// draws are a uniform random subset without repetition.
    pub fn assign<R: Rng + ?Sized>(&self, count: usize, shuffle: bool, rng: &mut R) -> Vec<Value> {
        let pool_len = self.values.len();
        if pool_len == 0 {
            return vec![Value::Null; count];
        }

        if count >= pool_len {
            let mut order = self.values.clone();
            if shuffle {
                order.shuffle(rng);
            }
            return (0..count).map(|i| order[i % pool_len].clone()).collect();
        }

        index::sample(rng, pool_len, count)
            .into_iter()
            .map(|i| self.values[i].clone())
            .collect()
    }
}

/// Records synthesized for a collection plus any integrity issues.
#[derive(Debug, Clone)]
pub struct SeededRecords {
    pub records: Vec<Record>,
    pub issues: Vec<SeedIssue>,
}

/// Seeds a collection after its belongsTo parents, drawing FKs from them.
pub(crate) struct ReferentialSeeder<'a> {
    shared: &'a EngineShared,
}

impl<'a> ReferentialSeeder<'a> {
    pub(crate) fn new(shared: &'a EngineShared) -> Self {
        Self { shared }
    }

    pub async fn seed(&self, definition: &CollectionDefinition) -> Result<SeededRecords> {
        let name = definition.name.as_str();
        let options = &self.shared.options;
        let registry = &self.shared.registry;
        let count = definition.seed_count.unwrap_or(options.default_seed_count) as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(options.rng_seed, &format!("fk:{name}")));
        let mut issues = Vec::new();

        let relations: Vec<_> = definition.belongs_to().collect();
        if !relations.is_empty() {
            let ancestors = registry.ancestors_in_order(name)?;
            debug!(collection = %name, order = ?ancestors, "seeding parents first");
            for ancestor in &ancestors {
                if let Some(store) = registry.get(ancestor) {
                    store.initialize(self.shared).await?;
                }
            }
        }

        let mut assignments: Vec<(String, Vec<Value>)> = Vec::new();
        for (relation_name, relation) in relations {
            let Some(parent) = registry.get(&relation.target) else {
                warn!(
                    collection = %name,
                    relation = %relation_name,
                    target = %relation.target,
                    "parent collection is not registered; foreign keys are unconstrained"
                );
                issues.push(SeedIssue {
                    code: "missing_parent".to_string(),
                    relation: relation_name.to_string(),
                    message: format!("collection '{}' is not registered", relation.target),
                });
                continue;
            };

            parent.initialize(self.shared).await?;
            let pool = FkValuePool::new(parent.column_values(&relation.referenced_field));
            if pool.is_empty() {
                warn!(
                    collection = %name,
                    relation = %relation_name,
                    target = %relation.target,
                    "parent collection has no rows; foreign keys are unconstrained"
                );
                issues.push(SeedIssue {
                    code: "empty_parent".to_string(),
                    relation: relation_name.to_string(),
                    message: format!("collection '{}' has no rows", relation.target),
                });
                continue;
            }

            debug!(
                collection = %name,
                relation = %relation_name,
                parents = pool.len(),
                children = count,
                "fk pool built"
            );
            let values = pool.assign(count, options.shuffle_fk_pool, &mut rng);
            assignments.push((relation.foreign_key.clone(), values));
        }

        let mut records = Vec::with_capacity(count);
        for row in 0..count {
            let mut record = Record::new();
            for (field, descriptor) in &definition.schema {
                if is_system_field(field) || assignments.iter().any(|(fk, _)| fk == field) {
                    continue;
                }
                let ctx = SynthesisContext {
                    collection: name,
                    field_path: field,
                    seed_hint: definition.seed_hint.as_deref(),
                    index: row as u64,
                };
                let value = self.shared.synthesizer.synthesize(descriptor, &ctx).await?;
                record.insert(field.clone(), value);
            }

            for (_, relation) in definition.belongs_to() {
                if !record.contains(&relation.foreign_key) {
                    record.insert(relation.foreign_key.clone(), Value::Null);
                }
            }
            for (field, values) in &assignments {
                record.insert(field.clone(), values[row].clone());
            }
            records.push(record);
        }

        Ok(SeededRecords { records, issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn pool(size: u64) -> FkValuePool {
        FkValuePool::new((1..=size).map(Value::from).collect())
    }

    #[test]
    fn round_robin_covers_every_parent() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for shuffle in [false, true] {
            let values = pool(3).assign(30, shuffle, &mut rng);
            assert_eq!(values.len(), 30);
            let distinct: BTreeSet<u64> = values.iter().filter_map(Value::as_u64).collect();
            assert_eq!(distinct, BTreeSet::from([1, 2, 3]));
        }
    }

    #[test]
    fn fewer_children_draw_distinct_parents() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let values = pool(10).assign(4, true, &mut rng);
        let distinct: BTreeSet<u64> = values.iter().filter_map(Value::as_u64).collect();
        assert_eq!(distinct.len(), 4);
        assert!(distinct.iter().all(|id| (1..=10).contains(id)));
    }

    #[test]
    fn empty_pool_yields_nulls() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let values = FkValuePool::new(Vec::new()).assign(2, true, &mut rng);
        assert_eq!(values, vec![Value::Null, Value::Null]);
    }
}
