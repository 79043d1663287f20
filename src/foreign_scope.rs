//! ForeignScope: keeps multi-column FK tuples mutually consistent within
//! one synthesized row by narrowing candidate parent tuples monotonically
//! as FK columns are chosen.

use indexmap::IndexMap;

use crate::db::Value;
use crate::faker::Faker;
use std::collections::HashMap;

/// Map from unique-index name to candidate parent tuples (child-column
/// keyed). Created fresh per synthesized row.
#[derive(Default)]
pub struct ForeignScope {
    rows_set: IndexMap<String, Vec<HashMap<String, Value>>>,
}

impl ForeignScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, index_name: impl Into<String>, tuples: Vec<HashMap<String, Value>>) {
        self.rows_set.insert(index_name.into(), tuples);
    }

    /// Distinct values appearing at `column_name` across every bucket.
    pub fn column_values(&self, column_name: &str) -> Vec<Value> {
        let mut seen = Vec::new();
        for tuples in self.rows_set.values() {
            for tuple in tuples {
                if let Some(value) = tuple.get(column_name) {
                    if !seen.contains(value) {
                        seen.push(value.clone());
                    }
                }
            }
        }
        seen
    }

    /// Picks a uniformly random value at `column_name`, then drops every
    /// candidate tuple (in every bucket) whose value there differs.
    /// Monotone: scope only shrinks, and an already-empty bucket stays
    /// empty. Returns `None` when no candidate exists.
    pub fn random_scope(&mut self, faker: &dyn Faker, column_name: &str) -> Option<Value> {
        let candidates = self.column_values(column_name);
        if candidates.is_empty() {
            return None;
        }
        let index = faker.random_int(0, candidates.len() as i64 - 1) as usize;
        let chosen = candidates[index].clone();

        for tuples in self.rows_set.values_mut() {
            tuples.retain(|tuple| match tuple.get(column_name) {
                Some(value) => *value == chosen,
                None => true,
            });
        }

        Some(chosen)
    }
}
