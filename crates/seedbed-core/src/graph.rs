use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::definition::CollectionDefinition;
use crate::error::{Error, Result};

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// belongsTo graph over registered collections: child -> parents.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    parents: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

impl DependencyGraph {
    /// Build the graph; targets that are not among `definitions` are left out.
    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a CollectionDefinition>,
    ) -> Self {
        let definitions: Vec<&CollectionDefinition> = definitions.into_iter().collect();
        let known: BTreeSet<&str> = definitions.iter().map(|def| def.name.as_str()).collect();

        let mut parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for definition in &definitions {
            let entry = parents.entry(definition.name.clone()).or_default();
            for (_, relation) in definition.belongs_to() {
                if known.contains(relation.target.as_str()) {
                    entry.insert(relation.target.clone());
                }
            }
        }

        Self { parents }
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            nodes: self.parents.len(),
            edges: self.parents.values().map(BTreeSet::len).sum(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name)
    }

    /// Direct belongsTo targets of `name`.
    pub fn parents_of(&self, name: &str) -> impl Iterator<Item = &str> {
        self.parents
            .get(name)
            .into_iter()
            .flat_map(|parents| parents.iter().map(String::as_str))
    }

    /// Every collection, each placed after all the collections it belongs to.
    pub fn seed_order(&self) -> Result<Vec<String>> {
        let mut marks = BTreeMap::new();
        let mut order = Vec::with_capacity(self.parents.len());
        for name in self.parents.keys() {
            self.visit(name, &mut marks, &mut Vec::new(), &mut order)?;
        }
        Ok(order)
    }

    /// Ancestors of `name` in seed order, excluding `name` itself.
    pub fn ancestors_in_order(&self, name: &str) -> Result<Vec<String>> {
        let mut marks = BTreeMap::new();
        let mut order = Vec::new();
        if self.contains(name) {
            self.visit(name, &mut marks, &mut Vec::new(), &mut order)?;
            order.pop();
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        marks: &mut BTreeMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Active) => {
                let start = stack.iter().position(|node| *node == name).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|node| node.to_string()).collect();
                path.push(name.to_string());
                return Err(Error::CyclicDependency {
                    collection: name.to_string(),
                    path,
                });
            }
            None => {}
        }

        marks.insert(name, Mark::Active);
        stack.push(name);
        for parent in self.parents_of(name) {
            self.visit(parent, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::RelationSpec;

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|item| item == name).unwrap()
    }

    #[test]
    fn seed_order_places_parents_first() {
        let definitions = vec![
            CollectionDefinition::new("reviews")
                .with_relation("order", RelationSpec::belongs_to("orders", "orderId"))
                .with_relation("author", RelationSpec::belongs_to("users", "authorId")),
            CollectionDefinition::new("orders")
                .with_relation("user", RelationSpec::belongs_to("users", "userId"))
                .with_relation("items", RelationSpec::has_many("lineItems", "orderId")),
            CollectionDefinition::new("users")
                .with_relation("orders", RelationSpec::has_many("orders", "userId")),
            CollectionDefinition::new("tags"),
        ];

        let graph = DependencyGraph::from_definitions(&definitions);
        let order = graph.seed_order().expect("acyclic");
        assert_eq!(order.len(), 4);
        assert!(position(&order, "users") < position(&order, "orders"));
        assert!(position(&order, "orders") < position(&order, "reviews"));
        assert_eq!(graph.summary(), GraphSummary { nodes: 4, edges: 3 });

        let ancestors = graph.ancestors_in_order("reviews").expect("acyclic");
        assert_eq!(ancestors, vec!["users".to_string(), "orders".to_string()]);
    }

    #[test]
    fn cycle_names_offending_collection() {
        let definitions = vec![
            CollectionDefinition::new("a").with_relation("b", RelationSpec::belongs_to("b", "bId")),
            CollectionDefinition::new("b").with_relation("a", RelationSpec::belongs_to("a", "aId")),
        ];

        let graph = DependencyGraph::from_definitions(&definitions);
        match graph.seed_order() {
            Err(Error::CyclicDependency { collection, path }) => {
                assert!(collection == "a" || collection == "b");
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(graph.ancestors_in_order("b").is_err());
    }

    #[test]
    fn unregistered_targets_are_ignored() {
        let definitions = vec![
            CollectionDefinition::new("orders")
                .with_relation("user", RelationSpec::belongs_to("users", "userId")),
        ];
        let graph = DependencyGraph::from_definitions(&definitions);
        assert_eq!(graph.seed_order().unwrap(), vec!["orders".to_string()]);
        assert!(graph.ancestors_in_order("orders").unwrap().is_empty());
    }
}
