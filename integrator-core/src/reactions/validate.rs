use std::collections::{BTreeMap, BTreeSet, HashSet};

use thiserror::Error;

use super::ReactionRule;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("rule #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("duplicate rule name: {0}")]
    DuplicateName(String),

    /// Following the derived event types leads back to an earlier trigger.
    #[error("reaction rules form a cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

pub(super) fn validate(rules: &[ReactionRule]) -> Result<(), RuleError> {
    let mut names = HashSet::new();
    for (index, rule) in rules.iter().enumerate() {
        for (field, value) in [
            ("name", &rule.name),
            ("trigger", &rule.trigger),
            ("derived event type", &rule.derived.event_type),
        ] {
            if value.trim().is_empty() {
                return Err(RuleError::EmptyField { index, field });
            }
        }
        if !names.insert(rule.name.as_str()) {
            return Err(RuleError::DuplicateName(rule.name.clone()));
        }
    }

    let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for rule in rules {
        edges
            .entry(rule.trigger.as_str())
            .or_default()
            .insert(rule.derived.event_type.as_str());
    }

    let mut done = HashSet::new();
    for start in edges.keys() {
        let mut path = Vec::new();
        if let Some(cycle) = find_cycle(*start, &edges, &mut path, &mut done) {
            return Err(RuleError::Cycle(cycle));
        }
    }
    Ok(())
}

/// Depth-first search. `path` holds the event types on the current branch.
fn find_cycle<'a>(
    node: &'a str,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if let Some(pos) = path.iter().position(|n| *n == node) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if done.contains(node) {
        return None;
    }

    path.push(node);
    if let Some(next) = edges.get(node) {
        for child in next {
            if let Some(cycle) = find_cycle(*child, edges, path, done) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    done.insert(node);
    None
}
