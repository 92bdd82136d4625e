//! Decides whether a listed metric belongs to a rule.

use super::provider::{Dimension, MetricDescriptor};
use super::rule::CompiledRule;

/// Whether `candidate` is selected by `rule`.
///
/// The candidate's dimension names must equal the rule's exactly, as a set. Among those, a value
/// matching a `DimensionsNoMatch` pattern rejects the candidate even when the corresponding
/// `DimensionsMatch` pattern would accept it.
#[must_use]
pub fn includes(rule: &CompiledRule, candidate: &MetricDescriptor) -> bool {
    if candidate.dimensions.len() != rule.dimensions().len() {
        return false;
    }

    for dim in &candidate.dimensions {
        if rule.no_match_pattern(&dim.name).is_some_and(|re| re.is_match(&dim.value)) {
            return false;
        }

        if rule.match_pattern(&dim.name).is_some_and(|re| !re.is_match(&dim.value)) {
            return false;
        }
    }

    let mut names: Vec<&str> = candidate.dimensions.iter().map(|d| d.name.as_str()).collect();
    names.sort_unstable();

    names.iter().zip(rule.dimensions()).all(|(name, expected)| name == expected)
}

/// The candidate's dimension values, ordered like the rule's sorted dimension names.
///
/// Only meaningful for candidates that [`includes`] accepted.
#[must_use]
pub fn label_values(rule: &CompiledRule, candidate: &MetricDescriptor) -> Vec<String> {
    rule.dimensions()
        .iter()
        .filter_map(|name| candidate.dimensions.iter().find(|d| &d.name == name))
        .map(|d| d.value.clone())
        .collect()
}

/// The candidate's dimensions sorted by name, the canonical order used for series identity.
pub(crate) fn sorted_dimensions(candidate: &MetricDescriptor) -> Vec<Dimension> {
    let mut dims = candidate.dimensions.clone();
    dims.sort();
    dims
}
