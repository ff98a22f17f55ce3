use crate::rules::FieldRule;

/// Execution order for the field rules of one record type.
///
/// Weighted rules run first, ascending by weight; unweighted rules follow in
/// declaration order. Equal weights keep declaration order.
pub fn order_rules(rules: &[FieldRule]) -> Vec<&FieldRule> {
    order_indices(rules)
        .into_iter()
        .map(|idx| &rules[idx])
        .collect()
}

/// Same ordering as [`order_rules`], expressed as positions into `rules`.
pub fn order_indices(rules: &[FieldRule]) -> Vec<usize> {
    let mut indices = (0..rules.len()).collect::<Vec<_>>();
    indices.sort_by_key(|&idx| match rules[idx].weight {
        Some(weight) => (0u8, weight),
        None => (1u8, 0),
    });
    indices
}
