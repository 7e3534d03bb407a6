use proptest::prelude::*;

/// Strategy for generating subscription priorities, duplicates included
pub fn priorities_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-5i32..15, 1..24)
}

/// Strategy for generating valid field names
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,40}"
}

/// Strategy for generating names that must be rejected as field names
pub fn invalid_field_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z][a-zA-Z0-9_]{0,20}",
        "[0-9_][a-z0-9_]{0,20}",
        "[a-z]{1,10}[- .][a-z]{1,10}",
        "[a-z]{65,80}",
    ]
}

/// Strategy for generating migration ordinals
pub fn migration_ordinals_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(0u64..5_000, 1..20).prop_map(|set| set.into_iter().collect())
}
