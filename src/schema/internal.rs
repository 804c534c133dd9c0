//! Framework definitions appended to every user schema

use crate::constants::RUNTIME_SCALAR_DIRECTIVE;

/// Directives, scalars and enums the framework gives meaning to. Written
/// with `internal = 1` after the user schema.
pub const INTERNAL_SCHEMA: &str = r#"
scalar ComponentFields

scalar Component

enum PaginateMode {
    Infinite
    SinglePage
}

enum DedupeMatchMode {
    Variables
    Operation
    None
}

enum CachePolicy {
    CacheAndNetwork
    CacheOnly
    CacheOrNetwork
    NetworkOnly
    NoCache
}

type __ArgumentSpecification {
    type: String!
    default: ID
}

"""
Mark a field as a list the runtime can insert into and remove from
"""
directive @list(name: String!, connection: Boolean) on FIELD_DEFINITION

"""
Mark a field as paginated
"""
directive @paginate(name: String!, mode: PaginateMode) on FIELD

directive @prepend on FRAGMENT_SPREAD

directive @append on FRAGMENT_SPREAD

directive @allLists on FRAGMENT_SPREAD

directive @mask_enable on FRAGMENT_SPREAD

directive @mask_disable on FRAGMENT_SPREAD

directive @parentID(value: ID!) on FRAGMENT_SPREAD

directive @when on FRAGMENT_SPREAD

directive @when_not on FRAGMENT_SPREAD

"""
Declare the arguments a fragment accepts
"""
directive @arguments on FRAGMENT_DEFINITION

"""
Pass arguments to a fragment
"""
directive @with on FRAGMENT_SPREAD

directive @dedupe(cancelFirst: Boolean, match: DedupeMatchMode) on QUERY | MUTATION

directive @optimisticKey on FIELD

directive @cache(policy: CachePolicy, partial: Boolean) on QUERY

directive @loading(count: Int, cascade: Boolean) on QUERY | FIELD | FRAGMENT_DEFINITION | FRAGMENT_SPREAD

directive @required on FIELD

"""
Declare a fragment as a field of its type condition
"""
directive @componentField(prop: String, field: String) on FRAGMENT_DEFINITION | INLINE_FRAGMENT | FIELD_DEFINITION
"#;

/// The runtime-scalar marker is registered separately so its name stays in
/// one place
pub fn runtime_scalar_directive() -> String {
    format!(
        "directive @{}(type: String!) on QUERY\n",
        RUNTIME_SCALAR_DIRECTIVE
    )
}

/// Directives hidden from generated tooling
pub const HIDDEN_DIRECTIVES: [&str; 1] = [RUNTIME_SCALAR_DIRECTIVE];
