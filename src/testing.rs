//! Helpers for pass tests: build an in-memory store up to a given stage

use tokio_util::sync::CancellationToken;

use crate::config::ProjectConfig;
use crate::db::Store;
use crate::diagnostics::Diagnostics;
use crate::loader::load_documents;
use crate::passes::{discover_component_fields, discover_lists};
use crate::schema::load_schema;
use crate::types::RawDocument;

/// Write the schema and load `documents` (one raw document each)
pub fn compile_until_loaded(schema: &str, documents: &[&str]) -> Store {
    compile_until_loaded_with(schema, documents, &ProjectConfig::default())
}

pub fn compile_until_loaded_with(schema: &str, documents: &[&str], config: &ProjectConfig) -> Store {
    let store = Store::in_memory().unwrap();
    store.write_config(config).unwrap();
    store.with_transaction(|tx| load_schema(tx, schema)).unwrap();
    let raw: Vec<RawDocument> = documents
        .iter()
        .enumerate()
        .map(|(i, content)| RawDocument::new(format!("doc{}.graphql", i), *content))
        .collect();
    store.insert_raw_documents(&raw).unwrap();
    let diagnostics = load_documents(&store, 1, &CancellationToken::new()).unwrap();
    assert!(diagnostics.is_empty(), "{}", diagnostics);
    store
}

/// Load, then run component field and list discovery
pub fn compile_until_discovered(
    schema: &str,
    documents: &[&str],
    config: &ProjectConfig,
) -> (Store, Diagnostics) {
    let store = compile_until_loaded_with(schema, documents, config);
    let mut diagnostics = Diagnostics::new();
    {
        let conn = store.connection().unwrap();
        diagnostics.extend(discover_component_fields(&conn).unwrap());
        diagnostics.extend(discover_lists(&conn, config).unwrap());
    }
    (store, diagnostics)
}

/// A schema with the shapes most pass tests need
pub const SCHEMA: &str = r#"
    interface Node { id: ID! }

    type User implements Node {
        id: ID!
        firstName: String
        avatar(size: Int): String!
        friends(first: Int, after: String, last: Int, before: String): UserConnection!
        friendsList(limit: Int, offset: Int): [User!]!
    }

    type UserConnection {
        edges: [UserEdge!]!
        pageInfo: PageInfo!
    }

    type UserEdge {
        cursor: String
        node: User
    }

    type PageInfo {
        hasNextPage: Boolean!
        endCursor: String
    }

    type Ghost {
        name: String!
        aka: String!
        believers: [User!]!
    }

    union Friend = User | Ghost

    type Query {
        node(id: ID!): Node
        user(id: ID): User
        users(limit: Int, offset: Int, name: String): [User!]!
        userConnection(first: Int, after: String, last: Int, before: String): UserConnection!
        ghost: Ghost
    }

    type Mutation {
        updateUser(id: ID!): User
        addFriend: User!
    }
"#;
