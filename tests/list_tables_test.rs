//! Integration tests for the list_databases and list_tables tools.

mod common;

use clickhouse_mcp_server::db::{CatalogClient, CursorCache};
use clickhouse_mcp_server::tools::schema::{
    ListDatabasesInput, ListTablesInput, PatternInput, SchemaToolHandler,
};
use common::{FakeCatalog, FakeColumn, FakeTable};
use std::sync::Arc;

fn handler(catalog: FakeCatalog) -> SchemaToolHandler {
    let catalog: Arc<dyn CatalogClient> = Arc::new(catalog);
    SchemaToolHandler::new(catalog, Arc::new(CursorCache::new()))
}

fn shop_catalog() -> FakeCatalog {
    FakeCatalog::new().with_database(
        "shop",
        vec![
            FakeTable::new("user_accounts"),
            FakeTable::new("user_sessions"),
            FakeTable::new("order_items"),
            FakeTable::new("orders_archive"),
            FakeTable::new("inventory"),
        ],
    )
}

fn table_names(output: &clickhouse_mcp_server::tools::ListTablesOutput) -> Vec<&str> {
    output.tables.iter().map(|t| t.name.as_str()).collect()
}

#[tokio::test]
async fn test_column_comments_preserved() {
    let catalog = FakeCatalog::new().with_database(
        "test_tool_db",
        vec![
            FakeTable::new("test_table")
                .with_comment("Test table for MCP")
                .with_columns(vec![
                    FakeColumn::new("id", "UInt32", "Primary identifier"),
                    FakeColumn::new("name", "String", "User name field"),
                ]),
        ],
    );

    let output = handler(catalog)
        .list_tables(ListTablesInput::new("test_tool_db"))
        .await
        .unwrap();

    assert_eq!(output.tables.len(), 1);
    assert_eq!(output.total_tables, 1);
    let table = &output.tables[0];
    assert_eq!(table.name, "test_table");
    assert_eq!(table.comment.as_deref(), Some("Test table for MCP"));

    let comments: Vec<(&str, Option<&str>)> = table
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.comment.as_deref()))
        .collect();
    assert_eq!(
        comments,
        vec![
            ("id", Some("Primary identifier")),
            ("name", Some("User name field")),
        ]
    );
}

#[tokio::test]
async fn test_not_like_everything_returns_empty() {
    let output = handler(shop_catalog())
        .list_tables(ListTablesInput {
            not_like: Some(PatternInput::One("%".to_string())),
            ..ListTablesInput::new("shop")
        })
        .await
        .unwrap();

    assert!(output.tables.is_empty());
    assert_eq!(output.total_tables, 0);
    assert!(output.next_page_token.is_none());
}

#[tokio::test]
async fn test_like_list_is_a_union() {
    let output = handler(shop_catalog())
        .list_tables(ListTablesInput {
            like: Some(PatternInput::Many(vec![
                "user_%".to_string(),
                "order_%".to_string(),
            ])),
            ..ListTablesInput::new("shop")
        })
        .await
        .unwrap();

    // `_` is a single-character wildcard, so `order_%` also matches `orders_archive`.
    assert_eq!(
        table_names(&output),
        vec!["user_accounts", "user_sessions", "order_items", "orders_archive"]
    );
}

#[tokio::test]
async fn test_like_list_selects_only_matching_tables() {
    let catalog = FakeCatalog::new().with_database(
        "app",
        vec![
            FakeTable::new("user_table"),
            FakeTable::new("order_table"),
            FakeTable::new("test_table"),
        ],
    );

    let output = handler(catalog)
        .list_tables(ListTablesInput {
            like: Some(PatternInput::Many(vec![
                "user_%".to_string(),
                "order_%".to_string(),
            ])),
            include_detailed_columns: false,
            ..ListTablesInput::new("app")
        })
        .await
        .unwrap();

    assert_eq!(table_names(&output), vec!["user_table", "order_table"]);
    assert_eq!(output.total_tables, 2);
}

#[tokio::test]
async fn test_like_and_not_like_combine() {
    let output = handler(shop_catalog())
        .list_tables(ListTablesInput {
            like: Some(PatternInput::One("%s".to_string())),
            not_like: Some(PatternInput::Many(vec!["user_%".to_string()])),
            include_detailed_columns: false,
            ..ListTablesInput::new("shop")
        })
        .await
        .unwrap();

    assert_eq!(table_names(&output), vec!["order_items"]);
    assert!(output.tables[0].columns.is_empty());
}

#[tokio::test]
async fn test_page_size_and_token_round_trip_through_tool() {
    let schema = handler(FakeCatalog::new().with_numbered_tables("db", "t", 5));

    let first = schema
        .list_tables(ListTablesInput {
            page_size: Some(3),
            ..ListTablesInput::new("db")
        })
        .await
        .unwrap();
    assert_eq!(first.tables.len(), 3);
    assert_eq!(first.total_tables, 5);

    let second = schema
        .list_tables(ListTablesInput {
            page_size: Some(3),
            page_token: first.next_page_token,
            ..ListTablesInput::new("db")
        })
        .await
        .unwrap();
    assert_eq!(table_names(&second), vec!["t003", "t004"]);
    assert!(second.next_page_token.is_none());
}

#[tokio::test]
async fn test_oversized_page_size_is_clamped() {
    let schema = handler(FakeCatalog::new().with_numbered_tables("db", "t", 3));
    let output = schema
        .list_tables(ListTablesInput {
            page_size: Some(u32::MAX),
            include_detailed_columns: false,
            ..ListTablesInput::new("db")
        })
        .await
        .unwrap();
    assert_eq!(output.tables.len(), 3);
}

#[tokio::test]
async fn test_blank_database_rejected() {
    let err = handler(shop_catalog())
        .list_tables(ListTablesInput::new(""))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("database is required"));
}

#[tokio::test]
async fn test_database_name_is_matched_exactly() {
    let catalog = FakeCatalog::new()
        .with_database("db", vec![FakeTable::new("in_db")])
        .with_database(" db", vec![FakeTable::new("in_space_db")]);
    let schema = handler(catalog);

    let spaced = schema
        .list_tables(ListTablesInput::new(" db"))
        .await
        .unwrap();
    assert_eq!(table_names(&spaced), vec!["in_space_db"]);

    let plain = schema.list_tables(ListTablesInput::new("db")).await.unwrap();
    assert_eq!(table_names(&plain), vec!["in_db"]);

    let err = schema
        .list_tables(ListTablesInput::new("   "))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("database is required"));
}

#[tokio::test]
async fn test_list_databases_filters() {
    let schema = handler(shop_catalog());

    let all = schema
        .list_databases(ListDatabasesInput::default())
        .await
        .unwrap();
    assert_eq!(all.databases, vec!["default", "system", "shop"]);
    assert_eq!(all.count, 3);

    let user_only = schema
        .list_databases(ListDatabasesInput {
            like: None,
            not_like: Some(PatternInput::Many(vec![
                "system".to_string(),
                "default".to_string(),
            ])),
        })
        .await
        .unwrap();
    assert_eq!(user_only.databases, vec!["shop"]);
    assert_eq!(user_only.count, 1);
}

#[tokio::test]
async fn test_filter_values_are_bound_not_inlined() {
    let catalog = Arc::new(shop_catalog());
    let schema = SchemaToolHandler::new(catalog.clone(), Arc::new(CursorCache::new()));

    schema
        .list_tables(ListTablesInput {
            like: Some(PatternInput::One("x' OR 1=1 --".to_string())),
            ..ListTablesInput::new("shop")
        })
        .await
        .unwrap();

    assert!(
        catalog
            .queries()
            .iter()
            .all(|q| !q.sql.contains("OR 1=1"))
    );
}
