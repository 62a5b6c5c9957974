//! Snapshot tests for multi-clause SQL rendering.

use squill_sql::ddl::{
    ColumnChange, ColumnOpts, ColumnSpec, ColumnType, DdlCommand, Reference, ReferenceAction, Table,
};
use squill_sql::*;

fn renderer() -> Renderer {
    Renderer::default()
}

#[test]
fn cte_join_group_having_order() {
    let recent = Query::from_table("orders")
        .select([Expr::field(0, "id"), Expr::field(0, "customer_id")])
        .and_where(Expr::field(0, "inserted_at").gt(Expr::param(0)));
    let query = Query::from_schema("customers", "Customer")
        .with("recent_orders", CteSource::Query(Box::new(recent)))
        .select([Expr::field(0, "name"), Expr::CountStar])
        .join(
            JoinQual::Inner,
            Source::table("recent_orders"),
            Expr::field(1, "customer_id").eq(Expr::field(0, "id")),
        )
        .group_by(Expr::field(0, "name"))
        .and_having(Expr::CountStar.gt(Expr::Integer(1)))
        .order_by(OrderBy::desc(Expr::CountStar))
        .limit(Expr::Integer(10));

    insta::assert_snapshot!(
        renderer().all(&query).unwrap(),
        @r#"WITH "recent_orders" AS (SELECT o0."id", o0."customer_id" FROM "orders" AS o0 WHERE (o0."inserted_at" > $1)) SELECT c0."name", count(*) FROM "customers" AS c0 INNER JOIN "recent_orders" AS r1 ON (r1."customer_id" = c0."id") GROUP BY c0."name" HAVING (count(*) > 1) ORDER BY count(*) DESC LIMIT 10"#
    );
}

#[test]
fn distinct_set_op_and_lock() {
    let archived = Query::from_table("archived_users").select([Expr::field(0, "email")]);
    let query = Query::from_table("users")
        .select([Expr::field(0, "email")])
        .distinct(Distinct::Plain)
        .combine(Combination::Except, archived)
        .order_by(OrderBy::asc(Expr::field(0, "email")))
        .lock("FOR SHARE");

    insta::assert_snapshot!(
        renderer().all(&query).unwrap(),
        @r#"SELECT DISTINCT u0."email" FROM "users" AS u0 EXCEPT (SELECT a0."email" FROM "archived_users" AS a0) ORDER BY u0."email" FOR SHARE"#
    );
}

#[test]
fn windowed_aggregate_over_subquery_source() {
    let sub = Query::from_table("sales")
        .select([Expr::field(0, "region"), Expr::field(0, "amount")])
        .and_where(Expr::field(0, "voided").eq(Expr::Bool(false)));
    let query = Query::from_source(Source::Subquery(Box::new(sub)))
        .select([
            Expr::field(0, "region"),
            Expr::Over {
                agg: Box::new(Expr::call("sum", [Expr::field(0, "amount")])),
                window: OverWindow::Name("by_region".to_string()),
            },
        ])
        .window(
            "by_region",
            WindowDef {
                partition_by: vec![Expr::field(0, "region")],
                order_by: vec![OrderBy::desc(Expr::field(0, "amount"))],
                frame: None,
            },
        );

    insta::assert_snapshot!(
        renderer().all(&query).unwrap(),
        @r#"SELECT s0."region", sum(s0."amount") OVER "by_region" FROM (SELECT s0."region", s0."amount" FROM "sales" AS s0 WHERE (s0."voided" = FALSE)) AS s0 WINDOW "by_region" AS (PARTITION BY s0."region" ORDER BY s0."amount" DESC)"#
    );
}

#[test]
fn upsert_with_returning() {
    let rows = vec![vec![InsertValue::Value, InsertValue::Value]];
    let sql = renderer()
        .insert(
            None,
            "products",
            &["handle", "status"],
            &rows,
            &OnConflict::Replace {
                fields: vec!["status".to_string(), "updated_at".to_string()],
                target: ConflictTarget::Columns(vec!["handle".to_string()]),
            },
            &["id", "handle", "status"],
        )
        .unwrap();

    insta::assert_snapshot!(
        sql,
        @r#"INSERT INTO "products" ("handle","status") VALUES ($1,$2) ON CONFLICT ("handle") DO UPDATE SET "status" = EXCLUDED."status","updated_at" = EXCLUDED."updated_at" RETURNING "id","handle","status""#
    );
}

#[test]
fn create_table_statement_list() {
    let command = DdlCommand::CreateTable {
        if_not_exists: false,
        table: Table {
            comment: Some("published articles".to_string()),
            ..Table::new("posts")
        },
        columns: vec![
            ColumnChange::add(
                "id",
                ColumnSpec::Type(ColumnType::Serial),
                ColumnOpts {
                    primary_key: true,
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "author_id",
                ColumnSpec::Reference(Reference {
                    on_delete: ReferenceAction::DeleteAll,
                    ..Reference::new("users")
                }),
                ColumnOpts {
                    null: Some(false),
                    ..Default::default()
                },
            ),
            ColumnChange::add(
                "title",
                ColumnSpec::Type(ColumnType::String),
                ColumnOpts {
                    comment: Some("display title".to_string()),
                    ..Default::default()
                },
            ),
        ],
    };

    let statements = renderer().execute_ddl(&command).unwrap();
    insta::assert_snapshot!(
        statements.join("\n"),
        @r#"
    CREATE TABLE "posts" ("id" serial, "author_id" bigint NOT NULL CONSTRAINT "posts_author_id_fkey" REFERENCES "users"("id") ON DELETE CASCADE, "title" varchar(255), PRIMARY KEY ("id"))
    COMMENT ON TABLE "posts" IS 'published articles'
    COMMENT ON COLUMN "posts"."title" IS 'display title'
    "#
    );
}
