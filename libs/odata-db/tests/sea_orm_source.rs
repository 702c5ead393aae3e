use odata_core::ast::{CompareOperator, Expr, Value};
use odata_core::{
    build_envelope, Error, ODataOrderBy, ODataQuery, ODataSettings, OrderKey, Outcome,
    QuerySource, RequestContext, ResultPage, Rows, SortDir,
};
use odata_db::{connect, DatabaseConfig, FieldKind, FieldMap, SeaOrmSource};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, Schema, Set};
use serde::{Deserialize, Serialize};

mod gadget {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "gadgets")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub name: String,
        pub price: f64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct GadgetDto {
    id: i64,
    name: String,
    price: f64,
}

fn to_dto(m: gadget::Model) -> GadgetDto {
    GadgetDto {
        id: m.id,
        name: m.name,
        price: m.price,
    }
}

async fn seeded(n: i64) -> DatabaseConnection {
    let db = connect(&DatabaseConfig::in_memory()).await.unwrap();
    let backend = db.get_database_backend();
    let stmt = Schema::new(backend).create_table_from_entity(gadget::Entity);
    db.execute(backend.build(&stmt)).await.unwrap();

    for id in 1..=n {
        gadget::ActiveModel {
            id: Set(id),
            name: Set(format!("gadget-{id:03}")),
            price: Set(id as f64 * 1.5),
        }
        .insert(&db)
        .await
        .unwrap();
    }
    db
}

fn source(db: DatabaseConnection) -> SeaOrmSource<gadget::Entity, GadgetDto> {
    let fields = FieldMap::new()
        .insert("id", gadget::Column::Id, FieldKind::I64)
        .insert("name", gadget::Column::Name, FieldKind::String)
        .insert("price", gadget::Column::Price, FieldKind::F64);
    SeaOrmSource::new(db, fields, ("id", SortDir::Asc), to_dto)
}

fn id_gt(n: i64) -> Expr {
    Expr::Compare(
        Box::new(Expr::Identifier("id".into())),
        CompareOperator::Gt,
        Box::new(Expr::Value(Value::Number(n.into()))),
    )
}

#[tokio::test]
async fn counts_with_and_without_filter() {
    let src = source(seeded(12).await);
    assert_eq!(src.count(None).await.unwrap(), 12);
    assert_eq!(src.count(Some(&id_gt(10))).await.unwrap(), 2);
}

#[tokio::test]
async fn count_reports_unknown_fields_as_query_errors() {
    let src = source(seeded(1).await);
    let bad = Expr::Compare(
        Box::new(Expr::Identifier("weight".into())),
        CompareOperator::Eq,
        Box::new(Expr::Value(Value::Number(1.into()))),
    );
    let err = src.count(Some(&bad)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidFilter(ref m) if m.contains("weight")));
}

#[tokio::test]
async fn fetch_pages_in_tiebreaker_order() {
    let src = source(seeded(12).await);
    let rows = src.fetch(&ODataQuery::new().with_skip(5), 3).await.unwrap();
    match rows {
        Rows::Typed(items) => {
            let ids: Vec<i64> = items.iter().map(|g| g.id).collect();
            assert_eq!(ids, vec![6, 7, 8]);
        }
        Rows::Projected(_) => panic!("expected typed rows"),
    }
}

#[tokio::test]
async fn fetch_honours_client_order() {
    let src = source(seeded(5).await);
    let q = ODataQuery::new().with_order(ODataOrderBy(vec![OrderKey {
        field: "price".into(),
        dir: SortDir::Desc,
    }]));
    let Rows::Typed(items) = src.fetch(&q, 2).await.unwrap() else {
        panic!("expected typed rows");
    };
    assert_eq!(items[0].id, 5);
    assert_eq!(items[1].id, 4);
}

#[tokio::test]
async fn fetch_projects_with_api_names() {
    let src = source(seeded(3).await);
    let q = ODataQuery::new().with_select(vec!["NAME".into(), "id".into()]);
    let Rows::Projected(rows) = src.fetch(&q, 10).await.unwrap() else {
        panic!("expected projection");
    };
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["name"], "gadget-001");
    assert_eq!(rows[0]["id"], 1);
}

#[tokio::test]
async fn fetch_rejects_unknown_select_order_and_expand() {
    let src = source(seeded(1).await);

    let q = ODataQuery::new().with_select(vec!["weight".into()]);
    assert_eq!(
        src.fetch(&q, 10).await.unwrap_err(),
        Error::InvalidSelectField("weight".into())
    );

    let q = ODataQuery::new().with_order(ODataOrderBy(vec![OrderKey {
        field: "weight".into(),
        dir: SortDir::Asc,
    }]));
    assert_eq!(
        src.fetch(&q, 10).await.unwrap_err(),
        Error::InvalidOrderByField("weight".into())
    );

    let q = ODataQuery::new().with_expand(vec!["parts".into()]);
    assert!(matches!(
        src.fetch(&q, 10).await.unwrap_err(),
        Error::UnsupportedExpand(_)
    ));
}

#[tokio::test]
async fn next_page_link_advances_skip() {
    let src = source(seeded(1).await);
    let ctx = RequestContext::new("https", "api.example.com", "/api/gadgets")
        .with_query_pair("$filter", "price gt 1")
        .with_query_pair("$skip", "4")
        .with_query_pair("$top", "2");
    let link = src
        .next_page_link(&ctx, &ODataQuery::new().with_skip(4).with_top(2), 2)
        .unwrap();

    let url = url::Url::parse(&link).unwrap();
    assert_eq!(url.host_str(), Some("api.example.com"));
    assert_eq!(url.path(), "/api/gadgets");
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![
            ("$filter".to_string(), "price gt 1".to_string()),
            ("$top".to_string(), "2".to_string()),
            ("$skip".to_string(), "6".to_string()),
        ]
    );
}

fn settings() -> ODataSettings {
    ODataSettings {
        host_name: "api.example.com".into(),
        default_page_size: 5,
        max_page_size: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn envelope_over_sqlite() {
    let src = source(seeded(12).await);
    let ctx = RequestContext::new("http", "127.0.0.1:8087", "/api/gadgets");

    match build_envelope(&src, ODataQuery::new(), ctx.clone(), &settings()).await {
        Outcome::Success { envelope, page } => {
            assert_eq!(envelope.count, 12);
            assert_eq!(envelope.page_size, 5);
            assert_eq!(envelope.total_pages, 3);
            assert_eq!(envelope.current_page, 1);
            let next = envelope.next_url.unwrap();
            assert!(next.starts_with("http://api.example.com/api/gadgets?"), "{next}");
            assert!(matches!(page, ResultPage::Typed(ref v) if v.len() == 5));
        }
        other => panic!("unexpected {other:?}"),
    }

    let q = ODataQuery::new().with_filter(id_gt(100));
    assert!(matches!(
        build_envelope(&src, q, ctx.clone(), &settings()).await,
        Outcome::NotFound(_)
    ));

    let q = ODataQuery::new().with_top(11);
    match build_envelope(&src, q, ctx, &settings()).await {
        Outcome::BadRequest(m) => assert!(m.contains("10")),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn envelope_with_partial_select_is_projected() {
    let src = source(seeded(3).await);
    let ctx = RequestContext::new("http", "127.0.0.1:8087", "/api/gadgets");
    let q = ODataQuery::new().with_select(vec!["name".into()]);

    match build_envelope(&src, q, ctx, &settings()).await {
        Outcome::Success { envelope, page } => {
            assert_eq!(envelope.count, 3);
            assert!(page.is_projected());
        }
        other => panic!("unexpected {other:?}"),
    }
}
