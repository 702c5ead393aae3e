use async_trait::async_trait;
use odata_core::{ast, Error as ODataError, ODataQuery, QuerySource, RequestContext, Rows, SortDir};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, PaginatorTrait,
    QuerySelect,
};
use tracing::debug;

use crate::odata::{FieldMap, ODataExt, ODataOrderExt};

/// Maps a loaded row to the item type handed to the pipeline.
pub type ModelMapper<E, T> = fn(<E as EntityTrait>::Model) -> T;

/// A SeaORM entity exposed as a [`QuerySource`].
///
/// Only fields registered in the [`FieldMap`] can be filtered, ordered or selected.
/// A tiebreaker column is always appended to the order so offset pages don't overlap.
pub struct SeaOrmSource<E: EntityTrait, T> {
    db: DatabaseConnection,
    fields: FieldMap<E>,
    tiebreaker: (String, SortDir),
    mapper: ModelMapper<E, T>,
}

impl<E: EntityTrait, T> SeaOrmSource<E, T> {
    pub fn new(
        db: DatabaseConnection,
        fields: FieldMap<E>,
        tiebreaker: (&str, SortDir),
        mapper: ModelMapper<E, T>,
    ) -> Self {
        Self {
            db,
            fields,
            tiebreaker: (tiebreaker.0.to_string(), tiebreaker.1),
            mapper,
        }
    }

    pub fn fields(&self) -> &FieldMap<E> {
        &self.fields
    }
}

fn db_err(e: DbErr) -> ODataError {
    ODataError::Db(e.to_string())
}

#[async_trait]
impl<E, T> QuerySource for SeaOrmSource<E, T>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
    E::Model: FromQueryResult + Send + Sync,
    T: Send + Sync,
{
    type Item = T;

    async fn count(&self, filter: Option<&ast::Expr>) -> Result<u64, ODataError> {
        let select = E::find().apply_odata_filter(filter, &self.fields)?;
        select.count(&self.db).await.map_err(db_err)
    }

    async fn fetch(&self, query: &ODataQuery, page_size: u64) -> Result<Rows<T>, ODataError> {
        if !query.expand.is_empty() {
            return Err(ODataError::UnsupportedExpand(query.expand.join(", ")));
        }

        let order = query
            .order
            .clone()
            .ensure_tiebreaker(&self.tiebreaker.0, self.tiebreaker.1);
        debug!(order = %order, skip = query.skip, page_size, "fetching page");

        let select = E::find()
            .apply_odata_filter(query.filter(), &self.fields)?
            .apply_odata_order(&order, &self.fields)?
            .offset(query.skip)
            .limit(page_size);

        match &query.select {
            None => {
                let models = select.all(&self.db).await.map_err(db_err)?;
                Ok(Rows::Typed(models.into_iter().map(self.mapper).collect()))
            }
            Some(names) => {
                let mut projected = select.select_only();
                for name in names {
                    let f = self
                        .fields
                        .get(name)
                        .ok_or_else(|| ODataError::InvalidSelectField(name.clone()))?;
                    projected = projected.column_as(f.col, f.api_name.clone());
                }
                let rows = projected
                    .into_json()
                    .all(&self.db)
                    .await
                    .map_err(db_err)?;
                Ok(Rows::Projected(rows))
            }
        }
    }

    fn next_page_link(
        &self,
        ctx: &RequestContext,
        query: &ODataQuery,
        page_size: u64,
    ) -> Option<String> {
        let mut url = url::Url::parse(&ctx.base_url()).ok()?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &ctx.query {
                if k.eq_ignore_ascii_case("$top") || k.eq_ignore_ascii_case("$skip") {
                    continue;
                }
                pairs.append_pair(k, v);
            }
            pairs.append_pair("$top", &page_size.to_string());
            pairs.append_pair("$skip", &query.skip.saturating_add(page_size).to_string());
        }
        Some(url.into())
    }
}
