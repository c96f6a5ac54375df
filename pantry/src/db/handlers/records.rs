//! Database repository for schema-driven records.
//!
//! One [`Records`] repository serves every configured resource: the table, the columns and the
//! natural key all come from the [`ResourceSchema`] it is constructed with. Identifiers are
//! quoted and every value is a bound parameter.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::records::{Entity, FieldUpdate, FieldValue, Record},
};
use crate::schema::{ResourceSchema, quote_ident};
use crate::types::RecordId;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, instrument};

/// Filter for listing records
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub skip: i64,
    /// `None` returns every remaining record
    pub limit: Option<i64>,
}

impl RecordFilter {
    pub fn new(skip: i64, limit: Option<i64>) -> Self {
        Self { skip, limit }
    }
}

pub struct Records<'c> {
    db: &'c mut SqliteConnection,
    schema: &'c ResourceSchema,
}

fn bind_value(query: &mut QueryBuilder<'_, Sqlite>, value: &FieldValue) {
    match value {
        FieldValue::Text(s) => query.push_bind(s.clone()),
        FieldValue::Integer(i) => query.push_bind(*i),
    };
}

#[async_trait::async_trait]
impl<'c> Repository for Records<'c> {
    type CreateRequest = Entity;
    type UpdateRequest = FieldUpdate;
    type Response = Record;
    type Id = RecordId;
    type Filter = RecordFilter;

    #[instrument(skip_all, err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} ", self.table()));

        if request.is_empty() {
            query.push("DEFAULT VALUES");
        } else {
            query.push("(");
            for (i, (name, _)) in request.iter().enumerate() {
                if i > 0 {
                    query.push(", ");
                }
                query.push(quote_ident(name));
            }
            query.push(") VALUES (");
            for (i, (_, value)) in request.iter().enumerate() {
                if i > 0 {
                    query.push(", ");
                }
                bind_value(&mut query, value);
            }
            query.push(")");
        }
        query.push(" RETURNING id");

        let id: RecordId = query
            .build_query_scalar::<RecordId>()
            .fetch_one(&mut *self.db)
            .await
            .map_err(|e| self.conflict(DbError::from(e), |key| request.get(key)))?;

        debug!(resource = %self.schema.name, id, "Record created");

        Ok(Record {
            id,
            entity: request.clone(),
        })
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE id = ", self.table()));
        query.push_bind(id);

        let row = query.build().fetch_optional(&mut *self.db).await?;

        Ok(row.map(|row| Record::from_row(&row, self.schema)).transpose()?)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} ORDER BY id", self.table()));

        if filter.limit.is_some() || filter.skip > 0 {
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded
            query.push(" LIMIT ");
            query.push_bind(filter.limit.unwrap_or(-1));
            query.push(" OFFSET ");
            query.push_bind(filter.skip.max(0));
        }

        let rows = query.build().fetch_all(&mut *self.db).await?;

        debug!(resource = %self.schema.name, count = rows.len(), "Records listed");

        Ok(rows
            .iter()
            .map(|row| Record::from_row(row, self.schema))
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        if request.is_empty() {
            return self.get_by_id(id).await?.ok_or(DbError::NotFound);
        }

        // One statement, so the row is never read and written under different locks
        let mut query = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", self.table()));
        for (i, (name, value)) in request.iter().enumerate() {
            if i > 0 {
                query.push(", ");
            }
            query.push(format!("{} = ", quote_ident(name)));
            bind_value(&mut query, value);
        }
        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(" RETURNING *");

        let row = query
            .build()
            .fetch_optional(&mut *self.db)
            .await
            .map_err(|e| self.conflict(DbError::from(e), |key| request.get(key)))?
            .ok_or(DbError::NotFound)?;

        Ok(Record::from_row(&row, self.schema)?)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<()> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE id = ", self.table()));
        query.push_bind(id);

        let result = query.build().execute(&mut *self.db).await?;

        if result.rows_affected() > 0 {
            Ok(())
        } else {
            Err(DbError::NotFound)
        }
    }

    #[instrument(skip(self), err)]
    async fn delete_all(&mut self) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", self.table()))
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

impl<'c> Records<'c> {
    pub fn new(db: &'c mut SqliteConnection, schema: &'c ResourceSchema) -> Self {
        Self { db, schema }
    }

    pub fn schema(&self) -> &ResourceSchema {
        self.schema
    }

    fn table(&self) -> String {
        quote_ident(&self.schema.name)
    }

    /// Fill in the natural key details of a unique violation. `written` looks up the value that
    /// was being written to a column.
    fn conflict<'v>(&self, err: DbError, written: impl FnOnce(&str) -> Option<&'v FieldValue>) -> DbError {
        match &self.schema.unique_key {
            Some(key) => err.with_conflict(&self.schema.name, key, written(key).map(|v| v.to_string())),
            None => err,
        }
    }

    /// Find the first record (lowest ID) whose `field` equals `value`.
    #[instrument(skip(self, value), err)]
    pub async fn find_by_field(&mut self, field: &str, value: &FieldValue) -> Result<Option<Record>> {
        if self.schema.field(field).is_none() {
            return Err(DbError::Other(anyhow::anyhow!(
                "'{field}' is not a field of '{}'",
                self.schema.name
            )));
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT * FROM {} WHERE {} = ",
            self.table(),
            quote_ident(field)
        ));
        bind_value(&mut query, value);
        query.push(" ORDER BY id LIMIT 1");

        let row = query.build().fetch_optional(&mut *self.db).await?;

        Ok(row.map(|row| Record::from_row(&row, self.schema)).transpose()?)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table()))
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}
