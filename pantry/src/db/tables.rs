//! Table creation for configured resources.
//!
//! There are no migration files: each resource's table is derived from its schema and created
//! at startup if it does not exist yet. Existing tables are left as they are.

use crate::schema::{ResourceSchema, quote_ident};
use sqlx::SqliteConnection;
use tracing::{debug, instrument};

/// Builds the `CREATE TABLE` statement for a resource.
///
/// `AUTOINCREMENT` keeps SQLite from handing out the ID of a deleted row again.
pub fn create_table_sql(schema: &ResourceSchema) -> String {
    let mut columns = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for field in &schema.fields {
        let mut column = format!("{} {}", quote_ident(&field.name), field.kind.sql_type());
        if field.required {
            column.push_str(" NOT NULL");
        }
        if schema.is_unique(&field.name) {
            column.push_str(" UNIQUE");
        }
        columns.push(column);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&schema.name),
        columns.join(", ")
    )
}

#[instrument(skip_all, fields(resource = %schema.name), err)]
pub async fn ensure_table(conn: &mut SqliteConnection, schema: &ResourceSchema) -> Result<(), sqlx::Error> {
    let sql = create_table_sql(schema);
    debug!(%sql, "Ensuring table exists");
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}
