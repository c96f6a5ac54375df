//! HTTP handlers for schema-driven resources.
//!
//! Every configured resource gets the same set of routes under `/api/<name>`, bound to a
//! [`ResourceState`] carrying its schema. Optional routes (`delete`, `authenticate`) are only
//! mounted when the schema enables them.

use crate::api::models::records::{ListRecordsQuery, MessageResponse};
use crate::db::errors::DbError;
use crate::db::handlers::{Records, Repository};
use crate::db::models::records::{Entity, FieldValue, Record};
use crate::errors::{Error, Result};
use crate::schema::{FieldSpec, ResourceSchema};
use crate::types::{Operation, RecordId};
use crate::validation::{validate, validate_update};
use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    routing::{delete, get, post},
};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// State shared by the routes of one resource
#[derive(Clone)]
pub struct ResourceState {
    pub db: SqlitePool,
    pub schema: Arc<ResourceSchema>,
}

/// Builds the routes for one resource.
pub fn router(state: ResourceState) -> Router {
    let base = format!("/api/{}", state.schema.name);
    let by_id = format!("{base}/{{id}}");

    let mut router = Router::new()
        .route(&format!("{base}/create"), post(create_record))
        .route(&base, get(list_records))
        .route(&format!("{base}/"), get(list_records));

    if state.schema.allow_delete {
        router = router
            .route(&format!("{base}/delete"), delete(delete_all_records))
            .route(&by_id, get(get_record).patch(update_record).delete(delete_record));
    } else {
        router = router.route(&by_id, get(get_record).patch(update_record));
    }

    if state.schema.authenticate.is_some() {
        router = router.route(&format!("{base}/authenticate"), post(authenticate_record));
    }

    router.with_state(state)
}

fn json_object(payload: std::result::Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(Error::BadRequest {
            message: "Request body must be a JSON object".to_string(),
        }),
        Err(rejection) => Err(Error::BadRequest {
            message: rejection.body_text(),
        }),
    }
}

fn record_id(path: std::result::Result<Path<RecordId>, PathRejection>) -> Result<RecordId> {
    path.map(|Path(id)| id).map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })
}

fn not_found(schema: &ResourceSchema, id: RecordId) -> Error {
    Error::NotFound {
        resource: schema.name.clone(),
        id: id.to_string(),
    }
}

fn by_id_error(schema: &ResourceSchema, id: RecordId) -> impl FnOnce(DbError) -> Error + '_ {
    move |e| match e {
        DbError::NotFound => not_found(schema, id),
        e => Error::Database(e),
    }
}

#[tracing::instrument(skip_all)]
pub async fn create_record(
    State(state): State<ResourceState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>> {
    let payload = json_object(payload)?;
    let entity = Entity::new(validate(&payload, &state.schema.fields)?);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let record;
    {
        let mut repo = Records::new(&mut tx, &state.schema);
        record = repo.create(&entity).await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    debug!(resource = %state.schema.name, operation = %Operation::Create, id = record.id, "Record created");

    Ok(Json(record))
}

#[tracing::instrument(skip_all)]
pub async fn list_records(
    State(state): State<ResourceState>,
    query: std::result::Result<Query<ListRecordsQuery>, QueryRejection>,
) -> Result<Json<Vec<Record>>> {
    let Query(query) = query.map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Records::new(&mut conn, &state.schema);
    let records = repo.list(&query.filter()).await?;

    debug!(resource = %state.schema.name, operation = %Operation::Read, count = records.len(), "Records listed");

    Ok(Json(records))
}

#[tracing::instrument(skip_all)]
pub async fn get_record(
    State(state): State<ResourceState>,
    id: std::result::Result<Path<RecordId>, PathRejection>,
) -> Result<Json<Record>> {
    let id = record_id(id)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Records::new(&mut conn, &state.schema);

    match repo.get_by_id(id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(not_found(&state.schema, id)),
    }
}

#[tracing::instrument(skip_all)]
pub async fn update_record(
    State(state): State<ResourceState>,
    id: std::result::Result<Path<RecordId>, PathRejection>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>> {
    let id = record_id(id)?;
    let payload = json_object(payload)?;
    let update = validate_update(&payload, &state.schema.fields)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let record;
    {
        let mut repo = Records::new(&mut tx, &state.schema);
        record = repo.update(id, &update).await.map_err(by_id_error(&state.schema, id))?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    debug!(resource = %state.schema.name, operation = %Operation::Update, id, "Record updated");

    Ok(Json(record))
}

#[tracing::instrument(skip_all)]
pub async fn delete_record(
    State(state): State<ResourceState>,
    id: std::result::Result<Path<RecordId>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let id = record_id(id)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    {
        let mut repo = Records::new(&mut tx, &state.schema);
        repo.delete(id).await.map_err(by_id_error(&state.schema, id))?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(resource = %state.schema.name, operation = %Operation::Delete, id, "Record deleted");

    Ok(Json(MessageResponse::new(format!(
        "{} record {id} has been deleted",
        state.schema.name
    ))))
}

#[tracing::instrument(skip_all)]
pub async fn delete_all_records(State(state): State<ResourceState>) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let deleted;
    {
        let mut repo = Records::new(&mut tx, &state.schema);
        deleted = repo.delete_all().await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(resource = %state.schema.name, operation = %Operation::DeleteAll, deleted, "Records deleted");

    Ok(Json(MessageResponse::new(format!(
        "Deleted {deleted} {} records",
        state.schema.name
    ))))
}

/// Reads one credential from the payload, holding it to the field's constraints.
fn credential(payload: &Map<String, Value>, spec: &FieldSpec) -> Result<FieldValue> {
    let spec = FieldSpec {
        required: true,
        ..spec.clone()
    };
    let validated = validate(payload, std::slice::from_ref(&spec))?;
    validated
        .into_values()
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .ok_or_else(|| Error::Internal {
            operation: format!("read credential '{}'", spec.name),
        })
}

/// Looks a record up by its natural key and accepts the request when the secret field matches.
#[tracing::instrument(skip_all)]
pub async fn authenticate_record(
    State(state): State<ResourceState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>> {
    let auth = state.schema.authenticate.as_ref().ok_or_else(|| Error::Internal {
        operation: format!("{} {}: not enabled", Operation::Authenticate, state.schema.name),
    })?;
    let payload = json_object(payload)?;

    let (key_spec, secret_spec) = match (state.schema.field(&auth.key_field), state.schema.field(&auth.secret_field)) {
        (Some(key), Some(secret)) => (key, secret),
        _ => {
            return Err(Error::Internal {
                operation: format!("{} {}: unknown fields", Operation::Authenticate, state.schema.name),
            });
        }
    };
    let key = credential(&payload, key_spec)?;
    let secret = credential(&payload, secret_spec)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Records::new(&mut conn, &state.schema);

    match repo.find_by_field(&auth.key_field, &key).await? {
        Some(record) if record.get(&auth.secret_field) == Some(&secret) => {
            debug!(resource = %state.schema.name, operation = %Operation::Authenticate, id = record.id, "Credentials accepted");
            Ok(Json(record))
        }
        _ => {
            info!(resource = %state.schema.name, operation = %Operation::Authenticate, "Credentials rejected");
            Err(Error::Unauthenticated {
                message: Some("Invalid credentials".to_string()),
            })
        }
    }
}
