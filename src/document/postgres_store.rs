//! PostgreSQL-backed document store.
//!
//! Reads and writes the `clients` and `client_documents` tables. Flag updates
//! are single-statement point updates so they never race with writes to
//! other columns of the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::store::{DocumentStore, StoreError};
use super::types::{Client, ClientDocument, ClientId, DocumentId, DocumentUpdate, NewDocument};

const DOCUMENT_COLUMNS: &str = "id, client_id, uploaded_by, kind, title, description, file_ref, \
     created_at, notification_sent, notification_sent_at, viewed, viewed_at";

pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a client row. Used by seeding and operator tooling.
    pub async fn insert_client(
        &self,
        username: &str,
        full_name: &str,
        email: &str,
    ) -> Result<Client, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO clients (username, full_name, email)
            VALUES ($1, $2, $3)
            RETURNING id, username, full_name, email
            "#,
        )
        .bind(username)
        .bind(full_name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        row_to_client(&row)
    }
}

fn row_to_document(row: &PgRow) -> Result<ClientDocument, StoreError> {
    let id: DocumentId = row.try_get("id")?;
    let kind_code: String = row.try_get("kind")?;
    let kind = kind_code.parse().map_err(|e: super::types::UnknownDocumentKind| {
        StoreError::CorruptRow {
            id,
            reason: e.to_string(),
        }
    })?;

    Ok(ClientDocument {
        id,
        client_id: row.try_get("client_id")?,
        uploaded_by: row.try_get("uploaded_by")?,
        kind,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        file_ref: row.try_get("file_ref")?,
        created_at: row.try_get("created_at")?,
        notification_sent: row.try_get("notification_sent")?,
        notification_sent_at: row.try_get("notification_sent_at")?,
        viewed: row.try_get("viewed")?,
        viewed_at: row.try_get("viewed_at")?,
    })
}

fn row_to_client(row: &PgRow) -> Result<Client, StoreError> {
    Ok(Client {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
    })
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert_document(&self, new: NewDocument) -> Result<ClientDocument, StoreError> {
        let query = format!(
            r#"
            INSERT INTO client_documents
                (client_id, uploaded_by, kind, title, description, file_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW()))
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );

        let result = sqlx::query(&query)
            .bind(new.client_id)
            .bind(new.uploaded_by)
            .bind(new.kind.code())
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.file_ref)
            .bind(new.created_at)
            .fetch_one(&self.pool)
            .await;

        let row = match result {
            Ok(row) => row,
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(StoreError::ClientNotFound(new.client_id));
            }
            Err(e) => return Err(e.into()),
        };

        let document = row_to_document(&row)?;
        tracing::trace!(document_id = document.id, "Document inserted into PostgreSQL");
        Ok(document)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<ClientDocument>, StoreError> {
        let query = format!("SELECT {DOCUMENT_COLUMNS} FROM client_documents WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn get_client(&self, id: ClientId) -> Result<Option<Client>, StoreError> {
        let row = sqlx::query("SELECT id, username, full_name, email FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_client).transpose()
    }

    async fn update_details(
        &self,
        id: DocumentId,
        update: &DocumentUpdate,
    ) -> Result<Option<ClientDocument>, StoreError> {
        // $4 says whether $3 carries a description change (NULL clears it)
        let query = format!(
            r#"
            UPDATE client_documents
            SET title = COALESCE($2, title),
                description = CASE WHEN $4 THEN $3 ELSE description END,
                kind = COALESCE($5, kind)
            WHERE id = $1
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );

        let description = update.description.clone().flatten();
        let row = sqlx::query(&query)
            .bind(id)
            .bind(&update.title)
            .bind(description)
            .bind(update.description.is_some())
            .bind(update.kind.map(|k| k.code()))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn mark_viewed(&self, id: DocumentId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE client_documents
            SET viewed = TRUE, viewed_at = $2
            WHERE id = $1 AND viewed = FALSE
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_notified(&self, id: DocumentId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE client_documents
            SET notification_sent = TRUE, notification_sent_at = $2
            WHERE id = $1 AND notification_sent = FALSE
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn pending_notifications(&self, limit: usize) -> Result<Vec<DocumentId>, StoreError> {
        let rows: Vec<(DocumentId,)> = sqlx::query_as(
            r#"
            SELECT d.id
            FROM client_documents d
            JOIN clients c ON c.id = d.client_id
            WHERE d.notification_sent = FALSE AND btrim(c.email) <> ''
            ORDER BY d.created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
