//! PostgreSQL document store
//!
//! All collections share one `documents` table; the `collection` column names
//! the collection and `body` holds the document as JSONB. Field paths are
//! compared with `body #>> path`, which renders scalars as text.

use super::traits::{DocumentFilter, DocumentStore};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Text(String),
    TextArray(Vec<String>),
}

fn push_bind(binds: &mut Vec<BindValue>, value: BindValue) -> usize {
    binds.push(value);
    binds.len()
}

/// Escape SQL LIKE meta-characters so user input is treated literally.
fn escape_like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn filter_sql(filter: &DocumentFilter, binds: &mut Vec<BindValue>) -> String {
    match filter {
        DocumentFilter::Equals { path, value } => {
            let p = push_bind(binds, BindValue::TextArray(path.segments().to_vec()));
            let v = push_bind(binds, BindValue::Text(value.clone()));
            format!("body #>> ${}::text[] = ${}", p, v)
        }
        DocumentFilter::ContainsIgnoreCase { path, needle } => {
            let p = push_bind(binds, BindValue::TextArray(path.segments().to_vec()));
            let v = push_bind(
                binds,
                BindValue::Text(format!("%{}%", escape_like_pattern(needle))),
            );
            format!("body #>> ${}::text[] ILIKE ${} ESCAPE E'\\\\'", p, v)
        }
        DocumentFilter::Any(filters) if filters.is_empty() => "FALSE".to_string(),
        DocumentFilter::Any(filters) => {
            let parts: Vec<String> = filters.iter().map(|f| filter_sql(f, binds)).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn build_find_sql(
    collection: &str,
    filter: &DocumentFilter,
    limit: Option<usize>,
) -> (String, Vec<BindValue>) {
    let mut binds = vec![BindValue::Text(collection.to_string())];
    let predicate = filter_sql(filter, &mut binds);
    let mut sql = format!(
        "SELECT body FROM documents WHERE collection = $1 AND {} ORDER BY id",
        predicate
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    (sql, binds)
}

fn observe(query_type: &str, start: Instant, result: &std::result::Result<(), &sqlx::Error>) {
    crate::metrics::DB_QUERY_DURATION_SECONDS
        .with_label_values(&[query_type])
        .observe(start.elapsed().as_secs_f64());
    if let Err(e) = result {
        let error_type = match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => "pool",
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => "connection",
            sqlx::Error::Database(_) => "database",
            _ => "other",
        };
        crate::metrics::DB_QUERY_ERRORS_TOTAL
            .with_label_values(&[query_type, error_type])
            .inc();
    }
}

#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let start = Instant::now();
        let result = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT collection FROM documents ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await;
        observe("list_collections", start, &result.as_ref().map(|_| ()));

        Ok(result?)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<JsonValue>> {
        let (sql, bind_values) = build_find_sql(collection, filter, limit);

        let mut query = sqlx::query(&sql);
        for value in bind_values {
            query = match value {
                BindValue::Text(v) => query.bind(v),
                BindValue::TextArray(vs) => query.bind(vs),
            };
        }

        let start = Instant::now();
        let result = query.fetch_all(&self.pool).await;
        observe("find", start, &result.as_ref().map(|_| ()));

        let rows = result?;
        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.try_get::<JsonValue, _>("body") {
                Ok(body) => documents.push(body),
                Err(e) => {
                    tracing::warn!(collection, error = %e, "Skipping undecodable document");
                }
            }
        }

        Ok(documents)
    }
}
