use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Best-effort audit write for a state-changing action; failures are logged and swallowed.
pub async fn record(pool: &DbPool, user_id: Uuid, action: &str, resource: &str, metadata: Value) {
    let inserted = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await;

    if let Err(err) = inserted {
        tracing::warn!(error = %err, action, resource, %user_id, "audit log failed");
    }
}
