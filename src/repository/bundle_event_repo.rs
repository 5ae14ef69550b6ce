// ==========================================
// 选举计票系统 - 票包事件仓储
// ==========================================
// 红线: Repository 不含业务逻辑，事件只追加
// 幂等: 重复 event_id 被忽略
// 并发: (bundle_id, version) 冲突 → 乐观锁失败
// ==========================================

use crate::domain::types::{BundleId, ResultId};
use crate::engine::events::{BundleEvent, EventEnvelope};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// 票包事件仓储
/// 职责: 管理 bundle_event 表
pub struct BundleEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BundleEventRepository {
    /// 打开数据库文件并确保 schema 存在
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加事件（单事务）
    ///
    /// # 返回
    /// 实际写入的事件数（重复 event_id 不计）
    pub fn append(&self, events: &[EventEnvelope]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for event in events {
            let exists: Option<String> = tx
                .query_row(
                    "SELECT event_id FROM bundle_event WHERE event_id = ?1",
                    params![event.event_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                debug!(event_id = %event.event_id, "duplicate event ignored");
                continue;
            }

            let result = tx.execute(
                r#"
                INSERT INTO bundle_event (
                    event_id, bundle_id, result_id, version,
                    event_type, actor, occurred_at, payload_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    event.event_id.to_string(),
                    event.bundle_id.to_string(),
                    event.result_id.to_string(),
                    event.version as i64,
                    event.payload.as_str(),
                    event.actor,
                    event.occurred_at.to_rfc3339(),
                    serde_json::to_string(&event.payload)?,
                ],
            );

            match result.map_err(RepositoryError::from) {
                Ok(_) => inserted += 1,
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    return Err(RepositoryError::OptimisticLockFailure {
                        bundle_id: event.bundle_id.to_string(),
                        version: event.version,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// 某计票区结果的全部事件（按票包、版本排序）
    pub fn load_by_result(&self, result_id: &ResultId) -> RepositoryResult<Vec<EventEnvelope>> {
        self.query(
            r#"
            SELECT event_id, bundle_id, result_id, version, actor, occurred_at, payload_json
            FROM bundle_event
            WHERE result_id = ?1
            ORDER BY bundle_id, version
            "#,
            &result_id.to_string(),
        )
    }

    pub fn load_by_bundle(&self, bundle_id: &BundleId) -> RepositoryResult<Vec<EventEnvelope>> {
        self.query(
            r#"
            SELECT event_id, bundle_id, result_id, version, actor, occurred_at, payload_json
            FROM bundle_event
            WHERE bundle_id = ?1
            ORDER BY version
            "#,
            &bundle_id.to_string(),
        )
    }

    pub fn load_all(&self) -> RepositoryResult<Vec<EventEnvelope>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, bundle_id, result_id, version, actor, occurred_at, payload_json
            FROM bundle_event
            ORDER BY bundle_id, version
            "#,
        )?;
        let rows = stmt.query_map([], map_row)?;
        let events = rows
            .map(|r| r.map_err(RepositoryError::from).and_then(|r| r))
            .collect::<RepositoryResult<Vec<_>>>();
        events
    }

    fn query(&self, sql: &str, key: &str) -> RepositoryResult<Vec<EventEnvelope>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], map_row)?;
        let events = rows
            .map(|r| r.map_err(RepositoryError::from).and_then(|r| r))
            .collect::<RepositoryResult<Vec<_>>>();
        events
    }
}

/// 行 → 事件信封；字段解析错误在外层 Result 中返回
fn map_row(row: &Row<'_>) -> rusqlite::Result<RepositoryResult<EventEnvelope>> {
    let event_id: String = row.get(0)?;
    let bundle_id: String = row.get(1)?;
    let result_id: String = row.get(2)?;
    let version: i64 = row.get(3)?;
    let actor: String = row.get(4)?;
    let occurred_at: String = row.get(5)?;
    let payload_json: String = row.get(6)?;

    Ok(decode(
        &event_id,
        &bundle_id,
        &result_id,
        version,
        actor,
        &occurred_at,
        &payload_json,
    ))
}

fn decode(
    event_id: &str,
    bundle_id: &str,
    result_id: &str,
    version: i64,
    actor: String,
    occurred_at: &str,
    payload_json: &str,
) -> RepositoryResult<EventEnvelope> {
    Ok(EventEnvelope {
        event_id: parse_uuid("event_id", event_id)?,
        bundle_id: parse_uuid("bundle_id", bundle_id)?,
        result_id: parse_uuid("result_id", result_id)?,
        version: u64::try_from(version).map_err(|e| RepositoryError::FieldValueError {
            field: "version".to_string(),
            message: e.to_string(),
        })?,
        occurred_at: DateTime::parse_from_rfc3339(occurred_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| RepositoryError::FieldValueError {
                field: "occurred_at".to_string(),
                message: e.to_string(),
            })?,
        actor,
        payload: serde_json::from_str::<BundleEvent>(payload_json)?,
    })
}

fn parse_uuid(field: &str, value: &str) -> RepositoryResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: e.to_string(),
    })
}
