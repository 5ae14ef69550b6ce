// ==========================================
// 选举计票系统 - 抽签裁决仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 主键: (political_business_id, decision_id)
// ==========================================

use crate::domain::apportionment::LotDecisionResolution;
use crate::domain::types::PoliticalBusinessId;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 抽签裁决仓储
///
/// `scope_id` 为选举 id，或双重比例时的选举联合 id
pub struct LotDecisionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LotDecisionRepository {
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

    pub fn save(&self, scope_id: &PoliticalBusinessId, resolution: &LotDecisionResolution) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO lot_decision_resolution (
                political_business_id, decision_id, chosen_entity_id, payload_json, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                scope_id.to_string(),
                resolution.decision_id,
                resolution.chosen_entity_id,
                serde_json::to_string(resolution)?,
                resolution.resolved_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 按决定 id 排序
    pub fn list(&self, scope_id: &PoliticalBusinessId) -> RepositoryResult<Vec<LotDecisionResolution>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT payload_json FROM lot_decision_resolution
            WHERE political_business_id = ?1
            ORDER BY decision_id
            "#,
        )?;
        let payloads = stmt
            .query_map(params![scope_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }

    /// # 返回
    /// 实际删除的行数
    pub fn delete(&self, scope_id: &PoliticalBusinessId, decision_ids: &[String]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for decision_id in decision_ids {
            deleted += tx.execute(
                "DELETE FROM lot_decision_resolution WHERE political_business_id = ?1 AND decision_id = ?2",
                params![scope_id.to_string(), decision_id],
            )?;
        }
        tx.commit()?;
        Ok(deleted)
    }
}
