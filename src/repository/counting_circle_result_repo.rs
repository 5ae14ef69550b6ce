// ==========================================
// 选举计票系统 - 计票区结果仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 存储: 结果整体以 JSON 保存，状态单列便于查询
// ==========================================

use crate::domain::result::CountingCircleResult;
use crate::domain::types::{PoliticalBusinessId, ResultId};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 计票区结果仓储
/// 职责: 管理 counting_circle_result 表
pub struct CountingCircleResultRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CountingCircleResultRepository {
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

    /// 新增或覆盖
    pub fn upsert(&self, result: &CountingCircleResult) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO counting_circle_result (
                result_id, political_business_id, counting_circle_id, state, payload_json, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(result_id) DO UPDATE SET
                state = excluded.state,
                payload_json = excluded.payload_json,
                updated_at = excluded.updated_at
            "#,
            params![
                result.id.to_string(),
                result.political_business_id.to_string(),
                result.counting_circle_id.to_string(),
                result.state.to_db_str(),
                serde_json::to_string(result)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 在同一事务内读取、修改并写回
    ///
    /// 写回以事务内读取的最新数据为基础，闭包只改动调用方负责的字段
    pub fn update<F>(&self, result_id: &ResultId, apply: F) -> RepositoryResult<CountingCircleResult>
    where
        F: FnOnce(&mut CountingCircleResult),
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let payload: Option<String> = tx
            .query_row(
                "SELECT payload_json FROM counting_circle_result WHERE result_id = ?1",
                params![result_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let mut result: CountingCircleResult = match payload {
            Some(json) => serde_json::from_str(&json)?,
            None => {
                return Err(RepositoryError::NotFound {
                    entity: "CountingCircleResult".to_string(),
                    id: result_id.to_string(),
                })
            }
        };

        apply(&mut result);

        tx.execute(
            r#"
            UPDATE counting_circle_result
            SET state = ?2, payload_json = ?3, updated_at = ?4
            WHERE result_id = ?1
            "#,
            params![
                result_id.to_string(),
                result.state.to_db_str(),
                serde_json::to_string(&result)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(result)
    }

    pub fn find_by_id(&self, result_id: &ResultId) -> RepositoryResult<Option<CountingCircleResult>> {
        let conn = self.get_conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM counting_circle_result WHERE result_id = ?1",
                params![result_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 某选举的全部计票区结果（按计票区排序）
    pub fn list_by_business(
        &self,
        political_business_id: &PoliticalBusinessId,
    ) -> RepositoryResult<Vec<CountingCircleResult>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT payload_json FROM counting_circle_result
            WHERE political_business_id = ?1
            ORDER BY counting_circle_id
            "#,
        )?;
        let payloads = stmt
            .query_map(params![political_business_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(RepositoryError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CountingCircleResultState;
    use uuid::Uuid;

    fn repo() -> CountingCircleResultRepository {
        let conn = open_sqlite_connection(":memory:").unwrap();
        init_schema(&conn).unwrap();
        CountingCircleResultRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_upsert_and_reload() {
        let repo = repo();
        let mut result = CountingCircleResult::new(Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        repo.upsert(&result).unwrap();

        result.state = CountingCircleResultState::SubmissionDone;
        result.conventional.candidate_votes.insert(Uuid::from_u128(9), 12);
        repo.upsert(&result).unwrap();

        let loaded = repo.find_by_id(&result.id).unwrap().unwrap();
        assert_eq!(loaded, result);
        assert_eq!(repo.list_by_business(&Uuid::from_u128(2)).unwrap().len(), 1);
        assert!(repo.find_by_id(&Uuid::from_u128(99)).unwrap().is_none());
    }

    #[test]
    fn test_update_only_touches_applied_fields() {
        let repo = repo();
        let result = CountingCircleResult::new(Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        repo.upsert(&result).unwrap();

        // 另一写入方先更新了直接录入部分
        let mut conventional = result.clone();
        conventional.conventional.candidate_votes.insert(Uuid::from_u128(9), 40);
        repo.upsert(&conventional).unwrap();

        let updated = repo
            .update(&result.id, |r| {
                r.reviewed_bundles.candidate_votes.insert(Uuid::from_u128(9), 2);
                r.open_bundle_count = 1;
            })
            .unwrap();
        assert_eq!(updated.conventional.candidate_votes[&Uuid::from_u128(9)], 40);
        assert_eq!(updated.reviewed_bundles.candidate_votes[&Uuid::from_u128(9)], 2);
        assert_eq!(repo.find_by_id(&result.id).unwrap().unwrap(), updated);

        let missing = repo.update(&Uuid::from_u128(99), |_| {}).unwrap_err();
        assert!(matches!(missing, RepositoryError::NotFound { .. }));
    }
}
