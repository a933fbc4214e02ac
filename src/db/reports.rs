use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::insert_activity;
use crate::{
    error::{AppError, AppResult},
    model::{
        activity_log::NewActivity,
        file_upload::StoredFile,
        report::{ReportPeriod, ReportRecord, ReportRow, ReportStatus},
    },
    services::report_lifecycle::ReportStore,
};

const REPORT_COLUMNS: &str = r#"
    id, report_type, month, year, status,
    submitted_by, submitted_at, approved_by, approved_at,
    locked_by, locked_at, file_id
"#;

#[derive(Clone)]
pub struct MySqlReportStore {
    pool: MySqlPool,
}

#[derive(Debug, Default)]
pub struct ReportFilter {
    pub report_type: Option<String>,
    pub year: Option<i32>,
    pub status: Option<ReportStatus>,
}

impl MySqlReportStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        filter: &ReportFilter,
        limit: u32,
        offset: u32,
    ) -> AppResult<(Vec<ReportRecord>, i64)> {
        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM report_status WHERE 1=1");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut data = QueryBuilder::<MySql>::new(format!(
            "SELECT {} FROM report_status WHERE 1=1",
            REPORT_COLUMNS
        ));
        push_filter(&mut data, filter);
        data.push(" ORDER BY year DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<ReportRow> = data.build_query_as().fetch_all(&self.pool).await?;
        let records = rows
            .into_iter()
            .map(ReportRecord::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((records, total))
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, MySql>, filter: &ReportFilter) {
    if let Some(report_type) = &filter.report_type {
        qb.push(" AND report_type = ").push_bind(report_type.clone());
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
}

#[async_trait]
impl ReportStore for MySqlReportStore {
    async fn find(&self, period: &ReportPeriod) -> AppResult<Option<ReportRecord>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM report_status WHERE report_type = ? AND month = ? AND year = ?",
            REPORT_COLUMNS
        ))
        .bind(&period.report_type)
        .bind(&period.month)
        .bind(period.year)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReportRecord::try_from).transpose()
    }

    async fn record_submission(
        &self,
        period: &ReportPeriod,
        submitted_by: u64,
        file: &StoredFile,
    ) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        // row lock keeps a concurrent `lock` from slipping in between check and upsert
        let current: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status FROM report_status
            WHERE report_type = ? AND month = ? AND year = ?
            FOR UPDATE
            "#,
        )
        .bind(&period.report_type)
        .bind(&period.month)
        .bind(period.year)
        .fetch_optional(&mut *tx)
        .await?;

        if current.as_deref() == Some(ReportStatus::Locked.as_ref()) {
            tx.rollback().await?;
            return Err(AppError::forbidden("Report is locked"));
        }

        let now = Utc::now();
        let file_id = sqlx::query(
            r#"
            INSERT INTO file_uploads
                (original_name, stored_name, file_path, mime_type,
                 size_bytes, uploaded_by, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file.original_name)
        .bind(&file.stored_name)
        .bind(file.path.to_string_lossy().into_owned())
        .bind(&file.mime_type)
        .bind(file.size_bytes)
        .bind(submitted_by)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        sqlx::query(
            r#"
            INSERT INTO report_status
                (report_type, month, year, status, submitted_by, submitted_at, file_id)
            VALUES (?, ?, ?, 'Submitted', ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = 'Submitted',
                submitted_by = VALUES(submitted_by),
                submitted_at = VALUES(submitted_at),
                file_id = VALUES(file_id),
                approved_by = NULL,
                approved_at = NULL
            "#,
        )
        .bind(&period.report_type)
        .bind(&period.month)
        .bind(period.year)
        .bind(submitted_by)
        .bind(now)
        .bind(file_id)
        .execute(&mut *tx)
        .await?;

        insert_activity(
            &mut *tx,
            &NewActivity {
                user_id: submitted_by,
                action: "report.submit",
                entity_type: "report",
                entity_ref: period.entity_ref(),
                details: Some(format!("file_id={} name={}", file_id, file.original_name)),
            },
        )
        .await?;

        tx.commit().await?;
        Ok(file_id)
    }

    async fn transition(
        &self,
        period: &ReportPeriod,
        to: ReportStatus,
        actor: u64,
    ) -> AppResult<bool> {
        let (sql, action) = match to {
            ReportStatus::Approved => (
                r#"
                UPDATE report_status
                SET status = 'Approved', approved_by = ?, approved_at = ?
                WHERE report_type = ? AND month = ? AND year = ? AND status = 'Submitted'
                "#,
                "report.approve",
            ),
            ReportStatus::Locked => (
                r#"
                UPDATE report_status
                SET status = 'Locked', locked_by = ?, locked_at = ?
                WHERE report_type = ? AND month = ? AND year = ? AND status = 'Approved'
                "#,
                "report.lock",
            ),
            other => {
                return Err(AppError::Internal(format!(
                    "{} is not a transition target",
                    other
                )));
            }
        };

        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(sql)
            .bind(actor)
            .bind(Utc::now())
            .bind(&period.report_type)
            .bind(&period.month)
            .bind(period.year)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_activity(
            &mut *tx,
            &NewActivity {
                user_id: actor,
                action,
                entity_type: "report",
                entity_ref: period.entity_ref(),
                details: None,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn march() -> ReportPeriod {
        ReportPeriod::new("monthly", "March", 2025).unwrap()
    }

    fn upload(name: &str) -> StoredFile {
        StoredFile {
            original_name: name.into(),
            stored_name: format!("abc_{}", name),
            path: PathBuf::from("uploads/reports").join(name),
            mime_type: Some("application/pdf".into()),
            size_bytes: 42,
        }
    }

    async fn activity_count(pool: &MySqlPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM activity_logs WHERE entity_type = 'report'")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[ignore = "needs a MySQL server at DATABASE_URL"]
    async fn transitions_only_apply_from_the_prior_status(pool: MySqlPool) {
        let store = MySqlReportStore::new(pool.clone());
        store.record_submission(&march(), 3, &upload("march.pdf")).await.unwrap();

        // Submitted cannot be locked
        assert!(!store.transition(&march(), ReportStatus::Locked, 1).await.unwrap());

        assert!(store.transition(&march(), ReportStatus::Approved, 1).await.unwrap());
        assert!(!store.transition(&march(), ReportStatus::Approved, 1).await.unwrap());

        assert!(store.transition(&march(), ReportStatus::Locked, 2).await.unwrap());

        let record = store.find(&march()).await.unwrap().unwrap();
        assert_eq!(record.status, ReportStatus::Locked);
        assert_eq!(record.approved_by, Some(1));
        assert_eq!(record.locked_by, Some(2));

        // submit, approve, lock; refused transitions leave no trail
        assert_eq!(activity_count(&pool).await, 3);
    }

    #[sqlx::test]
    #[ignore = "needs a MySQL server at DATABASE_URL"]
    async fn missing_period_does_not_transition(pool: MySqlPool) {
        let store = MySqlReportStore::new(pool);
        assert!(!store.transition(&march(), ReportStatus::Approved, 1).await.unwrap());
        assert!(store.find(&march()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "needs a MySQL server at DATABASE_URL"]
    async fn resubmission_clears_approval(pool: MySqlPool) {
        let store = MySqlReportStore::new(pool);
        let first = store.record_submission(&march(), 3, &upload("v1.pdf")).await.unwrap();
        store.transition(&march(), ReportStatus::Approved, 1).await.unwrap();

        let second = store.record_submission(&march(), 4, &upload("v2.pdf")).await.unwrap();
        assert_ne!(first, second);

        let record = store.find(&march()).await.unwrap().unwrap();
        assert_eq!(record.status, ReportStatus::Submitted);
        assert_eq!(record.submitted_by, Some(4));
        assert_eq!(record.file_id, Some(second));
        assert_eq!(record.approved_by, None);
        assert_eq!(record.approved_at, None);
    }

    #[sqlx::test]
    #[ignore = "needs a MySQL server at DATABASE_URL"]
    async fn submission_into_locked_period_is_refused(pool: MySqlPool) {
        let store = MySqlReportStore::new(pool.clone());
        store.record_submission(&march(), 3, &upload("v1.pdf")).await.unwrap();
        store.transition(&march(), ReportStatus::Approved, 1).await.unwrap();
        store.transition(&march(), ReportStatus::Locked, 1).await.unwrap();

        let err = store
            .record_submission(&march(), 3, &upload("late.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // the rolled back transaction leaves no file row behind
        let files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_uploads")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(files, 1);
    }
}
