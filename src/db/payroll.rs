use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::is_duplicate_key;
use crate::{
    error::AppResult,
    model::payroll::{
        NewPayrollRecord, PayrollEmployee, PayrollPeriod, PayrollRecord, PayrollReportRow,
    },
    services::payroll_batch::{InsertOutcome, PayrollStore},
};

#[derive(Clone)]
pub struct MySqlPayrollStore {
    pool: MySqlPool,
}

#[derive(Debug, Default)]
pub struct PayrollFilter {
    pub employee_id: Option<u64>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl MySqlPayrollStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn report(&self, period: PayrollPeriod) -> AppResult<Vec<PayrollReportRow>> {
        let rows = sqlx::query_as::<_, PayrollReportRow>(
            r#"
            SELECT
                p.employee_id,
                e.employee_code,
                CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
                p.monthly_salary,
                p.total_present,
                p.net_salary,
                p.generated_on
            FROM payroll_records p
            JOIN employees e ON e.id = p.employee_id
            WHERE p.month = ? AND p.year = ?
            ORDER BY e.employee_code
            "#,
        )
        .bind(period.month)
        .bind(period.year)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get(&self, id: u64) -> AppResult<Option<PayrollRecord>> {
        let record = sqlx::query_as::<_, PayrollRecord>(
            r#"
            SELECT id, employee_id, month, year, total_present,
                   monthly_salary, net_salary, generated_on
            FROM payroll_records
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn list(
        &self,
        filter: &PayrollFilter,
        limit: u32,
        offset: u32,
    ) -> AppResult<(Vec<PayrollRecord>, i64)> {
        let mut count =
            QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM payroll_records WHERE 1=1");
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut data = QueryBuilder::<MySql>::new(
            r#"
            SELECT id, employee_id, month, year, total_present,
                   monthly_salary, net_salary, generated_on
            FROM payroll_records
            WHERE 1=1
            "#,
        );
        push_filter(&mut data, filter);
        data.push(" ORDER BY year DESC, month DESC, employee_id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let records: Vec<PayrollRecord> = data.build_query_as().fetch_all(&self.pool).await?;
        Ok((records, total))
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, MySql>, filter: &PayrollFilter) {
    if let Some(employee_id) = filter.employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(month) = filter.month {
        qb.push(" AND month = ").push_bind(month);
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
}

#[async_trait]
impl PayrollStore for MySqlPayrollStore {
    async fn active_employees(&self) -> AppResult<Vec<PayrollEmployee>> {
        let employees = sqlx::query_as::<_, PayrollEmployee>(
            "SELECT id, monthly_salary FROM employees WHERE status = 'Active' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn record_exists(&self, employee_id: u64, period: PayrollPeriod) -> AppResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payroll_records
                WHERE employee_id = ? AND month = ? AND year = ?
            )
            "#,
        )
        .bind(employee_id)
        .bind(period.month)
        .bind(period.year)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn present_days(&self, employee_id: u64, period: PayrollPeriod) -> AppResult<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM attendance_logs
            WHERE employee_id = ?
              AND status = 'Present'
              AND MONTH(date) = ?
              AND YEAR(date) = ?
            "#,
        )
        .bind(employee_id)
        .bind(period.month)
        .bind(period.year)
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn insert_record(&self, record: &NewPayrollRecord) -> AppResult<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO payroll_records
                (employee_id, month, year, total_present, monthly_salary, net_salary)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.period.month)
        .bind(record.period.year)
        .bind(record.total_present)
        .bind(record.monthly_salary)
        .bind(record.net_salary)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }
}
