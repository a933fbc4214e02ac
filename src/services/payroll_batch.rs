//! Monthly payroll run.
//!
//! Employees are processed one at a time. A failure for one employee is
//! logged and counted, and the run continues with the next one. Existing
//! records are never touched, so re-running a period only fills the gaps.

use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::{
    error::AppResult,
    model::payroll::{
        NewPayrollRecord, PayrollEmployee, PayrollPeriod, PayrollRunSummary, ProrationPolicy,
        compute_net_salary,
    },
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// The unique key already held a record, e.g. from a concurrent run.
    Duplicate,
}

#[async_trait]
pub trait PayrollStore: Send + Sync {
    async fn active_employees(&self) -> AppResult<Vec<PayrollEmployee>>;

    async fn record_exists(&self, employee_id: u64, period: PayrollPeriod) -> AppResult<bool>;

    /// Number of `Present` attendance rows in the period.
    async fn present_days(&self, employee_id: u64, period: PayrollPeriod) -> AppResult<u32>;

    async fn insert_record(&self, record: &NewPayrollRecord) -> AppResult<InsertOutcome>;
}

enum EmployeeOutcome {
    Created,
    Skipped,
}

#[instrument(
    name = "payroll_generate",
    skip(store),
    fields(month = period.month, year = period.year)
)]
pub async fn generate<S: PayrollStore + ?Sized>(
    store: &S,
    period: PayrollPeriod,
    policy: ProrationPolicy,
) -> AppResult<PayrollRunSummary> {
    let employees = store.active_employees().await?;
    let divisor = policy.divisor(period);

    info!(employees = employees.len(), divisor, %policy, "Payroll run started");

    let mut summary = PayrollRunSummary {
        month: period.month,
        year: period.year,
        ..Default::default()
    };

    for employee in &employees {
        match process_employee(store, employee, period, divisor).await {
            Ok(EmployeeOutcome::Created) => summary.successful_records += 1,
            Ok(EmployeeOutcome::Skipped) => summary.skipped_duplicates += 1,
            Err(e) => {
                error!(error = %e, employee_id = employee.id, "Payroll failed for employee");
                summary.errors += 1;
                summary.failed_employee_ids.push(employee.id);
            }
        }
    }

    info!(
        successful = summary.successful_records,
        skipped = summary.skipped_duplicates,
        errors = summary.errors,
        "Payroll run finished"
    );

    Ok(summary)
}

async fn process_employee<S: PayrollStore + ?Sized>(
    store: &S,
    employee: &PayrollEmployee,
    period: PayrollPeriod,
    divisor: u32,
) -> AppResult<EmployeeOutcome> {
    if store.record_exists(employee.id, period).await? {
        return Ok(EmployeeOutcome::Skipped);
    }

    let total_present = store.present_days(employee.id, period).await?;
    let record = NewPayrollRecord {
        employee_id: employee.id,
        period,
        total_present,
        monthly_salary: employee.monthly_salary,
        net_salary: compute_net_salary(employee.monthly_salary, total_present, divisor),
    };

    match store.insert_record(&record).await? {
        InsertOutcome::Inserted => Ok(EmployeeOutcome::Created),
        InsertOutcome::Duplicate => Ok(EmployeeOutcome::Skipped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::MemoryPayrollStore;

    fn march() -> PayrollPeriod {
        PayrollPeriod::new(3, 2025).unwrap()
    }

    fn store_with(staff: &[(u64, f64, u32)]) -> MemoryPayrollStore {
        let store = MemoryPayrollStore::default();
        for &(id, salary, present) in staff {
            store.add_employee(id, salary, present);
        }
        store
    }

    #[actix_web::test]
    async fn salary_is_prorated_by_present_days() {
        let store = store_with(&[(1, 3000.0, 20)]);

        let summary = generate(&store, march(), ProrationPolicy::Fixed30).await.unwrap();

        assert_eq!(summary.successful_records, 1);
        let record = store.record(1, march()).unwrap();
        assert_eq!(record.total_present, 20);
        assert_eq!(record.net_salary, 2000.0);
    }

    #[actix_web::test]
    async fn rerun_skips_every_employee() {
        let store = store_with(&[(1, 3000.0, 20), (2, 4500.0, 22), (3, 2000.0, 0)]);

        let first = generate(&store, march(), ProrationPolicy::Fixed30).await.unwrap();
        assert_eq!(first.successful_records, 3);

        let second = generate(&store, march(), ProrationPolicy::Fixed30).await.unwrap();
        assert_eq!(second.successful_records, 0);
        assert_eq!(second.skipped_duplicates, 3);
        assert_eq!(second.errors, 0);
        assert_eq!(store.record_count(), 3);
    }

    #[actix_web::test]
    async fn one_failing_employee_does_not_abort_the_run() {
        let store = store_with(&[(1, 3000.0, 20), (2, 3000.0, 10), (3, 3000.0, 30)]);
        store.fail_attendance_for(2);

        let summary = generate(&store, march(), ProrationPolicy::Fixed30).await.unwrap();

        assert_eq!(summary.successful_records, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.failed_employee_ids, vec![2]);
        assert!(store.record(1, march()).is_some());
        assert!(store.record(2, march()).is_none());
        assert!(store.record(3, march()).is_some());
    }

    #[actix_web::test]
    async fn concurrent_insert_collision_counts_as_skip() {
        let store = store_with(&[(1, 3000.0, 20)]);
        store.collide_on_insert_for(1);

        let summary = generate(&store, march(), ProrationPolicy::Fixed30).await.unwrap();
        assert_eq!(summary.successful_records, 0);
        assert_eq!(summary.skipped_duplicates, 1);
        assert_eq!(summary.errors, 0);
    }

    #[actix_web::test]
    async fn calendar_policy_divides_by_days_in_month() {
        let store = store_with(&[(1, 2800.0, 14)]);
        let feb = PayrollPeriod::new(2, 2025).unwrap();

        generate(&store, feb, ProrationPolicy::Calendar).await.unwrap();

        // 2800 / 28 * 14
        assert_eq!(store.record(1, feb).unwrap().net_salary, 1400.0);
    }

    #[actix_web::test]
    async fn no_active_employees_yields_empty_summary() {
        let store = MemoryPayrollStore::default();
        let summary = generate(&store, march(), ProrationPolicy::Fixed30).await.unwrap();
        assert_eq!(summary.successful_records + summary.skipped_duplicates + summary.errors, 0);
        assert_eq!(summary.month, 3);
        assert_eq!(summary.year, 2025);
    }
}
