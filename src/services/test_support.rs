//! In-memory stores for service tests.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use super::{
    payroll_batch::{InsertOutcome, PayrollStore},
    report_lifecycle::ReportStore,
};
use crate::{
    error::{AppError, AppResult},
    model::{
        activity_log::NewActivity,
        file_upload::StoredFile,
        payroll::{NewPayrollRecord, PayrollEmployee, PayrollPeriod},
        report::{ReportPeriod, ReportRecord, ReportStatus},
    },
};

#[derive(Default)]
pub struct MemoryReportStore {
    rows: Mutex<HashMap<ReportPeriod, ReportRecord>>,
    activity: Mutex<Vec<NewActivity>>,
    next_id: AtomicU64,
    /// Makes `record_submission` fail like a dropped connection.
    pub fail_writes: AtomicBool,
    /// Makes `record_submission` see the period as locked.
    pub lock_before_write: AtomicBool,
}

impl MemoryReportStore {
    pub fn activity(&self) -> Vec<NewActivity> {
        self.activity.lock().unwrap().clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn find(&self, period: &ReportPeriod) -> AppResult<Option<ReportRecord>> {
        Ok(self.rows.lock().unwrap().get(period).cloned())
    }

    async fn record_submission(
        &self,
        period: &ReportPeriod,
        submitted_by: u64,
        _file: &StoredFile,
    ) -> AppResult<u64> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        if self.lock_before_write.load(Ordering::SeqCst) {
            return Err(AppError::forbidden("Report is locked"));
        }

        let file_id = self.next_id();
        let mut rows = self.rows.lock().unwrap();

        if rows.get(period).is_some_and(|r| r.status == ReportStatus::Locked) {
            return Err(AppError::forbidden("Report is locked"));
        }

        let id = rows.get(period).map_or_else(|| self.next_id(), |r| r.id);
        let record = rows.entry(period.clone()).or_insert_with(|| ReportRecord {
            id,
            report_type: period.report_type.clone(),
            month: period.month.clone(),
            year: period.year,
            status: ReportStatus::Submitted,
            submitted_by: None,
            submitted_at: None,
            approved_by: None,
            approved_at: None,
            locked_by: None,
            locked_at: None,
            file_id: None,
        });
        record.status = ReportStatus::Submitted;
        record.submitted_by = Some(submitted_by);
        record.submitted_at = Some(Utc::now());
        record.approved_by = None;
        record.approved_at = None;
        record.file_id = Some(file_id);

        self.activity.lock().unwrap().push(NewActivity {
            user_id: submitted_by,
            action: "report.submit",
            entity_type: "report",
            entity_ref: period.entity_ref(),
            details: None,
        });
        Ok(file_id)
    }

    async fn transition(
        &self,
        period: &ReportPeriod,
        to: ReportStatus,
        actor: u64,
    ) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(record) = rows.get_mut(period) else {
            return Ok(false);
        };
        if Some(record.status) != to.required_prior() {
            return Ok(false);
        }

        let action = match to {
            ReportStatus::Approved => {
                record.approved_by = Some(actor);
                record.approved_at = Some(Utc::now());
                "report.approve"
            }
            ReportStatus::Locked => {
                record.locked_by = Some(actor);
                record.locked_at = Some(Utc::now());
                "report.lock"
            }
            _ => return Ok(false),
        };
        record.status = to;

        self.activity.lock().unwrap().push(NewActivity {
            user_id: actor,
            action,
            entity_type: "report",
            entity_ref: period.entity_ref(),
            details: None,
        });
        Ok(true)
    }
}

#[derive(Default)]
pub struct MemoryPayrollStore {
    employees: Mutex<Vec<PayrollEmployee>>,
    present: Mutex<HashMap<u64, u32>>,
    records: Mutex<HashMap<(u64, PayrollPeriod), NewPayrollRecord>>,
    failing_attendance: Mutex<HashSet<u64>>,
    colliding_inserts: Mutex<HashSet<u64>>,
}

impl MemoryPayrollStore {
    pub fn add_employee(&self, id: u64, monthly_salary: f64, present_days: u32) {
        self.employees
            .lock()
            .unwrap()
            .push(PayrollEmployee { id, monthly_salary });
        self.present.lock().unwrap().insert(id, present_days);
    }

    pub fn fail_attendance_for(&self, employee_id: u64) {
        self.failing_attendance.lock().unwrap().insert(employee_id);
    }

    pub fn collide_on_insert_for(&self, employee_id: u64) {
        self.colliding_inserts.lock().unwrap().insert(employee_id);
    }

    pub fn record(&self, employee_id: u64, period: PayrollPeriod) -> Option<NewPayrollRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(employee_id, period))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl PayrollStore for MemoryPayrollStore {
    async fn active_employees(&self) -> AppResult<Vec<PayrollEmployee>> {
        Ok(self.employees.lock().unwrap().clone())
    }

    async fn record_exists(&self, employee_id: u64, period: PayrollPeriod) -> AppResult<bool> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .contains_key(&(employee_id, period)))
    }

    async fn present_days(&self, employee_id: u64, _period: PayrollPeriod) -> AppResult<u32> {
        if self.failing_attendance.lock().unwrap().contains(&employee_id) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self
            .present
            .lock()
            .unwrap()
            .get(&employee_id)
            .copied()
            .unwrap_or(0))
    }

    async fn insert_record(&self, record: &NewPayrollRecord) -> AppResult<InsertOutcome> {
        if self
            .colliding_inserts
            .lock()
            .unwrap()
            .contains(&record.employee_id)
        {
            return Ok(InsertOutcome::Duplicate);
        }

        let key = (record.employee_id, record.period);
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            return Ok(InsertOutcome::Duplicate);
        }
        records.insert(key, record.clone());
        Ok(InsertOutcome::Inserted)
    }
}
