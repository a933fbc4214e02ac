//! Report period workflow: `Draft -> Submitted -> Approved -> Locked`.
//!
//! The functions here are store-agnostic; `db::reports::MySqlReportStore` is
//! the production implementation. Every transition is conditional on the
//! prior status, and a call that finds the period in any other state fails
//! with an explicit error instead of being ignored.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    model::{
        file_upload::{IncomingFile, StoredFile},
        report::{ReportAudit, ReportPeriod, ReportRecord, ReportStatus},
    },
    utils::uploads::UploadStore,
};

/// Uploads for reports live under `<upload_dir>/reports/`.
pub const REPORT_UPLOAD_CATEGORY: &str = "reports";

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn find(&self, period: &ReportPeriod) -> AppResult<Option<ReportRecord>>;

    /// Registers `file` and upserts the period as `Submitted`, together with
    /// its audit entry, as one unit. Implementations re-check the lock inside
    /// that unit and fail with `Forbidden` if the period is locked.
    /// Returns the id of the new file row.
    async fn record_submission(
        &self,
        period: &ReportPeriod,
        submitted_by: u64,
        file: &StoredFile,
    ) -> AppResult<u64>;

    /// Moves the period into `to` if it is currently in `to.required_prior()`.
    /// Returns `false` when no row was in that prior state.
    async fn transition(&self, period: &ReportPeriod, to: ReportStatus, actor: u64)
    -> AppResult<bool>;
}

pub async fn get_status<S: ReportStore + ?Sized>(
    store: &S,
    period: &ReportPeriod,
) -> AppResult<ReportStatus> {
    Ok(store
        .find(period)
        .await?
        .map_or(ReportStatus::Draft, |r| r.status))
}

pub async fn is_locked<S: ReportStore + ?Sized>(
    store: &S,
    period: &ReportPeriod,
) -> AppResult<bool> {
    Ok(get_status(store, period).await? == ReportStatus::Locked)
}

fn locked_error() -> AppError {
    AppError::forbidden("Report is locked")
}

/// Stores the uploaded file and marks the period `Submitted`.
///
/// The file is written before the database unit and removed again if that
/// unit fails, so a failed submission never leaves an unreferenced file.
pub async fn submit<S: ReportStore + ?Sized>(
    store: &S,
    uploads: &UploadStore,
    period: &ReportPeriod,
    submitted_by: u64,
    file: IncomingFile,
) -> AppResult<u64> {
    if is_locked(store, period).await? {
        warn!(%period, submitted_by, "Submission rejected, report is locked");
        return Err(locked_error());
    }
    if file.bytes.is_empty() {
        return Err(AppError::validation("Uploaded file is empty"));
    }

    let stored = uploads.persist(REPORT_UPLOAD_CATEGORY, &file).await?;

    match store.record_submission(period, submitted_by, &stored).await {
        Ok(file_id) => {
            info!(%period, submitted_by, file_id, "Report submitted");
            Ok(file_id)
        }
        Err(e) => {
            uploads.discard(&stored).await;
            Err(e)
        }
    }
}

pub async fn approve<S: ReportStore + ?Sized>(
    store: &S,
    period: &ReportPeriod,
    approved_by: u64,
) -> AppResult<()> {
    if is_locked(store, period).await? {
        return Err(locked_error());
    }
    advance(store, period, ReportStatus::Approved, approved_by).await
}

pub async fn lock<S: ReportStore + ?Sized>(
    store: &S,
    period: &ReportPeriod,
    locked_by: u64,
) -> AppResult<()> {
    advance(store, period, ReportStatus::Locked, locked_by).await
}

pub async fn audit<S: ReportStore + ?Sized>(
    store: &S,
    period: &ReportPeriod,
) -> AppResult<ReportAudit> {
    Ok(ReportAudit::from(store.find(period).await?))
}

async fn advance<S: ReportStore + ?Sized>(
    store: &S,
    period: &ReportPeriod,
    to: ReportStatus,
    actor: u64,
) -> AppResult<()> {
    let expected = to
        .required_prior()
        .ok_or_else(|| AppError::Internal(format!("{} is not a transition target", to)))?;

    if store.transition(period, to, actor).await? {
        info!(%period, actor, status = %to, "Report status changed");
        return Ok(());
    }

    match store.find(period).await? {
        None => Err(AppError::not_found(format!(
            "No submitted report for {}",
            period
        ))),
        Some(r) if r.status == ReportStatus::Locked && to == ReportStatus::Locked => {
            Err(AppError::conflict("Report is already locked"))
        }
        Some(r) if r.status == ReportStatus::Locked => Err(locked_error()),
        Some(r) => Err(AppError::conflict(format!(
            "Report is {}, expected {}",
            r.status, expected
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::MemoryReportStore;
    use std::sync::atomic::Ordering;
    use tempfile::{TempDir, tempdir};

    fn march() -> ReportPeriod {
        ReportPeriod::new("monthly", "March", 2025).unwrap()
    }

    fn pdf(name: &str) -> IncomingFile {
        IncomingFile {
            original_name: name.to_string(),
            mime_type: Some("application/pdf".into()),
            bytes: b"%PDF-1.4 report".to_vec(),
        }
    }

    fn setup() -> (MemoryReportStore, UploadStore, TempDir) {
        let dir = tempdir().unwrap();
        let uploads = UploadStore::new(dir.path());
        (MemoryReportStore::default(), uploads, dir)
    }

    fn stored_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join(REPORT_UPLOAD_CATEGORY))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[actix_web::test]
    async fn missing_row_is_draft_and_unlocked() {
        let (store, _, _dir) = setup();
        assert_eq!(get_status(&store, &march()).await.unwrap(), ReportStatus::Draft);
        assert!(!is_locked(&store, &march()).await.unwrap());
    }

    #[actix_web::test]
    async fn submit_marks_submitted_and_records_who() {
        let (store, uploads, dir) = setup();

        let file_id = submit(&store, &uploads, &march(), 7, pdf("march.pdf")).await.unwrap();

        let audit = audit(&store, &march()).await.unwrap();
        assert_eq!(audit.status, ReportStatus::Submitted);
        assert_eq!(audit.submitted_by, Some(7));
        assert!(audit.submitted_at.is_some());
        assert_eq!(audit.file_id, Some(file_id));
        assert_eq!(stored_files(&dir), 1);

        let actions: Vec<_> = store.activity().iter().map(|a| a.action).collect();
        assert_eq!(actions, vec!["report.submit"]);
    }

    #[actix_web::test]
    async fn resubmission_overwrites_submitter_and_file() {
        let (store, uploads, _dir) = setup();

        let first = submit(&store, &uploads, &march(), 7, pdf("v1.pdf")).await.unwrap();
        approve(&store, &march(), 1).await.unwrap();
        let second = submit(&store, &uploads, &march(), 8, pdf("v2.pdf")).await.unwrap();

        let audit = audit(&store, &march()).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(audit.status, ReportStatus::Submitted);
        assert_eq!(audit.submitted_by, Some(8));
        assert_eq!(audit.file_id, Some(second));
        assert_eq!(audit.approved_by, None);
    }

    #[actix_web::test]
    async fn approve_requires_submitted() {
        let (store, uploads, _dir) = setup();

        let err = approve(&store, &march(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(get_status(&store, &march()).await.unwrap(), ReportStatus::Draft);

        submit(&store, &uploads, &march(), 7, pdf("march.pdf")).await.unwrap();
        approve(&store, &march(), 1).await.unwrap();

        let err = approve(&store, &march(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(get_status(&store, &march()).await.unwrap(), ReportStatus::Approved);
    }

    #[actix_web::test]
    async fn lock_requires_approved() {
        let (store, uploads, _dir) = setup();
        submit(&store, &uploads, &march(), 7, pdf("march.pdf")).await.unwrap();

        let err = lock(&store, &march(), 2).await.unwrap_err();
        assert_eq!(err.to_string(), "Report is Submitted, expected Approved");
        assert_eq!(get_status(&store, &march()).await.unwrap(), ReportStatus::Submitted);
    }

    #[actix_web::test]
    async fn full_lifecycle_then_locked_rejects_everything() {
        let (store, uploads, dir) = setup();
        let period = march();

        submit(&store, &uploads, &period, 7, pdf("march.pdf")).await.unwrap();
        assert_eq!(get_status(&store, &period).await.unwrap(), ReportStatus::Submitted);

        approve(&store, &period, 1).await.unwrap();
        assert_eq!(get_status(&store, &period).await.unwrap(), ReportStatus::Approved);

        lock(&store, &period, 2).await.unwrap();
        assert_eq!(get_status(&store, &period).await.unwrap(), ReportStatus::Locked);
        assert!(is_locked(&store, &period).await.unwrap());

        let err = submit(&store, &uploads, &period, 1, pdf("late.pdf")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Report is locked"));

        let err = approve(&store, &period, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = lock(&store, &period, 2).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // the rejected upload never reached the disk
        assert_eq!(stored_files(&dir), 1);

        let audit = audit(&store, &period).await.unwrap();
        assert_eq!(audit.submitted_by, Some(7));
        assert_eq!(audit.approved_by, Some(1));
        assert_eq!(audit.locked_by, Some(2));
        assert_eq!(store.activity().len(), 3);
    }

    #[actix_web::test]
    async fn failed_write_removes_uploaded_file() {
        let (store, uploads, dir) = setup();
        store.fail_writes.store(true, Ordering::SeqCst);

        let err = submit(&store, &uploads, &march(), 7, pdf("march.pdf")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(stored_files(&dir), 0);
        assert_eq!(get_status(&store, &march()).await.unwrap(), ReportStatus::Draft);
    }

    #[actix_web::test]
    async fn lock_taken_during_upload_is_respected() {
        let (store, uploads, dir) = setup();
        store.lock_before_write.store(true, Ordering::SeqCst);

        let err = submit(&store, &uploads, &march(), 7, pdf("march.pdf")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(stored_files(&dir), 0);
    }

    #[actix_web::test]
    async fn empty_upload_is_rejected() {
        let (store, uploads, _dir) = setup();
        let mut file = pdf("empty.pdf");
        file.bytes.clear();

        let err = submit(&store, &uploads, &march(), 7, file).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn periods_are_independent() {
        let (store, uploads, _dir) = setup();
        let april = ReportPeriod::new("monthly", "April", 2025).unwrap();

        submit(&store, &uploads, &march(), 7, pdf("march.pdf")).await.unwrap();
        assert_eq!(get_status(&store, &april).await.unwrap(), ReportStatus::Draft);
    }
}
