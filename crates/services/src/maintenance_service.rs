use std::sync::Arc;

use storage::repository::{ResetReport, StatisticsMaintenance};

use crate::error::MaintenanceError;

/// Administrative bulk operations.
#[derive(Clone)]
pub struct MaintenanceService {
    maintenance: Arc<dyn StatisticsMaintenance>,
}

impl MaintenanceService {
    #[must_use]
    pub fn new(maintenance: Arc<dyn StatisticsMaintenance>) -> Self {
        Self { maintenance }
    }

    /// Wipe answer history and rollup statistics, keeping questions,
    /// profiles and authored-question counts.
    ///
    /// # Errors
    ///
    /// Returns `MaintenanceError::Storage` if the reset fails; nothing is
    /// applied in that case.
    pub async fn reset_statistics(&self) -> Result<ResetReport, MaintenanceError> {
        let report = self.maintenance.reset_statistics().await?;
        tracing::info!(
            users = report.users,
            answers_deleted = report.answers_deleted,
            questions = report.questions,
            "statistics reset"
        );
        Ok(report)
    }
}
