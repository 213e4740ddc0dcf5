/// Maintenance Scheduler
/// Runs the daily housekeeping pass (overdue detection, recurring generation)
/// on a cron schedule while the engine stays open across midnight
use crate::error::{AppError, Result};
use crate::services::{InvoicesService, RecurringService};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceReport {
    pub overdue: Vec<String>,
    pub generated: Vec<String>,
}

/// Overdue detection followed by recurring generation, as on startup
#[derive(Clone)]
pub struct Maintenance {
    invoices: InvoicesService,
    recurring: RecurringService,
}

impl Maintenance {
    pub fn new(invoices: InvoicesService, recurring: RecurringService) -> Self {
        Self {
            invoices,
            recurring,
        }
    }

    pub fn run(&self, today: NaiveDate) -> Result<MaintenanceReport> {
        let overdue = self.invoices.detect_overdue(today)?;
        let generated = self
            .recurring
            .generate_due(today)?
            .into_iter()
            .map(|i| i.body.document_number)
            .collect();

        Ok(MaintenanceReport { overdue, generated })
    }
}

/// Scheduler service for the daily maintenance pass
pub struct SchedulerService {
    scheduler: Arc<RwLock<JobScheduler>>,
    maintenance: Arc<Maintenance>,
    current_job_id: Arc<RwLock<Option<Uuid>>>,
}

impl SchedulerService {
    pub async fn new(maintenance: Maintenance) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Generic(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            maintenance: Arc::new(maintenance),
            current_job_id: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Generic(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    /// Schedule the maintenance pass with a 6-field cron expression
    pub async fn schedule_maintenance(&self, cron_expr: &str) -> Result<()> {
        self.cancel_maintenance().await?;

        let maintenance = Arc::clone(&self.maintenance);
        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let maintenance = Arc::clone(&maintenance);
            Box::pin(async move {
                let today = Local::now().date_naive();
                tracing::info!("Running scheduled maintenance for {}", today);

                match maintenance.run(today) {
                    Ok(report) => tracing::info!(
                        "Maintenance done: {} overdue, {} generated",
                        report.overdue.len(),
                        report.generated.len()
                    ),
                    Err(e) => tracing::error!("Scheduled maintenance failed: {}", e),
                }
            })
        })
        .map_err(|e| AppError::Generic(format!("Failed to create maintenance job: {}", e)))?;

        let job_id = job.guid();

        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Generic(format!("Failed to schedule job: {}", e)))?;

        let mut current_job = self.current_job_id.write().await;
        *current_job = Some(job_id);

        tracing::info!("Maintenance scheduled ({})", cron_expr);
        Ok(())
    }

    pub async fn cancel_maintenance(&self) -> Result<()> {
        let mut current_job = self.current_job_id.write().await;

        if let Some(job_id) = *current_job {
            let scheduler = self.scheduler.write().await;
            scheduler
                .remove(&job_id)
                .await
                .map_err(|e| AppError::Generic(format!("Failed to remove job: {}", e)))?;

            *current_job = None;
            tracing::info!("Maintenance schedule cancelled");
        }

        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Generic(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Maintenance scheduler shutdown");
        Ok(())
    }
}
