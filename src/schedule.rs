//! Recurring assessment engine
//!
//! Running a schedule stamps out a fresh assessment from the standard's
//! master controls and advances the schedule's run markers. Each run creates
//! a new assessment; history is the point, so runs never merge.

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{
    now_rfc3339, Assessment, AssessmentStatus, Control, ControlStatus, Database, Schedule,
};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub assessment_id: String,
    pub controls_cloned: usize,
    pub next_run: String,
}

/// Assessment title for an automated run: `AUTO: {name} - {YYYY-MM-DD}`
pub fn auto_title(schedule_name: &str, date: chrono::NaiveDate) -> String {
    format!("AUTO: {} - {}", schedule_name, date.format("%Y-%m-%d"))
}

pub struct ScheduleEngine<'a> {
    db: &'a Database,
}

impl<'a> ScheduleEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Execute one due schedule
    pub fn run(&self, schedule_id: &str) -> Result<RunSummary, AppError> {
        let schedule = self.db.get_schedule(schedule_id)?;

        // A deleted standard does not block the run; the assessment keeps a
        // placeholder name.
        let standard_name = self
            .db
            .standard_name(&schedule.standard_id)?
            .unwrap_or_else(|| "Unknown Standard".to_string());

        info!(
            schedule = %schedule.name,
            standard = %standard_name,
            "running scheduled assessment"
        );

        let now = Utc::now();
        let assessment = Assessment {
            id: Uuid::new_v4().to_string(),
            title: auto_title(&schedule.name, now.date_naive()),
            system_id: schedule.system_id.clone(),
            standard_name,
            status: AssessmentStatus::InProgress,
            progress: 0,
            created_at: now_rfc3339(),
        };
        self.db.insert_assessment(&assessment)?;

        let controls_cloned = self.clone_master_controls(&schedule, &assessment.id)?;

        let next_run = (now + Duration::days(schedule.frequency.interval_days())).to_rfc3339();
        self.db
            .update_schedule_run(schedule_id, &now.to_rfc3339(), &next_run)?;

        info!(
            assessment = %assessment.id,
            controls = controls_cloned,
            "scheduled assessment created"
        );
        Ok(RunSummary {
            assessment_id: assessment.id,
            controls_cloned,
            next_run,
        })
    }

    /// Clone the standard's master controls into the new assessment. A
    /// standard with no masters yields an empty assessment with a warning,
    /// not an error.
    fn clone_master_controls(
        &self,
        schedule: &Schedule,
        assessment_id: &str,
    ) -> Result<usize, AppError> {
        let masters = self.db.master_controls_for_standard(&schedule.standard_id)?;
        if masters.is_empty() {
            warn!(
                schedule = %schedule.name,
                standard_id = %schedule.standard_id,
                "no master controls found for this standard"
            );
            return Ok(0);
        }

        let controls: Vec<Control> = masters
            .iter()
            .map(|m| Control {
                id: Uuid::new_v4().to_string(),
                assessment_id: assessment_id.to_string(),
                control_code: m.control_code.clone(),
                family: m.family.clone(),
                description: m.description.clone(),
                status: ControlStatus::NotStarted,
            })
            .collect();

        Ok(self.db.insert_controls(&controls)?)
    }
}
