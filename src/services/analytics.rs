//! Per-kid performance analytics

use anyhow::Result;
use uuid::Uuid;

use crate::db::{DbPool, KidProfileRepository, WorksheetRepository};
use crate::models::{AnalyticsOverview, KidAnalytics, KidProfile, LearningCurve, Worksheet};

/// Least-squares line through `(index, score)`; needs at least two scores
pub fn learning_curve(scores: &[i64]) -> Option<LearningCurve> {
    if scores.len() < 2 {
        return None;
    }

    let n = scores.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = scores.iter().sum::<i64>() as f64 / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &score) in scores.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (score as f64 - mean_y);
        sxx += dx * dx;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let predicted_next_score = (intercept + slope * n).clamp(0.0, 100.0);

    Some(LearningCurve {
        slope,
        intercept,
        predicted_next_score,
    })
}

fn average(scores: &[i64]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<i64>() as f64 / scores.len() as f64)
    }
}

/// Scores of completed worksheets ordered by completion time
fn completed_scores(worksheets: &[Worksheet]) -> Vec<i64> {
    let mut completed: Vec<_> = worksheets
        .iter()
        .filter_map(|w| Some((w.completed_at?, w.score?)))
        .collect();
    completed.sort_by_key(|(at, _)| *at);
    completed.into_iter().map(|(_, score)| score).collect()
}

pub fn summarize_kid(kid: &KidProfile, worksheets: &[Worksheet]) -> KidAnalytics {
    let scores = completed_scores(worksheets);
    KidAnalytics {
        kid_profile_id: kid.id,
        name: kid.name.clone(),
        worksheets_generated: worksheets.len() as i64,
        worksheets_completed: scores.len() as i64,
        average_score: average(&scores),
        learning_curve: learning_curve(&scores),
        scores,
    }
}

pub struct AnalyticsService<'a> {
    pool: &'a DbPool,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Analytics for one of `user_id`'s kids; `None` if the kid is not theirs
    pub async fn for_kid(&self, user_id: Uuid, kid_id: Uuid) -> Result<Option<KidAnalytics>> {
        let Some(kid) = KidProfileRepository::new(self.pool)
            .get_for_user(user_id, kid_id)
            .await?
        else {
            return Ok(None);
        };
        let worksheets = WorksheetRepository::new(self.pool).list_for_kid(kid.id).await?;
        Ok(Some(summarize_kid(&kid, &worksheets)))
    }

    pub async fn overview(&self, user_id: Uuid) -> Result<AnalyticsOverview> {
        let kids = KidProfileRepository::new(self.pool)
            .list_for_user(user_id)
            .await?;
        let worksheets = WorksheetRepository::new(self.pool)
            .list_for_user(user_id, None)
            .await?;
        let scores = completed_scores(&worksheets);

        Ok(AnalyticsOverview {
            kids: kids.len() as i64,
            worksheets_generated: worksheets.len() as i64,
            worksheets_completed: scores.len() as i64,
            average_score: average(&scores),
        })
    }
}
