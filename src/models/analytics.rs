//! Analytics response models

use serde::Serialize;
use uuid::Uuid;

/// Performance summary for one kid
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KidAnalytics {
    pub kid_profile_id: Uuid,
    pub name: String,
    pub worksheets_generated: i64,
    pub worksheets_completed: i64,
    pub average_score: Option<f64>,
    pub learning_curve: Option<LearningCurve>,
    /// Scores in completion order
    pub scores: Vec<i64>,
}

/// Least-squares fit of score against worksheet index
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningCurve {
    /// Score change per completed worksheet
    pub slope: f64,
    pub intercept: f64,
    /// Projected score of the next worksheet, clamped to 0..=100
    pub predicted_next_score: f64,
}

/// Totals across all of a user's kids
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub kids: i64,
    pub worksheets_generated: i64,
    pub worksheets_completed: i64,
    pub average_score: Option<f64>,
}
