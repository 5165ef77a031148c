use serde::Serialize;

use crate::models::feedback::{FeedbackTotals, SolutionCount};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total_analyses: i64,
    pub total_feedback: i64,
    /// Mean star rating, two decimals. 0 when nobody rated.
    pub average_rating: f64,
    /// Share of feedback marked solved, in percent with one decimal.
    pub success_rate: f64,
    pub popular_solutions: Vec<SolutionCount>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn summarize(totals: FeedbackTotals) -> AnalyticsReport {
    let average_rating = if totals.rating_count > 0 {
        round_to(totals.rating_sum as f64 / totals.rating_count as f64, 2)
    } else {
        0.0
    };
    let success_rate = if totals.total_feedback > 0 {
        round_to(
            totals.solved_count as f64 / totals.total_feedback as f64 * 100.0,
            1,
        )
    } else {
        0.0
    };

    AnalyticsReport {
        total_analyses: totals.total_analyses,
        total_feedback: totals.total_feedback,
        average_rating,
        success_rate,
        popular_solutions: totals.popular,
    }
}
