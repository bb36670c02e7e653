use chrono::Datelike;
use serde::Serialize;
use sqlx::FromRow;

use crate::domain::models::tour::Tour;

/// Tours with at least this average count towards the difficulty report.
pub const STATS_MIN_RATING: f64 = 4.5;

#[derive(Debug, Serialize, FromRow, Clone, PartialEq)]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonthlyPlan {
    pub month: u32,
    pub num_tour_starts: usize,
    pub tours: Vec<String>,
}

/// One row per month of `year` with at least one tour start, busiest first.
pub fn monthly_plan(tours: &[Tour], year: i32) -> Vec<MonthlyPlan> {
    let mut months: Vec<MonthlyPlan> = Vec::new();

    for tour in tours {
        for start in tour.start_dates.0.iter().filter(|d| d.year() == year) {
            let month = start.month();
            match months.iter_mut().find(|m| m.month == month) {
                Some(plan) => {
                    plan.num_tour_starts += 1;
                    plan.tours.push(tour.name.clone());
                }
                None => months.push(MonthlyPlan {
                    month,
                    num_tour_starts: 1,
                    tours: vec![tour.name.clone()],
                }),
            }
        }
    }

    months.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts).then(a.month.cmp(&b.month)));
    months
}
