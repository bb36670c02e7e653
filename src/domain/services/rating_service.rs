use crate::domain::models::tour::{round_rating, DEFAULT_RATINGS_AVERAGE};
use crate::domain::ports::{ReviewRepository, TourRepository};
use crate::error::AppError;
use tracing::debug;

/// Recomputes a tour's rating aggregates from all of its reviews. A tour
/// without reviews falls back to the default average and zero ratings.
pub async fn recalculate_tour_ratings(
    reviews: &dyn ReviewRepository,
    tours: &dyn TourRepository,
    tour_id: &str,
) -> Result<(), AppError> {
    let (average, quantity) = match reviews.rating_stats(tour_id).await? {
        (count, Some(avg)) if count > 0 => (round_rating(avg), count as i32),
        _ => (DEFAULT_RATINGS_AVERAGE, 0),
    };

    debug!(tour_id, average, quantity, "updating tour ratings");
    tours.update_ratings(tour_id, average, quantity).await
}
