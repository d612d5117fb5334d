use std::collections::HashMap;

use sqlx::PgPool;

pub fn mean_rating(scores: &[i32]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: i64 = scores.iter().map(|&s| s as i64).sum();
    total as f64 / scores.len() as f64
}

/// Ratings for several lawyers from one query. Every requested id gets an entry.
pub async fn lawyer_ratings(pool: &PgPool, lawyer_ids: &[i64]) -> Result<HashMap<i64, f64>, sqlx::Error> {
    if lawyer_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i32)> =
        sqlx::query_as("SELECT lawyer_id, rating FROM reviews WHERE lawyer_id = ANY($1)")
            .bind(lawyer_ids)
            .fetch_all(pool)
            .await?;

    let mut scores: HashMap<i64, Vec<i32>> = lawyer_ids.iter().map(|&id| (id, Vec::new())).collect();
    for (lawyer_id, rating) in rows {
        scores.entry(lawyer_id).or_default().push(rating);
    }
    Ok(scores
        .into_iter()
        .map(|(id, s)| (id, mean_rating(&s)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_reviews_rate_zero() {
        assert_eq!(mean_rating(&[]), 0.0);
    }

    #[test]
    fn mean_is_not_truncated() {
        assert_eq!(mean_rating(&[4, 5]), 4.5);
        assert!((mean_rating(&[1, 2, 2]) - 5.0 / 3.0).abs() < f64::EPSILON);
    }
}
