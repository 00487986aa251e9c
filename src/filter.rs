//! Review filter compilation.
//!
//! A [`ReviewFilter`] is an immutable set of optional constraints coming from
//! the caller. [`ReviewFilter::compile`] validates it and turns it into a
//! [`ReviewQuery`], which the store renders into SQL against the rating
//! index and the R*Tree location index, then refines with exact great-circle
//! distance.

use crate::error::{Result, ReviewError};
use crate::geo::{GeoBounds, GeoPoint};
use crate::models::review::{Rating, Review};
use rusqlite::types::Value;

/// Caller-supplied constraints for listing reviews.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewFilter {
    pub min_rating: Option<i64>,
    pub max_rating: Option<i64>,
    pub center: Option<GeoPoint>,
    pub radius_km: Option<f64>,
}

impl ReviewFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_rating(mut self, rating: i64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn max_rating(mut self, rating: i64) -> Self {
        self.max_rating = Some(rating);
        self
    }

    pub fn near(mut self, center: GeoPoint, radius_km: f64) -> Self {
        self.center = Some(center);
        self.radius_km = Some(radius_km);
        self
    }

    pub fn compile(&self) -> Result<ReviewQuery> {
        let min = self
            .min_rating
            .map(|v| bound("minRating", v))
            .transpose()?;
        let max = self
            .max_rating
            .map(|v| bound("maxRating", v))
            .transpose()?;

        if let Some(radius_km) = self.radius_km {
            if !radius_km.is_finite() || radius_km <= 0.0 {
                return Err(ReviewError::validation(format!(
                    "radiusKm must be a positive number, got {}",
                    radius_km
                )));
            }
        }

        let rating = if min.is_some() || max.is_some() {
            Some(RatingRange { min, max })
        } else {
            None
        };

        // Half a proximity spec is ignored rather than rejected.
        let proximity = match (self.center, self.radius_km) {
            (Some(center), Some(radius_km)) => Some(Proximity {
                center,
                radius_m: radius_km * 1000.0,
            }),
            _ => None,
        };

        Ok(ReviewQuery { rating, proximity })
    }
}

fn bound(name: &str, value: i64) -> Result<Rating> {
    Rating::new(value).map_err(|_| {
        ReviewError::validation(format!("{} must be between 1 and 5, got {}", name, value))
    })
}

/// Inclusive rating range; a missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingRange {
    pub min: Option<Rating>,
    pub max: Option<Rating>,
}

impl RatingRange {
    pub fn contains(&self, rating: Rating) -> bool {
        self.min.map_or(true, |min| rating >= min) && self.max.map_or(true, |max| rating <= max)
    }
}

/// Great-circle radius search around `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub center: GeoPoint,
    pub radius_m: f64,
}

impl Proximity {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.distance_to(point) <= self.radius_m
    }

    pub fn bounds(&self) -> GeoBounds {
        GeoBounds::around(&self.center, self.radius_m)
    }
}

/// A validated filter, ready for the store. Active predicates are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewQuery {
    pub rating: Option<RatingRange>,
    pub proximity: Option<Proximity>,
}

/// Parameterised SQL produced from a [`ReviewQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPlan {
    pub sql: String,
    pub params: Vec<Value>,
}

pub(crate) const REVIEW_COLUMNS: &str =
    "r.id, r.title, r.text, r.rating, r.lng, r.lat, r.created_at, r.updated_at";

impl ReviewQuery {
    /// Query with no predicates: every review, newest first.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.rating.is_none() && self.proximity.is_none()
    }

    /// Exact check of every active predicate.
    pub fn matches(&self, review: &Review) -> bool {
        self.rating.map_or(true, |range| range.contains(review.rating))
            && self
                .proximity
                .map_or(true, |near| near.contains(&review.location))
    }

    /// Render the candidate-selection SQL. The spatial part only narrows
    /// rows to the search circle's bounding box; callers must still apply
    /// [`ReviewQuery::matches`] to the returned rows.
    pub fn to_sql(&self) -> SqlPlan {
        let mut sql = format!("SELECT {} FROM reviews r", REVIEW_COLUMNS);
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(near) = &self.proximity {
            sql.push_str(" JOIN review_locations loc ON loc.seq = r.seq");
            let bounds = near.bounds();

            // Overlap tests tolerate the R*Tree's 32-bit rounding of points.
            clauses.push("loc.max_lat >= ? AND loc.min_lat <= ?".to_string());
            params.push(Value::Real(bounds.min_lat));
            params.push(Value::Real(bounds.max_lat));

            let spans: Vec<&str> = bounds
                .lng_spans
                .iter()
                .map(|_| "(loc.max_lng >= ? AND loc.min_lng <= ?)")
                .collect();
            clauses.push(format!("({})", spans.join(" OR ")));
            for (lo, hi) in &bounds.lng_spans {
                params.push(Value::Real(*lo));
                params.push(Value::Real(*hi));
            }
        }

        if let Some(range) = &self.rating {
            if let Some(min) = range.min {
                clauses.push("r.rating >= ?".to_string());
                params.push(Value::Integer(i64::from(min)));
            }
            if let Some(max) = range.max {
                clauses.push("r.rating <= ?".to_string());
                params.push(Value::Integer(i64::from(max)));
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY r.created_at DESC, r.seq ASC");

        SqlPlan { sql, params }
    }
}
