//! Sample reviews used to populate a fresh database.

use crate::db::Database;
use crate::error::Result;
use crate::geo::GeoPoint;
use crate::models::review::ReviewDraft;
use tracing::info;

const SAMPLES: &[(&str, &str, i64, f64, f64)] = &[
    (
        "Beautiful Beach View",
        "Absolutely stunning location with crystal clear water and white sand. Perfect for a weekend getaway!",
        5,
        72.8372,
        19.0760,
    ),
    (
        "Great Mountain Hike",
        "Challenging but rewarding hike with breathtaking views at the summit. Highly recommend for adventure seekers.",
        4,
        77.5676,
        30.3165,
    ),
    (
        "Delicious Street Food",
        "Amazing variety of local cuisine at affordable prices. The flavors are authentic and unforgettable.",
        5,
        77.2090,
        28.7041,
    ),
    (
        "Peaceful Temple Visit",
        "Serene atmosphere and beautiful architecture. A great place for meditation and reflection.",
        4,
        74.0856,
        24.7671,
    ),
    (
        "Historical Fort Tour",
        "Fascinating history and well-preserved structures. The guide provided excellent insights into the region's past.",
        4,
        73.0499,
        26.2850,
    ),
    (
        "Scenic Waterfall",
        "Majestic waterfall surrounded by lush greenery. The sound of falling water is incredibly soothing.",
        5,
        74.8654,
        15.4148,
    ),
    (
        "Lively Market Experience",
        "Bustling marketplace with colorful stalls and friendly vendors. Great place to shop for souvenirs.",
        3,
        73.8553,
        18.5204,
    ),
    (
        "Cultural Festival",
        "Incredible display of local traditions and performances. The vibrant costumes and music were mesmerizing.",
        5,
        72.8759,
        19.0760,
    ),
];

pub fn sample_reviews() -> Result<Vec<ReviewDraft>> {
    SAMPLES
        .iter()
        .map(|(title, text, rating, lng, lat)| {
            Ok(ReviewDraft::new(*title, *text, *rating, GeoPoint::new(*lng, *lat)?))
        })
        .collect()
}

/// Replace the store's contents with the sample reviews.
pub async fn populate(db: &Database) -> Result<usize> {
    let removed = db.clear().await?;
    info!("[SEED] Cleared {} existing reviews", removed);

    let drafts = sample_reviews()?;
    for draft in &drafts {
        db.create(draft).await?;
    }
    info!("[SEED] Inserted {} sample reviews", drafts.len());
    Ok(drafts.len())
}
