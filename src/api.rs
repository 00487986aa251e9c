#[cfg(feature = "ssr")]
use actix_cors::Cors;
#[cfg(feature = "ssr")]
use actix_web::{web, HttpResponse};
#[cfg(feature = "ssr")]
use crate::db::Database;
#[cfg(feature = "ssr")]
use crate::error::Result;
#[cfg(feature = "ssr")]
use tracing::info;

use crate::error::ReviewError;
use crate::filter::ReviewFilter;
use crate::geo::GeoPoint;
use crate::models::review::{ReviewDraft, ReviewId, ReviewPatch};
use serde::{Deserialize, Serialize};

/// `{ "longitude": .., "latitude": .. }` as sent by the review form.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct LocationInput {
    pub longitude: f64,
    pub latitude: f64,
}

impl TryFrom<LocationInput> for GeoPoint {
    type Error = ReviewError;

    fn try_from(input: LocationInput) -> std::result::Result<Self, Self::Error> {
        GeoPoint::new(input.longitude, input.latitude)
    }
}

/// Rating as posted by the review form: a number, or the text value of a
/// `<select>` such as `"4"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RatingInput {
    Int(i64),
    Text(String),
}

impl RatingInput {
    pub fn parse(&self) -> std::result::Result<i64, ReviewError> {
        match self {
            RatingInput::Int(value) => Ok(*value),
            RatingInput::Text(raw) => raw.trim().parse::<i64>().map_err(|_| {
                ReviewError::validation(format!("Rating must be a whole number, got '{}'", raw))
            }),
        }
    }
}

impl From<i64> for RatingInput {
    fn from(value: i64) -> Self {
        RatingInput::Int(value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateReviewRequest {
    pub title: String,
    pub text: String,
    pub rating: RatingInput,
    pub location: LocationInput,
}

impl TryFrom<CreateReviewRequest> for ReviewDraft {
    type Error = ReviewError;

    fn try_from(req: CreateReviewRequest) -> std::result::Result<Self, Self::Error> {
        Ok(ReviewDraft::new(
            req.title,
            req.text,
            req.rating.parse()?,
            GeoPoint::try_from(req.location)?,
        ))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateReviewRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<RatingInput>,
    pub location: Option<LocationInput>,
}

impl TryFrom<UpdateReviewRequest> for ReviewPatch {
    type Error = ReviewError;

    fn try_from(req: UpdateReviewRequest) -> std::result::Result<Self, Self::Error> {
        Ok(ReviewPatch {
            title: req.title,
            text: req.text,
            rating: req.rating.as_ref().map(RatingInput::parse).transpose()?,
            location: req.location.map(GeoPoint::try_from).transpose()?,
        })
    }
}

/// Raw list query string. Values arrive as text so that empty parameters
/// (`?minRating=`) can be treated as absent.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListParams {
    pub min_rating: Option<String>,
    pub max_rating: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub radius: Option<String>,
}

impl TryFrom<ReviewListParams> for ReviewFilter {
    type Error = ReviewError;

    fn try_from(params: ReviewListParams) -> std::result::Result<Self, Self::Error> {
        let min_rating = parse_param::<i64>("minRating", params.min_rating.as_deref())?;
        let max_rating = parse_param::<i64>("maxRating", params.max_rating.as_deref())?;
        let lat = parse_param::<f64>("lat", params.lat.as_deref())?;
        let lng = parse_param::<f64>("lng", params.lng.as_deref())?;
        let radius_km = parse_param::<f64>("radius", params.radius.as_deref())?;

        let center = match (lng, lat) {
            (Some(lng), Some(lat)) => Some(GeoPoint::new(lng, lat)?),
            _ => None,
        };

        Ok(ReviewFilter {
            min_rating,
            max_rating,
            center,
            radius_km,
        })
    }
}

fn parse_param<T: std::str::FromStr>(
    name: &str,
    raw: Option<&str>,
) -> std::result::Result<Option<T>, ReviewError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|_| {
            ReviewError::validation(format!("{} must be a number, got '{}'", name, value))
        }),
    }
}

#[cfg(feature = "ssr")]
pub async fn list_reviews(
    db: web::Data<Database>,
    params: web::Query<ReviewListParams>,
) -> Result<HttpResponse> {
    let filter = ReviewFilter::try_from(params.into_inner())?;
    let query = filter.compile()?;
    let reviews = db.query(&query).await?;
    info!("[API] Returning {} reviews", reviews.len());
    Ok(HttpResponse::Ok().json(reviews))
}

#[cfg(feature = "ssr")]
pub async fn get_review(db: web::Data<Database>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    let review = db.get_by_id(&id).await?;
    Ok(HttpResponse::Ok().json(review))
}

#[cfg(feature = "ssr")]
pub async fn create_review(
    db: web::Data<Database>,
    request: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse> {
    let draft = ReviewDraft::try_from(request.into_inner())?;
    let review = db.create(&draft).await?;
    info!("[API] Created review {}", review.id);
    Ok(HttpResponse::Created().json(review))
}

#[cfg(feature = "ssr")]
pub async fn update_review(
    db: web::Data<Database>,
    id: web::Path<String>,
    request: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    let patch = ReviewPatch::try_from(request.into_inner())?;
    let review = db.update(&id, &patch).await?;
    info!("[API] Updated review {}", review.id);
    Ok(HttpResponse::Ok().json(review))
}

#[cfg(feature = "ssr")]
pub async fn delete_review(db: web::Data<Database>, id: web::Path<String>) -> Result<HttpResponse> {
    let id = parse_id(&id)?;
    db.delete(&id).await?;
    info!("[API] Deleted review {}", id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Review deleted" })))
}

#[cfg(feature = "ssr")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Geo-Tagged Review Map API")
}

// An id that can never exist is reported the same way as a missing one.
#[cfg(feature = "ssr")]
fn parse_id(raw: &str) -> Result<ReviewId> {
    ReviewId::parse(raw).map_err(|_| ReviewError::NotFound(raw.to_string()))
}

/// Cross-origin policy for the browser client, which is served from a
/// different origin than the API.
#[cfg(feature = "ssr")]
pub fn cors() -> Cors {
    Cors::permissive()
}

/// Register the review routes on an actix app.
#[cfg(feature = "ssr")]
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Malformed bodies get the same `{ "message": .. }` reply as other bad input.
    let json_config = web::JsonConfig::default()
        .error_handler(|err, _req| ReviewError::validation(err.to_string()).into());

    cfg.app_data(json_config)
        .route("/", web::get().to(index))
        .service(
            web::scope("/api/reviews")
                .route("", web::get().to(list_reviews))
                .route("", web::post().to(create_review))
                .route("/{id}", web::get().to(get_review))
                .route("/{id}", web::patch().to(update_review))
                .route("/{id}", web::delete().to(delete_review)),
        );
}
