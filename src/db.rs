mod db_impl {
    use crate::error::{Result, ReviewError};
    use crate::filter::{ReviewQuery, REVIEW_COLUMNS};
    use crate::geo::GeoPoint;
    use crate::models::review::{Rating, Review, ReviewContent, ReviewDraft, ReviewId, ReviewPatch};
    use chrono::{DateTime, Utc};
    use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::{debug, info};

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::filter::ReviewFilter;

        // Helper function to create test database
        async fn create_test_db() -> Database {
            debug!("[TEST] Creating in-memory test database");
            let db = Database::new(":memory:").unwrap();
            db.create_schema().await.unwrap();
            db
        }

        fn point(lng: f64, lat: f64) -> GeoPoint {
            GeoPoint::new(lng, lat).unwrap()
        }

        fn draft(title: &str, rating: i64, lng: f64, lat: f64) -> ReviewDraft {
            ReviewDraft::new(title, format!("{} review text", title), rating, point(lng, lat))
        }

        // Test database schema creation
        #[tokio::test]
        async fn test_schema_creation() {
            let db = create_test_db().await;

            let conn = db.conn.lock().await;
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'index')")
                .unwrap();
            let names: Vec<String> = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<_, _>>()
                .unwrap();

            assert!(names.contains(&"reviews".to_string()));
            assert!(names.contains(&"review_locations".to_string()));
            assert!(names.contains(&"idx_reviews_rating".to_string()));
            assert!(names.contains(&"idx_reviews_created_at".to_string()));
        }

        #[tokio::test]
        async fn test_schema_creation_is_idempotent() {
            let db = create_test_db().await;
            db.create(&draft("Kept", 3, 10.0, 10.0)).await.unwrap();
            db.create_schema().await.unwrap();
            assert_eq!(db.count().await.unwrap(), 1);
        }

        // Review lifecycle: create, read, update, delete
        #[tokio::test]
        async fn test_full_review_lifecycle() {
            let db = create_test_db().await;
            let input = draft("Beautiful Beach View", 5, 72.8372, 19.0760);

            let created = db.create(&input).await.unwrap();
            assert_eq!(created.title, input.title);
            assert_eq!(created.text, input.text);
            assert_eq!(i64::from(created.rating), input.rating);
            assert_eq!(created.location, input.location);
            assert_eq!(created.created_at, created.updated_at);

            let fetched = db.get_by_id(&created.id).await.unwrap();
            assert_eq!(fetched, created);

            let patch = ReviewPatch {
                title: Some("Even Better Beach".into()),
                ..Default::default()
            };
            let updated = db.update(&created.id, &patch).await.unwrap();
            assert_eq!(updated.title, "Even Better Beach");
            assert_eq!(updated.text, created.text);
            assert_eq!(updated.created_at, created.created_at);
            assert!(updated.updated_at >= created.updated_at);
            assert_eq!(db.get_by_id(&created.id).await.unwrap(), updated);

            db.delete(&created.id).await.unwrap();
            assert!(db.get_by_id(&created.id).await.unwrap_err().is_not_found());
            assert_eq!(db.count().await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_create_rejects_invalid_draft() {
            let db = create_test_db().await;
            for rating in [0, 6] {
                let err = db.create(&draft("Bad", rating, 0.0, 0.0)).await.unwrap_err();
                assert!(err.is_validation());
            }
            assert!(db.create(&draft("Low", 1, 0.0, 0.0)).await.is_ok());
            assert!(db.create(&draft("High", 5, 0.0, 0.0)).await.is_ok());
            assert_eq!(db.count().await.unwrap(), 2);
        }

        #[tokio::test]
        async fn test_invalid_update_leaves_record_unchanged() {
            let db = create_test_db().await;
            let created = db.create(&draft("Fort", 4, 73.0499, 26.2850)).await.unwrap();

            let patch = ReviewPatch {
                title: Some("Renamed".into()),
                rating: Some(6),
                ..Default::default()
            };
            assert!(db.update(&created.id, &patch).await.unwrap_err().is_validation());
            assert_eq!(db.get_by_id(&created.id).await.unwrap(), created);
        }

        #[tokio::test]
        async fn test_missing_ids_report_not_found() {
            let db = create_test_db().await;
            let id = ReviewId::new();
            assert!(db.get_by_id(&id).await.unwrap_err().is_not_found());
            assert!(db.delete(&id).await.unwrap_err().is_not_found());
            let patch = ReviewPatch {
                rating: Some(3),
                ..Default::default()
            };
            assert!(db.update(&id, &patch).await.unwrap_err().is_not_found());
        }

        #[tokio::test]
        async fn test_repeated_delete_is_not_found() {
            let db = create_test_db().await;
            let created = db.create(&draft("Once", 3, 1.0, 1.0)).await.unwrap();
            db.delete(&created.id).await.unwrap();
            assert!(db.delete(&created.id).await.unwrap_err().is_not_found());
        }

        #[tokio::test]
        async fn test_location_update_moves_index_entry() {
            let db = create_test_db().await;
            let created = db.create(&draft("Mover", 4, 72.8372, 19.0760)).await.unwrap();

            let near_delhi = ReviewFilter::new()
                .near(point(77.2090, 28.7041), 25.0)
                .compile()
                .unwrap();
            assert!(db.query(&near_delhi).await.unwrap().is_empty());

            let patch = ReviewPatch {
                location: Some(point(77.2090, 28.7041)),
                ..Default::default()
            };
            db.update(&created.id, &patch).await.unwrap();

            let found = db.query(&near_delhi).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id, created.id);
        }

        #[tokio::test]
        async fn test_updated_at_never_moves_backwards() {
            let db = create_test_db().await;
            let created = db.create(&draft("Clock", 3, 2.0, 2.0)).await.unwrap();

            // Pretend the last write happened an hour ahead of the current clock.
            let ahead = created.updated_at.timestamp_micros() + 3_600_000_000;
            {
                let conn = db.conn.lock().await;
                conn.execute(
                    "UPDATE reviews SET updated_at = ? WHERE id = ?",
                    params![ahead, created.id.to_string()],
                )
                .unwrap();
            }

            let patch = ReviewPatch {
                text: Some("Still good".into()),
                ..Default::default()
            };
            let updated = db.update(&created.id, &patch).await.unwrap();
            assert!(updated.updated_at.timestamp_micros() >= ahead);

            // An empty patch is still a successful mutation.
            let touched = db.update(&created.id, &ReviewPatch::default()).await.unwrap();
            assert_eq!(touched.text, "Still good");
            assert!(touched.updated_at >= updated.updated_at);
        }

        #[tokio::test]
        async fn test_created_at_strictly_increases() {
            let db = create_test_db().await;
            let mut last = None;
            for i in 0..20 {
                let r = db.create(&draft(&format!("R{}", i), 3, 0.0, 0.0)).await.unwrap();
                if let Some(prev) = last {
                    assert!(r.created_at > prev);
                }
                last = Some(r.created_at);
            }
        }

        #[tokio::test]
        async fn test_query_orders_newest_first() {
            let db = create_test_db().await;
            let a = db.create(&draft("A", 3, 0.0, 0.0)).await.unwrap();
            let b = db.create(&draft("B", 4, 0.0, 0.0)).await.unwrap();
            let c = db.create(&draft("C", 5, 0.0, 0.0)).await.unwrap();

            let all = db.query(&ReviewQuery::all()).await.unwrap();
            let ids: Vec<_> = all.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![c.id, b.id, a.id]);
        }

        #[tokio::test]
        async fn test_clear_removes_reviews_and_index_entries() {
            let db = create_test_db().await;
            db.create(&draft("A", 3, 5.0, 5.0)).await.unwrap();
            db.create(&draft("B", 3, 5.0, 5.0)).await.unwrap();
            assert_eq!(db.clear().await.unwrap(), 2);
            assert_eq!(db.count().await.unwrap(), 0);

            let conn = db.conn.lock().await;
            let indexed: i64 = conn
                .query_row("SELECT COUNT(*) FROM review_locations", [], |row| row.get(0))
                .unwrap();
            assert_eq!(indexed, 0);
        }
    }

    /// SQLite-backed review store with an R*Tree location index.
    #[derive(Debug, Clone)]
    pub struct Database {
        conn: Arc<Mutex<Connection>>,
    }

    impl Database {
        // Open (or create) the database file
        pub fn new(db_path: &str) -> Result<Self> {
            let conn = Connection::open(db_path)?;
            info!("[DB] Database connection established at: {}", db_path);
            Ok(Database {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        // Create the database schema
        pub async fn create_schema(&self) -> Result<()> {
            let conn = self.conn.lock().await;

            // 1. Reviews table; seq gives the insertion order
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS reviews (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    text TEXT NOT NULL,
                    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                    lng REAL NOT NULL CHECK (lng BETWEEN -180 AND 180),
                    lat REAL NOT NULL CHECK (lat BETWEEN -90 AND 90),
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_reviews_rating ON reviews (rating, created_at);
                CREATE INDEX IF NOT EXISTS idx_reviews_created_at ON reviews (created_at);",
            )
            .map_err(|e| {
                tracing::error!("[DB] Failed creating reviews table: {}", e);
                e
            })?;

            // 2. Spatial index
            conn.execute_batch(
                "CREATE VIRTUAL TABLE IF NOT EXISTS review_locations USING rtree(
                    seq,
                    min_lng, max_lng,
                    min_lat, max_lat
                );",
            )
            .map_err(|e| {
                tracing::error!("[DB] Failed creating review_locations index: {}", e);
                e
            })?;

            info!("[DB] Schema ready");
            Ok(())
        }

        /// Validate `draft`, assign id and timestamps, and persist it
        /// together with its index entry.
        pub async fn create(&self, draft: &ReviewDraft) -> Result<Review> {
            let content = draft.validate()?;
            let id = ReviewId::new();

            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;

            let latest: Option<i64> =
                tx.query_row("SELECT MAX(created_at) FROM reviews", [], |row| row.get(0))?;
            let now = Utc::now().timestamp_micros();
            let stamp = match latest {
                Some(latest) if latest >= now => latest + 1,
                _ => now,
            };

            tx.execute(
                "INSERT INTO reviews (id, title, text, rating, lng, lat, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    id.to_string(),
                    &content.title,
                    &content.text,
                    i64::from(content.rating),
                    content.location.lng(),
                    content.location.lat(),
                    stamp,
                    stamp
                ],
            )?;
            let seq = tx.last_insert_rowid();
            index_location(&tx, seq, &content.location)?;
            tx.commit()?;

            debug!("[DB] Review created: {} (seq {})", id, seq);
            Ok(Review {
                id,
                title: content.title,
                text: content.text,
                rating: content.rating,
                location: content.location,
                created_at: from_micros(stamp)?,
                updated_at: from_micros(stamp)?,
            })
        }

        pub async fn get_by_id(&self, id: &ReviewId) -> Result<Review> {
            let conn = self.conn.lock().await;
            let sql = format!("SELECT {} FROM reviews r WHERE r.id = ?", REVIEW_COLUMNS);
            let row = conn
                .query_row(&sql, [id.to_string()], read_row)
                .optional()?;
            match row {
                Some(row) => row.into_review(),
                None => Err(ReviewError::NotFound(id.to_string())),
            }
        }

        /// Apply `patch` to the stored review. The merged record is
        /// validated before anything is written.
        pub async fn update(&self, id: &ReviewId, patch: &ReviewPatch) -> Result<Review> {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;

            let sql = format!(
                "SELECT r.seq, {} FROM reviews r WHERE r.id = ?",
                REVIEW_COLUMNS
            );
            let found = tx
                .query_row(&sql, [id.to_string()], |row| {
                    Ok((row.get::<_, i64>(0)?, read_row_at(row, 1)?))
                })
                .optional()?;
            let (seq, current) = match found {
                Some((seq, row)) => (seq, row.into_review()?),
                None => return Err(ReviewError::NotFound(id.to_string())),
            };

            if patch.is_empty() {
                debug!("[DB] Empty patch for {}, only updatedAt changes", id);
            }
            let merged: ReviewContent = current.content().merge(patch)?;
            // Never move updatedAt backwards, even if the clock does.
            let updated_at = Utc::now()
                .timestamp_micros()
                .max(current.updated_at.timestamp_micros());

            tx.execute(
                "UPDATE reviews SET title = ?, text = ?, rating = ?, lng = ?, lat = ?, updated_at = ?
                WHERE seq = ?",
                params![
                    &merged.title,
                    &merged.text,
                    i64::from(merged.rating),
                    merged.location.lng(),
                    merged.location.lat(),
                    updated_at,
                    seq
                ],
            )?;
            if merged.location != current.location {
                tx.execute("DELETE FROM review_locations WHERE seq = ?", [seq])?;
                index_location(&tx, seq, &merged.location)?;
            }
            tx.commit()?;

            debug!("[DB] Review updated: {}", id);
            Ok(Review {
                id: current.id,
                title: merged.title,
                text: merged.text,
                rating: merged.rating,
                location: merged.location,
                created_at: current.created_at,
                updated_at: from_micros(updated_at)?,
            })
        }

        pub async fn delete(&self, id: &ReviewId) -> Result<()> {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;

            let seq: Option<i64> = tx
                .query_row("SELECT seq FROM reviews WHERE id = ?", [id.to_string()], |row| {
                    row.get(0)
                })
                .optional()?;
            let seq = match seq {
                Some(seq) => seq,
                None => return Err(ReviewError::NotFound(id.to_string())),
            };

            tx.execute("DELETE FROM review_locations WHERE seq = ?", [seq])?;
            tx.execute("DELETE FROM reviews WHERE seq = ?", [seq])?;
            tx.commit()?;

            debug!("[DB] Review deleted: {}", id);
            Ok(())
        }

        /// Run a compiled query. Candidates come from the rating and R*Tree
        /// indexes; each is then checked against the exact predicates.
        pub async fn query(&self, query: &ReviewQuery) -> Result<Vec<Review>> {
            let plan = query.to_sql();
            if query.is_unfiltered() {
                debug!("[DB] Listing all reviews");
            } else {
                debug!("[DB] Query: {} ({} params)", plan.sql, plan.params.len());
            }

            let conn = self.conn.lock().await;
            let mut stmt = conn.prepare(&plan.sql)?;
            let rows = stmt.query_map(params_from_iter(plan.params.iter()), read_row)?;

            let mut result = Vec::new();
            let mut candidates = 0usize;
            for row in rows {
                candidates += 1;
                let review = row?.into_review()?;
                if query.matches(&review) {
                    result.push(review);
                }
            }

            debug!(
                "[DB] Query matched {} of {} candidates",
                result.len(),
                candidates
            );
            Ok(result)
        }

        pub async fn count(&self) -> Result<usize> {
            let conn = self.conn.lock().await;
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
            Ok(n as usize)
        }

        /// Remove every review. Returns how many were deleted.
        pub async fn clear(&self) -> Result<usize> {
            let mut conn = self.conn.lock().await;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM review_locations", [])?;
            let removed = tx.execute("DELETE FROM reviews", [])?;
            tx.commit()?;
            info!("[DB] Cleared {} reviews", removed);
            Ok(removed)
        }
    }

    fn index_location(tx: &rusqlite::Transaction<'_>, seq: i64, location: &GeoPoint) -> Result<()> {
        tx.execute(
            "INSERT INTO review_locations (seq, min_lng, max_lng, min_lat, max_lat)
            VALUES (?, ?, ?, ?, ?)",
            params![seq, location.lng(), location.lng(), location.lat(), location.lat()],
        )?;
        Ok(())
    }

    fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| ReviewError::Internal(format!("Invalid timestamp {}", micros)))
    }

    // Raw row as stored; converted into a Review after the statement is done
    struct ReviewRow {
        id: String,
        title: String,
        text: String,
        rating: i64,
        lng: f64,
        lat: f64,
        created_at: i64,
        updated_at: i64,
    }

    impl ReviewRow {
        fn into_review(self) -> Result<Review> {
            let corrupt = |e: ReviewError| {
                ReviewError::Internal(format!("Stored review {} is invalid: {}", self.id, e))
            };
            Ok(Review {
                id: ReviewId::parse(&self.id).map_err(corrupt)?,
                rating: Rating::new(self.rating).map_err(corrupt)?,
                location: GeoPoint::new(self.lng, self.lat).map_err(corrupt)?,
                created_at: from_micros(self.created_at)?,
                updated_at: from_micros(self.updated_at)?,
                title: self.title,
                text: self.text,
            })
        }
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
        read_row_at(row, 0)
    }

    fn read_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<ReviewRow> {
        Ok(ReviewRow {
            id: row.get(offset)?,
            title: row.get(offset + 1)?,
            text: row.get(offset + 2)?,
            rating: row.get(offset + 3)?,
            lng: row.get(offset + 4)?,
            lat: row.get(offset + 5)?,
            created_at: row.get(offset + 6)?,
            updated_at: row.get(offset + 7)?,
        })
    }
}

pub use db_impl::Database;
