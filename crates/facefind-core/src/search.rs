//! Per-event face similarity index.
//!
//! [`FaceIndex`] validates face records on the way in and answers
//! nearest-match queries over a [`FaceStore`] snapshot.
//!
//! # Ranking
//!
//! 1. Take a consistent snapshot of the event's faces.
//! 2. Compute cosine similarity against every stored embedding; faces with
//!    an all-zero embedding are skipped, and faces whose embedding length
//!    differs from the index are skipped with a warning.
//! 3. Keep faces with `similarity >= min_similarity`.
//! 4. Sort by similarity (desc), `photo_id` (asc), `face_id` (asc).
//!
//! The scan is linear, O(n·D) per query, which is fine for a single
//! event's photo volume. An approximate index can replace the scan behind
//! [`FaceIndex::query`] without changing its contract.

use std::cmp::Ordering;

use tracing::{debug, info, instrument, warn};

use crate::embedding::{check_dims, cosine_similarity, normalize};
use crate::error::{Error, Result};
use crate::models::{Face, FaceMatch};
use crate::store::FaceStore;

/// Floor threshold used when a caller does not pass one.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.15;

/// Face similarity index over a pluggable [`FaceStore`].
pub struct FaceIndex<S> {
    store: S,
    dims: usize,
}

impl<S: FaceStore> FaceIndex<S> {
    /// `dims` is the embedding length shared by every face in the
    /// deployment.
    pub fn new(store: S, dims: usize) -> Self {
        Self { store, dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Insert or replace a face record.
    #[instrument(skip_all, fields(face_id = %face.face_id, photo_id = %face.photo_id))]
    pub async fn upsert(&self, face: &Face) -> Result<()> {
        check_dims(&face.embedding, self.dims)?;
        if face.face_id.is_empty() || face.photo_id.is_empty() || face.event_id.is_empty() {
            return Err(Error::invalid(
                "face_id, photo_id and event_id must not be empty",
            ));
        }
        if !(0.0..=1.0).contains(&face.quality_score) {
            return Err(Error::invalid(format!(
                "quality_score must be in [0, 1], got {}",
                face.quality_score
            )));
        }

        self.store.upsert_face(face).await?;
        debug!(event_id = %face.event_id, "face indexed");
        Ok(())
    }

    /// Remove every face of a photo. Idempotent; returns the number of
    /// faces removed.
    #[instrument(skip(self))]
    pub async fn remove(&self, photo_id: &str) -> Result<u64> {
        let removed = self.store.remove_photo_faces(photo_id).await?;
        if removed > 0 {
            info!(removed, "faces removed from index");
        }
        Ok(removed)
    }

    /// Rank an event's faces by similarity to `query_embedding`.
    ///
    /// Returns one entry per face at or above `min_similarity`, ordered by
    /// similarity descending with ties broken by `photo_id` then `face_id`.
    /// An event without faces yields an empty result.
    #[instrument(skip(self, query_embedding))]
    pub async fn query(
        &self,
        event_id: &str,
        query_embedding: &[f64],
        min_similarity: f64,
    ) -> Result<Vec<FaceMatch>> {
        check_dims(query_embedding, self.dims)?;
        if !(0.0..=1.0).contains(&min_similarity) {
            return Err(Error::invalid(format!(
                "min_similarity must be in [0, 1], got {}",
                min_similarity
            )));
        }
        let unit_query = normalize(query_embedding)
            .ok_or_else(|| Error::invalid("query embedding has zero magnitude"))?;

        let faces = self.store.event_faces(event_id).await?;
        let ranked = rank_faces(&faces, &unit_query, min_similarity);
        if ranked.wrong_dims > 0 {
            warn!(
                skipped = ranked.wrong_dims,
                expected_dims = self.dims,
                "stored faces with a different embedding length were skipped"
            );
        }
        let matches = ranked.matches;

        debug!(
            scanned = faces.len(),
            matched = matches.len(),
            "face query complete"
        );
        Ok(matches)
    }
}

struct Ranked {
    matches: Vec<FaceMatch>,
    /// Faces skipped because their embedding length differs from the query.
    wrong_dims: usize,
}

/// Score, filter, and order a snapshot of faces.
fn rank_faces(faces: &[Face], unit_query: &[f64], min_similarity: f64) -> Ranked {
    let mut wrong_dims = 0;
    let mut matches: Vec<FaceMatch> = faces
        .iter()
        .filter_map(|face| {
            if face.embedding.len() != unit_query.len() {
                wrong_dims += 1;
                return None;
            }
            let similarity = cosine_similarity(unit_query, &face.embedding)?;
            (similarity >= min_similarity).then(|| FaceMatch {
                photo_id: face.photo_id.clone(),
                face_id: face.face_id.clone(),
                similarity,
                bbox: face.bbox,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.photo_id.cmp(&b.photo_id))
            .then_with(|| a.face_id.cmp(&b.face_id))
    });
    Ranked {
        matches,
        wrong_dims,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;
    use crate::store::memory::InMemoryStore;
    use chrono::Utc;

    const DIMS: usize = 4;

    fn face(face_id: &str, photo_id: &str, embedding: [f64; DIMS]) -> Face {
        Face {
            face_id: face_id.into(),
            photo_id: photo_id.into(),
            event_id: "e1".into(),
            embedding: embedding.to_vec(),
            bbox: BoundingBox::new(10, 20, 30, 40),
            quality_score: 0.8,
            created_at: Utc::now(),
        }
    }

    async fn index_with(faces: &[Face]) -> FaceIndex<InMemoryStore> {
        let index = FaceIndex::new(InMemoryStore::new(), DIMS);
        for f in faces {
            index.upsert(f).await.unwrap();
        }
        index
    }

    fn ids(matches: &[FaceMatch]) -> Vec<(&str, &str)> {
        matches
            .iter()
            .map(|m| (m.photo_id.as_str(), m.face_id.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_identity_match_ranks_first() {
        let target = [0.2, 0.7, -0.1, 0.4];
        let index = index_with(&[
            face("f1", "p1", [0.3, 0.6, 0.0, 0.4]),
            face("f2", "p2", target),
            face("f3", "p3", [-0.2, 0.1, 0.9, 0.0]),
        ])
        .await;

        let matches = index.query("e1", &target, 0.0).await.unwrap();
        assert_eq!(matches[0].face_id, "f2");
        assert!((matches[0].similarity - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_threshold_is_monotonic() {
        let index = index_with(&[
            face("f1", "p1", [1.0, 0.0, 0.0, 0.0]),
            face("f2", "p2", [0.8, 0.6, 0.0, 0.0]),
            face("f3", "p3", [0.5, 0.5, 0.5, 0.5]),
            face("f4", "p4", [0.0, 1.0, 0.0, 0.0]),
        ])
        .await;
        let q = [1.0, 0.0, 0.0, 0.0];

        let mut previous = usize::MAX;
        for threshold in [0.0, 0.25, 0.5, 0.75, 0.9, 1.0] {
            let matches = index.query("e1", &q, threshold).await.unwrap();
            assert!(matches.iter().all(|m| m.similarity >= threshold));
            assert!(matches.len() <= previous);
            previous = matches.len();
        }
    }

    #[tokio::test]
    async fn test_ties_broken_by_photo_then_face() {
        let same = [0.0, 0.0, 1.0, 0.0];
        let index = index_with(&[
            face("fb", "p2", same),
            face("fz", "p1", same),
            face("fa", "p2", same),
            face("fy", "p1", same),
        ])
        .await;

        let first = index.query("e1", &same, 0.5).await.unwrap();
        assert_eq!(
            ids(&first),
            vec![("p1", "fy"), ("p1", "fz"), ("p2", "fa"), ("p2", "fb")]
        );
        let second = index.query("e1", &same, 0.5).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_multiple_faces_per_photo_not_collapsed() {
        let index = index_with(&[
            face("f1", "p1", [1.0, 0.0, 0.0, 0.0]),
            face("f2", "p1", [0.9, 0.1, 0.0, 0.0]),
        ])
        .await;

        let matches = index.query("e1", &[1.0, 0.0, 0.0, 0.0], 0.5).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.photo_id == "p1"));
    }

    #[tokio::test]
    async fn test_negative_similarity_filtered_by_positive_floor() {
        let index = index_with(&[face("f1", "p1", [-1.0, 0.0, 0.0, 0.0])]).await;
        let matches = index
            .query("e1", &[1.0, 0.0, 0.0, 0.0], DEFAULT_MIN_SIMILARITY)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_zero_magnitude_face_excluded() {
        let index = index_with(&[
            face("f0", "p0", [0.0, 0.0, 0.0, 0.0]),
            face("f1", "p1", [1.0, 0.0, 0.0, 0.0]),
        ])
        .await;

        let matches = index.query("e1", &[1.0, 0.0, 0.0, 0.0], 0.0).await.unwrap();
        assert_eq!(ids(&matches), vec![("p1", "f1")]);
        assert!(matches.iter().all(|m| !m.similarity.is_nan()));
    }

    #[tokio::test]
    async fn test_identity_match_at_extreme_magnitudes() {
        for scale in [1e-9, 1e200] {
            let target = [0.2 * scale, 0.7 * scale, -0.1 * scale, 0.4 * scale];
            let index = index_with(&[
                face("f1", "p1", [0.3, 0.6, 0.0, 0.4]),
                face("f2", "p2", target),
            ])
            .await;

            let matches = index.query("e1", &target, 0.0).await.unwrap();
            assert_eq!(matches[0].face_id, "f2", "scale {}", scale);
            assert!((matches[0].similarity - 1.0).abs() < 1e-9, "scale {}", scale);
            assert!(matches[1].similarity > 0.5, "scale {}", scale);
        }
    }

    #[tokio::test]
    async fn test_tiny_nonzero_query_accepted() {
        let index = index_with(&[face("f1", "p1", [1.0, 0.0, 0.0, 0.0])]).await;
        let matches = index.query("e1", &[1e-17, 0.0, 0.0, 0.0], 0.5).await.unwrap();
        assert_eq!(ids(&matches), vec![("p1", "f1")]);
        assert!((matches[0].similarity - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_stored_face_of_other_length_skipped() {
        let index = index_with(&[face("f1", "p1", [1.0, 0.0, 0.0, 0.0])]).await;
        let mut stale = face("f0", "p0", [1.0, 0.0, 0.0, 0.0]);
        stale.embedding.truncate(3);
        index.store().upsert_face(&stale).await.unwrap();

        let matches = index.query("e1", &[1.0, 0.0, 0.0, 0.0], 0.0).await.unwrap();
        assert_eq!(ids(&matches), vec![("p1", "f1")]);

        let faces = index.store().event_faces("e1").await.unwrap();
        let ranked = rank_faces(&faces, &[1.0, 0.0, 0.0, 0.0], 0.0);
        assert_eq!(ranked.wrong_dims, 1);
        assert_eq!(ranked.matches.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_event_is_empty() {
        let index = index_with(&[face("f1", "p1", [1.0, 0.0, 0.0, 0.0])]).await;
        let matches = index
            .query("missing", &[1.0, 0.0, 0.0, 0.0], 0.1)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_query_dimension_rejected() {
        let index = index_with(&[]).await;
        let err = index.query("e1", &[1.0, 0.0], 0.5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_threshold_out_of_range_rejected() {
        let index = index_with(&[]).await;
        let q = [1.0, 0.0, 0.0, 0.0];
        for bad in [-0.1, 1.5, f64::NAN] {
            let err = index.query("e1", &q, bad).await.unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_zero_query_rejected() {
        let index = index_with(&[]).await;
        let err = index.query("e1", &[0.0; DIMS], 0.5).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let index = index_with(&[]).await;
        let mut bad = face("f1", "p1", [1.0, 0.0, 0.0, 0.0]);
        bad.embedding.push(0.0);
        assert!(matches!(
            index.upsert(&bad).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(index.store().event_faces("e1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_drops_photo_from_results() {
        let index = index_with(&[
            face("f1", "p1", [1.0, 0.0, 0.0, 0.0]),
            face("f2", "p2", [1.0, 0.0, 0.0, 0.0]),
        ])
        .await;

        assert_eq!(index.remove("p1").await.unwrap(), 1);
        assert_eq!(index.remove("p1").await.unwrap(), 0);
        let matches = index.query("e1", &[1.0, 0.0, 0.0, 0.0], 0.5).await.unwrap();
        assert_eq!(ids(&matches), vec![("p2", "f2")]);
    }
}
