//! Distance strategies for vector similarity

use crate::document::VectorDocument;
use crate::error::Result;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Distance strategies for measuring vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStrategy {
    /// Cosine distance (1 - cosine similarity), in [0, 2]
    #[default]
    Cosine,
    /// Angle between the vectors scaled to [0, 1]
    Angular,
    /// Euclidean (L2) distance
    Euclidean,
    /// Manhattan (L1) distance
    Manhattan,
    /// Chebyshev (L-infinity) distance
    Chebyshev,
}

impl DistanceStrategy {
    /// Compute the distance between two vectors using this strategy
    pub fn distance(&self, v1: &Vector, v2: &Vector) -> Result<f32> {
        v1.ensure_same_dimension(v2)?;

        Ok(match self {
            DistanceStrategy::Cosine => cosine_distance(v1, v2),
            DistanceStrategy::Angular => angular_distance(v1, v2),
            DistanceStrategy::Euclidean => euclidean_distance(v1, v2),
            DistanceStrategy::Manhattan => manhattan_distance(v1, v2),
            DistanceStrategy::Chebyshev => chebyshev_distance(v1, v2),
        })
    }
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Compute Manhattan (L1) distance between two vectors
pub fn manhattan_distance(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).abs())
        .sum()
}

/// Compute Chebyshev distance (largest coordinate difference)
pub fn chebyshev_distance(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max)
}

/// Cosine similarity clamped to [-1, 1], or `None` when either vector has zero norm.
///
/// Accumulates in f64 and snaps results within a few ULPs of 1.0 to exactly
/// 1.0, so a vector compared with itself has distance 0.
pub fn cosine_similarity(v1: &Vector, v2: &Vector) -> Option<f32> {
    let (mut dot, mut sq1, mut sq2) = (0.0f64, 0.0f64, 0.0f64);
    for (&a, &b) in v1.as_slice().iter().zip(v2.as_slice()) {
        let (a, b) = (f64::from(a), f64::from(b));
        dot += a * b;
        sq1 += a * a;
        sq2 += b * b;
    }

    if sq1 == 0.0 || sq2 == 0.0 {
        return None;
    }

    let similarity = dot / (sq1.sqrt() * sq2.sqrt());
    if (1.0 - similarity).abs() <= 4.0 * f64::EPSILON {
        return Some(1.0);
    }
    Some(similarity.clamp(-1.0, 1.0) as f32)
}

/// Compute cosine distance between two vectors (1 - cosine similarity).
///
/// A zero vector has no direction; it is treated as maximally distant (2.0).
pub fn cosine_distance(v1: &Vector, v2: &Vector) -> f32 {
    cosine_similarity(v1, v2).map_or(2.0, |similarity| 1.0 - similarity)
}

/// Compute angular distance: the angle between the vectors divided by pi.
///
/// A zero vector is treated as maximally distant (1.0).
pub fn angular_distance(v1: &Vector, v2: &Vector) -> f32 {
    cosine_similarity(v1, v2).map_or(1.0, |similarity| similarity.acos() / PI)
}

/// Compute dot product of two vectors
pub fn dot_product(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}

/// Ranks documents by their distance to a query vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistanceCalculator {
    strategy: DistanceStrategy,
}

impl DistanceCalculator {
    pub fn new(strategy: DistanceStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> DistanceStrategy {
        self.strategy
    }

    pub fn distance(&self, v1: &Vector, v2: &Vector) -> Result<f32> {
        self.strategy.distance(v1, v2)
    }

    /// Score every document against `vector`, closest first.
    ///
    /// Ties keep the input order. The returned documents carry their
    /// distance as `score`.
    pub fn calculate<'a, I>(
        &self,
        documents: I,
        vector: &Vector,
        max_items: Option<usize>,
    ) -> Result<Vec<VectorDocument>>
    where
        I: IntoIterator<Item = &'a VectorDocument>,
    {
        let mut scored = documents
            .into_iter()
            .map(|doc| {
                let distance = self.distance(&doc.vector, vector)?;
                Ok((doc, distance))
            })
            .collect::<Result<Vec<_>>>()?;

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        if let Some(max_items) = max_items {
            scored.truncate(max_items);
        }

        Ok(scored
            .into_iter()
            .map(|(doc, distance)| doc.clone().with_score(distance))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::error::StoreError;
    use approx::assert_relative_eq;

    const ALL: [DistanceStrategy; 5] = [
        DistanceStrategy::Cosine,
        DistanceStrategy::Angular,
        DistanceStrategy::Euclidean,
        DistanceStrategy::Manhattan,
        DistanceStrategy::Chebyshev,
    ];

    fn doc(id: &str, data: Vec<f32>) -> VectorDocument {
        VectorDocument::new(id, Vector::new(data), Metadata::new())
    }

    #[test]
    fn test_euclidean_distance() {
        let v1 = Vector::new(vec![1.0, 2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 6.0]);
        assert_relative_eq!(euclidean_distance(&v1, &v2), 5.196152, epsilon = 1e-5);
    }

    #[test]
    fn test_manhattan_distance() {
        let v1 = Vector::new(vec![1.0, -2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 3.5]);
        assert_relative_eq!(manhattan_distance(&v1, &v2), 10.5, epsilon = 1e-6);
    }

    #[test]
    fn test_chebyshev_distance() {
        let v1 = Vector::new(vec![1.0, -2.0, 3.0]);
        let v2 = Vector::new(vec![4.0, 5.0, 3.5]);
        assert_relative_eq!(chebyshev_distance(&v1, &v2), 7.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cosine_distance() {
        let v1 = Vector::new(vec![1.0, 0.0, 0.0]);
        let orthogonal = Vector::new(vec![0.0, 1.0, 0.0]);
        let opposite = Vector::new(vec![-1.0, 0.0, 0.0]);
        assert_relative_eq!(cosine_distance(&v1, &v1), 0.0, epsilon = 1e-6);
        assert_relative_eq!(cosine_distance(&v1, &orthogonal), 1.0, epsilon = 1e-6);
        assert_relative_eq!(cosine_distance(&v1, &opposite), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_angular_distance() {
        let v1 = Vector::new(vec![1.0, 0.0]);
        let orthogonal = Vector::new(vec![0.0, 1.0]);
        let opposite = Vector::new(vec![-1.0, 0.0]);
        assert_relative_eq!(angular_distance(&v1, &orthogonal), 0.5, epsilon = 1e-6);
        assert_relative_eq!(angular_distance(&v1, &opposite), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_self_distance_is_exactly_zero() {
        let vectors = [
            vec![0.1, 0.2, 0.3],
            vec![0.7, -0.3, 0.0, 1e-3, 42.5, -17.25, 0.333],
            vec![1e-20, 3e-21],
            vec![-93.7, 12.01, 0.5, 8.8],
        ];
        for data in vectors {
            let v = Vector::new(data);
            for strategy in ALL {
                assert_eq!(strategy.distance(&v, &v).unwrap(), 0.0, "{:?} on {}", strategy, v);
            }
        }
    }

    #[test]
    fn test_zero_vector_is_maximally_distant() {
        let zero = Vector::new(vec![0.0, 0.0, 0.0]);
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(DistanceStrategy::Cosine.distance(&zero, &v).unwrap(), 2.0);
        assert_eq!(DistanceStrategy::Cosine.distance(&zero, &zero).unwrap(), 2.0);
        assert_eq!(DistanceStrategy::Angular.distance(&v, &zero).unwrap(), 1.0);
        assert_eq!(DistanceStrategy::Euclidean.distance(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let v1 = Vector::new(vec![1.0, 2.0]);
        let v2 = Vector::new(vec![1.0, 2.0, 3.0]);
        for strategy in ALL {
            assert!(matches!(
                strategy.distance(&v1, &v2),
                Err(StoreError::DimensionMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_calculate_orders_closest_first() {
        let docs = vec![
            doc("a", vec![0.1, 0.1, 0.5]),
            doc("b", vec![0.7, -0.3, 0.0]),
            doc("c", vec![0.3, 0.7, 0.1]),
        ];
        let query = Vector::new(vec![0.0, 0.1, 0.6]);

        let results = DistanceCalculator::default()
            .calculate(&docs, &query, None)
            .unwrap();

        let ids: Vec<_> = results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(results.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[test]
    fn test_calculate_truncates_and_keeps_tie_order() {
        let docs = vec![
            doc("first", vec![1.0, 0.0]),
            doc("second", vec![1.0, 0.0]),
            doc("far", vec![-1.0, 0.0]),
        ];
        let query = Vector::new(vec![2.0, 0.0]);
        let calculator = DistanceCalculator::new(DistanceStrategy::Manhattan);

        let results = calculator.calculate(&docs, &query, Some(2)).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "first");
        assert_eq!(results[1].id, "second");
        assert_eq!(results[0].score, Some(1.0));
    }

    #[test]
    fn test_strategy_names() {
        let parsed: DistanceStrategy = serde_json::from_str("\"chebyshev\"").unwrap();
        assert_eq!(parsed, DistanceStrategy::Chebyshev);
        assert_eq!(DistanceStrategy::default(), DistanceStrategy::Cosine);
    }
}
