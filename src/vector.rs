//! Vector type and operations

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable embedding in n-dimensional space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Fail with `DimensionMismatch` unless `other` has this vector's dimension
    pub fn ensure_same_dimension(&self, other: &Vector) -> Result<()> {
        if self.has_same_dimension(other) {
            Ok(())
        } else {
            Err(StoreError::DimensionMismatch {
                expected: self.dimension(),
                actual: other.dimension(),
            })
        }
    }

    /// Compute the L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Parse a vector from a comma-separated string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Vector::new(Vec::new()));
        }
        let data: Result<Vec<f32>> = s
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| StoreError::invalid_argument(format!("Invalid float: {}", x)))
            })
            .collect();
        Ok(Vector::new(data?))
    }

    /// Parse the pgvector text representation, e.g. `[1,2.5,3]`
    pub fn from_pgvector(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| {
                StoreError::invalid_argument(format!("Invalid pgvector literal: {}", s))
            })?;
        Self::parse(inner)
    }

    /// Render in pgvector text form
    pub fn to_pgvector(&self) -> String {
        self.to_string()
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, x) in self.data.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", x)?;
        }
        f.write_str("]")
    }
}
