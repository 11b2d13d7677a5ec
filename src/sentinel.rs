//! The placeholder graph that stands in for "no usable structure".
//!
//! The marker value 2 never occurs in a real boolean column, so the single
//! node row and single edge row below cannot be mistaken for a molecule.

use ndarray::{arr2, Array2};

/// Value written into the boolean columns of the sentinel rows.
pub const SENTINEL_MARKER: f32 = 2.0;

pub const SENTINEL_NODE_ROW: [f32; 10] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    SENTINEL_MARKER,
    SENTINEL_MARKER,
];

pub const SENTINEL_EDGE_ROW: [f32; 5] = [
    0.0,
    0.0,
    SENTINEL_MARKER,
    SENTINEL_MARKER,
    SENTINEL_MARKER,
];

/// `(x, edge_index, edge_attr)` of the sentinel.
pub fn sentinel_tensors() -> (Array2<f32>, Array2<i64>, Array2<f32>) {
    (
        arr2(&[SENTINEL_NODE_ROW]),
        arr2(&[[0i64], [0i64]]),
        arr2(&[SENTINEL_EDGE_ROW]),
    )
}

/// Whether the three tensors are exactly the sentinel's.
pub fn is_sentinel(x: &Array2<f32>, edge_index: &Array2<i64>, edge_attr: &Array2<f32>) -> bool {
    let (sx, sindex, sattr) = sentinel_tensors();
    *x == sx && *edge_index == sindex && *edge_attr == sattr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_shapes() {
        let (x, edge_index, edge_attr) = sentinel_tensors();
        assert_eq!(x.dim(), (1, 10));
        assert_eq!(edge_index.dim(), (2, 1));
        assert_eq!(edge_attr.dim(), (1, 5));
        assert_eq!(x[[0, 8]], 2.0);
        assert_eq!(edge_attr[[0, 0]], 0.0);
        assert!(is_sentinel(&x, &edge_index, &edge_attr));
    }

    #[test]
    fn test_real_rows_are_not_sentinel() {
        let (mut x, edge_index, edge_attr) = sentinel_tensors();
        x[[0, 8]] = 1.0;
        assert!(!is_sentinel(&x, &edge_index, &edge_attr));
    }
}
