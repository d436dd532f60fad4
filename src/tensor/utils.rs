use std::cmp::max;

use itertools::EitherOrBoth::{Both, Left, Right};
use itertools::Itertools;

use super::error::{Result, TensorError};

pub struct IndexIterator {
    index: Vec<usize>,
    dimensions: Vec<usize>,
    first: bool,
}

impl IndexIterator {
    pub fn new(dimensions: Vec<usize>) -> IndexIterator {
        IndexIterator {
            index: vec![0; dimensions.len()],
            // an empty dimension has nothing to visit
            first: dimensions.iter().all(|&d| d > 0),
            dimensions,
        }
    }
}

impl Iterator for IndexIterator {
    type Item = Vec<usize>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.first {
            self.first = false;
            return Some(self.index.clone());
        }
        if increment_index(&mut self.index, &self.dimensions) {
            return Some(self.index.clone());
        }
        None
    }
}

/// Advances `index` to the next position of a row-major walk over `shape`.
/// Returns `false` once the walk is exhausted.
pub fn increment_index(index: &mut [usize], shape: &[usize]) -> bool {
    for i in (0..index.len()).rev() {
        if index[i] + 1 < shape[i] {
            index[i] += 1;
            reset_trailing_indices(index, i);
            return true;
        }
    }
    false
}

fn reset_trailing_indices(index: &mut [usize], position: usize) {
    for idx in index.iter_mut().skip(position + 1) {
        *idx = 0;
    }
}

/// Row-major offset of `index` into a tensor of `shape`.
pub fn global_index(index: &[usize], shape: &[usize]) -> Result<usize> {
    if index.len() != shape.len() || index.iter().zip(shape).any(|(&i, &d)| i >= d) {
        return Err(TensorError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: shape.to_vec(),
        });
    }
    Ok(index
        .iter()
        .zip(shape)
        .fold(0, |acc, (&idx, &dim)| acc * dim + idx))
}

/// Row-major offset of a broadcast `index` into a tensor of `shape`.
///
/// Shapes are aligned on their trailing dimensions and dimensions of size one
/// always read position zero. `index` must be at least as long as `shape`.
pub fn broadcast_index(index: &[usize], shape: &[usize]) -> usize {
    let skip = index.len() - shape.len();
    index[skip..]
        .iter()
        .zip(shape)
        .fold(0, |acc, (&idx, &dim)| {
            let idx = if dim == 1 { 0 } else { idx };
            acc * dim + idx
        })
}

pub fn broadcastable(left_shape: &[usize], right_shape: &[usize]) -> bool {
    left_shape
        .iter()
        .rev()
        .zip(right_shape.iter().rev())
        .all(|(&l, &r)| l == r || l == 1 || r == 1)
}

pub fn max_shape(left_shape: &[usize], right_shape: &[usize]) -> Vec<usize> {
    let mut max_shape = Vec::with_capacity(max(left_shape.len(), right_shape.len()));
    for pair in left_shape
        .iter()
        .rev()
        .zip_longest(right_shape.iter().rev())
        .rev()
    {
        let dim = match pair {
            Both(&l, &r) => max(l, r),
            Left(&l) => l,
            Right(&r) => r,
        };
        max_shape.push(dim);
    }
    max_shape
}

#[test]
fn test_increment_index() {
    let mut index = vec![0, 0, 0];
    let dimensions = vec![2, 3, 2];
    let indices = vec![
        [0, 0, 1].to_vec(),
        [0, 1, 0].to_vec(),
        [0, 1, 1].to_vec(),
        [0, 2, 0].to_vec(),
        [0, 2, 1].to_vec(),
        [1, 0, 0].to_vec(),
        [1, 0, 1].to_vec(),
        [1, 1, 0].to_vec(),
        [1, 1, 1].to_vec(),
        [1, 2, 0].to_vec(),
        [1, 2, 1].to_vec(),
    ];
    for expected_idx in indices.into_iter() {
        let valid = increment_index(&mut index, &dimensions);
        assert!(valid);
        assert_eq!(index, expected_idx);
    }
    assert!(!increment_index(&mut index, &dimensions));
}

#[test]
fn test_index_iterator() {
    let index_iter = IndexIterator::new(vec![2, 2, 2]);
    assert_eq!(
        index_iter.collect::<Vec<_>>(),
        vec![
            [0, 0, 0].to_vec(),
            [0, 0, 1].to_vec(),
            [0, 1, 0].to_vec(),
            [0, 1, 1].to_vec(),
            [1, 0, 0].to_vec(),
            [1, 0, 1].to_vec(),
            [1, 1, 0].to_vec(),
            [1, 1, 1].to_vec(),
        ]
    );
}

#[test]
fn test_index_iterator_scalar_and_empty() {
    assert_eq!(IndexIterator::new(vec![]).count(), 1);
    assert_eq!(IndexIterator::new(vec![3, 0]).count(), 0);
}

#[test]
fn test_global_index() {
    assert_eq!(global_index(&[1, 2], &[3, 4]).unwrap(), 6);
    assert_eq!(global_index(&[2, 3], &[3, 4]).unwrap(), 11);
    assert!(global_index(&[3, 0], &[3, 4]).is_err());
    assert!(global_index(&[0], &[3, 4]).is_err());
}

#[test]
fn test_broadcast_index() {
    // a bias of shape [4] read from a [3, 4] walk
    assert_eq!(broadcast_index(&[2, 1], &[4]), 1);
    assert_eq!(broadcast_index(&[2, 1], &[1, 4]), 1);
    assert_eq!(broadcast_index(&[2, 1], &[3, 1]), 2);
    assert_eq!(broadcast_index(&[2, 1], &[]), 0);
}

#[test]
fn test_max_shape() {
    assert_eq!(max_shape(&[64, 10], &[10]), vec![64, 10]);
    assert_eq!(max_shape(&[1, 10], &[5, 1]), vec![5, 10]);
    assert!(broadcastable(&[64, 10], &[10]));
    assert!(!broadcastable(&[64, 10], &[9]));
}
