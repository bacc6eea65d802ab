use crate::error::CryptoError;

use ark_std::rand::{seq::SliceRandom, Rng};

/// `mapping[i]` is the source index of the element placed at position `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    pub mapping: Vec<usize>,
    pub size: usize,
}

impl Permutation {
    pub fn new<R: Rng>(rng: &mut R, size: usize) -> Self {
        let mut mapping: Vec<usize> = (0..size).collect();
        mapping.shuffle(rng);
        Self { mapping, size }
    }

    pub fn from_mapping(mapping: &[usize]) -> Result<Self, CryptoError> {
        let permutation = Self {
            mapping: mapping.to_vec(),
            size: mapping.len(),
        };
        if !permutation.is_valid() {
            return Err(CryptoError::InvalidPermutation(mapping.len()));
        }
        Ok(permutation)
    }

    /// Every index in `0..size` appears exactly once.
    pub fn is_valid(&self) -> bool {
        let mut seen = vec![false; self.size];
        for &i in &self.mapping {
            if i >= self.size || seen[i] {
                return false;
            }
            seen[i] = true;
        }
        self.mapping.len() == self.size
    }

    pub fn permute_array<T: Clone>(&self, input: &[T]) -> Result<Vec<T>, CryptoError> {
        if input.len() != self.size {
            return Err(CryptoError::LengthError(
                String::from("Permutation"),
                self.size,
                input.len(),
            ));
        }
        Ok(self.mapping.iter().map(|&pi| input[pi].clone()).collect())
    }

    pub fn inverse(&self) -> Self {
        let mut mapping = vec![0; self.size];
        for (i, &pi) in self.mapping.iter().enumerate() {
            mapping[pi] = i;
        }
        Self {
            mapping,
            size: self.size,
        }
    }
}
