pub mod encoding;
pub mod permutation;
pub mod rand;
