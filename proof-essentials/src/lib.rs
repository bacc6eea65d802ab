pub mod commitment;
pub mod error;
pub mod homomorphic_encryption;
pub mod utils;
