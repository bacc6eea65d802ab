//! Hex text encoding of arkworks values for the space-separated wire grammar.

use crate::error::CryptoError;

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

pub fn to_hex<T: CanonicalSerialize>(value: &T) -> Result<String, CryptoError> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    value
        .serialize_compressed(&mut bytes)
        .map_err(|e| CryptoError::EncodingError(e.to_string()))?;
    Ok(hex::encode(bytes))
}

pub fn from_hex<T: CanonicalDeserialize>(token: &str) -> Result<T, CryptoError> {
    let bytes = hex::decode(token).map_err(|e| CryptoError::EncodingError(e.to_string()))?;
    T::deserialize_compressed(bytes.as_slice())
        .map_err(|e| CryptoError::EncodingError(e.to_string()))
}

pub fn encode_all<T: CanonicalSerialize>(values: &[T]) -> Result<Vec<String>, CryptoError> {
    values.iter().map(to_hex).collect()
}

pub fn decode_all<'a, T, I>(tokens: I) -> Result<Vec<T>, CryptoError>
where
    T: CanonicalDeserialize,
    I: IntoIterator<Item = &'a str>,
{
    tokens.into_iter().map(from_hex).collect()
}
