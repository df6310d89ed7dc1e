//! CBOR value encoding for stored records
//! Records derive minicbor with map encoding, so decoders skip fields they
//! do not know about and missing optional fields decode as `None`.

use minicbor::{Decode, Encode};

#[derive(Debug, thiserror::Error)]
pub enum CborError {
    #[error("failed to encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: minicbor::decode::Error,
    },
}

/// Encode a record to bytes
pub fn encode<T: Encode<()>>(value: &T) -> Result<Vec<u8>, CborError> {
    minicbor::to_vec(value).map_err(|e| CborError::Encode {
        what: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}

/// Decode a record from bytes
pub fn decode<'a, T: Decode<'a, ()>>(bytes: &'a [u8]) -> Result<T, CborError> {
    minicbor::decode(bytes).map_err(|source| CborError::Decode {
        what: std::any::type_name::<T>(),
        source,
    })
}
