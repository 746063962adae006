//! Compact string encoding for persistent state.
//!
//! Snapshots are bincode-serialized, gzip-compressed and base64-encoded so
//! they survive transport through string-only memory substrates.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub fn encode_to_string<T>(data: &T) -> Result<String, String>
where
    T: Serialize,
{
    let serialized_data = bincode::serialize(data).map_err(|e| e.to_string())?;

    encode_buffer_to_string(&serialized_data)
}

pub fn encode_buffer_to_string(data: &[u8]) -> Result<String, String> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::prelude::*;

    let mut compressor = GzEncoder::new(Vec::with_capacity(1024), Compression::default());

    compressor.write_all(data).map_err(|e| e.to_string())?;

    let compressed_data = compressor.finish().map_err(|e| e.to_string())?;

    Ok(BASE64.encode(&compressed_data))
}

pub fn decode_from_string<T>(data: &str) -> Result<T, String>
where
    for<'de> T: Deserialize<'de>,
{
    let decoded_data = decode_buffer_from_string(data)?;

    bincode::deserialize_from(decoded_data.as_slice()).map_err(|e| e.to_string())
}

pub fn decode_buffer_from_string(data: &str) -> Result<Vec<u8>, String> {
    use flate2::read::GzDecoder;
    use std::io::prelude::*;

    let decoded_data = BASE64.decode(data).map_err(|e| e.to_string())?;

    let mut decompressor = GzDecoder::new(decoded_data.as_slice());

    let mut decompressed_data = Vec::with_capacity(1024);

    decompressor.read_to_end(&mut decompressed_data).map_err(|e| e.to_string())?;

    Ok(decompressed_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_structured_data() {
        let original: Vec<(String, u32)> = vec![("alpha".to_string(), 1), ("beta".to_string(), 2000)];

        let encoded = encode_to_string(&original).unwrap();
        let decoded: Vec<(String, u32)> = decode_from_string(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn rejects_garbage_input() {
        assert!(decode_from_string::<Vec<u32>>("not-base64!@#").is_err());
    }
}
