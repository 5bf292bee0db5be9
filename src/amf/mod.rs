//! AMF0 value codec, consumed through the batch interface: a command or
//! data message body decodes to a flat sequence of values and encodes
//! back from one. AMF3 bodies are handled upstream by dropping the
//! leading byte and reading the remainder as AMF0.

mod amf0;

pub use amf0::*;

use crate::{ByteBuffer, Error, Result};

/// Decode every value in `data`, in order.
pub fn decode_batch(data: &[u8]) -> Result<Vec<Amf0Value>> {
    let mut buffer = ByteBuffer::new(data.to_vec());
    let mut values = Vec::new();

    while buffer.remaining() > 0 {
        values.push(decode_value(&mut buffer)?);
    }

    Ok(values)
}

/// Encode `values` back to back.
pub fn encode_batch(values: &[Amf0Value]) -> Result<Vec<u8>> {
    let mut buffer = ByteBuffer::with_capacity(256);

    for value in values {
        encode_value(&mut buffer, value)?;
    }

    if buffer.is_empty() {
        return Err(Error::command("nothing to encode"));
    }

    Ok(buffer.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_batch_round_trip() {
        let mut obj = HashMap::new();
        obj.insert("app".to_string(), Amf0Value::String("live".to_string()));
        obj.insert("fpad".to_string(), Amf0Value::Boolean(false));
        obj.insert("audioCodecs".to_string(), Amf0Value::Number(4071.0));

        let values = vec![
            Amf0Value::String("connect".to_string()),
            Amf0Value::Number(1.0),
            Amf0Value::Object(obj),
            Amf0Value::Null,
        ];

        let bytes = encode_batch(&values).unwrap();
        let decoded = decode_batch(&bytes).unwrap();
        assert_eq!(values, decoded);
    }

    #[test]
    fn test_decode_known_connect_prefix() {
        // "connect" + transaction id 1
        let bytes = [
            0x02, 0x00, 0x07, b'c', b'o', b'n', b'n', b'e', b'c', b't', 0x00,
            0x3F, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let values = decode_batch(&bytes).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_str(), Some("connect"));
        assert_eq!(values[1].as_number(), Some(1.0));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(encode_batch(&[]).is_err());
        assert!(decode_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_value() {
        // String marker with a length that overruns the payload.
        let bytes = [0x02, 0x00, 0x10, b'x'];
        assert!(decode_batch(&bytes).is_err());
    }
}
