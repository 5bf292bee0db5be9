use crate::{ByteBuffer, Error, Result};
use std::collections::HashMap;

/// AMF0 type markers.
mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
}

pub type Amf0Object = HashMap<String, Amf0Value>;

/// The AMF0 value subset the RTMP command dialogue uses.
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(Amf0Object),
    Null,
    Undefined,
    EcmaArray(Amf0Object),
    Array(Vec<Amf0Value>),
    Date(f64, i16),
    LongString(String),
}

impl Amf0Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) | Amf0Value::LongString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }
}

pub(crate) fn decode_value(buffer: &mut ByteBuffer) -> Result<Amf0Value> {
    let marker = buffer.read_u8().map_err(map_eof)?;
    match marker {
        markers::NUMBER => Ok(Amf0Value::Number(buffer.read_f64_be().map_err(map_eof)?)),
        markers::BOOLEAN => Ok(Amf0Value::Boolean(buffer.read_u8().map_err(map_eof)? != 0)),
        markers::STRING => Ok(Amf0Value::String(decode_short_string(buffer)?)),
        markers::OBJECT => Ok(Amf0Value::Object(decode_properties(buffer)?)),
        markers::NULL => Ok(Amf0Value::Null),
        markers::UNDEFINED => Ok(Amf0Value::Undefined),
        markers::ECMA_ARRAY => {
            let _count = buffer.read_u32_be().map_err(map_eof)?;
            Ok(Amf0Value::EcmaArray(decode_properties(buffer)?))
        }
        markers::STRICT_ARRAY => {
            let count = buffer.read_u32_be().map_err(map_eof)? as usize;
            let mut array = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                array.push(decode_value(buffer)?);
            }
            Ok(Amf0Value::Array(array))
        }
        markers::DATE => {
            let timestamp = buffer.read_f64_be().map_err(map_eof)?;
            let timezone = buffer.read_i16_be().map_err(map_eof)?;
            Ok(Amf0Value::Date(timestamp, timezone))
        }
        markers::LONG_STRING => {
            let len = buffer.read_u32_be().map_err(map_eof)? as usize;
            let bytes = buffer.read_bytes(len).map_err(map_eof)?;
            Ok(Amf0Value::LongString(utf8(bytes)?))
        }
        other => Err(Error::protocol(format!("unknown amf0 marker=0x{:02x}", other))),
    }
}

fn decode_short_string(buffer: &mut ByteBuffer) -> Result<String> {
    let len = buffer.read_u16_be().map_err(map_eof)? as usize;
    let bytes = buffer.read_bytes(len).map_err(map_eof)?;
    utf8(bytes)
}

fn decode_properties(buffer: &mut ByteBuffer) -> Result<Amf0Object> {
    let mut object = HashMap::new();
    loop {
        let name_len = buffer.read_u16_be().map_err(map_eof)? as usize;
        if name_len == 0 {
            let end = buffer.read_u8().map_err(map_eof)?;
            if end != markers::OBJECT_END {
                return Err(Error::protocol(format!(
                    "expected object end marker, got 0x{:02x}",
                    end
                )));
            }
            break;
        }

        let name = utf8(buffer.read_bytes(name_len).map_err(map_eof)?)?;
        let value = decode_value(buffer)?;
        object.insert(name, value);
    }
    Ok(object)
}

pub(crate) fn encode_value(buffer: &mut ByteBuffer, value: &Amf0Value) -> Result<()> {
    match value {
        Amf0Value::Number(n) => {
            buffer.write_u8(markers::NUMBER);
            buffer.write_f64_be(*n);
        }
        Amf0Value::Boolean(b) => {
            buffer.write_u8(markers::BOOLEAN);
            buffer.write_u8(u8::from(*b));
        }
        Amf0Value::String(s) => {
            if s.len() > u16::MAX as usize {
                return Err(Error::protocol("string too long for short form"));
            }
            buffer.write_u8(markers::STRING);
            encode_property_name(buffer, s);
        }
        Amf0Value::Object(obj) => {
            buffer.write_u8(markers::OBJECT);
            encode_properties(buffer, obj)?;
        }
        Amf0Value::Null => buffer.write_u8(markers::NULL),
        Amf0Value::Undefined => buffer.write_u8(markers::UNDEFINED),
        Amf0Value::EcmaArray(obj) => {
            buffer.write_u8(markers::ECMA_ARRAY);
            buffer.write_u32_be(obj.len() as u32);
            encode_properties(buffer, obj)?;
        }
        Amf0Value::Array(arr) => {
            buffer.write_u8(markers::STRICT_ARRAY);
            buffer.write_u32_be(arr.len() as u32);
            for item in arr {
                encode_value(buffer, item)?;
            }
        }
        Amf0Value::Date(timestamp, timezone) => {
            buffer.write_u8(markers::DATE);
            buffer.write_f64_be(*timestamp);
            buffer.write_i16_be(*timezone);
        }
        Amf0Value::LongString(s) => {
            buffer.write_u8(markers::LONG_STRING);
            buffer.write_u32_be(s.len() as u32);
            buffer.write_bytes(s.as_bytes());
        }
    }
    Ok(())
}

fn encode_properties(buffer: &mut ByteBuffer, obj: &Amf0Object) -> Result<()> {
    for (key, value) in obj {
        encode_property_name(buffer, key);
        encode_value(buffer, value)?;
    }
    buffer.write_u16_be(0);
    buffer.write_u8(markers::OBJECT_END);
    Ok(())
}

fn encode_property_name(buffer: &mut ByteBuffer, name: &str) {
    buffer.write_u16_be(name.len() as u16);
    buffer.write_bytes(name.as_bytes());
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::protocol(format!("invalid utf-8: {}", e)))
}

fn map_eof(e: std::io::Error) -> Error {
    Error::protocol(format!("truncated amf0 value: {}", e))
}
