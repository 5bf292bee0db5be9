use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Error as IoError, ErrorKind, Result as IoResult};

/// Growable byte buffer with a read cursor, used by the AMF codec and the
/// message constructors. Network IO goes through `io::BufferedReader` and
/// `io::BufferedWriter` instead.
pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        if !self.has_remaining(len) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "not enough bytes"));
        }
        let bytes = self.buffer[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;
        Ok(bytes)
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn read_u8(&mut self) -> IoResult<u8> {
        if !self.has_remaining(1) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "not enough bytes"));
        }
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        if !self.has_remaining(2) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "not enough bytes"));
        }
        let value = Cursor::new(&self.buffer[self.cursor..]).read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    pub fn write_u16_be(&mut self, value: u16) {
        let mut bytes = vec![];
        bytes.write_u16::<BigEndian>(value).expect("vec write");
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn read_i16_be(&mut self) -> IoResult<i16> {
        if !self.has_remaining(2) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "not enough bytes"));
        }
        let value = Cursor::new(&self.buffer[self.cursor..]).read_i16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    pub fn write_i16_be(&mut self, value: i16) {
        let mut bytes = vec![];
        bytes.write_i16::<BigEndian>(value).expect("vec write");
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        if !self.has_remaining(4) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "not enough bytes"));
        }
        let value = Cursor::new(&self.buffer[self.cursor..]).read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    pub fn write_u32_be(&mut self, value: u32) {
        let mut bytes = vec![];
        bytes.write_u32::<BigEndian>(value).expect("vec write");
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        if !self.has_remaining(8) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "not enough bytes"));
        }
        let value = Cursor::new(&self.buffer[self.cursor..]).read_f64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }

    pub fn write_f64_be(&mut self, value: f64) {
        let mut bytes = vec![];
        bytes.write_f64::<BigEndian>(value).expect("vec write");
        self.buffer.extend_from_slice(&bytes);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_u8() {
        let mut w = ByteBuffer::with_capacity(2);
        w.write_u8(0x42);
        w.write_u8(0x84);

        let mut r = ByteBuffer::new(w.into_vec());
        assert_eq!(r.read_u8().unwrap(), 0x42);
        assert_eq!(r.read_u8().unwrap(), 0x84);
    }

    #[test]
    fn test_read_write_u16() {
        let mut w = ByteBuffer::with_capacity(2);
        w.write_u16_be(0x1234);

        let mut r = ByteBuffer::new(w.into_vec());
        assert_eq!(r.read_u16_be().unwrap(), 0x1234);
    }

    #[test]
    fn test_remaining() {
        let mut buffer = ByteBuffer::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(buffer.remaining(), 5);
        buffer.read_u8().unwrap();
        assert_eq!(buffer.remaining(), 4);
    }

    #[test]
    fn test_boundary_checks() {
        let mut buffer = ByteBuffer::new(vec![1, 2]);
        assert!(buffer.read_u16_be().is_ok());
        assert!(buffer.read_u32_be().is_err());
    }
}
