use std::io::Write;

use byteorder::{BigEndian, ByteOrder};

use crate::Result;

/// Writes the primitive encodings every message is made of.
pub struct WireWriter<W: Write> {
    writer: W,
}

impl<W: Write> WireWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf)?;
        Ok(())
    }

    /// Writes a single raw byte.
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.writer.write_all(&[v])?;
        Ok(())
    }

    /// Writes a control byte such as [`WIRE_CTRL_NIL`](crate::object::WIRE_CTRL_NIL).
    pub fn write_control(&mut self, ctrl: u8) -> Result<()> {
        self.write_u8(ctrl)
    }

    /// Writes an unsigned integer.
    /// Values below 128 are a single byte. Larger values are a length byte
    /// (the inverted byte count minus one) followed by the big-endian bytes.
    pub fn write_uint(&mut self, v: u64) -> Result<()> {
        if v < 128 {
            return self.write_u8(v as u8);
        }
        let n = 8 - (v.leading_zeros() / 8) as usize;
        let mut buf = [0u8; 9];
        buf[0] = !(n as u8 - 1);
        BigEndian::write_uint(&mut buf[1..=n], v, n);
        self.writer.write_all(&buf[..=n])?;
        Ok(())
    }

    /// Writes a signed integer, zig-zag folded into an unsigned one.
    pub fn write_int(&mut self, v: i64) -> Result<()> {
        let u = if v < 0 { ((!v as u64) << 1) | 1 } else { (v as u64) << 1 };
        self.write_uint(u)
    }

    /// Writes a float as its byte-reversed IEEE bits, which keeps small
    /// integral values short.
    pub fn write_float(&mut self, v: f64) -> Result<()> {
        self.write_uint(v.to_bits().swap_bytes())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Writes a length-prefixed byte string.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_uint(v.len() as u64)?;
        self.writer.write_all(v)?;
        Ok(())
    }

    pub fn write_string(&mut self, v: &str) -> Result<()> {
        self.write_bytes(v.as_bytes())
    }
}
