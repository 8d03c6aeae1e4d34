use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder};

use crate::{Error, Result};

/// An unsigned integer or a control byte, which share the first-byte space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UintOrControl {
    Uint(u64),
    Control(u8),
}

/// Reads the primitive encodings written by [`WireWriter`](crate::encode::WireWriter).
///
/// Holds one byte of lookahead so callers can test for control bytes and
/// for a clean end of stream. Optionally records every byte consumed.
pub struct WireReader<R: Read> {
    reader: R,
    peeked: Option<u8>,
    recording: Option<Vec<u8>>,
}

fn is_control(b: u8) -> bool {
    (0x80..=0xf7).contains(&b)
}

fn eof() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of stream"))
}

impl<R: Read> WireReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, peeked: None, recording: None }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn fill(&mut self) -> Result<Option<u8>> {
        if self.peeked.is_none() {
            let mut buf = [0; 1];
            loop {
                match self.reader.read(&mut buf) {
                    Ok(0) => return Ok(None),
                    Ok(_) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            self.peeked = Some(buf[0]);
        }
        Ok(self.peeked)
    }

    /// Reports whether the stream has ended. Never consumes input.
    pub fn at_eof(&mut self) -> Result<bool> {
        Ok(self.fill()?.is_none())
    }

    pub fn peek_u8(&mut self) -> Result<u8> {
        self.fill()?.ok_or_else(eof)
    }

    /// The next byte if it is a control byte, without consuming it.
    pub fn peek_control(&mut self) -> Result<Option<u8>> {
        let b = self.peek_u8()?;
        Ok(is_control(b).then_some(b))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let b = self.peek_u8()?;
        self.peeked = None;
        if let Some(rec) = &mut self.recording {
            rec.push(b);
        }
        Ok(b)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut start = 0;
        if let Some(b) = self.peeked.take() {
            buf[0] = b;
            start = 1;
        }
        self.reader.read_exact(&mut buf[start..])?;
        if let Some(rec) = &mut self.recording {
            rec.extend_from_slice(buf);
        }
        Ok(())
    }

    /// Reads `n` bytes without trusting `n` for preallocation.
    pub fn read_vec(&mut self, n: u64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut remaining = n;
        if remaining > 0 {
            if let Some(b) = self.peeked.take() {
                out.push(b);
                remaining -= 1;
            }
        }
        let got = (&mut self.reader).take(remaining).read_to_end(&mut out)?;
        if (got as u64) < remaining {
            return Err(eof());
        }
        if let Some(rec) = &mut self.recording {
            rec.extend_from_slice(&out);
        }
        Ok(out)
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        if self.recording.is_some() {
            self.read_vec(n)?;
            return Ok(());
        }
        let mut remaining = n;
        if remaining > 0 && self.peeked.take().is_some() {
            remaining -= 1;
        }
        let got = io::copy(&mut (&mut self.reader).take(remaining), &mut io::sink())?;
        if got < remaining {
            return Err(eof());
        }
        Ok(())
    }

    /// Starts recording consumed bytes, discarding any previous recording.
    pub fn start_recording(&mut self) {
        self.recording = Some(Vec::new());
    }

    pub fn take_recording(&mut self) -> Vec<u8> {
        self.recording.take().unwrap_or_default()
    }

    /// Runs `f` and returns the bytes it consumed. A recording already in
    /// progress keeps those bytes too.
    pub fn record<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<(T, Vec<u8>)> {
        let outer = self.recording.replace(Vec::new());
        let res = f(self);
        let inner = self.recording.take().unwrap_or_default();
        if let Some(mut outer) = outer {
            outer.extend_from_slice(&inner);
            self.recording = Some(outer);
        }
        Ok((res?, inner))
    }

    pub fn read_uint_or_control(&mut self) -> Result<UintOrControl> {
        let u7_or_len = self.read_u8()?;
        if u7_or_len < 0x80 {
            return Ok(UintOrControl::Uint(u7_or_len as u64));
        }
        if is_control(u7_or_len) {
            return Ok(UintOrControl::Control(u7_or_len));
        }
        let len = (!u7_or_len + 1) as usize;
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf[..len])?;
        // Only the shortest encoding of a value is accepted.
        if buf[0] == 0 || (len == 1 && buf[0] < 0x80) {
            return Err(Error::invalid(format!("non-minimal uint encoding {:02x?}", &buf[..len])));
        }
        Ok(UintOrControl::Uint(BigEndian::read_uint(&buf[..len], len)))
    }

    #[inline]
    pub fn read_uint(&mut self) -> Result<u64> {
        match self.read_uint_or_control()? {
            UintOrControl::Uint(v) => Ok(v),
            UintOrControl::Control(c) => Err(Error::UnexpectedControlByte(c)),
        }
    }

    #[inline]
    pub fn read_int(&mut self) -> Result<i64> {
        let bits = self.read_uint()?;
        let sint = (bits >> 1) as i64;
        if bits & 1 == 0 { Ok(sint) } else { Ok(!sint) }
    }

    #[inline]
    pub fn read_float(&mut self) -> Result<f64> {
        let bits = self.read_uint()?;
        Ok(f64::from_bits(bits.swap_bytes()))
    }

    #[inline]
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::invalid(format!("invalid bool byte {b:#04x}"))),
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_uint()?;
        self.read_vec(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| Error::invalid(format!("string is not utf-8: {e}")))
    }

    /// Skips a length-prefixed byte string.
    pub fn skip_bytes(&mut self) -> Result<()> {
        let len = self.read_uint()?;
        self.skip(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_uint() {
        let mut dec = WireReader::new(&[0xfe, 0x01][..]);
        match dec.read_uint() {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_non_minimal_uint() {
        for bytes in [&[0xff, 0x05][..], &[0xfe, 0x00, 0x80], &[0xf8, 0, 0, 0, 0, 0, 0, 0, 1]] {
            assert!(matches!(WireReader::new(bytes).read_uint(), Err(Error::InvalidValue(_))), "{bytes:02x?}");
        }
        assert_eq!(WireReader::new(&[0xff, 0x80][..]).read_uint().unwrap(), 0x80);
        assert_eq!(WireReader::new(&[0xfe, 0x01, 0x00][..]).read_uint().unwrap(), 0x100);
    }

    #[test]
    fn test_control_bytes() {
        let mut dec = WireReader::new(&[0xe1, 0x05][..]);
        assert_eq!(dec.peek_control().unwrap(), Some(0xe1));
        assert!(matches!(dec.read_uint(), Err(Error::UnexpectedControlByte(0xe1))));
        assert_eq!(dec.peek_control().unwrap(), None);
        assert_eq!(dec.read_uint_or_control().unwrap(), UintOrControl::Uint(5));
        assert!(dec.at_eof().unwrap());
    }

    #[test]
    fn test_bool_bytes() {
        let mut dec = WireReader::new(&[0, 1, 2][..]);
        assert!(!dec.read_bool().unwrap());
        assert!(dec.read_bool().unwrap());
        assert!(dec.read_bool().is_err());
    }

    #[test]
    fn test_recording_and_skip() {
        let mut dec = WireReader::new(&[3, b'a', b'b', b'c', 2, b'x', b'y', 7][..]);
        dec.peek_u8().unwrap();
        dec.start_recording();
        assert_eq!(dec.read_string().unwrap(), "abc");
        dec.skip_bytes().unwrap();
        assert_eq!(dec.take_recording(), vec![3, b'a', b'b', b'c', 2, b'x', b'y']);
        assert_eq!(dec.read_u8().unwrap(), 7);
        assert!(dec.at_eof().unwrap());
    }

    #[test]
    fn test_nested_record() {
        let mut dec = WireReader::new(&[1, 2, 3, 4][..]);
        dec.start_recording();
        dec.read_u8().unwrap();
        let (b, inner) = dec.record(|r| r.read_u8()).unwrap();
        assert_eq!((b, inner), (2, vec![2]));
        dec.read_u8().unwrap();
        assert_eq!(dec.take_recording(), vec![1, 2, 3]);
    }

    #[test]
    fn test_huge_length_does_not_allocate() {
        let mut dec = WireReader::new(&[0xf8, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, b'a'][..]);
        assert!(dec.read_bytes().is_err());
    }
}
