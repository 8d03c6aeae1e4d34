use std::io::Read;
use std::sync::Arc;

use log::trace;

use crate::config::{Config, Version};
use crate::decode::WireReader;
use crate::native::VdlType;
use crate::object::{has_message_len, TypeId};
use crate::raw::{transcode, RawValue};
use crate::reader::{TypeLookup, ValueReader};
use crate::target::{Target, ValueTarget};
use crate::type_decoder::{read_type_message, TypeDecoder};
use crate::value::Value;
use crate::vtype::Type;
use crate::writer::RefList;
use crate::{Error, Result};

/// The header of a value message.
struct Header {
    id: TypeId,
    tt: Type,
    refs: Vec<Type>,
    len: Option<u64>,
}

/// Decodes, or skips, one value of type `tt` from `r`.
fn walk<R: Read>(
    r: &mut WireReader<R>,
    lookup: &dyn TypeLookup,
    tt: Type,
    target: Option<&mut dyn Target>,
    max_depth: usize,
) -> Result<()> {
    let mut vr = ValueReader::new(r, lookup).with_max_depth(max_depth);
    match target {
        Some(t) => vr.decode_value(tt, t),
        None => vr.ignore_value(tt),
    }
}

/// Reads values from a stream of type and value messages.
pub struct Decoder<R: Read> {
    reader: WireReader<R>,
    types: Arc<TypeDecoder>,
    shared: bool,
    config: Config,
    version: Option<Version>,
    /// Set once the stream version has been compared with the version of
    /// a shared type stream.
    version_checked: bool,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, Config::default())
    }

    /// The version is read from the stream; only the limits of `config`
    /// apply to decoding.
    pub fn with_config(reader: R, config: Config) -> Self {
        Decoder {
            reader: WireReader::new(reader),
            types: Arc::new(TypeDecoder::with_config(config.clone())),
            shared: false,
            config,
            version: None,
            version_checked: true,
        }
    }

    /// A decoder resolving type ids through a shared [`TypeDecoder`],
    /// usually one fed from a separate type stream. The limits of the type
    /// decoder's config apply to the values too.
    pub fn with_type_decoder(reader: R, types: Arc<TypeDecoder>) -> Self {
        let config = types.config().clone();
        Decoder {
            reader: WireReader::new(reader),
            types,
            shared: true,
            config,
            version: None,
            version_checked: false,
        }
    }

    pub fn type_decoder(&self) -> &Arc<TypeDecoder> {
        &self.types
    }

    /// The stream version, once the first message has been read.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn read_version(&mut self) -> Result<Version> {
        if let Some(v) = self.version {
            return Ok(v);
        }
        if self.reader.at_eof()? {
            return Err(Error::EndOfStream);
        }
        let v = Version::try_from(self.reader.read_u8()?)?;
        self.version = Some(v);
        Ok(v)
    }

    /// Compares the stream version with the shared type stream's, as soon
    /// as the type stream has declared one.
    fn check_version(&mut self, got: Version) -> Result<()> {
        if self.version_checked {
            return Ok(());
        }
        if let Some(want) = self.types.stream_version() {
            if want != got {
                return Err(Error::VersionMismatch { got, want });
            }
            self.version_checked = true;
        }
        Ok(())
    }

    fn read_len(&mut self) -> Result<u64> {
        let len = self.reader.read_uint()?;
        if len > self.config.max_message_len as u64 {
            return Err(Error::MessageTooLong { len, max: self.config.max_message_len });
        }
        Ok(len)
    }

    /// Consumes type messages up to the next value message and returns its
    /// header.
    fn next_header(&mut self) -> Result<Header> {
        let version = self.read_version()?;
        self.check_version(version)?;
        loop {
            if self.reader.at_eof()? {
                return Err(Error::EndOfStream);
            }
            let id = self.reader.read_int()?;
            if id == 0 {
                return Err(Error::ZeroTypeId);
            }
            if id < 0 {
                let id = TypeId(id.unsigned_abs());
                let wire = read_type_message(&mut self.reader, id, self.config.max_message_len)?;
                self.types.add_wire_type(id, wire)?;
                continue;
            }
            let id = TypeId(id as u64);
            let tt = self.types.lookup_or_build_type(id)?;
            let mut refs = Vec::new();
            if version == Version::V81 && tt.contains_any_or_type_object() {
                let n = self.reader.read_uint()?;
                for _ in 0..n {
                    let r = TypeId(self.reader.read_uint()?);
                    refs.push(self.types.lookup_or_build_type(r)?);
                }
            }
            // Waiting on the type stream may have taught us its version.
            self.check_version(version)?;
            let len = if has_message_len(tt) { Some(self.read_len()?) } else { None };
            trace!("vom: value message type {id} ({tt}), len {len:?}");
            return Ok(Header { id, tt, refs, len });
        }
    }

    /// Reads the body of the value message `h` into `target`, or skips it.
    fn read_body(&mut self, h: &Header, target: Option<&mut dyn Target>) -> Result<()> {
        let Self { reader, types, version, config, .. } = self;
        let max_depth = config.max_depth;
        let lookup: &dyn TypeLookup = match version {
            Some(Version::V80) => types.as_ref(),
            _ => &h.refs,
        };
        match h.len {
            Some(len) => {
                let payload = reader.read_vec(len)?;
                let mut r = WireReader::new(payload.as_slice());
                walk(&mut r, lookup, h.tt, target, max_depth)?;
                if !r.at_eof()? {
                    return Err(Error::LeftoverBytes(r.into_inner().len() + 1));
                }
                Ok(())
            }
            None => walk(reader, lookup, h.tt, target, max_depth),
        }
    }

    fn decode_message(&mut self, want: Option<Type>, raw_any: bool) -> Result<Value> {
        let h = self.next_header()?;
        let mut target = ValueTarget::new(want.unwrap_or(h.tt));
        if raw_any {
            target = target.with_raw_any();
        }
        self.read_body(&h, Some(&mut target))?;
        target.finish()
    }

    /// Decodes the next value as `T`, converting from the type it was sent as.
    /// The contents of anys stay encoded until `T` asks for them, so a
    /// [`RawValue`] field captures its bytes as sent.
    pub fn decode<T: VdlType>(&mut self) -> Result<T> {
        let v = self.decode_message(Some(T::vdl_type()?), true)?;
        T::from_value(&v)
    }

    /// Decodes the next value as it was sent.
    pub fn decode_value(&mut self) -> Result<Value> {
        self.decode_message(None, false)
    }

    /// Decodes the next value converted to `want`.
    pub fn decode_value_as(&mut self, want: Type) -> Result<Value> {
        self.decode_message(Some(want), false)
    }

    /// Presents the next value to `target`.
    pub fn decode_into(&mut self, target: &mut dyn Target) -> Result<()> {
        let h = self.next_header()?;
        self.read_body(&h, Some(target))
    }

    /// Captures the next value without decoding it.
    pub fn decode_raw(&mut self) -> Result<RawValue> {
        let version = self.read_version()?;
        let h = self.next_header()?;
        let data = match h.len {
            Some(len) => self.reader.read_vec(len)?,
            None => {
                let lookup: &dyn TypeLookup = match version {
                    Version::V80 => self.types.as_ref(),
                    Version::V81 => &h.refs,
                };
                let max_depth = self.config.max_depth;
                self.reader.record(|r| walk(r, lookup, h.tt, None, max_depth))?.1
            }
        };
        if version == Version::V81 {
            // Checks the payload is exactly one value.
            let mut r = WireReader::new(data.as_slice());
            walk(&mut r, &h.refs, h.tt, None, self.config.max_depth)?;
            if !r.at_eof()? {
                return Err(Error::LeftoverBytes(r.into_inner().len() + 1));
            }
            return Ok(RawValue::new(h.tt, h.refs, data, version));
        }
        // Absolute references are rewritten to index a list of their own.
        let mut refs = RefList::new();
        let data = transcode(h.tt, &data, self.types.as_ref(), &mut refs, self.config.max_depth)?;
        trace!("vom: captured value of type {} with {} refs", h.id, refs.types().len());
        Ok(RawValue::new(h.tt, refs.into_types(), data, version))
    }

    /// Skips the next value.
    pub fn ignore(&mut self) -> Result<()> {
        let h = self.next_header()?;
        match h.len {
            Some(len) => self.reader.skip(len),
            None => self.read_body(&h, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use crate::object::WIRE_CTRL_END;

    fn encoded(values: &[Value], version: Version) -> Vec<u8> {
        let mut enc = Encoder::with_version(Vec::new(), version);
        for v in values {
            enc.encode_value(v).unwrap();
        }
        enc.into_inner()
    }

    #[test]
    fn test_values_then_eof() {
        let bytes = encoded(&[Value::int64(5), Value::string("hi")], Version::V81);
        let mut dec = Decoder::new(bytes.as_slice());
        assert_eq!(dec.decode_value().unwrap(), Value::int64(5));
        assert_eq!(dec.decode::<String>().unwrap(), "hi");
        assert!(dec.decode_value().unwrap_err().is_eof());
        assert_eq!(dec.version(), Some(Version::V81));
    }

    #[test]
    fn test_empty_and_bad_version() {
        assert!(Decoder::new(&[][..]).decode_value().unwrap_err().is_eof());
        assert!(matches!(Decoder::new(&[0x7f][..]).decode_value(), Err(Error::UnsupportedVersion(0x7f))));
    }

    #[test]
    fn test_zero_and_unknown_ids() {
        assert!(matches!(Decoder::new(&[0x81, 0][..]).decode_value(), Err(Error::ZeroTypeId)));
        // Value of type 41 with no type message.
        assert!(matches!(
            Decoder::new(&[0x81, 0x52, 1, WIRE_CTRL_END][..]).decode_value(),
            Err(Error::UnknownType(TypeId(41)))
        ));
    }

    #[test]
    fn test_message_too_long() {
        let list = Type::list_of(Type::INT64).unwrap();
        let v = Value::list(list, vec![Value::int64(1); 8]).unwrap();
        let bytes = encoded(&[v], Version::V81);
        let mut dec = Decoder::with_config(bytes.as_slice(), Config::default().with_max_message_len(4));
        assert!(matches!(dec.decode_value(), Err(Error::MessageTooLong { max: 4, .. })));
    }

    #[test]
    fn test_leftover_bytes() {
        // []int64 (id 41) whose length covers one more byte than the value.
        let list = Type::list_of(Type::INT64).unwrap();
        let mut bytes = encoded(&[Value::list(list, vec![Value::int64(1)]).unwrap()], Version::V81);
        let n = bytes.len();
        // ... 0x52, len 2, [1, 2] becomes 0x52, len 3, [1, 2, 0].
        assert_eq!(&bytes[n - 4..], &[0x52, 2, 1, 2]);
        bytes[n - 3] = 3;
        bytes.push(0);
        assert!(matches!(Decoder::new(bytes.as_slice()).decode_value(), Err(Error::LeftoverBytes(1))));
    }

    #[test]
    fn test_ignore_then_decode() {
        let s = Type::struct_of("dec.S", &[("A", Type::STRING)]).unwrap();
        let first = Value::struct_from(s, &[("A", Value::string("skip me"))]).unwrap();
        let bytes = encoded(&[first, Value::string("x"), Value::bool(true)], Version::V81);
        let mut dec = Decoder::new(bytes.as_slice());
        dec.ignore().unwrap();
        dec.ignore().unwrap();
        assert!(dec.decode::<bool>().unwrap());
    }

    #[test]
    fn test_decode_into_target() {
        let bytes = encoded(&[Value::complex128(1.5, -2.0)], Version::V81);
        let mut target = ValueTarget::new(Type::COMPLEX128);
        Decoder::new(bytes.as_slice()).decode_into(&mut target).unwrap();
        assert_eq!(target.finish().unwrap().as_complex(), Some((1.5, -2.0)));
    }

    #[test]
    fn test_decode_raw_v80_and_v81() {
        let list = Type::list_of(Type::ANY).unwrap();
        let v = Value::list(list, vec![Value::int64(1), Value::string("x"), Value::int64(2)]).unwrap();
        for version in [Version::V80, Version::V81] {
            let bytes = encoded(&[v.clone(), Value::uint16(3)], version);
            let mut dec = Decoder::new(bytes.as_slice());
            let raw = dec.decode_raw().unwrap();
            assert_eq!(raw.version(), version);
            assert_eq!(raw.ref_types(), &[Type::INT64, Type::STRING]);
            assert_eq!(raw.data(), &[3, 0, 2, 1, 1, b'x', 0, 4]);
            assert_eq!(raw.to_value().unwrap(), v);
            let raw = dec.decode_raw().unwrap();
            assert_eq!(raw.data(), &[3]);
        }
    }
}
