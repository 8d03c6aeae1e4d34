use std::collections::HashMap;
use std::io::Write;
use std::mem;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::config::{Config, Version, DEFAULT_MAX_DEPTH};
use crate::encode::WireWriter;
use crate::native::VdlType;
use crate::object::{bootstrap_id, has_message_len, TypeId, FIRST_USER_ID};
use crate::raw::{transcode, RawValue};
use crate::types::{
    WireArray, WireEnum, WireField, WireList, WireMap, WireNamed, WireOptional, WireSet, WireStruct, WireType,
    WireUnion,
};
use crate::value::Value;
use crate::vtype::{Kind, Type};
use crate::writer::{RefList, TypeRefs, ValueWriter};
use crate::{Error, Result};

/// The ids assigned to types on one outbound stream.
#[derive(Debug)]
pub struct WireTypeTable {
    ids: HashMap<Type, TypeId>,
    next: u64,
}

impl Default for WireTypeTable {
    fn default() -> Self {
        Self { ids: HashMap::new(), next: FIRST_USER_ID.0 }
    }
}

impl WireTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, t: Type) -> Option<TypeId> {
        bootstrap_id(t).or_else(|| self.ids.get(&t).copied())
    }

    /// Returns the id for `t`, allocating one if the stream has not seen it.
    /// The flag is true for a new id, whose type message the caller owes.
    pub fn reference_type(&mut self, t: Type) -> (TypeId, bool) {
        if let Some(id) = self.lookup(t) {
            return (id, false);
        }
        let id = TypeId(self.next);
        self.next += 1;
        self.ids.insert(t, id);
        (id, true)
    }
}

enum Sink {
    /// Type messages wait here until the value message that needs them.
    Inline(Vec<u8>),
    /// Type messages go straight to their own stream.
    Stream(Box<dyn Write + Send>),
}

struct TypeEncoderState {
    table: WireTypeTable,
    sink: Sink,
    version: Version,
    wrote_version: bool,
}

/// Assigns type ids and writes type messages for one outbound type stream.
///
/// Encoders created with [`Encoder::with_type_encoder`] share one instance,
/// so every type is described once however many value streams use it.
pub struct TypeEncoder {
    inner: Mutex<TypeEncoderState>,
}

impl TypeEncoder {
    /// A type encoder writing its type messages to `writer`, a stream
    /// separate from the values.
    pub fn new(writer: impl Write + Send + 'static, version: Version) -> Self {
        Self::with_sink(Sink::Stream(Box::new(writer)), version)
    }

    pub(crate) fn inline(version: Version) -> Self {
        Self::with_sink(Sink::Inline(Vec::new()), version)
    }

    fn with_sink(sink: Sink, version: Version) -> Self {
        TypeEncoder {
            inner: Mutex::new(TypeEncoderState { table: WireTypeTable::new(), sink, version, wrote_version: false }),
        }
    }

    pub fn version(&self) -> Version {
        self.inner.lock().version
    }

    /// Returns the id of `t`, first writing the type messages of `t` and of
    /// any component types this stream has not described yet.
    pub fn encode_type(&self, t: Type) -> Result<TypeId> {
        let mut st = self.inner.lock();
        let id = st.encode_type(t)?;
        if let Sink::Stream(w) = &mut st.sink {
            w.flush()?;
        }
        Ok(id)
    }

    /// Drains the type messages buffered for an inline stream.
    pub(crate) fn take_pending(&self) -> Vec<u8> {
        match &mut self.inner.lock().sink {
            Sink::Inline(buf) => mem::take(buf),
            Sink::Stream(_) => Vec::new(),
        }
    }
}

impl TypeEncoderState {
    fn encode_type(&mut self, t: Type) -> Result<TypeId> {
        let (id, is_new) = self.table.reference_type(t);
        if !is_new {
            return Ok(id);
        }
        // The id is taken before the components are described, so a cycle
        // back to `t` finds it.
        let wire = self.wire_type(t)?;
        let payload = wire.encode()?;
        self.write_type_message(id, &payload)?;
        debug!("vom: sent type {id}: {t}");
        Ok(id)
    }

    fn fields(&mut self, t: Type) -> Result<Vec<WireField>> {
        t.fields()
            .iter()
            .map(|f| Ok(WireField { name: f.name.clone(), ty: self.encode_type(f.ty)? }))
            .collect()
    }

    fn wire_type(&mut self, t: Type) -> Result<WireType> {
        let name = t.name().to_string();
        if t.kind().is_primitive() {
            let base = Type::primitive(t.kind())
                .and_then(bootstrap_id)
                .ok_or_else(|| Error::invalid(format!("{t} has no wire description")))?;
            return Ok(WireType::Named(WireNamed { name, base }));
        }
        Ok(match t.kind() {
            Kind::Enum => WireType::Enum(WireEnum { name, labels: t.labels().to_vec() }),
            Kind::Array => {
                WireType::Array(WireArray { name, elem: self.encode_type(t.elem())?, len: t.len() as u64 })
            }
            Kind::List => WireType::List(WireList { name, elem: self.encode_type(t.elem())? }),
            Kind::Set => WireType::Set(WireSet { name, key: self.encode_type(t.key())? }),
            Kind::Map => {
                let key = self.encode_type(t.key())?;
                let elem = self.encode_type(t.elem())?;
                WireType::Map(WireMap { name, key, elem })
            }
            Kind::Struct => WireType::Struct(WireStruct { name, fields: self.fields(t)? }),
            Kind::Union => WireType::Union(WireUnion { name, fields: self.fields(t)? }),
            Kind::Optional => WireType::Optional(WireOptional { name, elem: self.encode_type(t.elem())? }),
            _ => return Err(Error::invalid(format!("{t} has no wire description"))),
        })
    }

    fn write_type_message(&mut self, id: TypeId, payload: &[u8]) -> Result<()> {
        let mut msg = WireWriter::new(Vec::with_capacity(payload.len() + 12));
        if !self.wrote_version {
            if let Sink::Stream(_) = self.sink {
                msg.write_u8(self.version.byte())?;
            }
            self.wrote_version = true;
        }
        msg.write_int(-(id.0 as i64))?;
        msg.write_uint(payload.len() as u64)?;
        msg.write_all(payload)?;
        let msg = msg.into_inner();
        match &mut self.sink {
            Sink::Inline(buf) => buf.extend_from_slice(&msg),
            Sink::Stream(w) => w.write_all(&msg)?,
        }
        Ok(())
    }
}

/// Type references written as absolute type ids.
struct AbsoluteRefs<'a>(&'a TypeEncoder);

impl TypeRefs for AbsoluteRefs<'_> {
    fn type_ref(&mut self, t: Type) -> Result<u64> {
        Ok(self.0.encode_type(t)?.0)
    }
}

/// Writes values as a stream of type and value messages.
pub struct Encoder<W: Write> {
    writer: WireWriter<W>,
    types: Arc<TypeEncoder>,
    version: Version,
    wrote_version: bool,
    max_depth: usize,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, Config::default())
    }

    pub fn with_version(writer: W, version: Version) -> Self {
        Self::with_config(writer, Config::default().with_version(version))
    }

    pub fn with_config(writer: W, config: Config) -> Self {
        Encoder {
            writer: WireWriter::new(writer),
            types: Arc::new(TypeEncoder::inline(config.version)),
            version: config.version,
            wrote_version: false,
            max_depth: config.max_depth,
        }
    }

    /// An encoder whose type messages go through a shared [`TypeEncoder`]
    /// instead of being interleaved with the values.
    pub fn with_type_encoder(writer: W, types: Arc<TypeEncoder>) -> Self {
        let version = types.version();
        Encoder {
            writer: WireWriter::new(writer),
            types,
            version,
            wrote_version: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn encode<T: VdlType>(&mut self, v: &T) -> Result<()> {
        let value = v.to_value()?;
        self.encode_value(&value)
    }

    pub fn encode_value(&mut self, v: &Value) -> Result<()> {
        // A message carries the concrete type of a top-level any.
        let v = v.unwrap_any();
        let tt = v.ty();
        let id = self.types.encode_type(tt)?;
        let (payload, refs) = match self.version {
            Version::V81 => {
                let mut list = RefList::new();
                let mut w = ValueWriter::new(tt, &mut list);
                v.drive(&mut w)?;
                let payload = w.into_bytes();
                (payload, self.ref_ids(list.types())?)
            }
            Version::V80 => {
                let mut refs = AbsoluteRefs(&self.types);
                let mut w = ValueWriter::new(tt, &mut refs);
                v.drive(&mut w)?;
                (w.into_bytes(), Vec::new())
            }
        };
        self.write_message(id, tt, &refs, &payload)
    }

    /// Re-encodes a captured value, remapping its type references onto this
    /// stream.
    pub fn encode_raw(&mut self, raw: &RawValue) -> Result<()> {
        let tt = raw.ty();
        let id = self.types.encode_type(tt)?;
        match self.version {
            Version::V81 => {
                let refs = self.ref_ids(raw.ref_types())?;
                self.write_message(id, tt, &refs, raw.data())
            }
            Version::V80 => {
                let mut refs = AbsoluteRefs(&self.types);
                let lookup = raw.ref_types().to_vec();
                let payload = transcode(tt, raw.data(), &lookup, &mut refs, self.max_depth)?;
                self.write_message(id, tt, &[], &payload)
            }
        }
    }

    fn ref_ids(&self, types: &[Type]) -> Result<Vec<TypeId>> {
        types.iter().map(|t| self.types.encode_type(*t)).collect()
    }

    fn write_message(&mut self, id: TypeId, tt: Type, refs: &[TypeId], payload: &[u8]) -> Result<()> {
        if !self.wrote_version {
            self.writer.write_u8(self.version.byte())?;
            self.wrote_version = true;
        }
        let pending = self.types.take_pending();
        self.writer.write_all(&pending)?;
        self.writer.write_int(id.0 as i64)?;
        if self.version == Version::V81 && tt.contains_any_or_type_object() {
            self.writer.write_uint(refs.len() as u64)?;
            for r in refs {
                self.writer.write_uint(r.0)?;
            }
        }
        if has_message_len(tt) {
            self.writer.write_uint(payload.len() as u64)?;
        }
        self.writer.write_all(payload)?;
        trace!("vom: value message type {id}, {} bytes", payload.len());
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}
