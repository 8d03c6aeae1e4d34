use std::collections::{HashMap, HashSet};
use std::io::Read;

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::builder::{PendingType, TypeBuilder, TypeOrPending};
use crate::config::{Config, Version};
use crate::decode::WireReader;
use crate::object::{bootstrap_type, TypeId};
use crate::reader::TypeLookup;
use crate::types::WireType;
use crate::vtype::Type;
use crate::{Error, Result};

fn malformed(id: TypeId, reason: impl ToString) -> Error {
    Error::MalformedType { id, reason: reason.to_string() }
}

#[derive(Default)]
struct State {
    /// Received descriptions not built yet.
    wire: HashMap<TypeId, WireType>,
    built: HashMap<TypeId, Type>,
    closed: bool,
    blocking: bool,
    version: Option<Version>,
}

impl State {
    /// The ids that must be built together with `id`: every unbuilt type
    /// reachable from it.
    fn closure(&self, id: TypeId) -> Result<Vec<TypeId>> {
        let mut seen = HashSet::from([id]);
        let mut order = vec![id];
        let mut next = 0;
        while let Some(&cur) = order.get(next) {
            next += 1;
            let wire = self.wire.get(&cur).ok_or(Error::UnknownType(cur))?;
            for r in wire.refs() {
                if r.0 == 0 || (r.is_bootstrap() && bootstrap_type(r).is_none()) {
                    return Err(malformed(cur, format!("refers to invalid id {r}")));
                }
                if r.is_bootstrap() || self.built.contains_key(&r) || !seen.insert(r) {
                    continue;
                }
                order.push(r);
            }
        }
        Ok(order)
    }

    fn build(&mut self, id: TypeId) -> Result<Type> {
        let ids = self.closure(id)?;
        let mut b = TypeBuilder::new();
        let mut pending: HashMap<TypeId, PendingType> = HashMap::new();
        for &cur in &ids {
            let p = match &self.wire[&cur] {
                WireType::Named(w) => b.named(w.name.as_str()),
                WireType::Enum(_) => b.enum_type(),
                WireType::Array(_) => b.array_type(),
                WireType::List(_) => b.list_type(),
                WireType::Set(_) => b.set_type(),
                WireType::Map(_) => b.map_type(),
                WireType::Struct(_) => b.struct_type(),
                WireType::Union(_) => b.union_type(),
                WireType::Optional(_) => b.optional_type(),
            };
            pending.insert(cur, p);
        }
        let resolve = |r: TypeId| -> TypeOrPending {
            match bootstrap_type(r).or_else(|| self.built.get(&r).copied()) {
                Some(t) => t.into(),
                None => pending[&r].into(),
            }
        };
        for &cur in &ids {
            let p = pending[&cur];
            let wire = &self.wire[&cur];
            if !matches!(wire, WireType::Named(_)) {
                b.set_name(p, wire.name());
            }
            match wire {
                WireType::Named(w) => b.assign_base(p, resolve(w.base)),
                WireType::Enum(w) => {
                    for label in &w.labels {
                        b.append_label(p, label.as_str());
                    }
                }
                WireType::Array(w) => {
                    let len = usize::try_from(w.len).map_err(|_| malformed(cur, format!("array length {}", w.len)))?;
                    b.assign_len(p, len);
                    b.assign_elem(p, resolve(w.elem));
                }
                WireType::List(w) => b.assign_elem(p, resolve(w.elem)),
                WireType::Set(w) => b.assign_key(p, resolve(w.key)),
                WireType::Map(w) => {
                    b.assign_key(p, resolve(w.key));
                    b.assign_elem(p, resolve(w.elem));
                }
                WireType::Struct(w) => {
                    for f in &w.fields {
                        b.append_field(p, f.name.as_str(), resolve(f.ty));
                    }
                }
                WireType::Union(w) => {
                    for f in &w.fields {
                        b.append_field(p, f.name.as_str(), resolve(f.ty));
                    }
                }
                WireType::Optional(w) => b.assign_elem(p, resolve(w.elem)),
            }
        }
        if let Err(errs) = b.build() {
            return Err(malformed(id, errs));
        }
        for &cur in &ids {
            let t = b.built(pending[&cur]).map_err(|e| malformed(cur, e))?;
            self.wire.remove(&cur);
            self.built.insert(cur, t);
            debug!("vom: built type {cur}: {t}");
        }
        self.built.get(&id).copied().ok_or(Error::UnknownType(id))
    }
}

/// The types received on one inbound type stream.
///
/// Descriptions are stored as they arrive and built into [`Type`]s the first
/// time a value needs them, together with every unbuilt type they reach.
/// Built types are kept for the life of the decoder.
pub struct TypeDecoder {
    state: Mutex<State>,
    ready: Condvar,
    config: Config,
}

impl Default for TypeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDecoder {
    /// A decoder fed by the type messages interleaved with values. Looking up
    /// a type that has not arrived fails at once.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        TypeDecoder { state: Mutex::new(State::default()), ready: Condvar::new(), config }
    }

    /// A decoder fed from a separate stream by [`read_types`](Self::read_types).
    /// Lookups wait for missing types until the stream ends.
    pub fn for_stream() -> Self {
        Self::for_stream_with_config(Config::default())
    }

    /// Like [`for_stream`](Self::for_stream), with the limits of `config`
    /// applied to the type stream and to every [`Decoder`](crate::Decoder)
    /// sharing this type decoder.
    pub fn for_stream_with_config(config: Config) -> Self {
        let state = State { blocking: true, ..State::default() };
        TypeDecoder { state: Mutex::new(state), ready: Condvar::new(), config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn add_wire_type(&self, id: TypeId, wire: WireType) -> Result<()> {
        if id.is_bootstrap() {
            return Err(malformed(id, "type message for a bootstrap id"));
        }
        let mut st = self.state.lock();
        if st.wire.contains_key(&id) || st.built.contains_key(&id) {
            return Err(malformed(id, "type defined twice"));
        }
        if st.wire.len() + st.built.len() >= self.config.max_types {
            return Err(malformed(id, format!("more than {} types on one stream", self.config.max_types)));
        }
        debug!("vom: received type {id}: {wire:?}");
        st.wire.insert(id, wire);
        self.ready.notify_all();
        Ok(())
    }

    pub fn lookup_or_build_type(&self, id: TypeId) -> Result<Type> {
        if id.0 == 0 {
            return Err(Error::ZeroTypeId);
        }
        if let Some(t) = bootstrap_type(id) {
            return Ok(t);
        }
        if id.is_bootstrap() {
            return Err(malformed(id, "reserved id"));
        }
        let mut st = self.state.lock();
        loop {
            if let Some(t) = st.built.get(&id) {
                return Ok(*t);
            }
            match st.build(id) {
                Err(Error::UnknownType(_)) if st.blocking && !st.closed => self.ready.wait(&mut st),
                r => return r,
            }
        }
    }

    /// Marks the type stream as finished, failing lookups still waiting.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    /// The version declared by the type stream, once read.
    pub fn stream_version(&self) -> Option<Version> {
        self.state.lock().version
    }

    /// Reads type messages from a separate type stream until it ends, then
    /// closes the decoder. Meant to run on its own thread.
    pub fn read_types<R: Read>(&self, reader: R) -> Result<()> {
        let mut r = WireReader::new(reader);
        let res = self.read_type_messages(&mut r);
        self.close();
        if let Err(e) = &res {
            warn!("vom: type stream ended with error: {e}");
        }
        res
    }

    fn read_type_messages<R: Read>(&self, r: &mut WireReader<R>) -> Result<()> {
        if r.at_eof()? {
            return Ok(());
        }
        let version = Version::try_from(r.read_u8()?)?;
        self.state.lock().version = Some(version);
        let max = self.config.max_message_len;
        while !r.at_eof()? {
            let id = r.read_int()?;
            if id == 0 {
                return Err(Error::ZeroTypeId);
            }
            if id > 0 {
                return Err(Error::invalid(format!("value message {id} on a type stream")));
            }
            let id = TypeId(id.unsigned_abs());
            let wire = read_type_message(r, id, max)?;
            self.add_wire_type(id, wire)?;
        }
        Ok(())
    }
}

/// Reads the length and payload of a type message whose id was consumed.
pub(crate) fn read_type_message<R: Read>(r: &mut WireReader<R>, id: TypeId, max: usize) -> Result<WireType> {
    let len = r.read_uint()?;
    if len > max as u64 {
        return Err(Error::MessageTooLong { len, max });
    }
    let payload = r.read_vec(len)?;
    WireType::decode(&payload).map_err(|e| malformed(id, e))
}

impl TypeLookup for TypeDecoder {
    fn lookup_ref(&self, r: u64) -> Result<Type> {
        self.lookup_or_build_type(TypeId(r))
    }
}
