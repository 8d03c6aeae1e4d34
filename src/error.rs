use crate::object::TypeId;

/// Errors raised while building types with [`TypeBuilder`](crate::TypeBuilder).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type {0:?} was never given a kind or base")]
    Unresolved(String),
    #[error("type {name:?} of kind {kind} is missing its {part} type")]
    MissingPart { name: String, kind: &'static str, part: &'static str },
    #[error("enum {0:?} has no labels")]
    EmptyEnum(String),
    #[error("enum {name:?} has an empty label")]
    EmptyLabel { name: String },
    #[error("enum {name:?} has duplicate label {label:?}")]
    DuplicateLabel { name: String, label: String },
    #[error("{name:?} has an empty field name")]
    EmptyFieldName { name: String },
    #[error("{name:?} has duplicate field {field:?}")]
    DuplicateField { name: String, field: String },
    #[error("union {0:?} has no fields")]
    EmptyUnion(String),
    #[error("optional elem must be a struct, got {0}")]
    OptionalElem(String),
    #[error("{0} is not a valid set or map key")]
    InvalidKey(String),
    #[error("{0} cannot be named")]
    Unnameable(&'static str),
    #[error("named type {0:?} has a cyclic base")]
    NamedBaseCycle(String),
    #[error("type cycle through {0:?} does not pass through a named type")]
    UnnamedCycle(String),
    #[error("type {0:?} has infinite size: its cycle only passes through struct fields or array elems")]
    InfiniteCycle(String),
    #[error("type {name:?} depends on invalid type: {cause}")]
    Dependency { name: String, cause: Box<TypeError> },
    #[error("pending type {0} does not belong to this builder")]
    UnknownPending(usize),
    #[error("builder has not been built")]
    NotBuilt,
}

/// A set of [`TypeError`]s reported together by a single build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildErrors(pub Vec<TypeError>);

impl std::fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("vom: {0}")]
    Io(#[from] std::io::Error),
    #[error("vom: end of stream")]
    EndOfStream,
    #[error("vom: zero type id")]
    ZeroTypeId,
    #[error("vom: unknown type id {0}")]
    UnknownType(TypeId),
    #[error("vom: malformed type id {id}: {reason}")]
    MalformedType { id: TypeId, reason: String },
    #[error("vom: index {index} out of range [0, {len}) for {ty}")]
    IndexOutOfRange { index: u64, len: usize, ty: String },
    #[error("vom: unexpected control byte {0:#04x}")]
    UnexpectedControlByte(u8),
    #[error("vom: {0} leftover bytes")]
    LeftoverBytes(usize),
    #[error("vom: message length {len} exceeds limit {max}")]
    MessageTooLong { len: u64, max: usize },
    #[error("vom: value nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("vom: unsupported version byte {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("vom: stream version {got:?} does not match {want:?}")]
    VersionMismatch { got: crate::Version, want: crate::Version },
    #[error("vom: type mismatch: can't convert {from} to {to}")]
    TypeMismatch { from: String, to: String },
    #[error("vom: invalid value: {0}")]
    InvalidValue(String),
    #[error("vom: {0}")]
    Type(#[from] TypeError),
}

impl Error {
    /// Reports whether this is the clean end of a stream, i.e. EOF seen
    /// exactly at a message boundary.
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    pub(crate) fn mismatch(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Error::TypeMismatch { from: from.to_string(), to: to.to_string() }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidValue(msg.into())
    }
}

impl From<BuildErrors> for Error {
    fn from(errs: BuildErrors) -> Self {
        match errs.0.into_iter().next() {
            Some(err) => Error::Type(err),
            None => Error::Type(TypeError::NotBuilt),
        }
    }
}
