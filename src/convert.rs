//! Conversion of scalar values between compatible types.
//!
//! Numbers convert between any numeric kinds as long as the value is
//! represented exactly in the destination. Enums convert to and from strings
//! (and other enums) by label. Byte strings convert to lists and arrays of
//! other numeric kinds element by element.

use crate::value::{Rep, Value};
use crate::vtype::{Kind, Type};
use crate::{Error, Result};

pub(crate) fn uint_max(kind: Kind) -> u64 {
    match kind {
        Kind::Byte => u8::MAX as u64,
        Kind::Uint16 => u16::MAX as u64,
        Kind::Uint32 => u32::MAX as u64,
        _ => u64::MAX,
    }
}

pub(crate) fn int_range(kind: Kind) -> (i64, i64) {
    match kind {
        Kind::Int16 => (i16::MIN as i64, i16::MAX as i64),
        Kind::Int32 => (i32::MIN as i64, i32::MAX as i64),
        _ => (i64::MIN, i64::MAX),
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    U(u64),
    I(i64),
    F(f64),
    C(f64, f64),
}

fn num_of(rep: &Rep) -> Option<Num> {
    match *rep {
        Rep::Uint(u) => Some(Num::U(u)),
        Rep::Int(i) => Some(Num::I(i)),
        Rep::Float(f) => Some(Num::F(f)),
        Rep::Complex(re, im) => Some(Num::C(re, im)),
        _ => None,
    }
}

// Largest magnitudes at which every integer is exactly representable.
const F32_EXACT: u64 = 1 << 24;
const F64_EXACT: u64 = 1 << 53;

fn float_to_uint(f: f64, max: u64) -> Option<u64> {
    (f.fract() == 0.0 && f >= 0.0 && f < max as f64 + 1.0).then_some(f as u64)
}

fn float_to_int(f: f64, min: i64, max: i64) -> Option<i64> {
    (f.fract() == 0.0 && f >= min as f64 && f < max as f64 + 1.0).then_some(f as i64)
}

/// Converts a real number to a float of the given precision, if exact.
fn to_float(n: Num, single: bool) -> Option<f64> {
    let limit = if single { F32_EXACT } else { F64_EXACT };
    match n {
        Num::U(u) => (u <= limit).then_some(u as f64),
        Num::I(i) => (i.unsigned_abs() <= limit).then_some(i as f64),
        Num::F(f) if single => ((f as f32) as f64 == f || !f.is_finite()).then_some(f),
        Num::F(f) => Some(f),
        Num::C(re, im) if im == 0.0 => to_float(Num::F(re), single),
        Num::C(..) => None,
    }
}

fn num_to(kind: Kind, n: Num) -> Option<Rep> {
    match kind {
        Kind::Byte | Kind::Uint16 | Kind::Uint32 | Kind::Uint64 => {
            let max = uint_max(kind);
            let u = match n {
                Num::U(u) => (u <= max).then_some(u),
                Num::I(i) => (i >= 0 && i as u64 <= max).then_some(i as u64),
                Num::F(f) => float_to_uint(f, max),
                Num::C(re, im) => (im == 0.0).then(|| float_to_uint(re, max)).flatten(),
            };
            u.map(Rep::Uint)
        }
        Kind::Int16 | Kind::Int32 | Kind::Int64 => {
            let (min, max) = int_range(kind);
            let i = match n {
                Num::U(u) => (u <= max as u64).then_some(u as i64),
                Num::I(i) => (i >= min && i <= max).then_some(i),
                Num::F(f) => float_to_int(f, min, max),
                Num::C(re, im) => (im == 0.0).then(|| float_to_int(re, min, max)).flatten(),
            };
            i.map(Rep::Int)
        }
        Kind::Float32 | Kind::Float64 => to_float(n, kind == Kind::Float32).map(Rep::Float),
        Kind::Complex64 | Kind::Complex128 => {
            let single = kind == Kind::Complex64;
            match n {
                Num::C(re, im) => Some(Rep::Complex(
                    to_float(Num::F(re), single)?,
                    to_float(Num::F(im), single)?,
                )),
                real => Some(Rep::Complex(to_float(real, single)?, 0.0)),
            }
        }
        _ => None,
    }
}

fn is_number(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Byte
            | Kind::Uint16
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Int16
            | Kind::Int32
            | Kind::Int64
            | Kind::Float32
            | Kind::Float64
            | Kind::Complex64
            | Kind::Complex128
    )
}

/// Converts a scalar `src` (or a byte string) to type `want`.
pub(crate) fn coerce(src: Value, want: Type) -> Result<Value> {
    let from = src.ty();
    if from == want {
        return Ok(src);
    }
    let fail = || Error::mismatch(from, want);
    let kind = want.kind();
    let rep = match (kind, src.into_rep()) {
        (Kind::Bool, Rep::Bool(b)) => Rep::Bool(b),
        (k, rep) if is_number(k) => num_of(&rep).and_then(|n| num_to(k, n)).ok_or_else(fail)?,
        (Kind::String, Rep::String(s)) => Rep::String(s),
        (Kind::String, Rep::Enum(i)) => Rep::String(from.labels().get(i).cloned().ok_or_else(fail)?),
        (Kind::Enum, Rep::String(s)) => Rep::Enum(want.label_index(&s).ok_or_else(fail)?),
        (Kind::Enum, Rep::Enum(i)) => {
            let label = from.labels().get(i).ok_or_else(fail)?;
            Rep::Enum(want.label_index(label).ok_or_else(fail)?)
        }
        (Kind::TypeObject, Rep::TypeObject(t)) => Rep::TypeObject(t),
        (Kind::Array | Kind::List, Rep::Bytes(b)) if want.is_bytes() => Rep::Bytes(b),
        (Kind::Array | Kind::List, Rep::Bytes(b)) => {
            let elem = want.elem();
            Rep::List(b.into_iter().map(|x| coerce(Value::byte(x), elem)).collect::<Result<_>>()?)
        }
        _ => return Err(fail()),
    };
    Value::new(want, rep).map_err(|_| fail())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(coerce(Value::int64(7), Type::UINT16).unwrap(), Value::uint16(7));
        assert_eq!(coerce(Value::uint64(7), Type::FLOAT32).unwrap(), Value::float32(7.0));
        assert_eq!(coerce(Value::float64(3.0), Type::INT32).unwrap(), Value::int32(3));
        assert_eq!(coerce(Value::float64(2.5), Type::FLOAT32).unwrap(), Value::float32(2.5));
        assert_eq!(coerce(Value::int64(2), Type::COMPLEX128).unwrap(), Value::complex128(2.0, 0.0));
        assert_eq!(coerce(Value::complex128(4.0, 0.0), Type::INT64).unwrap(), Value::int64(4));
    }

    #[test]
    fn test_numeric_conversion_failures() {
        assert!(coerce(Value::int64(-1), Type::UINT64).is_err());
        assert!(coerce(Value::uint64(1 << 20), Type::UINT16).is_err());
        assert!(coerce(Value::uint64(u64::MAX), Type::INT64).is_err());
        assert!(coerce(Value::float64(1.5), Type::INT64).is_err());
        assert!(coerce(Value::float64(0.1), Type::FLOAT32).is_err());
        assert!(coerce(Value::uint64((1 << 24) + 1), Type::FLOAT32).is_err());
        assert!(coerce(Value::complex128(1.0, 1.0), Type::FLOAT64).is_err());
        assert!(coerce(Value::float64(18446744073709551616.0), Type::UINT64).is_err());
        assert!(matches!(coerce(Value::bool(true), Type::INT64), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_enum_and_string() {
        let color = Type::enum_of("convert.Color", &["Red", "Green"]).unwrap();
        let shade = Type::enum_of("convert.Shade", &["Green", "Blue"]).unwrap();
        let green = coerce(Value::string("Green"), color).unwrap();
        assert_eq!(green.label(), Some("Green"));
        assert_eq!(coerce(green.clone(), Type::STRING).unwrap(), Value::string("Green"));
        assert_eq!(coerce(green, shade).unwrap().label_index(), Some(0));
        assert!(coerce(Value::string("Purple"), color).is_err());
    }

    #[test]
    fn test_bytes_to_lists() {
        let u32s = Type::list_of(Type::UINT32).unwrap();
        let v = coerce(Value::bytes(vec![1, 2]), u32s).unwrap();
        assert_eq!(v.elems().unwrap(), &[Value::uint32(1), Value::uint32(2)]);
        let arr = Type::array_of(2, Type::BYTE).unwrap();
        assert_eq!(coerce(Value::bytes(vec![1, 2]), arr).unwrap().as_bytes(), Some(&[1u8, 2][..]));
        assert!(coerce(Value::bytes(vec![1, 2, 3]), arr).is_err());
    }
}
