use std::convert::TryFrom;
use std::mem::size_of;

use crate::model::registry::{LayoutError, LayoutRegistry, LayoutResult};
use crate::model::typesystem::{FieldType, ScalarClass, ScalarType};
use crate::runtime::object::ObjectPointer;

/// Rust types that can be read from or written to a scalar field.
pub trait Scalar: Copy {
    fn accepts(scalar: ScalarType) -> bool;
}

macro_rules! impl_scalar {
    ($rust_type:ty, $class:expr) => {
        impl Scalar for $rust_type {
            fn accepts(scalar: ScalarType) -> bool {
                scalar.class() == $class && scalar.size() == size_of::<$rust_type>()
            }
        }
    };
}

impl_scalar!(i8, ScalarClass::Signed);
impl_scalar!(i16, ScalarClass::Signed);
impl_scalar!(i32, ScalarClass::Signed);
impl_scalar!(i64, ScalarClass::Signed);
impl_scalar!(isize, ScalarClass::Signed);
impl_scalar!(u16, ScalarClass::Unsigned);
impl_scalar!(u32, ScalarClass::Unsigned);
impl_scalar!(u64, ScalarClass::Unsigned);
impl_scalar!(usize, ScalarClass::Unsigned);
impl_scalar!(f64, ScalarClass::Float);

impl Scalar for u8 {
    fn accepts(scalar: ScalarType) -> bool {
        scalar.size() == 1 && scalar.class() != ScalarClass::Float
    }
}

/// A field value read without knowing its Rust type up front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Address(ObjectPointer)
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Signed(value) => Some(*value),
            Value::Unsigned(value) => Some(*value as i64),
            _ => None
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Signed(value) => write!(f, "{}", value),
            Value::Unsigned(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Address(address) => write!(f, "0x{:x}", *address as u64)
        }
    }
}

pub fn check_scalar<T: Scalar>(registry: &LayoutRegistry, name: &str, field_type: &FieldType) -> LayoutResult<()> {
    match field_type.scalar() {
        Some(scalar) if T::accepts(scalar) => Ok(()),
        _ => Err(LayoutError::TypeMismatch {
            field: name.to_owned(),
            expected: std::any::type_name::<T>().to_owned(),
            actual: registry.type_name(field_type)
        })
    }
}

pub fn check_address(registry: &LayoutRegistry, name: &str, field_type: &FieldType) -> LayoutResult<()> {
    if field_type.is_address() {
        Ok(())
    } else {
        Err(LayoutError::TypeMismatch {
            field: name.to_owned(),
            expected: "address".to_owned(),
            actual: registry.type_name(field_type)
        })
    }
}

pub fn at(base: ObjectPointer, offset: usize) -> ObjectPointer {
    (base as *mut u8).wrapping_add(offset) as ObjectPointer
}

/// Layouts carry no padding, so every access is unaligned.
pub unsafe fn read<T: Copy>(address: ObjectPointer) -> T {
    std::ptr::read_unaligned(address as *const T)
}

pub unsafe fn write<T: Copy>(address: ObjectPointer, value: T) {
    std::ptr::write_unaligned(address as *mut T, value)
}

/// Reads any integer scalar widened to `i64`.
pub unsafe fn read_integer(address: ObjectPointer, scalar: ScalarType) -> Option<i64> {
    match read_value(address, &FieldType::Scalar(scalar))? {
        Value::Float(_) | Value::Address(_) => None,
        value => value.as_i64()
    }
}

pub unsafe fn read_value(address: ObjectPointer, field_type: &FieldType) -> Option<Value> {
    match field_type {
        FieldType::Scalar(scalar) => {
            let value = match (scalar.class(), scalar.size()) {
                (ScalarClass::Signed, 1) => Value::Signed(read::<i8>(address) as i64),
                (ScalarClass::Signed, 2) => Value::Signed(read::<i16>(address) as i64),
                (ScalarClass::Signed, 4) => Value::Signed(read::<i32>(address) as i64),
                (ScalarClass::Signed, 8) => Value::Signed(read::<i64>(address)),
                (ScalarClass::Unsigned, 1) => Value::Unsigned(read::<u8>(address) as u64),
                (ScalarClass::Unsigned, 2) => Value::Unsigned(read::<u16>(address) as u64),
                (ScalarClass::Unsigned, 4) => Value::Unsigned(read::<u32>(address) as u64),
                (ScalarClass::Unsigned, 8) => Value::Unsigned(read::<u64>(address)),
                (ScalarClass::Float, 4) => Value::Float(read::<f32>(address) as f64),
                (ScalarClass::Float, 8) => Value::Float(read::<f64>(address)),
                _ => return None
            };

            Some(value)
        }
        field_type if field_type.is_address() => Some(Value::Address(read::<ObjectPointer>(address))),
        _ => None
    }
}

/// Writes `value` if it fits the field type. `None` when the kind or range does not.
pub unsafe fn write_value(address: ObjectPointer, field_type: &FieldType, value: Value) -> Option<()> {
    match (field_type, value) {
        (FieldType::Scalar(scalar), Value::Signed(value)) if scalar.class() == ScalarClass::Signed => {
            match scalar.size() {
                1 => write(address, i8::try_from(value).ok()?),
                2 => write(address, i16::try_from(value).ok()?),
                4 => write(address, i32::try_from(value).ok()?),
                8 => write(address, value),
                _ => return None
            }
        }
        (FieldType::Scalar(scalar), Value::Unsigned(value)) if scalar.class() == ScalarClass::Unsigned => {
            match scalar.size() {
                1 => write(address, u8::try_from(value).ok()?),
                2 => write(address, u16::try_from(value).ok()?),
                4 => write(address, u32::try_from(value).ok()?),
                8 => write(address, value),
                _ => return None
            }
        }
        (FieldType::Scalar(scalar), Value::Float(value)) if scalar.class() == ScalarClass::Float => {
            match scalar.size() {
                4 => write(address, value as f32),
                8 => write(address, value),
                _ => return None
            }
        }
        (field_type, Value::Address(value)) if field_type.is_address() => write(address, value),
        _ => return None
    }

    Some(())
}

#[test]
fn test_accepts1() {
    assert!(i64::accepts(ScalarType::Int64));
    assert!(isize::accepts(ScalarType::SSize));
    assert!(u32::accepts(ScalarType::UInt32));
    assert!(u8::accepts(ScalarType::Char));
    assert!(i8::accepts(ScalarType::Char));
    assert!(f64::accepts(ScalarType::Double));

    assert!(!u32::accepts(ScalarType::Int));
    assert!(!i32::accepts(ScalarType::Int64));
    assert!(!f64::accepts(ScalarType::Int64));
}

#[test]
fn test_read_value1() {
    let data: [u8; 8] = [0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00, 0x00];
    let base = data.as_ptr() as ObjectPointer;

    unsafe {
        assert_eq!(Some(Value::Signed(-1)), read_value(base, &FieldType::Scalar(ScalarType::Int)));
        assert_eq!(Some(Value::Unsigned(0xFFFFFFFF)), read_value(base, &FieldType::Scalar(ScalarType::UInt32)));
        assert_eq!(Some(1), read_integer(at(base, 4), ScalarType::Int));
        assert_eq!(None, read_integer(base, ScalarType::Double));
    }
}

#[test]
fn test_unaligned1() {
    let mut data = [0u8; 16];
    let base = data.as_mut_ptr() as ObjectPointer;

    unsafe {
        write::<u64>(at(base, 3), 0x0102030405060708);
        assert_eq!(0x0102030405060708, read::<u64>(at(base, 3)));
    }
    assert_eq!(0x0102030405060708u64.to_ne_bytes()[0], data[3]);
}

#[test]
fn test_write_value1() {
    let mut data = [0u8; 8];
    let base = data.as_mut_ptr() as ObjectPointer;
    let int = FieldType::Scalar(ScalarType::Int);

    unsafe {
        assert_eq!(Some(()), write_value(base, &int, Value::Signed(-3)));
        assert_eq!(Some(Value::Signed(-3)), read_value(base, &int));
        assert_eq!(None, write_value(base, &int, Value::Signed(1 << 40)));
        assert_eq!(None, write_value(base, &int, Value::Unsigned(1)));
        assert_eq!(None, write_value(base, &int, Value::Float(1.0)));
        assert_eq!(Some(Value::Signed(-3)), read_value(base, &int));
    }
}
