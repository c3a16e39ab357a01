use std::mem::size_of;

pub const POINTER_SIZE: usize = size_of::<*const std::ffi::c_void>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionTypeId(pub usize);

/// How a scalar's bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarClass {
    Signed,
    Unsigned,
    Float
}

/// C scalar types, sized for the compiling platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Char,
    Int,
    UInt,
    Long,
    ULong,
    Int64,
    UInt32,
    UInt64,
    SSize,
    Size,
    Double
}

impl ScalarType {
    pub fn size(&self) -> usize {
        match self {
            ScalarType::Char => size_of::<libc::c_char>(),
            ScalarType::Int => size_of::<libc::c_int>(),
            ScalarType::UInt => size_of::<libc::c_uint>(),
            ScalarType::Long => size_of::<libc::c_long>(),
            ScalarType::ULong => size_of::<libc::c_ulong>(),
            ScalarType::Int64 => size_of::<i64>(),
            ScalarType::UInt32 => size_of::<u32>(),
            ScalarType::UInt64 => size_of::<u64>(),
            ScalarType::SSize => size_of::<libc::ssize_t>(),
            ScalarType::Size => size_of::<libc::size_t>(),
            ScalarType::Double => size_of::<libc::c_double>()
        }
    }

    pub fn class(&self) -> ScalarClass {
        match self {
            ScalarType::Char | ScalarType::Int | ScalarType::Long | ScalarType::Int64 | ScalarType::SSize => ScalarClass::Signed,
            ScalarType::UInt | ScalarType::ULong | ScalarType::UInt32 | ScalarType::UInt64 | ScalarType::Size => ScalarClass::Unsigned,
            ScalarType::Double => ScalarClass::Float
        }
    }

    pub fn c_name(&self) -> &'static str {
        match self {
            ScalarType::Char => "char",
            ScalarType::Int => "int",
            ScalarType::UInt => "unsigned int",
            ScalarType::Long => "long",
            ScalarType::ULong => "unsigned long",
            ScalarType::Int64 => "int64_t",
            ScalarType::UInt32 => "uint32_t",
            ScalarType::UInt64 => "uint64_t",
            ScalarType::SSize => "Py_ssize_t",
            ScalarType::Size => "size_t",
            ScalarType::Double => "double"
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.c_name())
    }
}

/// What a pointer field points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pointee {
    Void,
    Scalar(ScalarType),
    Struct(StructId),
    Function(FunctionTypeId),
    /// A managed object without a declared layout.
    Object
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Scalar(ScalarType),
    Struct(StructId),
    Pointer(Pointee),
    Array(Box<FieldType>, usize),
    Function(FunctionTypeId),
    CString,
    /// Address-sized anchor for data whose extent is only known at runtime.
    Opaque,
    /// Dropped at finalization, as if the field was never declared.
    Absent
}

impl FieldType {
    pub fn pointer_to(id: StructId) -> FieldType {
        FieldType::Pointer(Pointee::Struct(id))
    }

    pub fn array_of(element: FieldType, count: usize) -> FieldType {
        FieldType::Array(Box::new(element), count)
    }

    /// The given type when the capability is present, otherwise `Absent`.
    pub fn when(present: bool, field_type: FieldType) -> FieldType {
        if present {
            field_type
        } else {
            FieldType::Absent
        }
    }

    /// The size of the type if it does not depend on other descriptors.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            FieldType::Scalar(scalar) => Some(scalar.size()),
            FieldType::Pointer(_) | FieldType::Function(_) | FieldType::CString | FieldType::Opaque => Some(POINTER_SIZE),
            FieldType::Absent => Some(0),
            FieldType::Array(element, count) => element.fixed_size().map(|size| size * count),
            FieldType::Struct(_) => None
        }
    }

    /// Address-sized types whose value is an address.
    pub fn is_address(&self) -> bool {
        match self {
            FieldType::Pointer(_) | FieldType::Function(_) | FieldType::CString | FieldType::Opaque => true,
            _ => false
        }
    }

    pub fn scalar(&self) -> Option<ScalarType> {
        if let FieldType::Scalar(scalar) = self {
            Some(*scalar)
        } else {
            None
        }
    }

    pub fn struct_id(&self) -> Option<StructId> {
        if let FieldType::Struct(id) = self {
            Some(*id)
        } else {
            None
        }
    }

    /// The struct an embedded struct, or an array of them, requires to be finalized.
    pub fn embedded_struct(&self) -> Option<StructId> {
        match self {
            FieldType::Struct(id) => Some(*id),
            FieldType::Array(element, _) => element.embedded_struct(),
            _ => None
        }
    }

    pub fn is_absent(&self) -> bool {
        self == &FieldType::Absent
    }
}

#[test]
fn test_fixed_size1() {
    assert_eq!(Some(POINTER_SIZE), FieldType::Opaque.fixed_size());
    assert_eq!(Some(POINTER_SIZE), FieldType::pointer_to(StructId(3)).fixed_size());
    assert_eq!(Some(0), FieldType::Absent.fixed_size());
    assert_eq!(None, FieldType::Struct(StructId(0)).fixed_size());
}

#[test]
fn test_fixed_size2() {
    let array = FieldType::array_of(FieldType::Function(FunctionTypeId(0)), 255);
    assert_eq!(Some(255 * POINTER_SIZE), array.fixed_size());

    let nested = FieldType::array_of(FieldType::Struct(StructId(1)), 2);
    assert_eq!(None, nested.fixed_size());
    assert_eq!(Some(StructId(1)), nested.embedded_struct());
}

#[test]
fn test_when1() {
    assert_eq!(FieldType::Scalar(ScalarType::Int), FieldType::when(true, FieldType::Scalar(ScalarType::Int)));
    assert!(FieldType::when(false, FieldType::Scalar(ScalarType::Int)).is_absent());
}

#[test]
fn test_scalar_class1() {
    assert_eq!(ScalarClass::Signed, ScalarType::SSize.class());
    assert_eq!(ScalarClass::Unsigned, ScalarType::UInt32.class());
    assert_eq!(ScalarClass::Float, ScalarType::Double.class());
    assert_eq!(4, ScalarType::UInt32.size());
    assert_eq!(POINTER_SIZE, ScalarType::SSize.size());
}
