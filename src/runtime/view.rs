use std::ffi::CStr;

use crate::model::layout::{Field, StructDescriptor};
use crate::model::registry::{LayoutError, LayoutRegistry, LayoutResult};
use crate::model::typesystem::{FieldType, Pointee, StructId};
use crate::runtime::array::{ArrayView, TrailingArray};
use crate::runtime::memory::{self, Scalar, Value};
use crate::runtime::object::ObjectPointer;

/// A struct descriptor paired with a base address.
///
/// The view owns nothing and tracks no lifetime of the memory it wraps: it
/// was created by one of the `unsafe` binding functions, whose caller vouched
/// for the address. Every read and write below relies on that promise.
#[derive(Clone, Copy)]
pub struct BoundView<'r> {
    registry: &'r LayoutRegistry,
    id: StructId,
    address: ObjectPointer
}

impl<'r> BoundView<'r> {
    pub(crate) fn new(registry: &'r LayoutRegistry, id: StructId, address: ObjectPointer) -> BoundView<'r> {
        BoundView {
            registry,
            id,
            address
        }
    }

    pub fn registry(&self) -> &'r LayoutRegistry {
        self.registry
    }

    pub fn struct_id(&self) -> StructId {
        self.id
    }

    pub fn descriptor(&self) -> &'r StructDescriptor {
        self.registry.get(self.id)
    }

    pub fn address(&self) -> ObjectPointer {
        self.address
    }

    /// The bound address, i.e. the object this view was created from.
    pub fn get_object(&self) -> ObjectPointer {
        self.address
    }

    pub fn size(&self) -> usize {
        self.descriptor().memory_size()
    }

    /// The same address under another layout.
    ///
    /// # Safety
    /// Same contract as `LayoutRegistry::bind_at` for `other`.
    pub unsafe fn reinterpret(&self, other: StructId) -> BoundView<'r> {
        self.registry.bind_at(other, self.address)
    }

    pub fn field(&self, name: &str) -> LayoutResult<&'r Field> {
        self.registry.get_field(self.id, name)
    }

    pub fn field_address(&self, name: &str) -> LayoutResult<ObjectPointer> {
        let field = self.field(name)?;
        Ok(memory::at(self.address, field.offset()))
    }

    pub fn read<T: Scalar>(&self, name: &str) -> LayoutResult<T> {
        self.read_path(&[name])
    }

    pub fn write<T: Scalar>(&self, name: &str, value: T) -> LayoutResult<()> {
        self.write_path(&[name], value)
    }

    /// Reads a scalar nested in embedded structs, e.g. `["ob_base", "ob_size"]`.
    pub fn read_path<T: Scalar>(&self, path: &[&str]) -> LayoutResult<T> {
        let (offset, field) = self.registry.resolve_path(self.id, path)?;
        memory::check_scalar::<T>(self.registry, field.name(), field.field_type())?;
        Ok(unsafe { memory::read::<T>(memory::at(self.address, offset)) })
    }

    pub fn write_path<T: Scalar>(&self, path: &[&str], value: T) -> LayoutResult<()> {
        let (offset, field) = self.registry.resolve_path(self.id, path)?;
        memory::check_scalar::<T>(self.registry, field.name(), field.field_type())?;
        unsafe { memory::write::<T>(memory::at(self.address, offset), value) };
        Ok(())
    }

    /// Reads a pointer, function pointer, C string or opaque field.
    pub fn read_address(&self, name: &str) -> LayoutResult<ObjectPointer> {
        let field = self.field(name)?;
        memory::check_address(self.registry, name, field.field_type())?;
        Ok(unsafe { memory::read::<ObjectPointer>(memory::at(self.address, field.offset())) })
    }

    pub fn write_address(&self, name: &str, value: ObjectPointer) -> LayoutResult<()> {
        let field = self.field(name)?;
        memory::check_address(self.registry, name, field.field_type())?;
        unsafe { memory::write::<ObjectPointer>(memory::at(self.address, field.offset()), value) };
        Ok(())
    }

    pub fn read_value(&self, name: &str) -> LayoutResult<Value> {
        let field = self.field(name)?;
        unsafe { memory::read_value(memory::at(self.address, field.offset()), field.field_type()) }
            .ok_or_else(|| LayoutError::TypeMismatch {
                field: name.to_owned(),
                expected: "scalar or address".to_owned(),
                actual: self.registry.type_name(field.field_type())
            })
    }

    /// A view of an embedded-by-value struct field.
    pub fn struct_field(&self, name: &str) -> LayoutResult<BoundView<'r>> {
        let field = self.field(name)?;
        let id = field.field_type().struct_id().ok_or_else(|| LayoutError::NotAStruct(name.to_owned()))?;
        Ok(BoundView::new(self.registry, id, memory::at(self.address, field.offset())))
    }

    /// Follows a pointer-to-struct field. `None` when the pointer is null.
    pub fn deref(&self, name: &str) -> LayoutResult<Option<BoundView<'r>>> {
        let field = self.field(name)?;
        let id = match field.field_type() {
            FieldType::Pointer(Pointee::Struct(id)) => *id,
            _ => return Err(LayoutError::NotAStruct(name.to_owned()))
        };

        let target = self.read_address(name)?;
        if target.is_null() {
            Ok(None)
        } else {
            Ok(Some(BoundView::new(self.registry, id, target)))
        }
    }

    /// Copies a `char*` field out as a string. `None` when the pointer is null.
    pub fn read_c_str(&self, name: &str) -> LayoutResult<Option<String>> {
        let field = self.field(name)?;
        if field.field_type() != &FieldType::CString {
            return Err(LayoutError::TypeMismatch {
                field: name.to_owned(),
                expected: "char*".to_owned(),
                actual: self.registry.type_name(field.field_type())
            });
        }

        let target = self.read_address(name)?;
        if target.is_null() {
            return Ok(None);
        }

        let c_str = unsafe { CStr::from_ptr(target as *const libc::c_char) };
        Ok(Some(c_str.to_string_lossy().into_owned()))
    }

    /// A view of a fixed-size array field.
    pub fn array(&self, name: &str) -> LayoutResult<ArrayView<'r>> {
        let field = self.field(name)?;
        match field.field_type() {
            FieldType::Array(element, count) => {
                ArrayView::new(self.registry, (**element).clone(), memory::at(self.address, field.offset()), *count)
            }
            other => Err(LayoutError::TypeMismatch {
                field: name.to_owned(),
                expected: "array".to_owned(),
                actual: self.registry.type_name(other)
            })
        }
    }

    /// The variable-length data described by `trailing`, sized from the current length field.
    pub fn trailing(&self, trailing: &TrailingArray) -> LayoutResult<ArrayView<'r>> {
        trailing.view(self)
    }
}

impl<'r> std::fmt::Debug for BoundView<'r> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ 0x{:x}", self.descriptor().name(), self.address as u64)
    }
}

#[cfg(test)]
use crate::model::typesystem::ScalarType;

#[cfg(test)]
#[repr(C)]
struct Header {
    refcount: isize,
    object_type: *const u8,
    name: *const libc::c_char
}

#[cfg(test)]
fn header_registry() -> (LayoutRegistry, StructId) {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Header").unwrap();
    registry.finalize(id, vec![
        ("refcount", FieldType::Scalar(ScalarType::SSize)),
        ("object_type", FieldType::pointer_to(id)),
        ("name", FieldType::CString),
    ]).unwrap();
    (registry, id)
}

#[test]
fn test_read1() {
    let (registry, id) = header_registry();
    let name = b"header\0";
    let header = Header { refcount: 3, object_type: std::ptr::null(), name: name.as_ptr() as *const libc::c_char };

    let view = unsafe { registry.bind_to_object(id, &header) };
    assert_eq!(3, view.read::<isize>("refcount").unwrap());
    assert!(view.deref("object_type").unwrap().is_none());
    assert_eq!(Some("header".to_owned()), view.read_c_str("name").unwrap());
    assert_eq!(Value::Signed(3), view.read_value("refcount").unwrap());
}

#[test]
fn test_write1() {
    let (registry, id) = header_registry();
    let mut header = Header { refcount: 0, object_type: std::ptr::null(), name: std::ptr::null() };
    let self_address = &header as *const Header as ObjectPointer;

    let view = unsafe { registry.bind_to_object(id, &mut header as *mut Header) };
    view.write::<isize>("refcount", 42).unwrap();
    view.write_address("object_type", self_address).unwrap();

    assert_eq!(42, view.read::<isize>("refcount").unwrap());
    let target = view.deref("object_type").unwrap().unwrap();
    assert_eq!(self_address, target.address());
    assert_eq!(42, target.read::<isize>("refcount").unwrap());
    assert_eq!(None, view.read_c_str("name").unwrap());
}

#[test]
fn test_type_mismatch1() {
    let (registry, id) = header_registry();
    let header = Header { refcount: 0, object_type: std::ptr::null(), name: std::ptr::null() };
    let view = unsafe { registry.bind_to_object(id, &header) };

    assert!(matches!(view.read::<u32>("refcount"), Err(LayoutError::TypeMismatch { .. })));
    assert!(matches!(view.read_address("refcount"), Err(LayoutError::TypeMismatch { .. })));
    assert!(matches!(view.read_c_str("object_type"), Err(LayoutError::TypeMismatch { .. })));
    assert!(matches!(view.struct_field("refcount"), Err(LayoutError::NotAStruct(_))));
    assert!(matches!(view.read::<isize>("missing"), Err(LayoutError::UnknownField { .. })));
}

#[test]
fn test_field_address1() {
    let (registry, id) = header_registry();
    let header = Header { refcount: 0, object_type: std::ptr::null(), name: std::ptr::null() };
    let view = unsafe { registry.bind_to_object(id, &header) };

    assert_eq!(&header.name as *const _ as ObjectPointer, view.field_address("name").unwrap());
    assert_eq!(std::mem::size_of::<Header>(), view.size());
}
