use crate::model::registry::{LayoutError, LayoutRegistry, LayoutResult};
use crate::model::typesystem::{FieldType, Pointee};
use crate::runtime::memory::{self, Scalar, Value};
use crate::runtime::object::ObjectPointer;
use crate::runtime::view::BoundView;

/// How the element count is derived from the length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    Exact,
    /// Absolute value, for lengths whose sign carries other meaning.
    Magnitude,
    /// One extra element for a terminator that follows the declared length.
    WithTerminator
}

/// Where the elements live relative to the anchor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The elements start at the anchor field itself.
    Inline,
    /// The anchor holds the address of the elements.
    Indirect
}

/// Trailing data whose length is a field of the same struct.
#[derive(Debug, Clone)]
pub struct TrailingArray {
    size_field: Vec<&'static str>,
    anchor_field: &'static str,
    element: FieldType,
    length: LengthRule,
    anchor: Anchor
}

impl TrailingArray {
    pub fn new(size_field: &[&'static str],
               anchor_field: &'static str,
               element: FieldType,
               length: LengthRule,
               anchor: Anchor) -> TrailingArray {
        TrailingArray {
            size_field: size_field.to_vec(),
            anchor_field,
            element,
            length,
            anchor
        }
    }

    pub fn element_type(&self) -> &FieldType {
        &self.element
    }

    /// Reads the current length from `view` and builds the array view.
    /// Nothing is cached: each call sees the live length.
    pub fn view<'r>(&self, view: &BoundView<'r>) -> LayoutResult<ArrayView<'r>> {
        let registry = view.registry();
        let (size_offset, size_field) = registry.resolve_path(view.struct_id(), &self.size_field)?;

        let scalar = size_field.field_type().scalar().ok_or_else(|| LayoutError::TypeMismatch {
            field: size_field.name().to_owned(),
            expected: "integer".to_owned(),
            actual: registry.type_name(size_field.field_type())
        })?;

        let value = unsafe { memory::read_integer(memory::at(view.address(), size_offset), scalar) }
            .ok_or_else(|| LayoutError::TypeMismatch {
                field: size_field.name().to_owned(),
                expected: "integer".to_owned(),
                actual: scalar.to_string()
            })?;

        let len = match self.length {
            LengthRule::Magnitude => value.unsigned_abs() as usize,
            LengthRule::Exact | LengthRule::WithTerminator if value < 0 => {
                return Err(LayoutError::NegativeLength { field: size_field.name().to_owned(), value });
            }
            LengthRule::Exact => value as usize,
            LengthRule::WithTerminator => value as usize + 1
        };

        let anchor = view.field_address(self.anchor_field)?;
        let address = match self.anchor {
            Anchor::Inline => anchor,
            Anchor::Indirect => view.read_address(self.anchor_field)?
        };

        ArrayView::new(registry, self.element.clone(), address, len)
    }
}

/// A typed array at a base address. Indices are checked on access only.
#[derive(Clone)]
pub struct ArrayView<'r> {
    registry: &'r LayoutRegistry,
    element: FieldType,
    element_size: usize,
    address: ObjectPointer,
    len: usize
}

impl<'r> ArrayView<'r> {
    pub(crate) fn new(registry: &'r LayoutRegistry,
                      element: FieldType,
                      address: ObjectPointer,
                      len: usize) -> LayoutResult<ArrayView<'r>> {
        let element_size = registry.field_size(&element)?;
        Ok(
            ArrayView {
                registry,
                element,
                element_size,
                address,
                len
            }
        )
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn address(&self) -> ObjectPointer {
        self.address
    }

    pub fn element_type(&self) -> &FieldType {
        &self.element
    }

    pub fn element_address(&self, index: usize) -> LayoutResult<ObjectPointer> {
        if index >= self.len {
            return Err(LayoutError::OutOfRange { index, len: self.len });
        }

        Ok(memory::at(self.address, index * self.element_size))
    }

    pub fn read<T: Scalar>(&self, index: usize) -> LayoutResult<T> {
        memory::check_scalar::<T>(self.registry, &self.element_name(index), &self.element)?;
        let address = self.element_address(index)?;
        Ok(unsafe { memory::read::<T>(address) })
    }

    pub fn write<T: Scalar>(&self, index: usize, value: T) -> LayoutResult<()> {
        memory::check_scalar::<T>(self.registry, &self.element_name(index), &self.element)?;
        let address = self.element_address(index)?;
        unsafe { memory::write::<T>(address, value) };
        Ok(())
    }

    pub fn read_address(&self, index: usize) -> LayoutResult<ObjectPointer> {
        memory::check_address(self.registry, &self.element_name(index), &self.element)?;
        let address = self.element_address(index)?;
        Ok(unsafe { memory::read::<ObjectPointer>(address) })
    }

    pub fn write_address(&self, index: usize, value: ObjectPointer) -> LayoutResult<()> {
        memory::check_address(self.registry, &self.element_name(index), &self.element)?;
        let address = self.element_address(index)?;
        unsafe { memory::write::<ObjectPointer>(address, value) };
        Ok(())
    }

    pub fn get(&self, index: usize) -> LayoutResult<Value> {
        let address = self.element_address(index)?;
        unsafe { memory::read_value(address, &self.element) }.ok_or_else(|| LayoutError::TypeMismatch {
            field: self.element_name(index),
            expected: "scalar or address".to_owned(),
            actual: self.registry.type_name(&self.element)
        })
    }

    /// Writes a dynamically typed value. Integers must fit the element type.
    pub fn set(&self, index: usize, value: Value) -> LayoutResult<()> {
        let address = self.element_address(index)?;
        unsafe { memory::write_value(address, &self.element, value) }.ok_or_else(|| LayoutError::TypeMismatch {
            field: self.element_name(index),
            expected: format!("{:?}", value),
            actual: self.registry.type_name(&self.element)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item=LayoutResult<Value>> + '_ {
        (0..self.len).map(move |index| self.get(index))
    }

    /// A view of an embedded struct element.
    pub fn element_view(&self, index: usize) -> LayoutResult<BoundView<'r>> {
        let id = self.element.struct_id().ok_or_else(|| LayoutError::NotAStruct(self.element_name(index)))?;
        let address = self.element_address(index)?;
        Ok(BoundView::new(self.registry, id, address))
    }

    /// Follows a pointer-to-struct element. `None` when the pointer is null.
    pub fn deref(&self, index: usize) -> LayoutResult<Option<BoundView<'r>>> {
        let id = match &self.element {
            FieldType::Pointer(Pointee::Struct(id)) => *id,
            _ => return Err(LayoutError::NotAStruct(self.element_name(index)))
        };

        let target = self.read_address(index)?;
        if target.is_null() {
            Ok(None)
        } else {
            Ok(Some(BoundView::new(self.registry, id, target)))
        }
    }

    pub fn values(&self) -> LayoutResult<Vec<Value>> {
        self.iter().collect()
    }

    /// Raw element bytes, for single-byte element types.
    pub fn to_bytes(&self) -> LayoutResult<Vec<u8>> {
        (0..self.len).map(|index| self.read::<u8>(index)).collect()
    }

    fn element_name(&self, index: usize) -> String {
        format!("[{}]", index)
    }
}

#[cfg(test)]
use crate::model::typesystem::{ScalarType, StructId, POINTER_SIZE};

#[cfg(test)]
fn digits_registry() -> (LayoutRegistry, StructId) {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Digits").unwrap();
    registry.finalize(id, vec![
        ("size", FieldType::Scalar(ScalarType::SSize)),
        ("_digits", FieldType::Opaque),
    ]).unwrap();
    (registry, id)
}

#[cfg(test)]
fn digits() -> TrailingArray {
    TrailingArray::new(&["size"], "_digits", FieldType::Scalar(ScalarType::UInt32), LengthRule::Exact, Anchor::Inline)
}

#[test]
fn test_trailing1() {
    let (registry, id) = digits_registry();
    let mut data = vec![0u8; POINTER_SIZE + 4 * 4];
    let view = unsafe { registry.bind_at(id, data.as_mut_ptr() as ObjectPointer) };
    view.write::<isize>("size", 3).unwrap();

    let array = view.trailing(&digits()).unwrap();
    assert_eq!(3, array.len());
    array.write::<u32>(0, 7).unwrap();
    array.write::<u32>(2, 9).unwrap();
    assert_eq!(vec![Value::Unsigned(7), Value::Unsigned(0), Value::Unsigned(9)], array.values().unwrap());
    assert_eq!(view.field_address("_digits").unwrap(), array.address());
}

#[test]
fn test_out_of_range1() {
    let (registry, id) = digits_registry();
    let mut data = vec![0u8; POINTER_SIZE + 4 * 4];
    let view = unsafe { registry.bind_at(id, data.as_mut_ptr() as ObjectPointer) };
    view.write::<isize>("size", 2).unwrap();

    let array = view.trailing(&digits()).unwrap();
    assert_eq!(Err(LayoutError::OutOfRange { index: 2, len: 2 }), array.read::<u32>(2));
    assert_eq!(Err(LayoutError::OutOfRange { index: 5, len: 2 }), array.write::<u32>(5, 1));
    assert!(array.read::<u32>(1).is_ok());
}

#[test]
fn test_set1() {
    let (registry, id) = digits_registry();
    let mut data = vec![0u8; POINTER_SIZE + 4 * 4];
    let view = unsafe { registry.bind_at(id, data.as_mut_ptr() as ObjectPointer) };
    view.write::<isize>("size", 2).unwrap();

    let array = view.trailing(&digits()).unwrap();
    array.set(0, Value::Unsigned(4)).unwrap();
    array.set(1, Value::Unsigned(u32::MAX as u64)).unwrap();
    assert!(array.set(1, Value::Signed(-1)).is_err());
    assert!(array.set(1, Value::Unsigned(1 << 32)).is_err());
    assert_eq!(Err(LayoutError::OutOfRange { index: 2, len: 2 }), array.set(2, Value::Unsigned(1)));

    let values = array.iter().collect::<LayoutResult<Vec<_>>>().unwrap();
    assert_eq!(vec![Value::Unsigned(4), Value::Unsigned(u32::MAX as u64)], values);
    assert_eq!(2, array.iter().count());
}

#[test]
fn test_length_rules1() {
    let (registry, id) = digits_registry();
    let mut data = vec![0u8; POINTER_SIZE + 4 * 4];
    let view = unsafe { registry.bind_at(id, data.as_mut_ptr() as ObjectPointer) };
    view.write::<isize>("size", -2).unwrap();

    assert_eq!(
        Err(LayoutError::NegativeLength { field: "size".to_owned(), value: -2 }),
        view.trailing(&digits()).map(|array| array.len())
    );

    let magnitude = TrailingArray::new(&["size"], "_digits", FieldType::Scalar(ScalarType::UInt32), LengthRule::Magnitude, Anchor::Inline);
    assert_eq!(2, view.trailing(&magnitude).unwrap().len());

    view.write::<isize>("size", 3).unwrap();
    let chars = TrailingArray::new(&["size"], "_digits", FieldType::Scalar(ScalarType::Char), LengthRule::WithTerminator, Anchor::Inline);
    assert_eq!(4, view.trailing(&chars).unwrap().len());
}

#[test]
fn test_indirect1() {
    let (registry, id) = digits_registry();
    let mut elements = [10u32, 20u32];
    let mut data = vec![0u8; 2 * POINTER_SIZE];
    let view = unsafe { registry.bind_at(id, data.as_mut_ptr() as ObjectPointer) };
    view.write::<isize>("size", 2).unwrap();
    view.write_address("_digits", elements.as_mut_ptr() as ObjectPointer).unwrap();

    let indirect = TrailingArray::new(&["size"], "_digits", FieldType::Scalar(ScalarType::UInt32), LengthRule::Exact, Anchor::Indirect);
    let array = view.trailing(&indirect).unwrap();
    assert_eq!(20, array.read::<u32>(1).unwrap());

    array.write::<u32>(0, 11).unwrap();
    assert_eq!(11, elements[0]);
}
