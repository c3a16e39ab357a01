use std::collections::HashMap;

use log::{debug, warn};
use thiserror::Error;

use crate::model::function::FunctionType;
use crate::model::layout::{Field, StructDescriptor};
use crate::model::typesystem::{FieldType, FunctionTypeId, Pointee, StructId};
use crate::runtime::object::{ObjectIdentity, ObjectPointer};
use crate::runtime::view::BoundView;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("'{0}' is already declared")]
    DuplicateDeclaration(String),
    #[error("struct '{0}' is already finalized")]
    DuplicateFinalization(String),
    #[error("struct '{structure}' declares field '{field}' twice")]
    DuplicateField { structure: String, field: String },
    #[error("struct '{0}' is not finalized")]
    NotFinalized(String),
    #[error("no struct named '{0}'")]
    UnknownStruct(String),
    #[error("no function type named '{0}'")]
    UnknownFunction(String),
    #[error("'{0}' is not exported")]
    NotExported(String),
    #[error("struct '{structure}' has no field '{field}'")]
    UnknownField { structure: String, field: String },
    #[error("field '{field}' has type {actual}, expected {expected}")]
    TypeMismatch { field: String, expected: String, actual: String },
    #[error("field '{0}' is not an embedded struct or a struct pointer")]
    NotAStruct(String),
    #[error("length field '{field}' holds negative value {value}")]
    NegativeLength { field: String, value: i64 },
    #[error("index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize }
}

pub type LayoutResult<T> = Result<T, LayoutError>;

/// Arena of struct descriptors and function-pointer types.
///
/// Structs reference each other through `StructId` handles, so a descriptor
/// can be used as a pointer target before it is populated. Once every
/// descriptor is finalized the registry is only read.
pub struct LayoutRegistry {
    structs: Vec<StructDescriptor>,
    structs_mapping: HashMap<String, StructId>,
    functions: Vec<FunctionType>,
    functions_mapping: HashMap<String, FunctionTypeId>
}

impl LayoutRegistry {
    pub fn new() -> LayoutRegistry {
        LayoutRegistry {
            structs: Vec::new(),
            structs_mapping: HashMap::new(),
            functions: Vec::new(),
            functions_mapping: HashMap::new()
        }
    }

    pub fn declare(&mut self, name: &str) -> LayoutResult<StructId> {
        if self.structs_mapping.contains_key(name) {
            return Err(LayoutError::DuplicateDeclaration(name.to_owned()));
        }

        let id = StructId(self.structs.len());
        self.structs.push(StructDescriptor::declare(name.to_owned()));
        self.structs_mapping.insert(name.to_owned(), id);
        debug!("Declared struct {} ({:?})", name, id);
        Ok(id)
    }

    pub fn declare_function(&mut self,
                            name: &str,
                            parameters: Vec<FieldType>,
                            return_type: Option<FieldType>) -> LayoutResult<FunctionTypeId> {
        if self.functions_mapping.contains_key(name) {
            return Err(LayoutError::DuplicateDeclaration(name.to_owned()));
        }

        for field_type in parameters.iter().chain(return_type.iter()) {
            self.check_handles(field_type)?;
        }

        let id = FunctionTypeId(self.functions.len());
        self.functions.push(FunctionType::new(name.to_owned(), parameters, return_type));
        self.functions_mapping.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Populates a declared struct. `Absent` fields are dropped before layout.
    pub fn finalize(&mut self, id: StructId, fields: Vec<(&str, FieldType)>) -> LayoutResult<()> {
        let descriptor = self.get(id);
        if descriptor.is_finalized() {
            return Err(LayoutError::DuplicateFinalization(descriptor.name().to_owned()));
        }

        let mut resolved = Vec::with_capacity(fields.len());
        let mut dropped = 0;
        for (name, field_type) in fields {
            if field_type.is_absent() {
                dropped += 1;
                continue;
            }

            if resolved.iter().any(|(field, _): &(Field, usize)| field.name() == name) {
                return Err(LayoutError::DuplicateField {
                    structure: descriptor.name().to_owned(),
                    field: name.to_owned()
                });
            }

            self.check_handles(&field_type)?;
            let size = self.field_size(&field_type)?;
            resolved.push((Field::new(name.to_owned(), field_type), size));
        }

        let descriptor = &mut self.structs[id.0];
        descriptor.populate(resolved);
        debug!(
            "Finalized struct {} (fields: {}, dropped: {}, size: {})",
            descriptor.name(),
            descriptor.fields().len(),
            dropped,
            descriptor.memory_size()
        );

        Ok(())
    }

    /// Rejects struct and function handles this registry never handed out.
    fn check_handles(&self, field_type: &FieldType) -> LayoutResult<()> {
        match field_type {
            FieldType::Struct(id) | FieldType::Pointer(Pointee::Struct(id)) if id.0 >= self.structs.len() => {
                Err(LayoutError::UnknownStruct(format!("#{}", id.0)))
            }
            FieldType::Function(id) | FieldType::Pointer(Pointee::Function(id)) if id.0 >= self.functions.len() => {
                Err(LayoutError::UnknownFunction(format!("#{}", id.0)))
            }
            FieldType::Array(element, _) => self.check_handles(element),
            _ => Ok(())
        }
    }

    /// Panics if `id` was not handed out by this registry.
    pub fn get(&self, id: StructId) -> &StructDescriptor {
        &self.structs[id.0]
    }

    pub fn struct_by_name(&self, name: &str) -> Option<StructId> {
        self.structs_mapping.get(name).cloned()
    }

    pub fn structs(&self) -> impl Iterator<Item=(StructId, &StructDescriptor)> {
        self.structs.iter().enumerate().map(|(index, descriptor)| (StructId(index), descriptor))
    }

    pub fn function(&self, id: FunctionTypeId) -> &FunctionType {
        &self.functions[id.0]
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionTypeId> {
        self.functions_mapping.get(name).cloned()
    }

    pub fn is_finalized(&self) -> bool {
        self.structs.iter().all(|descriptor| descriptor.is_finalized())
    }

    pub fn size_of(&self, id: StructId) -> LayoutResult<usize> {
        let descriptor = self.get(id);
        if !descriptor.is_finalized() {
            return Err(LayoutError::NotFinalized(descriptor.name().to_owned()));
        }

        Ok(descriptor.memory_size())
    }

    pub fn field_size(&self, field_type: &FieldType) -> LayoutResult<usize> {
        match field_type {
            FieldType::Struct(id) => self.size_of(*id),
            FieldType::Array(element, count) => Ok(self.field_size(element)? * count),
            other => Ok(other.fixed_size().unwrap_or(0))
        }
    }

    /// Bytes preceding `field`. An unknown name yields the total size of the
    /// struct instead of failing; prefer `try_field_offset`.
    pub fn field_offset(&self, id: StructId, field: &str) -> usize {
        match self.try_field_offset(id, field) {
            Ok(offset) => offset,
            Err(_) => {
                let descriptor = self.get(id);
                warn!(
                    "Unknown field '{}' in struct {}, falling back to struct size {}",
                    field,
                    descriptor.name(),
                    descriptor.memory_size()
                );
                descriptor.memory_size()
            }
        }
    }

    pub fn try_field_offset(&self, id: StructId, field: &str) -> LayoutResult<usize> {
        self.get_field(id, field).map(|field| field.offset())
    }

    pub fn get_field(&self, id: StructId, field: &str) -> LayoutResult<&Field> {
        let descriptor = self.get(id);
        descriptor.get_field(field).ok_or_else(|| LayoutError::UnknownField {
            structure: descriptor.name().to_owned(),
            field: field.to_owned()
        })
    }

    /// Resolves a path of embedded struct fields, e.g. `["ob_base", "ob_size"]`.
    pub fn resolve_path(&self, id: StructId, path: &[&str]) -> LayoutResult<(usize, &Field)> {
        let (last, parents) = match path.split_last() {
            Some(split) => split,
            None => {
                return Err(LayoutError::UnknownField {
                    structure: self.get(id).name().to_owned(),
                    field: String::new()
                });
            }
        };

        let mut offset = 0;
        let mut current = id;
        for name in parents {
            let field = self.get_field(current, name)?;
            offset += field.offset();
            current = field.field_type().struct_id().ok_or_else(|| LayoutError::NotAStruct((*name).to_owned()))?;
        }

        let field = self.get_field(current, last)?;
        Ok((offset + field.offset(), field))
    }

    pub fn field_offset_path(&self, id: StructId, path: &[&str]) -> LayoutResult<usize> {
        self.resolve_path(id, path).map(|(offset, _)| offset)
    }

    /// Binds `id` to `address`.
    ///
    /// # Safety
    /// Nothing about `address` is checked. It must point to memory laid out as
    /// `id` describes, valid for reads (and writes, if the view is written
    /// through) for as long as the view and anything derived from it is used.
    /// Violating this is undefined behavior; it cannot be detected here.
    pub unsafe fn bind_at(&self, id: StructId, address: ObjectPointer) -> BoundView<'_> {
        BoundView::new(self, id, address)
    }

    /// Binds `id` to the memory backing `object`.
    ///
    /// # Safety
    /// Same contract as `bind_at` for the address `object` resolves to.
    pub unsafe fn bind_to_object<O: ObjectIdentity>(&self, id: StructId, object: O) -> BoundView<'_> {
        self.bind_at(id, object.object_address())
    }

    pub fn type_name(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Scalar(scalar) => scalar.to_string(),
            FieldType::Struct(id) => self.get(*id).name().to_owned(),
            FieldType::Pointer(pointee) => format!("{}*", self.pointee_name(pointee)),
            FieldType::Array(element, count) => format!("{}[{}]", self.type_name(element), count),
            FieldType::Function(id) => self.function(*id).name().to_owned(),
            FieldType::CString => "char*".to_owned(),
            FieldType::Opaque => "<opaque>".to_owned(),
            FieldType::Absent => "<absent>".to_owned()
        }
    }

    fn pointee_name(&self, pointee: &Pointee) -> String {
        match pointee {
            Pointee::Void => "void".to_owned(),
            Pointee::Scalar(scalar) => scalar.to_string(),
            Pointee::Struct(id) => self.get(*id).name().to_owned(),
            Pointee::Function(id) => self.function(*id).name().to_owned(),
            Pointee::Object => "object".to_owned()
        }
    }

    /// C-like rendering, e.g. `PyObject* binaryfunc(PyObject*, PyObject*)`.
    pub fn function_signature(&self, id: FunctionTypeId) -> String {
        let function = self.function(id);
        let return_type = function.return_type()
            .map(|return_type| self.type_name(return_type))
            .unwrap_or_else(|| "void".to_owned());

        format!(
            "{} {}({})",
            return_type,
            function.name(),
            function.parameters().iter().map(|p| self.type_name(p)).collect::<Vec<_>>().join(", ")
        )
    }
}

#[cfg(test)]
use crate::model::typesystem::{ScalarType, POINTER_SIZE};

#[test]
fn test_declare1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Empty").unwrap();
    assert_eq!(Some(id), registry.struct_by_name("Empty"));
    assert!(!registry.get(id).is_finalized());
    assert_eq!(Err(LayoutError::DuplicateDeclaration("Empty".to_owned())), registry.declare("Empty"));
}

#[test]
fn test_finalize1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Pair").unwrap();
    registry.finalize(id, vec![
        ("a", FieldType::Scalar(ScalarType::Int64)),
        ("b", FieldType::Scalar(ScalarType::Int64)),
    ]).unwrap();

    assert_eq!(16, registry.size_of(id).unwrap());
    assert_eq!(0, registry.field_offset(id, "a"));
    assert_eq!(8, registry.field_offset(id, "b"));
}

#[test]
fn test_finalize_twice1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Pair").unwrap();
    registry.finalize(id, vec![("a", FieldType::Scalar(ScalarType::Int64))]).unwrap();

    assert_eq!(
        Err(LayoutError::DuplicateFinalization("Pair".to_owned())),
        registry.finalize(id, vec![("b", FieldType::Scalar(ScalarType::Int))])
    );
    assert_eq!(8, registry.size_of(id).unwrap());
    assert!(registry.get(id).get_field("b").is_none());
}

#[test]
fn test_finalize_duplicate_field1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Pair").unwrap();
    let result = registry.finalize(id, vec![
        ("a", FieldType::Scalar(ScalarType::Int)),
        ("a", FieldType::Scalar(ScalarType::Int)),
    ]);

    assert_eq!(
        Err(LayoutError::DuplicateField { structure: "Pair".to_owned(), field: "a".to_owned() }),
        result
    );
    assert!(!registry.get(id).is_finalized());
}

#[test]
fn test_embed_unfinalized1() {
    let mut registry = LayoutRegistry::new();
    let inner = registry.declare("Inner").unwrap();
    let outer = registry.declare("Outer").unwrap();

    assert_eq!(
        Err(LayoutError::NotFinalized("Inner".to_owned())),
        registry.finalize(outer, vec![("inner", FieldType::Struct(inner))])
    );

    // Pointers to an unfinalized struct are fine.
    registry.finalize(outer, vec![("inner", FieldType::pointer_to(inner))]).unwrap();
    assert_eq!(POINTER_SIZE, registry.size_of(outer).unwrap());
    assert_eq!(Err(LayoutError::NotFinalized("Inner".to_owned())), registry.size_of(inner));
}

#[test]
fn test_unknown_field1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Pair").unwrap();
    registry.finalize(id, vec![
        ("a", FieldType::Scalar(ScalarType::Int64)),
        ("b", FieldType::Scalar(ScalarType::Int64)),
    ]).unwrap();

    assert_eq!(16, registry.field_offset(id, "nonexistent_field"));
    assert_eq!(
        Err(LayoutError::UnknownField { structure: "Pair".to_owned(), field: "nonexistent_field".to_owned() }),
        registry.try_field_offset(id, "nonexistent_field")
    );
}

#[test]
fn test_resolve_path1() {
    let mut registry = LayoutRegistry::new();
    let header = registry.declare("Header").unwrap();
    let object = registry.declare("Object").unwrap();
    registry.finalize(header, vec![
        ("refcount", FieldType::Scalar(ScalarType::SSize)),
        ("size", FieldType::Scalar(ScalarType::SSize)),
    ]).unwrap();
    registry.finalize(object, vec![
        ("flags", FieldType::Scalar(ScalarType::Int64)),
        ("header", FieldType::Struct(header)),
    ]).unwrap();

    assert_eq!(8 + POINTER_SIZE, registry.field_offset_path(object, &["header", "size"]).unwrap());
    assert_eq!(
        Err(LayoutError::NotAStruct("flags".to_owned())),
        registry.field_offset_path(object, &["flags", "size"])
    );
    assert!(registry.field_offset_path(object, &[]).is_err());
}

#[test]
fn test_function_signature1() {
    let mut registry = LayoutRegistry::new();
    let object = registry.declare("PyObject").unwrap();
    let function = registry.declare_function(
        "binaryfunc",
        vec![FieldType::pointer_to(object), FieldType::pointer_to(object)],
        Some(FieldType::pointer_to(object))
    ).unwrap();

    assert_eq!("PyObject* binaryfunc(PyObject*, PyObject*)", registry.function_signature(function));
    assert_eq!(Some(function), registry.function_by_name("binaryfunc"));
    assert!(registry.declare_function("binaryfunc", Vec::new(), None).is_err());
}

#[test]
fn test_foreign_handles1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Holder").unwrap();

    assert_eq!(
        Err(LayoutError::UnknownStruct("#99".to_owned())),
        registry.finalize(id, vec![("p", FieldType::pointer_to(StructId(99)))])
    );
    assert_eq!(
        Err(LayoutError::UnknownStruct("#7".to_owned())),
        registry.finalize(id, vec![("items", FieldType::array_of(FieldType::Struct(StructId(7)), 2))])
    );
    assert_eq!(
        Err(LayoutError::UnknownFunction("#3".to_owned())),
        registry.finalize(id, vec![("f", FieldType::Function(FunctionTypeId(3)))])
    );
    assert_eq!(
        Err(LayoutError::UnknownFunction("#0".to_owned())),
        registry.declare_function("callback", vec![FieldType::Pointer(Pointee::Function(FunctionTypeId(0)))], None)
    );
    assert!(registry.function_by_name("callback").is_none());
    assert!(!registry.get(id).is_finalized());

    registry.finalize(id, vec![("p", FieldType::pointer_to(id))]).unwrap();
    assert_eq!("Holder*", registry.type_name(registry.get(id).fields()[0].field_type()));
}

#[test]
fn test_object_pointer_name1() {
    let registry = LayoutRegistry::new();
    assert_eq!("object*", registry.type_name(&FieldType::Pointer(Pointee::Object)));
}
