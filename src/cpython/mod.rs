//! Layouts of the CPython object model, as the interpreter lays them out in memory.

pub mod capabilities;
pub mod functions;
pub mod objects;
pub mod structs;

use log::debug;

use crate::cpython::capabilities::Capabilities;
use crate::cpython::functions::{FunctionTypes, EXPORTED_FUNCTIONS};
use crate::cpython::objects::{digits_to_i128, ObjectArrays};
use crate::cpython::structs::StructIds;
use crate::model::registry::{LayoutError, LayoutRegistry, LayoutResult};
use crate::model::typesystem::{FunctionTypeId, StructId};
use crate::runtime::array::ArrayView;
use crate::runtime::object::ObjectPointer;
use crate::runtime::view::BoundView;

pub const EXPORTED_STRUCTS: &[&str] = &[
    "PyAsyncMethods",
    "PyBufferProcs",
    "PyBytesObject",
    "PyCoreConfig",
    "PyErr_StackItem",
    "PyFloatObject",
    "PyGetSetDef",
    "PyInterpreterState",
    "PyListObject",
    "PyLongObject",
    "PyMappingMethods",
    "PyMemberDef",
    "PyMethodDef",
    "PyNumberMethods",
    "PyObject",
    "PySequenceMethods",
    "PyThreadState",
    "PyTupleObject",
    "PyTypeObject",
    "PyVarObject",
    "Py_buffer",
];

lazy_static! {
    /// The catalog for this process, built on first use.
    pub static ref LAYOUTS: CPythonLayouts = CPythonLayouts::build(Capabilities::from_env())
        .expect("CPython layout catalog is inconsistent");
}

pub struct CPythonLayouts {
    registry: LayoutRegistry,
    capabilities: Capabilities,
    structs: StructIds,
    functions: FunctionTypes,
    arrays: ObjectArrays
}

impl CPythonLayouts {
    /// Declares every struct, then the function types, then finalizes every struct.
    pub fn build(capabilities: Capabilities) -> LayoutResult<CPythonLayouts> {
        let mut registry = LayoutRegistry::new();
        let structs = structs::declare(&mut registry)?;
        let functions = functions::declare(&mut registry, &structs)?;
        structs::finalize(&mut registry, &structs, &functions, capabilities)?;

        let arrays = ObjectArrays::new(&structs);
        debug!("Built CPython layouts for {:?}", capabilities);

        Ok(
            CPythonLayouts {
                registry,
                capabilities,
                structs,
                functions,
                arrays
            }
        )
    }

    pub fn registry(&self) -> &LayoutRegistry {
        &self.registry
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn structs(&self) -> &StructIds {
        &self.structs
    }

    pub fn functions(&self) -> &FunctionTypes {
        &self.functions
    }

    pub fn arrays(&self) -> &ObjectArrays {
        &self.arrays
    }

    /// Resolves an exported struct name.
    pub fn lookup(&self, name: &str) -> LayoutResult<StructId> {
        if !EXPORTED_STRUCTS.contains(&name) {
            return Err(LayoutError::NotExported(name.to_owned()));
        }

        self.registry.struct_by_name(name).ok_or_else(|| LayoutError::UnknownStruct(name.to_owned()))
    }

    pub fn lookup_function(&self, name: &str) -> LayoutResult<FunctionTypeId> {
        if !EXPORTED_FUNCTIONS.contains(&name) {
            return Err(LayoutError::NotExported(name.to_owned()));
        }

        self.registry.function_by_name(name).ok_or_else(|| LayoutError::UnknownFunction(name.to_owned()))
    }

    /// Binds the exported struct `name` to `address`.
    ///
    /// # Safety
    /// See `LayoutRegistry::bind_at`.
    pub unsafe fn bind(&self, name: &str, address: ObjectPointer) -> LayoutResult<BoundView<'_>> {
        let id = self.lookup(name)?;
        Ok(self.registry.bind_at(id, address))
    }

    /// Binds the object header at `address`.
    ///
    /// # Safety
    /// See `LayoutRegistry::bind_at`.
    pub unsafe fn object(&self, address: ObjectPointer) -> BoundView<'_> {
        self.registry.bind_at(self.structs.object, address)
    }

    /// `tp_name` of the object's type, read through `ob_type`.
    pub fn type_name(&self, view: &BoundView) -> LayoutResult<Option<String>> {
        let header = unsafe { view.reinterpret(self.structs.object) };
        match header.deref("ob_type")? {
            Some(type_object) => type_object.read_c_str("tp_name"),
            None => Ok(None)
        }
    }

    pub fn long_digits<'r>(&self, view: &BoundView<'r>) -> LayoutResult<ArrayView<'r>> {
        view.trailing(&self.arrays.long_digits)
    }

    pub fn tuple_items<'r>(&self, view: &BoundView<'r>) -> LayoutResult<ArrayView<'r>> {
        view.trailing(&self.arrays.tuple_items)
    }

    pub fn list_items<'r>(&self, view: &BoundView<'r>) -> LayoutResult<ArrayView<'r>> {
        view.trailing(&self.arrays.list_items)
    }

    pub fn bytes_sval<'r>(&self, view: &BoundView<'r>) -> LayoutResult<ArrayView<'r>> {
        view.trailing(&self.arrays.bytes_sval)
    }

    /// The payload of a bytes object, without the terminator.
    pub fn bytes_value(&self, view: &BoundView) -> LayoutResult<Vec<u8>> {
        let mut bytes = self.bytes_sval(view)?.to_bytes()?;
        bytes.pop();
        Ok(bytes)
    }

    /// The value of an int object, if it fits in an `i128`.
    pub fn long_value(&self, view: &BoundView) -> LayoutResult<Option<i128>> {
        let size = view.read_path::<isize>(&["ob_base", "ob_size"])?;
        let array = self.long_digits(view)?;
        let digits = (0..array.len())
            .map(|index| array.read::<u32>(index))
            .collect::<LayoutResult<Vec<_>>>()?;

        Ok(digits_to_i128(&digits, size < 0))
    }
}

#[test]
fn test_lookup_missing1() {
    let mut layouts = CPythonLayouts::build(Capabilities::none()).unwrap();
    layouts.registry = LayoutRegistry::new();

    assert_eq!(Err(LayoutError::UnknownStruct("PyObject".to_owned())), layouts.lookup("PyObject"));
    assert_eq!(Err(LayoutError::UnknownFunction("binaryfunc".to_owned())), layouts.lookup_function("binaryfunc"));
    assert_eq!(Err(LayoutError::NotExported("on_delete".to_owned())), layouts.lookup_function("on_delete"));
}
