use crate::cpython::structs::StructIds;
use crate::model::registry::{LayoutRegistry, LayoutResult};
use crate::model::typesystem::{FieldType, FunctionTypeId, Pointee, ScalarType};

/// Function-pointer types used by the slot and state fields.
pub struct FunctionTypes {
    pub destructor: FunctionTypeId,
    pub printfunc: FunctionTypeId,
    pub getattrfunc: FunctionTypeId,
    pub getattrofunc: FunctionTypeId,
    pub setattrfunc: FunctionTypeId,
    pub setattrofunc: FunctionTypeId,
    pub reprfunc: FunctionTypeId,
    pub hashfunc: FunctionTypeId,
    pub richcmpfunc: FunctionTypeId,
    pub getiterfunc: FunctionTypeId,
    pub iternextfunc: FunctionTypeId,
    pub descrgetfunc: FunctionTypeId,
    pub descrsetfunc: FunctionTypeId,
    pub initproc: FunctionTypeId,
    pub newfunc: FunctionTypeId,
    pub allocfunc: FunctionTypeId,
    pub freefunc: FunctionTypeId,
    pub visitproc: FunctionTypeId,
    pub traverseproc: FunctionTypeId,
    pub inquiry: FunctionTypeId,
    pub unaryfunc: FunctionTypeId,
    pub binaryfunc: FunctionTypeId,
    pub ternaryfunc: FunctionTypeId,
    pub lenfunc: FunctionTypeId,
    pub ssizeargfunc: FunctionTypeId,
    pub ssizeobjargproc: FunctionTypeId,
    pub objobjproc: FunctionTypeId,
    pub objobjargproc: FunctionTypeId,
    pub getbufferproc: FunctionTypeId,
    pub releasebufferproc: FunctionTypeId,
    pub getter: FunctionTypeId,
    pub setter: FunctionTypeId,
    pub cfunction: FunctionTypeId,
    pub frame_eval: FunctionTypeId,
    pub tracefunc: FunctionTypeId,
    pub exitfunc: FunctionTypeId,
    pub on_delete: FunctionTypeId
}

pub const EXPORTED_FUNCTIONS: &[&str] = &[
    "destructor", "printfunc", "getattrfunc", "getattrofunc", "setattrfunc", "setattrofunc",
    "reprfunc", "hashfunc", "richcmpfunc", "getiterfunc", "iternextfunc", "descrgetfunc",
    "descrsetfunc", "initproc", "newfunc", "allocfunc", "freefunc", "visitproc", "traverseproc",
    "inquiry", "unaryfunc", "binaryfunc", "ternaryfunc", "lenfunc", "ssizeargfunc",
    "ssizeobjargproc", "objobjproc", "objobjargproc", "getbufferproc", "releasebufferproc",
    "getter", "setter", "PyCFunction", "PyFrameEvalFunction", "Py_tracefunc",
];

pub fn declare(registry: &mut LayoutRegistry, structs: &StructIds) -> LayoutResult<FunctionTypes> {
    let object = FieldType::pointer_to(structs.object);
    let type_object = FieldType::pointer_to(structs.type_object);
    let buffer = FieldType::pointer_to(structs.buffer);
    let void = FieldType::Pointer(Pointee::Void);
    let int = FieldType::Scalar(ScalarType::Int);
    let ssize = FieldType::Scalar(ScalarType::SSize);

    let visitproc = registry.declare_function("visitproc", vec![object.clone(), void.clone()], Some(int.clone()))?;

    Ok(
        FunctionTypes {
            destructor: registry.declare_function("destructor", vec![object.clone()], None)?,
            // The FILE* is left untyped.
            printfunc: registry.declare_function("printfunc", vec![object.clone(), void.clone(), int.clone()], Some(int.clone()))?,
            getattrfunc: registry.declare_function("getattrfunc", vec![object.clone(), FieldType::CString], Some(object.clone()))?,
            getattrofunc: registry.declare_function("getattrofunc", vec![object.clone(), object.clone()], Some(object.clone()))?,
            setattrfunc: registry.declare_function("setattrfunc", vec![object.clone(), FieldType::CString, object.clone()], Some(int.clone()))?,
            setattrofunc: registry.declare_function("setattrofunc", vec![object.clone(), object.clone(), object.clone()], Some(int.clone()))?,
            reprfunc: registry.declare_function("reprfunc", vec![object.clone()], Some(object.clone()))?,
            hashfunc: registry.declare_function("hashfunc", vec![object.clone()], Some(ssize.clone()))?,
            richcmpfunc: registry.declare_function("richcmpfunc", vec![object.clone(), object.clone(), int.clone()], Some(object.clone()))?,
            getiterfunc: registry.declare_function("getiterfunc", vec![object.clone()], Some(object.clone()))?,
            iternextfunc: registry.declare_function("iternextfunc", vec![object.clone()], Some(object.clone()))?,
            descrgetfunc: registry.declare_function("descrgetfunc", vec![object.clone(), object.clone(), object.clone()], Some(object.clone()))?,
            descrsetfunc: registry.declare_function("descrsetfunc", vec![object.clone(), object.clone(), object.clone()], Some(int.clone()))?,
            initproc: registry.declare_function("initproc", vec![object.clone(), object.clone(), object.clone()], Some(int.clone()))?,
            newfunc: registry.declare_function("newfunc", vec![type_object.clone(), object.clone(), object.clone()], Some(object.clone()))?,
            allocfunc: registry.declare_function("allocfunc", vec![type_object, ssize.clone()], Some(object.clone()))?,
            freefunc: registry.declare_function("freefunc", vec![void.clone()], None)?,
            visitproc,
            traverseproc: registry.declare_function("traverseproc", vec![object.clone(), FieldType::Function(visitproc), void.clone()], Some(int.clone()))?,
            inquiry: registry.declare_function("inquiry", vec![object.clone()], Some(int.clone()))?,
            unaryfunc: registry.declare_function("unaryfunc", vec![object.clone()], Some(object.clone()))?,
            binaryfunc: registry.declare_function("binaryfunc", vec![object.clone(), object.clone()], Some(object.clone()))?,
            ternaryfunc: registry.declare_function("ternaryfunc", vec![object.clone(), object.clone(), object.clone()], Some(object.clone()))?,
            lenfunc: registry.declare_function("lenfunc", vec![object.clone()], Some(ssize.clone()))?,
            ssizeargfunc: registry.declare_function("ssizeargfunc", vec![object.clone(), ssize.clone()], Some(object.clone()))?,
            ssizeobjargproc: registry.declare_function("ssizeobjargproc", vec![object.clone(), ssize, object.clone()], Some(int.clone()))?,
            objobjproc: registry.declare_function("objobjproc", vec![object.clone(), object.clone()], Some(int.clone()))?,
            objobjargproc: registry.declare_function("objobjargproc", vec![object.clone(), object.clone(), object.clone()], Some(int.clone()))?,
            getbufferproc: registry.declare_function("getbufferproc", vec![object.clone(), buffer.clone(), int.clone()], Some(int.clone()))?,
            releasebufferproc: registry.declare_function("releasebufferproc", vec![object.clone(), buffer], None)?,
            getter: registry.declare_function("getter", vec![object.clone(), void.clone()], Some(object.clone()))?,
            setter: registry.declare_function("setter", vec![object.clone(), object.clone(), void.clone()], Some(int.clone()))?,
            cfunction: registry.declare_function("PyCFunction", vec![object.clone(), object.clone()], Some(object.clone()))?,
            // Frame objects have no declared layout.
            frame_eval: registry.declare_function("PyFrameEvalFunction", vec![void.clone(), int.clone()], Some(object.clone()))?,
            tracefunc: registry.declare_function("Py_tracefunc", vec![object.clone(), void.clone(), int.clone(), object.clone()], Some(int))?,
            exitfunc: registry.declare_function("pyexitfunc", vec![FieldType::Pointer(Pointee::Object)], None)?,
            on_delete: registry.declare_function("on_delete", vec![void], None)?
        }
    )
}
