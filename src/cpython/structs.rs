use crate::cpython::capabilities::Capabilities;
use crate::cpython::functions::FunctionTypes;
use crate::model::registry::{LayoutRegistry, LayoutResult};
use crate::model::typesystem::{FieldType, FunctionTypeId, Pointee, ScalarType, StructId, POINTER_SIZE};

/// Handles of every declared CPython struct.
pub struct StructIds {
    pub object: StructId,
    pub var_object: StructId,
    pub type_object: StructId,
    pub async_methods: StructId,
    pub number_methods: StructId,
    pub sequence_methods: StructId,
    pub mapping_methods: StructId,
    pub buffer_procs: StructId,
    pub method_def: StructId,
    pub member_def: StructId,
    pub buffer: StructId,
    pub getset_def: StructId,
    pub float_object: StructId,
    pub long_object: StructId,
    pub list_object: StructId,
    pub tuple_object: StructId,
    pub bytes_object: StructId,
    pub err_stack_item: StructId,
    pub core_config: StructId,
    pub thread_state: StructId,
    pub interpreter_state: StructId
}

/// Declares every struct empty, so any of them can be a pointer target.
pub fn declare(registry: &mut LayoutRegistry) -> LayoutResult<StructIds> {
    Ok(
        StructIds {
            object: registry.declare("PyObject")?,
            var_object: registry.declare("PyVarObject")?,
            type_object: registry.declare("PyTypeObject")?,
            async_methods: registry.declare("PyAsyncMethods")?,
            number_methods: registry.declare("PyNumberMethods")?,
            sequence_methods: registry.declare("PySequenceMethods")?,
            mapping_methods: registry.declare("PyMappingMethods")?,
            buffer_procs: registry.declare("PyBufferProcs")?,
            method_def: registry.declare("PyMethodDef")?,
            member_def: registry.declare("PyMemberDef")?,
            buffer: registry.declare("Py_buffer")?,
            getset_def: registry.declare("PyGetSetDef")?,
            float_object: registry.declare("PyFloatObject")?,
            long_object: registry.declare("PyLongObject")?,
            list_object: registry.declare("PyListObject")?,
            tuple_object: registry.declare("PyTupleObject")?,
            bytes_object: registry.declare("PyBytesObject")?,
            err_stack_item: registry.declare("PyErr_StackItem")?,
            core_config: registry.declare("PyCoreConfig")?,
            thread_state: registry.declare("PyThreadState")?,
            interpreter_state: registry.declare("PyInterpreterState")?
        }
    )
}

fn scalar(scalar: ScalarType) -> FieldType {
    FieldType::Scalar(scalar)
}

fn function(id: FunctionTypeId) -> FieldType {
    FieldType::Function(id)
}

fn void_ptr() -> FieldType {
    FieldType::Pointer(Pointee::Void)
}

/// Explicit alignment gap between a 4-byte int and a following pointer-aligned field.
fn int_gap() -> FieldType {
    FieldType::when(POINTER_SIZE == 8, FieldType::array_of(scalar(ScalarType::Char), 4))
}

/// Populates every struct. Embedded structs are finalized before their embedders.
pub fn finalize(registry: &mut LayoutRegistry,
                structs: &StructIds,
                functions: &FunctionTypes,
                capabilities: Capabilities) -> LayoutResult<()> {
    let object = FieldType::pointer_to(structs.object);
    let ssize = scalar(ScalarType::SSize);
    let int = scalar(ScalarType::Int);

    registry.finalize(structs.object, vec![
        ("ob_refcnt", ssize.clone()),
        ("ob_type", FieldType::pointer_to(structs.type_object)),
    ])?;

    registry.finalize(structs.var_object, vec![
        ("ob_base", FieldType::Struct(structs.object)),
        ("ob_size", ssize.clone()),
    ])?;

    registry.finalize(structs.type_object, vec![
        ("ob_base", FieldType::Struct(structs.var_object)),
        ("tp_name", FieldType::CString),
        ("tp_basicsize", ssize.clone()),
        ("tp_itemsize", ssize.clone()),

        ("tp_dealloc", function(functions.destructor)),
        ("tp_print", function(functions.printfunc)),
        ("tp_getattr", function(functions.getattrfunc)),
        ("tp_setattr", function(functions.setattrfunc)),
        ("tp_as_async", FieldType::pointer_to(structs.async_methods)),
        ("tp_repr", function(functions.reprfunc)),

        ("tp_as_number", FieldType::pointer_to(structs.number_methods)),
        ("tp_as_sequence", FieldType::pointer_to(structs.sequence_methods)),
        ("tp_as_mapping", FieldType::pointer_to(structs.mapping_methods)),

        ("tp_hash", function(functions.hashfunc)),
        ("tp_call", function(functions.ternaryfunc)),
        ("tp_str", function(functions.reprfunc)),
        ("tp_getattro", function(functions.getattrofunc)),
        ("tp_setattro", function(functions.setattrofunc)),

        ("tp_as_buffer", FieldType::pointer_to(structs.buffer_procs)),
        ("tp_flags", scalar(ScalarType::ULong)),
        ("tp_doc", FieldType::CString),

        ("tp_traverse", function(functions.traverseproc)),
        ("tp_clear", function(functions.inquiry)),
        ("tp_richcompare", function(functions.richcmpfunc)),
        ("tp_weaklistoffset", ssize.clone()),

        ("tp_iter", function(functions.getiterfunc)),
        ("tp_iternext", function(functions.iternextfunc)),

        ("tp_methods", FieldType::pointer_to(structs.method_def)),
        ("tp_members", FieldType::pointer_to(structs.member_def)),
        ("tp_getset", FieldType::pointer_to(structs.getset_def)),
        ("tp_base", FieldType::pointer_to(structs.type_object)),
        ("tp_dict", object.clone()),

        ("tp_descr_get", function(functions.descrgetfunc)),
        ("tp_descr_set", function(functions.descrsetfunc)),
        ("tp_dictoffset", ssize.clone()),
        ("tp_init", function(functions.initproc)),
        ("tp_alloc", function(functions.allocfunc)),
        ("tp_new", function(functions.newfunc)),
        ("tp_free", function(functions.freefunc)),
        ("tp_is_gc", function(functions.inquiry)),
        ("tp_bases", object.clone()),
        ("tp_mro", object.clone()),
        ("tp_cache", object.clone()),
        ("tp_subclasses", object.clone()),
        ("tp_weaklist", object.clone()),
        ("tp_del", function(functions.destructor)),

        ("tp_version_tag", scalar(ScalarType::UInt)),
        ("_tp_version_tag_gap", int_gap()),
        ("tp_finalize", function(functions.destructor)),
    ])?;

    registry.finalize(structs.async_methods, vec![
        ("am_await", function(functions.unaryfunc)),
        ("am_aiter", function(functions.unaryfunc)),
        ("am_anext", function(functions.unaryfunc)),
    ])?;

    registry.finalize(structs.number_methods, vec![
        ("nb_add", function(functions.binaryfunc)),
        ("nb_subtract", function(functions.binaryfunc)),
        ("nb_multiply", function(functions.binaryfunc)),
        ("nb_remainder", function(functions.binaryfunc)),
        ("nb_divmod", function(functions.binaryfunc)),
        ("nb_power", function(functions.ternaryfunc)),
        ("nb_negative", function(functions.unaryfunc)),
        ("nb_positive", function(functions.unaryfunc)),
        ("nb_absolute", function(functions.unaryfunc)),
        ("nb_bool", function(functions.inquiry)),
        ("nb_invert", function(functions.unaryfunc)),
        ("nb_lshift", function(functions.binaryfunc)),
        ("nb_rshift", function(functions.binaryfunc)),
        ("nb_and", function(functions.binaryfunc)),
        ("nb_xor", function(functions.binaryfunc)),
        ("nb_or", function(functions.binaryfunc)),
        ("nb_int", function(functions.unaryfunc)),
        ("nb_reserved", void_ptr()),
        ("nb_float", function(functions.unaryfunc)),

        ("nb_inplace_add", function(functions.binaryfunc)),
        ("nb_inplace_subtract", function(functions.binaryfunc)),
        ("nb_inplace_multiply", function(functions.binaryfunc)),
        ("nb_inplace_remainder", function(functions.binaryfunc)),
        ("nb_inplace_power", function(functions.ternaryfunc)),
        ("nb_inplace_lshift", function(functions.binaryfunc)),
        ("nb_inplace_rshift", function(functions.binaryfunc)),
        ("nb_inplace_and", function(functions.binaryfunc)),
        ("nb_inplace_xor", function(functions.binaryfunc)),
        ("nb_inplace_or", function(functions.binaryfunc)),

        ("nb_floor_divide", function(functions.binaryfunc)),
        ("nb_true_divide", function(functions.binaryfunc)),
        ("nb_inplace_floor_divide", function(functions.binaryfunc)),
        ("nb_inplace_true_divide", function(functions.binaryfunc)),

        ("nb_index", function(functions.unaryfunc)),

        ("nb_matrix_multiply", function(functions.binaryfunc)),
        ("nb_inplace_matrix_multiply", function(functions.binaryfunc)),
    ])?;

    registry.finalize(structs.sequence_methods, vec![
        ("sq_length", function(functions.lenfunc)),
        ("sq_concat", function(functions.binaryfunc)),
        ("sq_repeat", function(functions.ssizeargfunc)),
        ("sq_item", function(functions.ssizeargfunc)),
        ("was_sq_slice", void_ptr()),
        ("sq_ass_item", function(functions.ssizeobjargproc)),
        ("was_sq_ass_slice", void_ptr()),
        ("sq_contains", function(functions.objobjproc)),

        ("sq_inplace_concat", function(functions.binaryfunc)),
        ("sq_inplace_repeat", function(functions.ssizeargfunc)),
    ])?;

    registry.finalize(structs.mapping_methods, vec![
        ("mp_length", function(functions.lenfunc)),
        ("mp_subscript", function(functions.binaryfunc)),
        ("mp_ass_subscript", function(functions.objobjargproc)),
    ])?;

    registry.finalize(structs.buffer_procs, vec![
        ("bf_getbuffer", function(functions.getbufferproc)),
        ("bf_releasebuffer", function(functions.releasebufferproc)),
    ])?;

    registry.finalize(structs.method_def, vec![
        ("ml_name", FieldType::CString),
        ("ml_meth", function(functions.cfunction)),
        ("ml_flags", int.clone()),
        ("_ml_flags_gap", int_gap()),
        ("ml_doc", FieldType::CString),
    ])?;

    registry.finalize(structs.member_def, vec![
        ("name", FieldType::CString),
        ("type", int.clone()),
        ("_type_gap", int_gap()),
        ("offset", ssize.clone()),
        ("flags", int.clone()),
        ("_flags_gap", int_gap()),
        ("doc", FieldType::CString),
    ])?;

    let ssize_ptr = FieldType::Pointer(Pointee::Scalar(ScalarType::SSize));
    registry.finalize(structs.buffer, vec![
        ("buf", void_ptr()),
        ("obj", object.clone()),
        ("len", ssize.clone()),
        ("itemsize", ssize.clone()),

        ("readonly", int.clone()),
        ("ndim", int.clone()),
        ("format", FieldType::CString),
        ("shape", ssize_ptr.clone()),
        ("strides", ssize_ptr.clone()),
        ("suboffsets", ssize_ptr),
        ("internal", void_ptr()),
    ])?;

    registry.finalize(structs.getset_def, vec![
        ("name", FieldType::CString),
        ("get", function(functions.getter)),
        ("set", function(functions.setter)),
        ("doc", FieldType::CString),
        ("closure", void_ptr()),
    ])?;

    registry.finalize(structs.long_object, vec![
        ("ob_base", FieldType::Struct(structs.var_object)),
        // ob_digit: uint32_t[abs(ob_size)], starting here
        ("_ob_digit", FieldType::Opaque),
    ])?;

    registry.finalize(structs.list_object, vec![
        ("ob_base", FieldType::Struct(structs.var_object)),
        // ob_item: PyObject **, to an array of ob_size items
        ("_ob_item", FieldType::Opaque),
        ("allocated", ssize.clone()),
    ])?;

    registry.finalize(structs.float_object, vec![
        ("ob_base", FieldType::Struct(structs.object)),
        ("ob_fval", scalar(ScalarType::Double)),
    ])?;

    registry.finalize(structs.tuple_object, vec![
        ("ob_base", FieldType::Struct(structs.var_object)),
        // ob_item: PyObject *[ob_size], starting here
        ("_ob_item", FieldType::Opaque),
    ])?;

    registry.finalize(structs.bytes_object, vec![
        ("ob_base", FieldType::Struct(structs.var_object)),
        ("ob_shash", ssize.clone()),
        // ob_sval: char[ob_size + 1], starting here
        ("_ob_sval", FieldType::Opaque),
    ])?;

    registry.finalize(structs.err_stack_item, vec![
        ("exc_type", object.clone()),
        ("exc_value", object.clone()),
        ("exc_traceback", object.clone()),

        ("previous_item", FieldType::pointer_to(structs.err_stack_item)),
    ])?;

    registry.finalize(structs.core_config, vec![
        ("isolated", int.clone()),
        ("use_environment", int.clone()),
        ("_init_main", int.clone()),
    ])?;

    registry.finalize(structs.interpreter_state, vec![
        ("next", FieldType::pointer_to(structs.interpreter_state)),
        ("tstate_head", FieldType::pointer_to(structs.thread_state)),

        ("id", scalar(ScalarType::Int64)),
        ("id_refcount", scalar(ScalarType::Int64)),
        ("requires_idref", int.clone()),
        ("_requires_idref_gap", int_gap()),
        // PyThread_type_lock
        ("id_mutex", void_ptr()),

        ("finalizing", int.clone()),
        ("_finalizing_gap", int_gap()),

        ("modules", object.clone()),
        ("modules_by_index", object.clone()),
        ("sysdict", object.clone()),
        ("builtins", object.clone()),
        ("importlib", object.clone()),

        ("check_interval", int.clone()),
        ("_check_interval_gap", int_gap()),

        ("num_threads", scalar(ScalarType::Long)),
        ("pythread_stacksize", scalar(ScalarType::Size)),

        ("codec_search_path", object.clone()),
        ("codec_search_cache", object.clone()),
        ("codec_error_registry", object.clone()),
        ("codecs_initialized", int.clone()),
        ("fscodec_initialized", int.clone()),

        ("core_config", FieldType::Struct(structs.core_config)),
        ("dlopenflags", FieldType::when(capabilities.have_dlopen, int.clone())),
        // core_config ends 4 bytes short of pointer alignment unless dlopenflags fills the gap
        ("_core_config_gap", FieldType::when(!capabilities.have_dlopen, int_gap())),

        ("dict", object.clone()),
        ("builtins_copy", object.clone()),
        ("import_func", object.clone()),

        ("eval_frame", function(functions.frame_eval)),

        ("co_extra_user_count", ssize.clone()),
        ("co_extra_freefuncs", FieldType::array_of(function(functions.freefunc), 255)),

        ("before_forkers", FieldType::when(capabilities.have_fork, object.clone())),
        ("after_forkers_parent", FieldType::when(capabilities.have_fork, object.clone())),
        ("after_forkers_child", FieldType::when(capabilities.have_fork, object.clone())),

        ("pyexitfunc", function(functions.exitfunc)),
        ("pyexitmodule", object.clone()),

        ("tstate_next_unique_id", scalar(ScalarType::UInt64)),
    ])?;

    registry.finalize(structs.thread_state, vec![
        ("prev", FieldType::pointer_to(structs.thread_state)),
        ("next", FieldType::pointer_to(structs.thread_state)),
        ("interp", FieldType::pointer_to(structs.interpreter_state)),

        // frame objects have no declared layout
        ("frame", void_ptr()),
        ("recursion_depth", int.clone()),
        ("overflowed", scalar(ScalarType::Char)),
        ("recursion_critical", scalar(ScalarType::Char)),
        ("_recursion_critical_gap", FieldType::array_of(scalar(ScalarType::Char), 2)),
        ("stackcheck_counter", int.clone()),

        ("tracing", int.clone()),
        ("use_tracing", int.clone()),
        ("_use_tracing_gap", int_gap()),

        ("c_profilefunc", function(functions.tracefunc)),
        ("c_tracefunc", function(functions.tracefunc)),
        ("c_profileobj", object.clone()),
        ("c_traceobj", object.clone()),

        ("curexc_type", object.clone()),
        ("curexc_value", object.clone()),
        ("curexc_traceback", object.clone()),

        ("exc_state", FieldType::Struct(structs.err_stack_item)),
        ("exc_info", FieldType::pointer_to(structs.err_stack_item)),

        ("dict", object.clone()),

        ("gilstate_counter", int.clone()),
        ("_gilstate_counter_gap", int_gap()),

        ("async_exc", object.clone()),
        ("thread_id", scalar(ScalarType::ULong)),

        ("trash_delete_nesting", int.clone()),
        ("_trash_delete_nesting_gap", int_gap()),
        ("trash_delete_later", object.clone()),

        ("on_delete", function(functions.on_delete)),
        ("on_delete_data", void_ptr()),

        ("coroutine_origin_tracking_depth", int.clone()),
        ("_coroutine_origin_tracking_depth_gap", int_gap()),

        ("coroutine_wrapper", object.clone()),
        ("in_coroutine_wrapper", int.clone()),
        ("_in_coroutine_wrapper_gap", int_gap()),

        ("async_gen_firstiter", object.clone()),
        ("async_gen_finalizer", object.clone()),

        ("context", object),
        ("context_ver", scalar(ScalarType::UInt64)),

        ("id", scalar(ScalarType::UInt64)),
    ])?;

    Ok(())
}
