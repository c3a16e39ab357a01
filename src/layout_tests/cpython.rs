use crate::cpython::capabilities::Capabilities;
use crate::cpython::functions::EXPORTED_FUNCTIONS;
use crate::cpython::{CPythonLayouts, EXPORTED_STRUCTS, LAYOUTS};
use crate::model::registry::{LayoutError, LayoutResult};
use crate::model::typesystem::POINTER_SIZE;
use crate::runtime::object::ObjectPointer;

fn layouts() -> CPythonLayouts {
    CPythonLayouts::build(Capabilities::detect()).unwrap()
}

fn scratch(layouts: &CPythonLayouts, name: &str, extra: usize) -> Vec<u8> {
    let id = layouts.lookup(name).unwrap();
    vec![0u8; layouts.registry().size_of(id).unwrap() + extra]
}

#[repr(C)]
struct FloatImage {
    ob_refcnt: isize,
    ob_type: ObjectPointer,
    ob_fval: f64
}

#[test]
fn test_build1() {
    for capabilities in &[Capabilities::none(), Capabilities::detect(), Capabilities::none().with_dlopen(true).with_fork(true)] {
        let layouts = CPythonLayouts::build(*capabilities).unwrap();
        assert!(layouts.registry().is_finalized());
        assert_eq!(*capabilities, layouts.capabilities());
    }
}

#[test]
fn test_exports1() {
    let layouts = layouts();
    for name in EXPORTED_STRUCTS {
        let id = layouts.lookup(name).unwrap();
        assert_eq!(*name, layouts.registry().get(id).name());
    }

    for name in EXPORTED_FUNCTIONS {
        let id = layouts.lookup_function(name).unwrap();
        assert_eq!(*name, layouts.registry().function(id).name());
    }

    assert_eq!(Err(LayoutError::NotExported("PyFrameObject".to_owned())), layouts.lookup("PyFrameObject"));
    assert_eq!(Err(LayoutError::NotExported("on_delete".to_owned())), layouts.lookup_function("on_delete"));
}

#[test]
fn test_header_offsets1() {
    let layouts = layouts();
    let registry = layouts.registry();
    let structs = layouts.structs();

    assert_eq!(2 * POINTER_SIZE, registry.size_of(structs.object).unwrap());
    assert_eq!(3 * POINTER_SIZE, registry.size_of(structs.var_object).unwrap());
    assert_eq!(2 * POINTER_SIZE, registry.field_offset_path(structs.var_object, &["ob_size"]).unwrap());
    assert_eq!(POINTER_SIZE, registry.field_offset_path(structs.type_object, &["ob_base", "ob_base", "ob_type"]).unwrap());
    assert_eq!(3 * POINTER_SIZE, registry.try_field_offset(structs.type_object, "tp_name").unwrap());
    assert_eq!(3 * POINTER_SIZE, registry.try_field_offset(structs.long_object, "_ob_digit").unwrap());
    assert_eq!(3 * POINTER_SIZE, registry.try_field_offset(structs.tuple_object, "_ob_item").unwrap());
    assert_eq!(4 * POINTER_SIZE, registry.try_field_offset(structs.bytes_object, "_ob_sval").unwrap());
    assert_eq!(2 * POINTER_SIZE, registry.try_field_offset(structs.float_object, "ob_fval").unwrap());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_abi_sizes1() {
    let layouts = layouts();
    let registry = layouts.registry();
    let structs = layouts.structs();

    assert_eq!(400, registry.size_of(structs.type_object).unwrap());
    assert_eq!(168, registry.try_field_offset(structs.type_object, "tp_flags").unwrap());
    assert_eq!(392, registry.try_field_offset(structs.type_object, "tp_finalize").unwrap());
    assert_eq!(32, registry.size_of(structs.method_def).unwrap());
    assert_eq!(40, registry.size_of(structs.member_def).unwrap());
    assert_eq!(80, registry.size_of(structs.buffer).unwrap());
    assert_eq!(288, registry.size_of(structs.number_methods).unwrap());
    assert_eq!(40, registry.try_field_offset(structs.thread_state, "stackcheck_counter").unwrap());
    assert_eq!(56, registry.try_field_offset(structs.thread_state, "c_profilefunc").unwrap());
}

#[test]
fn test_capability_fields1() {
    let without = CPythonLayouts::build(Capabilities::none()).unwrap();
    let with = CPythonLayouts::build(Capabilities::none().with_dlopen(true).with_fork(true)).unwrap();
    let state = without.structs().interpreter_state;

    assert!(without.registry().try_field_offset(state, "dlopenflags").is_err());
    assert!(without.registry().try_field_offset(state, "before_forkers").is_err());
    assert!(with.registry().try_field_offset(state, "dlopenflags").is_ok());
    assert!(with.registry().try_field_offset(state, "after_forkers_child").is_ok());

    // dlopenflags takes the place of the alignment gap after core_config.
    if POINTER_SIZE == 8 {
        assert_eq!(
            without.registry().try_field_offset(state, "dict").unwrap(),
            with.registry().try_field_offset(state, "dict").unwrap()
        );
    }
    assert_eq!(
        without.registry().try_field_offset(state, "pyexitfunc").unwrap() + 3 * POINTER_SIZE,
        with.registry().try_field_offset(state, "pyexitfunc").unwrap()
    );
    assert_eq!(
        without.registry().size_of(state).unwrap() + 3 * POINTER_SIZE,
        with.registry().size_of(state).unwrap()
    );
}

#[test]
fn test_float_object1() {
    let layouts = layouts();
    let image = FloatImage { ob_refcnt: 2, ob_type: std::ptr::null_mut(), ob_fval: 0.25 };

    let view = unsafe { layouts.registry().bind_to_object(layouts.structs().float_object, &image) };
    assert_eq!(0.25, view.read::<f64>("ob_fval").unwrap());
    assert_eq!(2, view.read_path::<isize>(&["ob_base", "ob_refcnt"]).unwrap());
    assert_eq!(None, layouts.type_name(&view).unwrap());
}

#[test]
fn test_type_name1() {
    let layouts = layouts();
    let tp_name = b"float\0";
    let mut type_object = scratch(&layouts, "PyTypeObject", 0);
    let type_view = unsafe { layouts.bind("PyTypeObject", type_object.as_mut_ptr() as ObjectPointer).unwrap() };
    type_view.write_address("tp_name", tp_name.as_ptr() as ObjectPointer).unwrap();

    let image = FloatImage { ob_refcnt: 1, ob_type: type_view.address(), ob_fval: 1.0 };
    let view = unsafe { layouts.registry().bind_to_object(layouts.structs().float_object, &image) };
    assert_eq!(Some("float".to_owned()), layouts.type_name(&view).unwrap());

    let header = unsafe { layouts.object(view.address()) };
    assert_eq!(type_view.address(), header.deref("ob_type").unwrap().unwrap().address());
}

#[test]
fn test_long_object1() {
    let layouts = layouts();
    let mut memory = scratch(&layouts, "PyLongObject", 3 * 4);
    let view = unsafe { layouts.bind("PyLongObject", memory.as_mut_ptr() as ObjectPointer).unwrap() };
    view.write_path::<isize>(&["ob_base", "ob_size"], -2).unwrap();

    let digits = layouts.long_digits(&view).unwrap();
    assert_eq!(2, digits.len());
    digits.write::<u32>(0, 5).unwrap();
    digits.write::<u32>(1, 3).unwrap();
    assert!(digits.write::<u32>(2, 1).is_err());

    assert_eq!(Some(-((3i128 << 30) + 5)), layouts.long_value(&view).unwrap());

    view.write_path::<isize>(&["ob_base", "ob_size"], 0).unwrap();
    assert!(layouts.long_digits(&view).unwrap().is_empty());
    assert_eq!(Some(0), layouts.long_value(&view).unwrap());
}

#[test]
fn test_bytes_object1() {
    let layouts = layouts();
    let mut memory = scratch(&layouts, "PyBytesObject", 8);
    let view = unsafe { layouts.bind("PyBytesObject", memory.as_mut_ptr() as ObjectPointer).unwrap() };
    view.write_path::<isize>(&["ob_base", "ob_size"], 3).unwrap();

    let sval = layouts.bytes_sval(&view).unwrap();
    assert_eq!(4, sval.len());
    for (index, byte) in b"abc\0".iter().enumerate() {
        sval.write::<u8>(index, *byte).unwrap();
    }

    assert_eq!(b"abc".to_vec(), layouts.bytes_value(&view).unwrap());
    assert_eq!(Err(LayoutError::OutOfRange { index: 4, len: 4 }), sval.read::<u8>(4));
}

#[test]
fn test_tuple_object1() {
    let layouts = layouts();
    let first = FloatImage { ob_refcnt: 1, ob_type: std::ptr::null_mut(), ob_fval: 1.5 };
    let second = FloatImage { ob_refcnt: 1, ob_type: std::ptr::null_mut(), ob_fval: -2.5 };

    let mut memory = scratch(&layouts, "PyTupleObject", 2 * POINTER_SIZE);
    let view = unsafe { layouts.bind("PyTupleObject", memory.as_mut_ptr() as ObjectPointer).unwrap() };
    view.write_path::<isize>(&["ob_base", "ob_size"], 2).unwrap();

    let items = layouts.tuple_items(&view).unwrap();
    assert_eq!(view.field_address("_ob_item").unwrap(), items.address());
    items.write_address(0, &first as *const FloatImage as ObjectPointer).unwrap();
    items.write_address(1, &second as *const FloatImage as ObjectPointer).unwrap();

    let values = (0..items.len())
        .map(|index| {
            let item = items.deref(index)?.expect("tuple items are never null");
            let float = unsafe { item.reinterpret(layouts.structs().float_object) };
            float.read::<f64>("ob_fval")
        })
        .collect::<LayoutResult<Vec<_>>>()
        .unwrap();

    assert_eq!(vec![1.5, -2.5], values);
}

#[test]
fn test_list_object1() {
    let layouts = layouts();
    let element = FloatImage { ob_refcnt: 1, ob_type: std::ptr::null_mut(), ob_fval: 8.0 };
    let mut items: Vec<ObjectPointer> = vec![&element as *const FloatImage as ObjectPointer, std::ptr::null_mut(), std::ptr::null_mut()];

    let mut memory = scratch(&layouts, "PyListObject", 0);
    let view = unsafe { layouts.bind("PyListObject", memory.as_mut_ptr() as ObjectPointer).unwrap() };
    view.write_path::<isize>(&["ob_base", "ob_size"], 1).unwrap();
    view.write::<isize>("allocated", 3).unwrap();
    view.write_address("_ob_item", items.as_mut_ptr() as ObjectPointer).unwrap();

    let list = layouts.list_items(&view).unwrap();
    assert_eq!(1, list.len());
    assert_eq!(items.as_ptr() as ObjectPointer, list.address());
    assert_eq!(&element as *const FloatImage as ObjectPointer, list.read_address(0).unwrap());
    assert!(list.read_address(1).is_err());

    // Appending only bumps ob_size; the next derivation sees it.
    view.write_path::<isize>(&["ob_base", "ob_size"], 2).unwrap();
    let list = layouts.list_items(&view).unwrap();
    assert!(list.deref(1).unwrap().is_none());
}

#[test]
fn test_interpreter_freefuncs1() {
    let layouts = layouts();
    let mut memory = scratch(&layouts, "PyInterpreterState", 0);
    let view = unsafe { layouts.bind("PyInterpreterState", memory.as_mut_ptr() as ObjectPointer).unwrap() };

    let freefuncs = view.array("co_extra_freefuncs").unwrap();
    assert_eq!(255, freefuncs.len());
    freefuncs.write_address(254, 0x10 as ObjectPointer).unwrap();
    assert_eq!(0x10 as ObjectPointer, freefuncs.read_address(254).unwrap());

    view.write::<u64>("tstate_next_unique_id", 9).unwrap();
    assert_eq!(9, view.read::<u64>("tstate_next_unique_id").unwrap());

    let core_config = view.struct_field("core_config").unwrap();
    core_config.write::<libc::c_int>("isolated", 1).unwrap();
    assert_eq!(1, view.read_path::<libc::c_int>(&["core_config", "isolated"]).unwrap());
}

#[test]
fn test_global_layouts1() {
    assert!(LAYOUTS.registry().is_finalized());
    let id = LAYOUTS.lookup("PyVarObject").unwrap();
    assert_eq!(3 * POINTER_SIZE, LAYOUTS.registry().size_of(id).unwrap());
}
