use proptest::prelude::*;

use crate::model::registry::{LayoutError, LayoutRegistry};
use crate::model::typesystem::{FieldType, FunctionTypeId, Pointee, ScalarType, StructId, POINTER_SIZE};
use crate::runtime::array::{Anchor, LengthRule, TrailingArray};
use crate::runtime::object::ObjectPointer;

const SCALARS: [ScalarType; 11] = [
    ScalarType::Char,
    ScalarType::Int,
    ScalarType::UInt,
    ScalarType::Long,
    ScalarType::ULong,
    ScalarType::Int64,
    ScalarType::UInt32,
    ScalarType::UInt64,
    ScalarType::SSize,
    ScalarType::Size,
    ScalarType::Double,
];

fn assert_monotonic(registry: &LayoutRegistry, id: StructId) {
    let fields = registry.get(id).fields();
    for (index, first) in fields.iter().enumerate() {
        for second in &fields[index + 1..] {
            assert!(first.offset() + registry.field_size(first.field_type()).unwrap() <= second.offset());
        }
    }

    for pair in fields.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset());
    }
}

#[test]
fn test_offset_monotonic1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Mixed").unwrap();
    registry.finalize(id, vec![
        ("c", FieldType::Scalar(ScalarType::Char)),
        ("i", FieldType::Scalar(ScalarType::Int)),
        ("p", FieldType::Pointer(Pointee::Void)),
        ("a", FieldType::array_of(FieldType::Scalar(ScalarType::UInt32), 3)),
        ("d", FieldType::Scalar(ScalarType::Double)),
    ]).unwrap();

    assert_monotonic(&registry, id);
    assert_eq!(1, registry.field_offset(id, "i"));
    assert_eq!(5, registry.field_offset(id, "p"));
    assert_eq!(5 + POINTER_SIZE, registry.field_offset(id, "a"));
    assert_eq!(5 + POINTER_SIZE + 12, registry.field_offset(id, "d"));
    assert_eq!(5 + POINTER_SIZE + 12 + 8, registry.size_of(id).unwrap());
}

#[test]
fn test_conditional_omission1() {
    let mut with_absent = LayoutRegistry::new();
    let first = with_absent.declare("State").unwrap();
    with_absent.finalize(first, vec![
        ("head", FieldType::Scalar(ScalarType::Int64)),
        ("flags", FieldType::when(false, FieldType::Scalar(ScalarType::Int))),
        ("dict", FieldType::Pointer(Pointee::Object)),
        ("tail", FieldType::Absent),
    ]).unwrap();

    let mut without = LayoutRegistry::new();
    let second = without.declare("State").unwrap();
    without.finalize(second, vec![
        ("head", FieldType::Scalar(ScalarType::Int64)),
        ("dict", FieldType::Pointer(Pointee::Object)),
    ]).unwrap();

    assert_eq!(without.size_of(second).unwrap(), with_absent.size_of(first).unwrap());
    for field in without.get(second).fields() {
        assert_eq!(field.offset(), with_absent.try_field_offset(first, field.name()).unwrap());
    }

    assert_eq!(2, with_absent.get(first).fields().len());
    assert!(with_absent.try_field_offset(first, "flags").is_err());
}

#[test]
fn test_round_trip1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Everything").unwrap();
    let function = registry.declare_function("callback", vec![FieldType::Pointer(Pointee::Void)], None).unwrap();

    let mut fields: Vec<(&str, FieldType)> = vec![
        ("char", FieldType::Scalar(ScalarType::Char)),
        ("int", FieldType::Scalar(ScalarType::Int)),
        ("uint", FieldType::Scalar(ScalarType::UInt)),
        ("long", FieldType::Scalar(ScalarType::Long)),
        ("ulong", FieldType::Scalar(ScalarType::ULong)),
        ("int64", FieldType::Scalar(ScalarType::Int64)),
        ("uint32", FieldType::Scalar(ScalarType::UInt32)),
        ("uint64", FieldType::Scalar(ScalarType::UInt64)),
        ("ssize", FieldType::Scalar(ScalarType::SSize)),
        ("size", FieldType::Scalar(ScalarType::Size)),
        ("double", FieldType::Scalar(ScalarType::Double)),
    ];
    fields.push(("self", FieldType::pointer_to(id)));
    fields.push(("callback", FieldType::Function(function)));
    fields.push(("name", FieldType::CString));
    fields.push(("_anchor", FieldType::Opaque));
    registry.finalize(id, fields).unwrap();

    let mut scratch = vec![0xAAu8; registry.size_of(id).unwrap()];
    let view = unsafe { registry.bind_at(id, scratch.as_mut_ptr() as ObjectPointer) };

    view.write::<i8>("char", -3).unwrap();
    view.write::<libc::c_int>("int", -70000).unwrap();
    view.write::<libc::c_uint>("uint", 70000).unwrap();
    view.write::<libc::c_long>("long", -123456).unwrap();
    view.write::<libc::c_ulong>("ulong", 123456).unwrap();
    view.write::<i64>("int64", i64::MIN).unwrap();
    view.write::<u32>("uint32", u32::MAX).unwrap();
    view.write::<u64>("uint64", u64::MAX - 1).unwrap();
    view.write::<libc::ssize_t>("ssize", -1).unwrap();
    view.write::<libc::size_t>("size", 4711).unwrap();
    view.write::<f64>("double", 2.5).unwrap();
    view.write_address("self", view.address()).unwrap();
    view.write_address("callback", 0x1000 as ObjectPointer).unwrap();
    view.write_address("name", std::ptr::null_mut()).unwrap();
    view.write_address("_anchor", 0x2000 as ObjectPointer).unwrap();

    assert_eq!(-3, view.read::<i8>("char").unwrap());
    assert_eq!(-70000, view.read::<libc::c_int>("int").unwrap());
    assert_eq!(70000, view.read::<libc::c_uint>("uint").unwrap());
    assert_eq!(-123456, view.read::<libc::c_long>("long").unwrap());
    assert_eq!(123456, view.read::<libc::c_ulong>("ulong").unwrap());
    assert_eq!(i64::MIN, view.read::<i64>("int64").unwrap());
    assert_eq!(u32::MAX, view.read::<u32>("uint32").unwrap());
    assert_eq!(u64::MAX - 1, view.read::<u64>("uint64").unwrap());
    assert_eq!(-1, view.read::<libc::ssize_t>("ssize").unwrap());
    assert_eq!(4711, view.read::<libc::size_t>("size").unwrap());
    assert_eq!(2.5, view.read::<f64>("double").unwrap());
    assert_eq!(view.address(), view.read_address("self").unwrap());
    assert_eq!(0x1000 as ObjectPointer, view.read_address("callback").unwrap());
    assert!(view.read_address("name").unwrap().is_null());
    assert_eq!(0x2000 as ObjectPointer, view.read_address("_anchor").unwrap());

    assert_eq!(view.address(), view.deref("self").unwrap().unwrap().address());
}

#[test]
fn test_variable_length_reread1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Sized").unwrap();
    registry.finalize(id, vec![
        ("ob_size", FieldType::Scalar(ScalarType::SSize)),
        ("_items", FieldType::Opaque),
    ]).unwrap();

    let items = TrailingArray::new(&["ob_size"], "_items", FieldType::Scalar(ScalarType::UInt32), LengthRule::Exact, Anchor::Inline);
    let mut scratch = vec![0u8; POINTER_SIZE + 8 * 4];
    let view = unsafe { registry.bind_at(id, scratch.as_mut_ptr() as ObjectPointer) };

    view.write::<isize>("ob_size", 2).unwrap();
    let before = view.trailing(&items).unwrap();
    assert_eq!(2, before.len());
    assert!(before.read::<u32>(5).is_err());

    // Mutated behind the view's back.
    unsafe { *(scratch.as_mut_ptr() as *mut isize) = 6 };

    let after = view.trailing(&items).unwrap();
    assert_eq!(6, after.len());
    assert_eq!(0, after.read::<u32>(5).unwrap());
}

#[test]
fn test_forward_reference1() {
    let mut registry = LayoutRegistry::new();
    let a = registry.declare("A").unwrap();
    let b = registry.declare("B").unwrap();

    registry.finalize(a, vec![
        ("value", FieldType::Scalar(ScalarType::Int64)),
        ("b", FieldType::pointer_to(b)),
    ]).unwrap();
    registry.finalize(b, vec![
        ("tag", FieldType::Scalar(ScalarType::Int)),
        ("a", FieldType::pointer_to(a)),
    ]).unwrap();

    assert_eq!(8, registry.field_offset(a, "b"));
    assert_eq!(4, registry.field_offset(b, "a"));
    assert_eq!(&FieldType::pointer_to(b), registry.get_field(a, "b").unwrap().field_type());
    assert_eq!(&FieldType::pointer_to(a), registry.get_field(b, "a").unwrap().field_type());
    assert!(registry.is_finalized());
}

#[test]
fn test_forward_reference2() {
    let mut registry = LayoutRegistry::new();
    let a = registry.declare("A").unwrap();
    let b = registry.declare("B").unwrap();
    registry.finalize(a, vec![("value", FieldType::Scalar(ScalarType::Int64)), ("b", FieldType::pointer_to(b))]).unwrap();
    registry.finalize(b, vec![("value", FieldType::Scalar(ScalarType::Int64)), ("a", FieldType::pointer_to(a))]).unwrap();

    let mut first = vec![0u8; 8 + POINTER_SIZE];
    let mut second = vec![0u8; 8 + POINTER_SIZE];
    let first_view = unsafe { registry.bind_at(a, first.as_mut_ptr() as ObjectPointer) };
    let second_view = unsafe { registry.bind_at(b, second.as_mut_ptr() as ObjectPointer) };

    first_view.write::<i64>("value", 1).unwrap();
    second_view.write::<i64>("value", 2).unwrap();
    first_view.write_address("b", second_view.address()).unwrap();
    second_view.write_address("a", first_view.address()).unwrap();

    let round_trip = first_view.deref("b").unwrap().unwrap().deref("a").unwrap().unwrap();
    assert_eq!(a, round_trip.struct_id());
    assert_eq!(1, round_trip.read::<i64>("value").unwrap());
}

#[test]
fn test_unknown_field_fallback1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Pair").unwrap();
    registry.finalize(id, vec![
        ("first", FieldType::Scalar(ScalarType::UInt64)),
        ("second", FieldType::Scalar(ScalarType::UInt64)),
    ]).unwrap();

    assert_eq!(16, registry.field_offset(id, "nonexistent_field"));
    assert!(matches!(registry.try_field_offset(id, "nonexistent_field"), Err(LayoutError::UnknownField { .. })));
}

#[test]
fn test_reinterpret1() {
    let mut registry = LayoutRegistry::new();
    let header = registry.declare("Header").unwrap();
    let float = registry.declare("Float").unwrap();
    registry.finalize(header, vec![
        ("refcount", FieldType::Scalar(ScalarType::SSize)),
        ("type", FieldType::Pointer(Pointee::Void)),
    ]).unwrap();
    registry.finalize(float, vec![
        ("base", FieldType::Struct(header)),
        ("value", FieldType::Scalar(ScalarType::Double)),
    ]).unwrap();

    let mut scratch = vec![0u8; registry.size_of(float).unwrap()];
    let float_view = unsafe { registry.bind_at(float, scratch.as_mut_ptr() as ObjectPointer) };
    float_view.write::<f64>("value", 1.5).unwrap();
    float_view.write_path::<isize>(&["base", "refcount"], 7).unwrap();

    let header_view = unsafe { float_view.reinterpret(header) };
    assert_eq!(float_view.address(), header_view.address());
    assert_eq!(7, header_view.read::<isize>("refcount").unwrap());
    assert_eq!(7, float_view.struct_field("base").unwrap().read::<isize>("refcount").unwrap());
}

#[test]
fn test_fixed_array1() {
    let mut registry = LayoutRegistry::new();
    let id = registry.declare("Table").unwrap();
    let function = registry.declare_function("freefunc", vec![FieldType::Pointer(Pointee::Void)], None).unwrap();
    registry.finalize(id, vec![
        ("count", FieldType::Scalar(ScalarType::SSize)),
        ("entries", FieldType::array_of(FieldType::Function(function), 4)),
    ]).unwrap();

    let mut scratch = vec![0u8; registry.size_of(id).unwrap()];
    let view = unsafe { registry.bind_at(id, scratch.as_mut_ptr() as ObjectPointer) };
    let entries = view.array("entries").unwrap();

    assert_eq!(4, entries.len());
    entries.write_address(3, 0x40 as ObjectPointer).unwrap();
    assert_eq!(0x40 as ObjectPointer, entries.read_address(3).unwrap());
    assert_eq!(Err(LayoutError::OutOfRange { index: 4, len: 4 }), entries.read_address(4));
    assert!(view.array("count").is_err());
}

fn field_type(kind: usize) -> FieldType {
    match kind {
        kind if kind < SCALARS.len() => FieldType::Scalar(SCALARS[kind]),
        kind if kind == SCALARS.len() => FieldType::Pointer(Pointee::Void),
        kind if kind == SCALARS.len() + 1 => FieldType::Function(FunctionTypeId(0)),
        _ => FieldType::array_of(FieldType::Scalar(ScalarType::UInt32), 3)
    }
}

proptest! {
    #[test]
    fn test_offsets_are_prefix_sums(kinds in prop::collection::vec((0usize..14, any::<bool>()), 1..24)) {
        let mut registry = LayoutRegistry::new();
        let id = registry.declare("Generated").unwrap();
        registry.declare_function("f", Vec::new(), None).unwrap();

        let names = (0..kinds.len()).map(|index| format!("f{}", index)).collect::<Vec<_>>();
        let fields = kinds.iter().zip(names.iter())
            .map(|((kind, present), name)| (name.as_str(), FieldType::when(*present, field_type(*kind))))
            .collect::<Vec<_>>();
        registry.finalize(id, fields).unwrap();

        let mut expected = 0;
        for ((kind, present), name) in kinds.iter().zip(names.iter()) {
            if *present {
                prop_assert_eq!(expected, registry.try_field_offset(id, name).unwrap());
                expected += field_type(*kind).fixed_size().unwrap();
            } else {
                prop_assert!(registry.try_field_offset(id, name).is_err());
            }
        }

        prop_assert_eq!(expected, registry.size_of(id).unwrap());
        prop_assert_eq!(expected, registry.field_offset(id, "missing"));
        assert_monotonic(&registry, id);
    }
}
