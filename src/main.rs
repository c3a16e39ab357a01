use cpystructs::cpython::functions::EXPORTED_FUNCTIONS;
use cpystructs::cpython::{CPythonLayouts, EXPORTED_STRUCTS, LAYOUTS};
use cpystructs::{LayoutResult, ObjectPointer};

#[repr(C)]
struct BytesImage {
    ob_refcnt: isize,
    ob_type: ObjectPointer,
    ob_size: isize,
    ob_shash: isize,
    ob_sval: [u8; 8]
}

fn print_layouts(layouts: &CPythonLayouts) -> LayoutResult<()> {
    let registry = layouts.registry();

    for name in EXPORTED_STRUCTS {
        let id = layouts.lookup(name)?;
        println!("{} (size: {})", name, registry.size_of(id)?);
        for field in registry.get(id).fields() {
            println!("    {:>5}  {:<40} {}", field.offset(), field.name(), registry.type_name(field.field_type()));
        }
        println!();
    }

    for name in EXPORTED_FUNCTIONS {
        println!("{}", registry.function_signature(layouts.lookup_function(name)?));
    }

    Ok(())
}

fn inspect_bytes(layouts: &CPythonLayouts) -> LayoutResult<()> {
    let mut image = BytesImage {
        ob_refcnt: 1,
        ob_type: std::ptr::null_mut(),
        ob_size: 5,
        ob_shash: -1,
        ob_sval: *b"hello\0\0\0"
    };

    let view = unsafe { layouts.registry().bind_to_object(layouts.structs().bytes_object, &mut image) };
    println!("{:?}", view);
    println!("ob_size: {}", view.read_path::<isize>(&["ob_base", "ob_size"])?);
    println!("ob_sval: {:?}", String::from_utf8_lossy(&layouts.bytes_value(&view)?));

    view.write_path::<isize>(&["ob_base", "ob_size"], 4)?;
    println!("ob_sval after resize: {:?}", String::from_utf8_lossy(&layouts.bytes_value(&view)?));

    Ok(())
}

fn main() {
    env_logger::init();

    println!("Capabilities: {:?}", LAYOUTS.capabilities());
    println!();

    let result = print_layouts(&LAYOUTS).and_then(|_| inspect_bytes(&LAYOUTS));
    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
