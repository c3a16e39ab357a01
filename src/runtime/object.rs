use std::ptr::NonNull;

pub type ObjectPointer = *mut std::ffi::c_void;

/// Resolves the memory address backing a live object.
///
/// This is the host runtime's identity primitive; the views only ever see
/// the address it produces.
pub trait ObjectIdentity {
    fn object_address(&self) -> ObjectPointer;
}

impl<'a, T> ObjectIdentity for &'a T {
    fn object_address(&self) -> ObjectPointer {
        *self as *const T as ObjectPointer
    }
}

impl<'a, T> ObjectIdentity for &'a mut T {
    fn object_address(&self) -> ObjectPointer {
        &**self as *const T as ObjectPointer
    }
}

impl<T> ObjectIdentity for *const T {
    fn object_address(&self) -> ObjectPointer {
        *self as ObjectPointer
    }
}

impl<T> ObjectIdentity for *mut T {
    fn object_address(&self) -> ObjectPointer {
        *self as ObjectPointer
    }
}

impl<T> ObjectIdentity for NonNull<T> {
    fn object_address(&self) -> ObjectPointer {
        self.as_ptr() as ObjectPointer
    }
}

#[test]
fn test_identity1() {
    let value = [1u64, 2u64];
    let expected = value.as_ptr() as ObjectPointer;

    assert_eq!(expected, (&value).object_address());
    assert_eq!(expected, (value.as_ptr()).object_address());
    assert_eq!(expected, NonNull::from(&value).object_address());
}
