//! Typed, addressable views of memory laid out by another runtime.
//!
//! Struct layouts are declared empty, populated once, and then bound to
//! arbitrary addresses. Trailing variable-length data is exposed as arrays
//! sized from a length field of the same struct, re-read on every access.
//!
//! The engine cannot tell a valid address from an invalid one. Binding a
//! layout to memory that does not match it, or that is freed while a view is
//! in use, is undefined behavior. This is why every binding function
//! (`LayoutRegistry::bind_at`, `LayoutRegistry::bind_to_object`,
//! `BoundView::reinterpret`) is `unsafe`: the caller vouches for the address
//! once, and every read and write through the resulting view relies on it.

#[macro_use]
extern crate lazy_static;

pub mod model;
pub mod runtime;
pub mod cpython;


pub use crate::model::registry::{LayoutError, LayoutRegistry, LayoutResult};
pub use crate::model::typesystem::{FieldType, FunctionTypeId, Pointee, ScalarType, StructId};
pub use crate::runtime::array::{Anchor, ArrayView, LengthRule, TrailingArray};
pub use crate::runtime::memory::{Scalar, Value};
pub use crate::runtime::object::{ObjectIdentity, ObjectPointer};
pub use crate::runtime::view::BoundView;
