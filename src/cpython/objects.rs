use crate::cpython::structs::StructIds;
use crate::model::typesystem::{FieldType, ScalarType};
use crate::runtime::array::{Anchor, LengthRule, TrailingArray};

const OB_SIZE: &[&str] = &["ob_base", "ob_size"];

/// Trailing data of the variable-size object kinds.
pub struct ObjectArrays {
    /// `uint32_t[abs(ob_size)]`; the sign of `ob_size` is the sign of the int.
    pub long_digits: TrailingArray,
    /// `PyObject *[ob_size]`
    pub tuple_items: TrailingArray,
    /// `PyObject **`, separately allocated.
    pub list_items: TrailingArray,
    /// `char[ob_size + 1]`, NUL terminated.
    pub bytes_sval: TrailingArray
}

impl ObjectArrays {
    pub fn new(structs: &StructIds) -> ObjectArrays {
        let item = FieldType::pointer_to(structs.object);

        ObjectArrays {
            long_digits: TrailingArray::new(
                OB_SIZE, "_ob_digit", FieldType::Scalar(ScalarType::UInt32), LengthRule::Magnitude, Anchor::Inline
            ),
            tuple_items: TrailingArray::new(
                OB_SIZE, "_ob_item", item.clone(), LengthRule::Exact, Anchor::Inline
            ),
            list_items: TrailingArray::new(
                OB_SIZE, "_ob_item", item, LengthRule::Exact, Anchor::Indirect
            ),
            bytes_sval: TrailingArray::new(
                OB_SIZE, "_ob_sval", FieldType::Scalar(ScalarType::Char), LengthRule::WithTerminator, Anchor::Inline
            )
        }
    }
}

pub const DIGIT_BITS: u32 = 30;

/// Combines 30-bit digits, least significant first. `None` on overflow.
pub fn digits_to_i128(digits: &[u32], negative: bool) -> Option<i128> {
    let mut value: i128 = 0;
    for (index, digit) in digits.iter().enumerate() {
        let shift = DIGIT_BITS * index as u32;
        if shift >= 127 {
            if *digit != 0 {
                return None;
            }
            continue;
        }

        let part = (*digit as i128).checked_shl(shift)?;
        if (part >> shift) != *digit as i128 {
            return None;
        }

        value = value.checked_add(part)?;
    }

    Some(if negative { -value } else { value })
}

#[test]
fn test_digits_to_i128() {
    assert_eq!(Some(0), digits_to_i128(&[], false));
    assert_eq!(Some(5), digits_to_i128(&[5], false));
    assert_eq!(Some(-5), digits_to_i128(&[5], true));
    assert_eq!(Some((1i128 << 30) + 7), digits_to_i128(&[7, 1], false));
    assert_eq!(Some(1i128 << 120), digits_to_i128(&[0, 0, 0, 0, 1], false));
    assert_eq!(None, digits_to_i128(&[0, 0, 0, 0, 1 << 7], false));
}
