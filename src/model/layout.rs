use std::collections::HashMap;
use std::iter::FromIterator;

use crate::model::typesystem::FieldType;

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    field_type: FieldType,
    offset: usize,
    size: usize
}

impl Field {
    pub fn new(name: String, field_type: FieldType) -> Field {
        Field {
            name,
            field_type,
            offset: 0,
            size: 0
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// A named, contiguous memory layout. Declared empty, populated exactly once.
#[derive(Debug, Clone)]
pub struct StructDescriptor {
    name: String,
    fields: Vec<Field>,
    fields_mapping: HashMap<String, usize>,
    memory_size: usize,
    finalized: bool
}

impl StructDescriptor {
    pub fn declare(name: String) -> StructDescriptor {
        StructDescriptor {
            name,
            fields: Vec::new(),
            fields_mapping: HashMap::new(),
            memory_size: 0,
            finalized: false
        }
    }

    /// Lays out `fields` back to back, no padding. Each entry carries its resolved size.
    pub(crate) fn populate(&mut self, fields: Vec<(Field, usize)>) {
        let mut offset = 0;
        let mut laid_out = Vec::with_capacity(fields.len());
        for (mut field, size) in fields {
            field.offset = offset;
            field.size = size;
            offset += size;
            laid_out.push(field);
        }

        self.fields_mapping = HashMap::from_iter(
            laid_out.iter().enumerate().map(|(index, field)| (field.name.clone(), index))
        );
        self.fields = laid_out;
        self.memory_size = offset;
        self.finalized = true;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &Vec<Field> {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        let field_index = self.fields_mapping.get(name)?;
        self.fields.get(*field_index)
    }

    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
use crate::model::typesystem::ScalarType;

#[test]
fn test_populate1() {
    let mut descriptor = StructDescriptor::declare("Point".to_owned());
    assert!(!descriptor.is_finalized());
    assert_eq!(0, descriptor.memory_size());

    descriptor.populate(vec![
        (Field::new("x".to_owned(), FieldType::Scalar(ScalarType::Int)), 4),
        (Field::new("y".to_owned(), FieldType::Scalar(ScalarType::Double)), 8),
        (Field::new("z".to_owned(), FieldType::Scalar(ScalarType::Int)), 4),
    ]);

    assert!(descriptor.is_finalized());
    assert_eq!(16, descriptor.memory_size());
    assert_eq!(0, descriptor.get_field("x").unwrap().offset());
    assert_eq!(4, descriptor.get_field("y").unwrap().offset());
    assert_eq!(12, descriptor.get_field("z").unwrap().offset());
    assert_eq!(16, descriptor.get_field("z").unwrap().end());
    assert!(descriptor.get_field("w").is_none());
}
