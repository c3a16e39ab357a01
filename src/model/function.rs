use crate::model::typesystem::FieldType;

/// A callable signature usable as a field type. Never instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    name: String,
    parameters: Vec<FieldType>,
    return_type: Option<FieldType>
}

impl FunctionType {
    pub fn new(name: String, parameters: Vec<FieldType>, return_type: Option<FieldType>) -> FunctionType {
        FunctionType {
            name,
            parameters,
            return_type
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Vec<FieldType> {
        &self.parameters
    }

    /// `None` for functions returning void.
    pub fn return_type(&self) -> Option<&FieldType> {
        self.return_type.as_ref()
    }

    pub fn returns_void(&self) -> bool {
        self.return_type.is_none()
    }
}
