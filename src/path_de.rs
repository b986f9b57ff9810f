use serde::de::DeserializeOwned;

use crate::error::SchemaError;

/// Deserialize a descriptor, reporting the JSON path of the offending node.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, SchemaError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(descriptor_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SchemaError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(descriptor_error)
}

/// Same, from an already parsed tree.
pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, SchemaError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(descriptor_error)
}

fn descriptor_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> SchemaError {
    SchemaError::Descriptor {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}
