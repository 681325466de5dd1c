//! Schema descriptors and decoding of model output.
//!
//! A [`Schema`] exposes a JSON Schema descriptor used to constrain the model
//! and decodes the model's raw JSON into its typed output. Validation runs
//! through `jsonschema`; decoding never coerces a value that failed it.

use std::fmt;
use std::marker::PhantomData;

use jsonschema::Validator;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// A schema the agent can extract against.
pub trait Schema: Send + Sync {
    type Output: Serialize + Send;

    /// JSON Schema describing the expected output.
    fn descriptor(&self) -> &Value;

    fn decode(&self, raw: Value) -> Result<Self::Output, SchemaMismatchError>;
}

/// Failure to compile a schema descriptor.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("failed to generate schema: {0}")]
    Generation(#[from] serde_json::Error),
}

/// Model output did not fit the requested schema.
#[derive(Debug, Error)]
pub enum SchemaMismatchError {
    #[error("output violates schema: {message}")]
    Violation { message: String },
    #[error("output could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
}

impl SchemaMismatchError {
    fn first_violation(validator: &Validator, instance: &Value) -> Option<Self> {
        let mut errors = validator.iter_errors(instance);
        errors.next().map(|error| SchemaMismatchError::Violation {
            message: error.to_string(),
        })
    }
}

fn compile(descriptor: &Value) -> Result<Validator, SchemaError> {
    jsonschema::validator_for(descriptor)
        .map_err(|error| SchemaError::InvalidDescriptor(error.to_string()))
}

/// A schema given as a raw JSON Schema document; decodes to [`Value`].
pub struct ValueSchema {
    descriptor: Value,
    validator: Validator,
}

impl ValueSchema {
    pub fn new(descriptor: Value) -> Result<Self, SchemaError> {
        let validator = compile(&descriptor)?;
        Ok(Self {
            descriptor,
            validator,
        })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }
}

impl fmt::Debug for ValueSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSchema")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl Schema for ValueSchema {
    type Output = Value;

    fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    fn decode(&self, raw: Value) -> Result<Value, SchemaMismatchError> {
        match SchemaMismatchError::first_violation(&self.validator, &raw) {
            Some(err) => Err(err),
            None => Ok(raw),
        }
    }
}

/// A schema derived from a Rust type with `schemars`; decodes to `T`.
pub struct TypedSchema<T> {
    descriptor: Value,
    validator: Validator,
    _output: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T>
where
    T: schemars::JsonSchema + DeserializeOwned + Serialize + Send,
{
    pub fn new() -> Result<Self, SchemaError> {
        let descriptor = serde_json::to_value(schemars::schema_for!(T))?;
        let validator = compile(&descriptor)?;
        Ok(Self {
            descriptor,
            validator,
            _output: PhantomData,
        })
    }
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSchema")
            .field("type", &std::any::type_name::<T>())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + Send,
{
    type Output = T;

    fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    fn decode(&self, raw: Value) -> Result<T, SchemaMismatchError> {
        if let Some(err) = SchemaMismatchError::first_violation(&self.validator, &raw) {
            return Err(err);
        }
        serde_json::from_value(raw).map_err(SchemaMismatchError::Decode)
    }
}
