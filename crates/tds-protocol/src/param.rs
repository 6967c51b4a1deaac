//! Outbound RPC parameters.
//!
//! A [`Parameter`] pairs a canonical [`SqlValue`] with the registered data
//! type it is sent as. Parameters are only created through
//! [`ParameterBuilder::build`], which runs the type's `validate` step and
//! resolves defaults (length, precision, scale), so encoding a built
//! parameter never has to re-check its value.

use bitflags::bitflags;
use tds_types::{SqlValue, TypeError};

use crate::collation::Collation;
use crate::data_type::{DataTypeRef, DataTypeRegistry};

bitflags! {
    /// RPC parameter status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamStatus: u8 {
        /// Parameter is passed by reference (OUTPUT parameter).
        const BY_REF = 0x01;
        /// Parameter uses its default value.
        const DEFAULT = 0x02;
        /// Parameter is encrypted.
        const ENCRYPTED = 0x08;
    }
}

/// A validated RPC parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) value: SqlValue,
    pub(crate) data_type: DataTypeRef,
    pub(crate) length: Option<u32>,
    pub(crate) precision: Option<u8>,
    pub(crate) scale: Option<u8>,
    pub(crate) collation: Option<Collation>,
    pub(crate) force_encrypt: bool,
    pub(crate) output: bool,
}

impl Parameter {
    /// Start building a parameter of the given data type.
    pub fn builder(name: impl Into<String>, data_type: DataTypeRef) -> ParameterBuilder {
        ParameterBuilder::new(name, data_type)
    }

    /// Build a parameter, resolving the data type by registered name.
    pub fn typed(
        name: impl Into<String>,
        type_name: &str,
        value: impl Into<SqlValue>,
    ) -> Result<Self, TypeError> {
        let data_type = DataTypeRegistry::standard()
            .by_name(type_name)
            .ok_or_else(|| TypeError::UnsupportedConversion {
                from: type_name.to_string(),
                to: "registered data type",
            })?;
        ParameterBuilder::new(name, data_type).value(value).build()
    }

    /// Parameter name as given (with or without a leading `@`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical value.
    #[must_use]
    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    /// Data type the parameter is sent as.
    #[must_use]
    pub fn data_type(&self) -> DataTypeRef {
        self.data_type
    }

    /// Resolved length (characters for Unicode types, bytes otherwise).
    #[must_use]
    pub fn length(&self) -> Option<u32> {
        self.length
    }

    /// Resolved precision.
    #[must_use]
    pub fn precision(&self) -> Option<u8> {
        self.precision
    }

    /// Resolved scale.
    #[must_use]
    pub fn scale(&self) -> Option<u8> {
        self.scale
    }

    /// Collation used for single-byte character data.
    #[must_use]
    pub fn collation(&self) -> Option<&Collation> {
        self.collation.as_ref()
    }

    /// Whether the value must be sent encrypted.
    #[must_use]
    pub fn force_encrypt(&self) -> bool {
        self.force_encrypt
    }

    /// Whether this is an OUTPUT parameter.
    #[must_use]
    pub fn is_output(&self) -> bool {
        self.output
    }

    /// Status byte written in front of the TYPE_INFO.
    #[must_use]
    pub fn status(&self) -> ParamStatus {
        let mut status = ParamStatus::empty();
        status.set(ParamStatus::BY_REF, self.output);
        status.set(ParamStatus::ENCRYPTED, self.force_encrypt);
        status
    }

    /// Name with exactly one leading `@`. Positional (nameless) parameters
    /// stay nameless.
    #[must_use]
    pub fn sql_name(&self) -> String {
        if self.name.is_empty() || self.name.starts_with('@') {
            self.name.clone()
        } else {
            format!("@{}", self.name)
        }
    }

    /// A nameless parameter describing one cell of a table-valued parameter.
    pub(crate) fn cell(
        data_type: DataTypeRef,
        value: SqlValue,
        length: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
        collation: Option<Collation>,
    ) -> Result<Self, TypeError> {
        let mut param = Self {
            name: String::new(),
            value,
            data_type,
            length,
            precision,
            scale,
            collation,
            force_encrypt: false,
            output: false,
        };
        data_type.resolve(&mut param)?;
        Ok(param)
    }
}

/// Builder for [`Parameter`].
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    name: String,
    value: SqlValue,
    data_type: DataTypeRef,
    length: Option<u32>,
    precision: Option<u8>,
    scale: Option<u8>,
    collation: Option<Collation>,
    force_encrypt: bool,
    output: bool,
}

impl ParameterBuilder {
    /// Create a builder for a NULL parameter of the given type.
    pub fn new(name: impl Into<String>, data_type: DataTypeRef) -> Self {
        Self {
            name: name.into(),
            value: SqlValue::Null,
            data_type,
            length: None,
            precision: None,
            scale: None,
            collation: None,
            force_encrypt: false,
            output: false,
        }
    }

    /// Set the value.
    #[must_use]
    pub fn value(mut self, value: impl Into<SqlValue>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the declared length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the declared precision.
    #[must_use]
    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the declared scale.
    #[must_use]
    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set the collation for single-byte character data.
    #[must_use]
    pub fn collation(mut self, collation: Collation) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Mark the parameter as OUTPUT.
    #[must_use]
    pub fn output(mut self) -> Self {
        self.output = true;
        self
    }

    /// Require the value to be sent encrypted.
    #[must_use]
    pub fn force_encrypt(mut self) -> Self {
        self.force_encrypt = true;
        self
    }

    /// Validate the value and resolve defaults.
    pub fn build(self) -> Result<Parameter, TypeError> {
        let value = self
            .data_type
            .validate(self.value, self.collation.as_ref())?;

        let mut param = Parameter {
            name: self.name,
            value,
            data_type: self.data_type,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            collation: self.collation,
            force_encrypt: self.force_encrypt,
            output: self.output,
        };
        self.data_type.resolve(&mut param)?;

        Ok(param)
    }
}
