//! Error types for parameters, messages and the message factory.

use thiserror::Error;

use crate::id::MessageTypeId;
use crate::param::ParamType;

/// A GUID string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// Not 32 hex digits once hyphens are removed.
    #[error("GUID {input:?} must contain exactly 32 hex digits")]
    BadLength {
        /// The rejected input.
        input: String,
    },
    /// A non-hex character was found.
    #[error("GUID {input:?} contains a non-hex digit")]
    BadDigit {
        /// The rejected input.
        input: String,
    },
}

/// Errors raised while reading or writing message parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// The written value does not match the parameter's declared type.
    #[error("parameter {name:?} is declared {expected} but was assigned {found}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParamType,
        /// Type of the rejected value.
        found: ParamType,
    },
    /// No parameter with this name exists in the message or group.
    #[error("no parameter named {name:?}")]
    UnknownParameter {
        /// Requested name.
        name: String,
    },
    /// A parameter with this name already exists.
    #[error("parameter {name:?} is already declared")]
    DuplicateParameter {
        /// Clashing name.
        name: String,
    },
    /// A group operation was attempted on a scalar parameter.
    #[error("parameter {name:?} is not a group")]
    NotAGroup {
        /// Parameter name.
        name: String,
    },
    /// A string could not be converted to the parameter's type.
    #[error("cannot parse {input:?} as a {expected} value for parameter {name:?}")]
    InvalidValue {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParamType,
        /// The rejected input.
        input: String,
    },
}

/// Errors raised by the [`MessageFactory`](crate::factory::MessageFactory).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactoryError {
    /// No message type with this id is registered.
    #[error("message type {id} is not registered")]
    UnknownMessageType {
        /// Requested id.
        id: MessageTypeId,
    },
    /// No message type with this name is registered.
    #[error("message type {name:?} is not registered")]
    UnknownMessageName {
        /// Requested name.
        name: String,
    },
    /// The id or name is already bound to a different registration.
    #[error("message type {id} ({name:?}) is already registered with a different definition")]
    DuplicateRegistration {
        /// Clashing id.
        id: MessageTypeId,
        /// Name of the rejected registration.
        name: String,
    },
    /// The prototype builder produced an invalid parameter set.
    #[error("invalid prototype: {0}")]
    Prototype(#[from] ParamError),
}
