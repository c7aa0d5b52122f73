//! Safe construction of KQL text from user-supplied names.

mod identifiers;

pub use identifiers::{
    escape_identifier, quote_string_literal, validate_identifier, MAX_IDENTIFIER_LENGTH,
};
