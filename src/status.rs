//! TiXI status codes
//!
//! Every native TiXI entry point returns a `ReturnCode` integer. This module is the
//! registry that turns those integers into named outcomes. Codes 0 through 31 are the
//! ones the native headers define; anything else maps to [`StatusCode::Unknown`] so a
//! lookup never comes back empty.

use std::fmt;

use libc::c_int;

/// Named outcome of a native TiXI call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusCode {
    /// No error occurred
    #[default]
    Success,
    /// Unspecified error
    Failed,
    InvalidXmlName,
    NotWellFormed,
    NotSchemaCompliant,
    NotDtdCompliant,
    InvalidHandle,
    InvalidXPath,
    ElementNotFound,
    IndexOutOfRange,
    NoPointFound,
    NotAnElement,
    AttributeNotFound,
    OpenFailed,
    OpenSchemaFailed,
    OpenDtdFailed,
    CloseFailed,
    AlreadySaved,
    ElementPathNotUnique,
    NoElementName,
    NoChildren,
    ChildNotFound,
    ErrorCreateRootNode,
    DeallocationFailed,
    NoNumber,
    NoAttributeName,
    StringTruncated,
    NonMatchingName,
    NonMatchingSize,
    MatrixDimensionError,
    CoordinateNotFound,
    UnknownStorageMode,
    /// A code the native headers do not define; the raw value is kept
    Unknown(i32),
}

impl StatusCode {
    /// All defined outcomes, indexed by their native code
    pub const ALL: [StatusCode; 32] = [
        StatusCode::Success,
        StatusCode::Failed,
        StatusCode::InvalidXmlName,
        StatusCode::NotWellFormed,
        StatusCode::NotSchemaCompliant,
        StatusCode::NotDtdCompliant,
        StatusCode::InvalidHandle,
        StatusCode::InvalidXPath,
        StatusCode::ElementNotFound,
        StatusCode::IndexOutOfRange,
        StatusCode::NoPointFound,
        StatusCode::NotAnElement,
        StatusCode::AttributeNotFound,
        StatusCode::OpenFailed,
        StatusCode::OpenSchemaFailed,
        StatusCode::OpenDtdFailed,
        StatusCode::CloseFailed,
        StatusCode::AlreadySaved,
        StatusCode::ElementPathNotUnique,
        StatusCode::NoElementName,
        StatusCode::NoChildren,
        StatusCode::ChildNotFound,
        StatusCode::ErrorCreateRootNode,
        StatusCode::DeallocationFailed,
        StatusCode::NoNumber,
        StatusCode::NoAttributeName,
        StatusCode::StringTruncated,
        StatusCode::NonMatchingName,
        StatusCode::NonMatchingSize,
        StatusCode::MatrixDimensionError,
        StatusCode::CoordinateNotFound,
        StatusCode::UnknownStorageMode,
    ];

    /// Look up the outcome for a native return code
    pub fn from_code(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(StatusCode::Unknown(code))
    }

    /// The native return code this outcome stands for
    pub fn code(&self) -> i32 {
        match self {
            StatusCode::Unknown(code) => *code,
            known => Self::ALL
                .iter()
                .position(|candidate| candidate == known)
                .map_or(-1, |index| index as i32),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, StatusCode::Unknown(_))
    }

    /// Label used for this code in the TiXI headers
    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::Failed => "FAILED",
            StatusCode::InvalidXmlName => "INVALID_XML_NAME",
            StatusCode::NotWellFormed => "NOT_WELL_FORMED",
            StatusCode::NotSchemaCompliant => "NOT_SCHEMA_COMPLIANT",
            StatusCode::NotDtdCompliant => "NOT_DTD_COMPLIANT",
            StatusCode::InvalidHandle => "INVALID_HANDLE",
            StatusCode::InvalidXPath => "INVALID_XPATH",
            StatusCode::ElementNotFound => "ELEMENT_NOT_FOUND",
            StatusCode::IndexOutOfRange => "INDEX_OUT_OF_RANGE",
            StatusCode::NoPointFound => "NO_POINT_FOUND",
            StatusCode::NotAnElement => "NOT_AN_ELEMENT",
            StatusCode::AttributeNotFound => "ATTRIBUTE_NOT_FOUND",
            StatusCode::OpenFailed => "OPEN_FAILED",
            StatusCode::OpenSchemaFailed => "OPEN_SCHEMA_FAILED",
            StatusCode::OpenDtdFailed => "OPEN_DTD_FAILED",
            StatusCode::CloseFailed => "CLOSE_FAILED",
            StatusCode::AlreadySaved => "ALREADY_SAVED",
            StatusCode::ElementPathNotUnique => "ELEMENT_PATH_NOT_UNIQUE",
            StatusCode::NoElementName => "NO_ELEMENT_NAME",
            StatusCode::NoChildren => "NO_CHILDREN",
            StatusCode::ChildNotFound => "CHILD_NOT_FOUND",
            StatusCode::ErrorCreateRootNode => "EROROR_CREATE_ROOT_NODE",
            StatusCode::DeallocationFailed => "DEALLOCATION_FAILED",
            StatusCode::NoNumber => "NO_NUMBER",
            StatusCode::NoAttributeName => "NO_ATTRIBUTE_NAME",
            StatusCode::StringTruncated => "STRING_TRUNCATED",
            StatusCode::NonMatchingName => "NON_MATCHING_NAME",
            StatusCode::NonMatchingSize => "NON_MATCHING_SIZE",
            StatusCode::MatrixDimensionError => "MATRIX_DIMENSION_ERROR",
            StatusCode::CoordinateNotFound => "COORDINATE_NOT_FOUND",
            StatusCode::UnknownStorageMode => "UNKNOWN_STORAGE_MODE",
            StatusCode::Unknown(_) => "UNKNOWN",
        }
    }

    /// One-line explanation of the outcome
    pub fn description(&self) -> &'static str {
        match self {
            StatusCode::Success => "no error occurred",
            StatusCode::Failed => "unspecified error",
            StatusCode::InvalidXmlName => "name is not XML standard compliant",
            StatusCode::NotWellFormed => "document is not well formed",
            StatusCode::NotSchemaCompliant => "document is not schema compliant",
            StatusCode::NotDtdCompliant => "document is not DTD compliant",
            StatusCode::InvalidHandle => "document handle is not valid",
            StatusCode::InvalidXPath => "XPath expression is not valid",
            StatusCode::ElementNotFound => "element does not exist in document",
            StatusCode::IndexOutOfRange => "index is outside the admissible range",
            StatusCode::NoPointFound => "no point element found at the given XPath",
            StatusCode::NotAnElement => "XPath does not point to an element node",
            StatusCode::AttributeNotFound => "element does not have the attribute",
            StatusCode::OpenFailed => "error on opening the file",
            StatusCode::OpenSchemaFailed => "error on opening the schema file",
            StatusCode::OpenDtdFailed => "error on opening the DTD file",
            StatusCode::CloseFailed => "error on closing the file",
            StatusCode::AlreadySaved => "document was already saved",
            StatusCode::ElementPathNotUnique => "path cannot be resolved unambiguously",
            StatusCode::NoElementName => "element name argument is missing",
            StatusCode::NoChildren => "node has no children",
            StatusCode::ChildNotFound => "named child is not a child of the element",
            StatusCode::ErrorCreateRootNode => "root node could not be added to the document",
            StatusCode::DeallocationFailed => "document memory could not be released",
            StatusCode::NoNumber => "no number specified",
            StatusCode::NoAttributeName => "no attribute name specified",
            StatusCode::StringTruncated => "string buffer too small for the result",
            StatusCode::NonMatchingName => "row or column names do not match the document",
            StatusCode::NonMatchingSize => "row or column counts do not match the document",
            StatusCode::MatrixDimensionError => "matrix needs at least one row and column",
            StatusCode::CoordinateNotFound => "point element is missing a coordinate",
            StatusCode::UnknownStorageMode => "storage mode is neither row nor column wise",
            StatusCode::Unknown(_) => "status code not defined by the native library",
        }
    }
}

impl From<c_int> for StatusCode {
    fn from(code: c_int) -> Self {
        StatusCode::from_code(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Unknown(code) => write!(f, "UNKNOWN({})", code),
            known => write!(f, "{} ({})", known.name(), known.code()),
        }
    }
}
