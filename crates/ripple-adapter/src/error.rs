//! Adapter error kinds.
//!
//! Only structural misuse is an error; absent data is `None`/`-1` at the
//! call sites that can express it.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdapterError {
    #[error("wildcard segment in a data path: {0}")]
    WildcardInPath(String),
    #[error("param step [{key}=…] applied to a non-array value")]
    ParamOnNonArray { key: String },
    #[error("missing container at '{0}' with auto-create disabled")]
    MissingContainer(String),
    #[error("no element with [{key}={value}] and auto-create disabled")]
    ParamNotFound { key: String, value: String },
    #[error("param leaf target is not a mapping")]
    ParamTargetNotMapping,
    #[error("param leaf value is not a mapping")]
    ParamValueNotMapping,
    #[error("unresolved placeholder ${0} in a data path")]
    UnresolvedPlaceholder(String),
    #[error("path error: {0}")]
    Path(#[from] ripple_path::ParseError),
}
