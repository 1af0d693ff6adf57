pub mod crypt;
pub mod fs;
pub mod json;
pub mod units;

/// Error returned by the text converters when the input is malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(String);

impl ParseError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

#[macro_export]
macro_rules! parse_err {
    ($($arg:tt)*) => {
        $crate::ParseError::new(format!($($arg)*))
    };
}
