//! Shorthands for building and returning [`crate::error::DiffError`] values.

/// Creates a [`crate::error::DiffError`] from an error kind and description.
///
/// Accepts an optional dynamic detail (`detail = value` moves an owned [`String`], a bare
/// expression is rendered with `to_string`) and an optional `source:` error.
#[macro_export]
macro_rules! diff_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::DiffError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::DiffError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::DiffError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::DiffError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::DiffError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::DiffError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with a [`crate::error::DiffError`] built by [`diff_error!`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::diff_error!($($arg)+))
    };
}
