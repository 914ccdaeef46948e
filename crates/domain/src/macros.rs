//! Macro for implementing Display and FromStr for keyword enums
//!
//! Node actions, path types and load modes arrive as loosely cased strings in
//! flow messages. This macro gives each keyword enum one canonical spelling
//! for output and case-insensitive parsing for input.
//!
//! # Example
//!
//! ```rust
//! use lakeflow_domain::impl_keyword_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Verb {
//!     Get,
//!     Put,
//! }
//!
//! impl_keyword_conversions!(Verb {
//!     Get => "get",
//!     Put => "put",
//! });
//!
//! assert_eq!("PUT".parse::<Verb>().unwrap(), Verb::Put);
//! ```

/// Implements Display and FromStr for keyword enums
///
/// This macro generates:
/// - Display trait: writes the canonical lowercase keyword
/// - FromStr trait: parses case-insensitive, whitespace-trimmed keywords
///
/// Unknown keywords are rejected with `Invalid {EnumName}: {input}`.
#[macro_export]
macro_rules! impl_keyword_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
