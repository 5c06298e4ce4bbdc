//! Macro for implementing Display and FromStr for domain enums
//!
//! Generates a single name table per enum and derives `as_str`, `Display` and
//! a case-insensitive `FromStr` from it. Unknown names fail with
//! [`SpoolError::InvalidArgument`](crate::SpoolError::InvalidArgument) rather
//! than falling back to a default variant.
//!
//! # Example
//!
//! ```rust
//! use spool_domain::impl_domain_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Warm,
//!     Cold,
//! }
//!
//! impl_domain_conversions!(Phase {
//!     Warm => "warm",
//!     Cold => "cold",
//! });
//!
//! assert_eq!("WARM".parse::<Phase>().unwrap(), Phase::Warm);
//! assert!("tepid".parse::<Phase>().is_err());
//! ```

/// Implements `as_str`, Display and FromStr for a fieldless enum
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their canonical names
#[macro_export]
macro_rules! impl_domain_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical name of this value
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::SpoolError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let name = s.trim();
                $(
                    if name.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::SpoolError::InvalidArgument(format!(
                    "unknown {} '{}'",
                    stringify!($enum_name),
                    s
                )))
            }
        }
    };
}
