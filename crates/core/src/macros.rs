// SPDX-License-Identifier: MIT

//! Declarative macros shared across the workspace.
//!
//! - [`display_names!`] — `Display` impl mapping enum variants to wire names
//! - [`builder!`] — test-only builder struct with defaults and `build()`
//! - [`setters!`] — chainable setter methods for production structs

/// Implement `Display` by mapping each variant to its wire name.
///
/// Unit variants match directly; data-carrying variants take `(..)`.
#[macro_export]
macro_rules! display_names {
    ($ty:ty { $( $variant:ident $(( $($skip:tt)* ))? => $name:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let name = match self {
                    $( Self::$variant $(( $($skip)* ))? => $name, )+
                };
                f.write_str(name)
            }
        }
    };
}

/// Define a builder for constructing test fixtures of `$target`.
///
/// Generated items are compiled only for tests or the `test-support`
/// feature. Field groups:
/// - `into` — builder field with an `impl Into` setter
/// - `set` — builder field with a by-value setter
/// - `option` — `Option` field, setter wraps the value in `Some`
/// - `computed` — no setter; the expression runs inside `build()`
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $target:ident {
            $(into { $( $i_field:ident : $i_ty:ty = $i_default:expr ),* $(,)? })?
            $(set { $( $s_field:ident : $s_ty:ty = $s_default:expr ),* $(,)? })?
            $(option { $( $o_field:ident : $o_ty:ty = $o_default:expr ),* $(,)? })?
            $(computed { $( $c_field:ident : $c_ty:ty = $c_expr:expr ),* $(,)? })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $($( $i_field: $i_ty, )*)?
            $($( $s_field: $s_ty, )*)?
            $($( $o_field: Option<$o_ty>, )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $($( $i_field: $i_default.into(), )*)?
                    $($( $s_field: $s_default, )*)?
                    $($( $o_field: $o_default, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            pub fn build(self) -> $target {
                $target {
                    $($( $i_field: self.$i_field, )*)?
                    $($( $s_field: self.$s_field, )*)?
                    $($( $o_field: self.$o_field, )*)?
                    $($( $c_field: $c_expr, )*)?
                }
            }

            $crate::setters! {
                $(into { $( $i_field: $i_ty ),* })?
                $(set { $( $s_field: $s_ty ),* })?
                $(option { $( $o_field: $o_ty ),* })?
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Builder pre-filled with test defaults.
            pub fn builder() -> $builder {
                $builder::default()
            }
        }
    };
}

/// Emit chainable setters inside an `impl` block.
///
/// Same field groups as [`builder!`], minus defaults: `into` setters take
/// `impl Into`, `set` setters take the value, `option` setters wrap in
/// `Some`.
#[macro_export]
macro_rules! setters {
    (
        $(into { $( $i_field:ident : $i_ty:ty ),* $(,)? })?
        $(set { $( $s_field:ident : $s_ty:ty ),* $(,)? })?
        $(option { $( $o_field:ident : $o_ty:ty ),* $(,)? })?
    ) => {
        $($(
            pub fn $i_field(mut self, value: impl Into<$i_ty>) -> Self {
                self.$i_field = value.into();
                self
            }
        )*)?
        $($(
            pub fn $s_field(mut self, value: $s_ty) -> Self {
                self.$s_field = value;
                self
            }
        )*)?
        $($(
            pub fn $o_field(mut self, value: impl Into<$o_ty>) -> Self {
                self.$o_field = Some(value.into());
                self
            }
        )*)?
    };
}
