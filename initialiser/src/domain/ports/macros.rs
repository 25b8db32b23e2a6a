//! `define_port_error!`: error enums for driven ports.
//!
//! Every variant carries named fields. The macro derives `thiserror::Error`
//! and adds one snake-case constructor per variant whose parameters accept
//! `impl Into<FieldType>`, so call sites can write
//! `GraphqlSessionError::timeout("30s elapsed")`.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),+ $(,)? } => $message:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant {
                    $(
                        #[doc = concat!("Value of `", stringify!($field), "`.")]
                        $field: $ty
                    ),+
                },
            )+
        }

        ::paste::paste! {
            impl $name {
                $(
                    #[doc = concat!("Build [`", stringify!($name), "::", stringify!($variant), "`].")]
                    pub fn [<$variant:snake>]($($field: impl Into<$ty>),+) -> Self {
                        Self::$variant { $($field: $field.into()),+ }
                    }
                )+
            }
        }
    };
}

pub(crate) use define_port_error;
