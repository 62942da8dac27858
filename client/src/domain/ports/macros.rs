//! Helper macro for port error enums that classify themselves.
//!
//! Each variant names the failure kind it belongs to, so callers branch on
//! the kind instead of matching every transport variant.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident by $kind:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )?
                    [$class:ident] => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                ::paste::paste! {
                    #[doc = "Build a `" $variant "` error."]
                    pub fn [<$variant:snake>]($( $($field: impl Into<$ty>),* )?) -> Self {
                        Self::$variant $( { $($field: $field.into()),* } )?
                    }
                }
            )*

            /// Failure kind this error belongs to.
            pub fn kind(&self) -> $kind {
                match self {
                    $( Self::$variant { .. } => $kind::$class, )*
                }
            }
        }
    };
}

pub(crate) use define_port_error;
