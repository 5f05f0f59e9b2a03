// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

/// Declares a flags newtype over the raw bits of an Ash flags type.
///
/// The generated type has the set operations as `const fn`s, so that flag sets can be combined
/// in constants, plus the matching `|`, `&` and `-` operators.
macro_rules! vulkan_bitflags {
    {
        $(#[doc = $ty_doc:literal])*
        $(#[cfg_attr($($cfg:tt)*)])*
        $ty:ident
        $( impl { $($impls:item)* } )?
        = $ty_ffi:ident($repr:ty);

        $(
            $(#[doc = $flag_doc:literal])*
            $flag_name:ident = $flag_name_ffi:ident,
        )+
    } => {
        $(#[doc = $ty_doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        $(#[cfg_attr($($cfg)*)])*
        pub struct $ty($repr);

        impl $ty {
            $(
                $(#[doc = $flag_doc])*
                pub const $flag_name: Self = Self(ash::vk::$ty_ffi::$flag_name_ffi.as_raw());
            )*

            const KNOWN: &'static [(Self, &'static str)] = &[
                $((Self::$flag_name, stringify!($flag_name)),)*
            ];

            #[doc = concat!("Returns a `", stringify!($ty), "` with none of the flags set.")]
            #[inline]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Returns whether no flags are set in `self`.
            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Returns whether any flags are set in both `self` and `other`.
            #[inline]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Returns whether all flags in `other` are set in `self`.
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Returns the flags set in `self`, `other` or both.
            #[inline]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Returns the flags set in both `self` and `other`.
            #[inline]
            pub const fn intersection(self, other: Self) -> Self {
                Self(self.0 & other.0)
            }

            /// Returns `self` without the flags set in `other`.
            #[inline]
            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            $( $($impls)* )?
        }

        impl Default for $ty {
            #[inline]
            fn default() -> Self {
                Self::empty()
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                let mut names = Self::KNOWN
                    .iter()
                    .filter(|&&(flag, _)| self.intersects(flag))
                    .map(|&(_, name)| name);

                let Some(first) = names.next() else {
                    return f.write_str("empty()");
                };

                f.write_str(first)?;

                for name in names {
                    write!(f, " | {}", name)?;
                }

                Ok(())
            }
        }

        impl From<$ty> for ash::vk::$ty_ffi {
            #[inline]
            fn from(val: $ty) -> Self {
                ash::vk::$ty_ffi::from_raw(val.0)
            }
        }

        impl From<ash::vk::$ty_ffi> for $ty {
            /// Bits that have no named flag are dropped.
            #[inline]
            fn from(val: ash::vk::$ty_ffi) -> Self {
                let known = $ty::KNOWN
                    .iter()
                    .fold(0, |bits, &(flag, _)| bits | flag.0);

                Self(val.as_raw() & known)
            }
        }

        crate::macros::impl_flag_ops!($ty);
    };
}

/// Implements `|`, `&` and `-` and their assigning forms through the `const fn`s of a flags type.
macro_rules! impl_flag_ops {
    ($ty:ident) => {
        crate::macros::impl_flag_ops!(@binary $ty: BitOr bitor union);
        crate::macros::impl_flag_ops!(@binary $ty: BitAnd bitand intersection);
        crate::macros::impl_flag_ops!(@binary $ty: Sub sub difference);
        crate::macros::impl_flag_ops!(@assign $ty: BitOrAssign bitor_assign union);
        crate::macros::impl_flag_ops!(@assign $ty: BitAndAssign bitand_assign intersection);
        crate::macros::impl_flag_ops!(@assign $ty: SubAssign sub_assign difference);
    };
    (@binary $ty:ident: $op:ident $method:ident $func:ident) => {
        impl std::ops::$op for $ty {
            type Output = Self;

            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.$func(rhs)
            }
        }
    };
    (@assign $ty:ident: $op:ident $method:ident $func:ident) => {
        impl std::ops::$op for $ty {
            #[inline]
            fn $method(&mut self, rhs: Self) {
                *self = self.$func(rhs);
            }
        }
    };
}

/// Declares a fieldless enum whose discriminants are the raw values of an Ash enum or flags
/// type.
macro_rules! vulkan_enum {
    {
        $(#[doc = $ty_doc:literal])*
        $ty:ident
        $( impl { $($impls:item)* } )?
        = $ty_ffi:ident($repr:ty);

        $(
            $(#[doc = $flag_doc:literal])*
            $flag_name:ident = $flag_name_ffi:ident,
        )+
    } => {
        $(#[doc = $ty_doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr($repr)]
        pub enum $ty {
            $(
                $(#[doc = $flag_doc])*
                $flag_name = ash::vk::$ty_ffi::$flag_name_ffi.as_raw(),
            )+
        }

        $(
            impl $ty {
                $($impls)*
            }
        )?

        impl From<$ty> for ash::vk::$ty_ffi {
            #[inline]
            fn from(val: $ty) -> Self {
                ash::vk::$ty_ffi::from_raw(val as $repr)
            }
        }
    };
}

/// Gives a driver object a process-unique ID, and makes equality and hashing go through it.
///
/// The type needs an `id: NonZero<u64>` field, initialized with `Self::next_id()`.
macro_rules! impl_id_counter {
    ($type:ident) => {
        impl $type {
            fn next_id() -> std::num::NonZero<u64> {
                static NEXT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

                match std::num::NonZero::new(NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
                {
                    Some(id) => id,
                    None => std::process::abort(),
                }
            }

            #[allow(dead_code)]
            pub(crate) fn id(&self) -> std::num::NonZero<u64> {
                self.id
            }
        }

        impl PartialEq for $type {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for $type {}

        impl std::hash::Hash for $type {
            #[inline]
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                state.write_u64(self.id.get());
            }
        }
    };
}

pub(crate) use {impl_flag_ops, impl_id_counter, vulkan_bitflags, vulkan_enum};
