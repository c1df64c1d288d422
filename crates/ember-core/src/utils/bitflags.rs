// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A dependency-free flag-set macro used for GPU usage masks and renderer flags.

/// Declares a transparent flag set over an unsigned integer.
///
/// The generated type supports `|`, `&`, `|=`, `contains`, `intersects`,
/// `is_empty`, `bits` and `from_bits_truncate`, which is everything the
/// renderer contracts need.
#[macro_export]
macro_rules! ember_bitflags {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$inner:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            $(
                $(#[$inner])*
                pub const $flag: Self = Self { bits: $value };
            )*

            const ALL_BITS: $ty = 0 $(| $value)*;

            /// Returns a set with no flags.
            #[inline]
            pub const fn empty() -> Self {
                Self { bits: 0 }
            }

            /// Returns a set with every declared flag.
            #[inline]
            pub const fn all() -> Self {
                Self { bits: Self::ALL_BITS }
            }

            /// Returns the raw bit representation.
            #[inline]
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Builds a set from raw bits, dropping bits that match no flag.
            #[inline]
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits: bits & Self::ALL_BITS }
            }

            /// Returns `true` if no flag is set.
            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if every flag of `other` is set in `self`.
            #[inline]
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if `self` and `other` share at least one flag.
            #[inline]
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets or clears the flags of `other`.
            #[inline]
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.bits |= other.bits;
                } else {
                    self.bits &= !other.bits;
                }
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                Self { bits: self.bits | rhs.bits }
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }

        impl ::std::ops::BitAnd for $name {
            type Output = Self;

            #[inline]
            fn bitand(self, rhs: Self) -> Self {
                Self { bits: self.bits & rhs.bits }
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let mut first = true;
                write!(f, "{}(", stringify!($name))?;
                $(
                    if $value != 0 && self.contains(Self::$flag) {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag))?;
                        first = false;
                    }
                )*
                if first {
                    write!(f, "empty")?;
                }
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::ember_bitflags! {
        struct TestFlags: u8 {
            const A = 1 << 0;
            const B = 1 << 1;
            const C = 1 << 2;
        }
    }

    #[test]
    fn union_and_contains() {
        let flags = TestFlags::A | TestFlags::C;
        assert!(flags.contains(TestFlags::A));
        assert!(!flags.contains(TestFlags::B));
        assert!(flags.intersects(TestFlags::C | TestFlags::B));
        assert!(!flags.contains(TestFlags::A | TestFlags::B));
    }

    #[test]
    fn truncate_drops_unknown_bits() {
        let flags = TestFlags::from_bits_truncate(0b1111_0011);
        assert_eq!(flags, TestFlags::A | TestFlags::B);
        assert_eq!(TestFlags::all().bits(), 0b111);
    }

    #[test]
    fn set_and_clear() {
        let mut flags = TestFlags::empty();
        flags.set(TestFlags::B, true);
        assert_eq!(flags, TestFlags::B);
        flags.set(TestFlags::B, false);
        assert!(flags.is_empty());
        assert_eq!(format!("{flags:?}"), "TestFlags(empty)");
        assert_eq!(format!("{:?}", TestFlags::A | TestFlags::C), "TestFlags(A | C)");
    }
}
