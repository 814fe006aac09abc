//! Bit-flag newtypes used by data-block headers and the engines.

/// Declare a transparent bit-flag newtype with set operations.
macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($repr:ty) {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        $vis struct $name($repr);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self($value);
            )*

            /// No flag set.
            #[must_use]
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Build from raw bits.
            #[must_use]
            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            /// Raw bits.
            #[must_use]
            pub const fn bits(self) -> $repr {
                self.0
            }

            /// Whether no flag is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Whether every flag of `other` is set.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether any flag of `other` is set.
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Set the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            /// Clear the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            /// Set or clear the flags of `other`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// Flags set in `self` or `other`.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Flags set in `self` but not in `other`.
            #[must_use]
            pub const fn difference(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.insert(rhs);
            }
        }

        impl std::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

pub(crate) use flag_set;

flag_set! {
    /// Persistent data-block flags.
    pub struct IdFlags(u16) {
        /// Keeps the data-block alive with a virtual user.
        const FAKE_USER = 1 << 0;
        /// The data-block is owned by another one and never listed.
        const EMBEDDED_DATA = 1 << 1;
        /// Indirectly linked, but kept weakly referenced by local data.
        const INDIRECT_WEAK_LINK = 1 << 2;
        /// Linked data whose library file is packed.
        const LINKED_AND_PACKED = 1 << 3;
    }
}

flag_set! {
    /// Runtime data-block tags. Never persisted.
    pub struct IdTags(u32) {
        /// Linked and used directly by local data.
        const EXTERN = 1 << 0;
        /// Linked and only used by other linked data.
        const INDIRECT = 1 << 1;
        /// Linked, but its library file could not provide it.
        const MISSING = 1 << 2;
        /// Requests one extra user, materialized lazily.
        const EXTRA_USER = 1 << 3;
        /// The extra user has been added to the user count.
        const EXTRA_USER_SET = 1 << 4;
        /// Lives outside of any database.
        const NO_MAIN = 1 << 5;
        /// Does not take part in user counting.
        const NO_USER_REFCOUNT = 1 << 6;
        /// Lives in a temporary database.
        const TEMP_MAIN = 1 << 7;
        /// Freshly created or copied.
        const NEW = 1 << 8;
        /// Generic tag for callers' batch processing.
        const DOIT = 1 << 9;
        /// Localized copy for previews or rendering.
        const LOCALIZED = 1 << 10;
        /// Changed since the last save.
        const NEED_PERSIST = 1 << 11;
    }
}
