//! Bit-mask newtypes for access, stage, usage and memory property masks.

/// Declare a `u32` bit-mask newtype with named constants and set operators.
macro_rules! bitmask {
  (
    $(#[$meta:meta])*
    pub struct $name:ident {
      $( $(#[$fmeta:meta])* const $flag:ident = $value:expr; )*
    }
  ) => {
    $(#[$meta])*
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct $name(u32);

    impl $name {
      pub const NONE: Self = Self(0);
      $( $(#[$fmeta])* pub const $flag: Self = Self($value); )*

      #[inline]
      pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
      }

      #[inline]
      pub const fn bits(self) -> u32 {
        self.0
      }

      #[inline]
      pub const fn is_empty(self) -> bool {
        self.0 == 0
      }

      /// True when every bit of `other` is set in `self`.
      #[inline]
      pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
      }

      #[inline]
      pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
      }

      #[inline]
      pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
      }
    }

    impl std::ops::BitOr for $name {
      type Output = Self;
      #[inline]
      fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
      }
    }

    impl std::ops::BitOrAssign for $name {
      #[inline]
      fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
      }
    }

    impl std::ops::BitAnd for $name {
      type Output = Self;
      #[inline]
      fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
      }
    }

    impl std::fmt::Debug for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
          return write!(f, "{}(NONE)", stringify!($name));
        }
        let mut names = Vec::new();
        $( if $value != 0 && self.0 & $value == $value { names.push(stringify!($flag)); } )*
        write!(f, "{}({})", stringify!($name), names.join(" | "))
      }
    }
  };
}

pub(crate) use bitmask;
