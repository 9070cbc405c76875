//! A tiny in-place optional value, used as the return type of the
//! bounded ring's `pop` and the job pool's `take_done` family.
//!
//! `Option<T>` already satisfies the "no dynamic allocation, holds `T`
//! in-place with a validity bit" description verbatim, so
//! [`SmallOption`] is a thin newtype over it rather than a hand-rolled
//! `MaybeUninit` + bool — that would just reinvent what the language
//! gives for free, with no behavioral difference and extra unsafe code.
/// The point of the newtype is to give the pop/take family of methods
/// a name distinct from `Option` in the public API, matching the
/// engine's own vocabulary (empty vs missing, not absent-because-error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmallOption<T>(Option<T>);

impl<T> SmallOption<T> {
    #[inline]
    pub const fn none() -> Self {
        SmallOption(None)
    }

    #[inline]
    pub const fn some(value: T) -> Self {
        SmallOption(Some(value))
    }

    #[inline]
    pub const fn is_some(&self) -> bool {
        self.0.is_some()
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0.is_none()
    }

    #[inline]
    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }

    #[inline]
    pub fn into_option(self) -> Option<T> {
        self.0
    }

    #[inline]
    pub fn as_ref(&self) -> Option<&T> {
        self.0.as_ref()
    }
}

impl<T> From<Option<T>> for SmallOption<T> {
    #[inline]
    fn from(value: Option<T>) -> Self {
        SmallOption(value)
    }
}

impl<T> From<SmallOption<T>> for Option<T> {
    #[inline]
    fn from(value: SmallOption<T>) -> Self {
        value.0
    }
}

impl<T> Default for SmallOption<T> {
    fn default() -> Self {
        SmallOption::none()
    }
}
