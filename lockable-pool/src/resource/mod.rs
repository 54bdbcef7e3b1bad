mod managed;
pub use managed::Managed;

/// The result of borrowing from a pool: either the live instance or the
/// poison pill inserted into the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Borrow<E, P> {
    Borrowed(E),
    Poisoned(P),
}

impl<E, P> Borrow<E, P> {
    pub fn is_poisoned(&self) -> bool {
        matches!(self, Self::Poisoned(_))
    }

    pub fn as_borrowed(&self) -> Option<&E> {
        match self {
            Self::Borrowed(item) => Some(item),
            Self::Poisoned(_) => None,
        }
    }

    pub fn as_poisoned(&self) -> Option<&P> {
        match self {
            Self::Borrowed(_) => None,
            Self::Poisoned(pill) => Some(pill),
        }
    }

    /// Convert into a `Result`, treating the pill as the error.
    pub fn into_result(self) -> Result<E, P> {
        match self {
            Self::Borrowed(item) => Ok(item),
            Self::Poisoned(pill) => Err(pill),
        }
    }

    pub fn map<F, R>(self, f: F) -> Borrow<R, P>
    where
        F: FnOnce(E) -> R,
    {
        match self {
            Self::Borrowed(item) => Borrow::Borrowed(f(item)),
            Self::Poisoned(pill) => Borrow::Poisoned(pill),
        }
    }
}
