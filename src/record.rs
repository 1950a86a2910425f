/// A record-shaped state that can absorb a partial update.
///
/// `merge` is shallow: every field present in the partial replaces the whole
/// field in `self`, nested values included, and absent fields are left alone.
/// Nested structures are never merged field by field.
///
/// Usually implemented through the [`record!`](crate::record) macro.
/// ```
/// use rxstore::Record;
///
/// #[derive(Clone, PartialEq)]
/// struct Pair {
///     a: i32,
///     b: i32,
/// }
///
/// #[derive(Default)]
/// struct PairPartial {
///     a: Option<i32>,
///     b: Option<i32>,
/// }
///
/// impl Record for Pair {
///     type Partial = PairPartial;
///
///     fn merge(&mut self, partial: PairPartial) {
///         if let Some(a) = partial.a {
///             self.a = a;
///         }
///         if let Some(b) = partial.b {
///             self.b = b;
///         }
///     }
/// }
///
/// let mut pair = Pair { a: 1, b: 2 };
/// pair.merge(PairPartial { a: Some(5), ..Default::default() });
///
/// assert_eq!((5, 2), (pair.a, pair.b));
/// ```
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    type Partial;

    fn merge(&mut self, partial: Self::Partial);
}

/// A typed handle to one field of `T`, used by [`Store::select`](crate::Store::select).
pub trait Key<T> {
    type Value;

    /// Field name, for diagnostics.
    const NAME: &'static str;

    fn get(state: &T) -> &Self::Value;
}
