use std::{cmp::Ordering, marker::PhantomData};

/// Total order over stored keys. The name is persisted, a store can only be
/// reopened with the comparator it was created with.
pub trait Comparator: Send + Sync + 'static {
    fn name() -> &'static str;

    fn compare(a: &[u8], b: &[u8]) -> Ordering;
}

/// Unsigned lexicographic order; of two keys sharing a prefix the shorter
/// one sorts first.
pub struct Bytewise;

impl Comparator for Bytewise {
    fn name() -> &'static str {
        "cryptodb_comparator"
    }

    fn compare(a: &[u8], b: &[u8]) -> Ordering {
        let n = a.len().min(b.len());
        a[..n].cmp(&b[..n]).then(a.len().cmp(&b.len()))
    }
}

/// Key ordered by `C` rather than by `[u8]`'s own `Ord`.
pub struct OrdKey<C> {
    bytes: Vec<u8>,
    phantom_data: PhantomData<fn() -> C>,
}

impl<C> OrdKey<C> {
    pub fn new(bytes: Vec<u8>) -> Self {
        OrdKey {
            bytes,
            phantom_data: PhantomData,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<C> PartialEq for OrdKey<C>
where
    C: Comparator,
{
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C> Eq for OrdKey<C> where C: Comparator {}

impl<C> PartialOrd for OrdKey<C>
where
    C: Comparator,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for OrdKey<C>
where
    C: Comparator,
{
    fn cmp(&self, other: &Self) -> Ordering {
        C::compare(&self.bytes, &other.bytes)
    }
}
