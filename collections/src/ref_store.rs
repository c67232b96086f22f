use std::fmt::{Debug, Error, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

pub trait Ref: Into<usize> + From<usize> + Copy + PartialEq {}

impl<X> Ref for X where X: Into<usize> + From<usize> + Copy + PartialEq {}

/// Declares a newtype wrapping a dense, zero-based integer id backed by a `NonZeroU32`
/// (so that `Option<Id>` is the same size as `Id`).
#[macro_export]
macro_rules! create_ref_type {
    ($type_name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
        pub struct $type_name(std::num::NonZeroU32);

        impl $type_name {
            pub const fn to_u32(self) -> u32 {
                self.0.get() - 1
            }
            pub const fn from_u32(u: u32) -> Self {
                unsafe { $type_name(std::num::NonZeroU32::new_unchecked(u + 1)) }
            }
        }
        impl From<usize> for $type_name {
            fn from(u: usize) -> Self {
                Self::from_u32(u as u32)
            }
        }
        impl From<$type_name> for usize {
            fn from(v: $type_name) -> Self {
                (v.0.get() - 1) as usize
            }
        }

        impl<V> std::ops::Index<$type_name> for Vec<V> {
            type Output = V;

            fn index(&self, index: $type_name) -> &Self::Output {
                &self[usize::from(index)]
            }
        }

        impl<V> std::ops::IndexMut<$type_name> for Vec<V> {
            fn index_mut(&mut self, index: $type_name) -> &mut Self::Output {
                &mut self[usize::from(index)]
            }
        }
    };
}

/// Dense append-only store indexed by a reference type `K`. Unlike a `Vec<V>`, keys can be
/// reconstructed from their integer rank, so adjacency lists and other side-tables can be
/// addressed by `K` without carrying a pointer back into the store.
#[derive(Clone)]
pub struct RefStore<K, V> {
    internal: Vec<V>,
    phantom: PhantomData<K>,
}
impl<K, V: Debug> Debug for RefStore<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_list().entries(self.internal.iter()).finish()
    }
}

impl<K: Ref, V> Default for RefStore<K, V> {
    fn default() -> Self {
        RefStore::new()
    }
}

impl<K, V> RefStore<K, V>
where
    K: Ref,
{
    pub fn new() -> Self {
        RefStore {
            internal: Vec::new(),
            phantom: PhantomData,
        }
    }

    pub fn initialized(len: usize, v: V) -> Self
    where
        V: Clone,
    {
        RefStore {
            internal: vec![v; len],
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> {
        (0..self.len()).map(K::from)
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)> {
        self.keys().map(move |k| (k, &self[k]))
    }

    pub fn last_key(&self) -> Option<K> {
        if self.is_empty() {
            None
        } else {
            Some((self.len() - 1).into())
        }
    }

    pub fn push(&mut self, v: V) -> K {
        let id: K = self.internal.len().into();
        self.internal.push(v);
        id
    }

    pub fn get(&self, k: K) -> &V {
        &self.internal[k.into()]
    }

    pub fn get_mut(&mut self, k: K) -> &mut V {
        &mut self.internal[k.into()]
    }
}

impl<K: Ref, V> Index<K> for RefStore<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index)
    }
}

impl<K: Ref, V> IndexMut<K> for RefStore<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        self.get_mut(index)
    }
}

/// Like `RefStore` but allows out-of-order insertion: entries are filled lazily with a default,
/// one `RefVec` per side-table instead of a single struct-of-vecs.
#[derive(Clone)]
pub struct RefVec<K, V> {
    values: Vec<V>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefVec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RefVec<K, V> {
    pub fn new() -> Self {
        RefVec {
            values: Vec::new(),
            phantom: PhantomData,
        }
    }

    pub fn with_values(num_items: usize, value: V) -> Self
    where
        V: Clone,
    {
        RefVec {
            values: vec![value; num_items],
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: V) -> K
    where
        K: From<usize>,
    {
        self.values.push(value);
        K::from(self.values.len() - 1)
    }

    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: From<usize>,
    {
        (0..self.values.len()).map(K::from)
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)>
    where
        K: From<usize>,
    {
        (0..self.values.len()).map(move |i| (K::from(i), &self.values[i]))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.values.iter()
    }
}

impl<K: Into<usize>, V> Index<K> for RefVec<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        &self.values[index.into()]
    }
}

impl<K: Into<usize>, V> IndexMut<K> for RefVec<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.values[index.into()]
    }
}

/// Sparse map keyed by a reference type, backed by a `Vec<Option<V>>` that grows on insert.
#[derive(Clone)]
pub struct RefMap<K, V> {
    entries: Vec<Option<V>>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefMap<K, V> {
    fn default() -> Self {
        RefMap {
            entries: Vec::new(),
            phantom: PhantomData,
        }
    }
}

impl<K: Ref, V> RefMap<K, V> {
    pub fn insert(&mut self, k: K, v: V) {
        let index = k.into();
        while self.entries.len() <= index {
            self.entries.push(None);
        }
        self.entries[index] = Some(v);
    }

    pub fn remove(&mut self, k: K) {
        let index = k.into();
        if index < self.entries.len() {
            self.entries[index] = None;
        }
    }

    pub fn contains(&self, k: K) -> bool {
        let index = k.into();
        index < self.entries.len() && self.entries[index].is_some()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        let index = k.into();
        self.entries.get(index).and_then(|v| v.as_ref())
    }

    pub fn get_mut(&mut self, k: K) -> Option<&mut V> {
        let index = k.into();
        self.entries.get_mut(index).and_then(|v| v.as_mut())
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.entries.len()).map(K::from).filter(move |k| self.contains(*k))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.iter_mut().filter_map(|x| x.as_mut())
    }
}

impl<K: Ref, V> Index<K> for RefMap<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index).expect("no such key")
    }
}

impl<K: Ref, V> IndexMut<K> for RefMap<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        self.get_mut(index).expect("no such key")
    }
}
