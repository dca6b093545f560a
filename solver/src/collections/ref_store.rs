use itertools::Itertools;
use std::fmt::{Debug, Error, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

pub trait Ref: Into<usize> + From<usize> + Copy + PartialEq {}

impl<X> Ref for X where X: Into<usize> + From<usize> + Copy + PartialEq {}

/// Declares a dense identifier type, usable as a key of a [`RefVec`].
#[macro_export]
macro_rules! create_ref_type {
    ($type_name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        pub struct $type_name(u32);

        impl $type_name {
            pub const fn to_u32(self) -> u32 {
                self.0
            }
            pub const fn from_u32(u: u32) -> Self {
                $type_name(u)
            }
        }
        impl From<usize> for $type_name {
            fn from(u: usize) -> Self {
                Self::from_u32(u as u32)
            }
        }
        impl From<$type_name> for usize {
            fn from(v: $type_name) -> Self {
                v.0 as usize
            }
        }
        impl From<u32> for $type_name {
            fn from(u: u32) -> Self {
                Self::from_u32(u)
            }
        }
        impl From<$type_name> for u32 {
            fn from(v: $type_name) -> Self {
                v.0
            }
        }
    };
}

/// A vector indexed by a dense reference type.
#[derive(Clone, PartialEq, Eq)]
pub struct RefVec<K, V> {
    values: Vec<V>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefVec<K, V> {
    fn default() -> Self {
        RefVec::new()
    }
}

impl<K, V: Debug> Debug for RefVec<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "[{:?}]", self.values.iter().format(", "))
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

    pub fn contains(&self, k: K) -> bool
    where
        K: Into<usize>,
    {
        k.into() < self.len()
    }

    pub fn push(&mut self, value: V) -> K
    where
        K: From<usize>,
    {
        self.values.push(value);
        K::from(self.values.len() - 1)
    }

    pub fn get(&self, k: K) -> Option<&V>
    where
        K: Into<usize>,
    {
        self.values.get(k.into())
    }

    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: From<usize>,
    {
        (0..self.values.len()).map(K::from)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.values.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)>
    where
        K: From<usize>,
    {
        self.values.iter().enumerate().map(|(i, v)| (K::from(i), v))
    }
}

impl<K, V> FromIterator<V> for RefVec<K, V> {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        RefVec {
            values: iter.into_iter().collect(),
            phantom: PhantomData,
        }
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
