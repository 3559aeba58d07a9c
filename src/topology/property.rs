use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Plain integer handle into a mesh arena.
pub trait Handle: Copy {
    fn index(self) -> usize;
    fn from_index(index: usize) -> Self;
}

/// Dense per-element tag array keyed by a typed handle.
///
/// Created for one algorithm stage and dropped at the stage boundary.
#[derive(Debug, Clone)]
pub struct PropertyMap<H, V> {
    values: Vec<V>,
    marker: PhantomData<H>,
}

impl<H: Handle, V: Clone> PropertyMap<H, V> {
    /// Map of `len` elements, all set to `default`.
    #[must_use]
    pub fn new(len: usize, default: V) -> Self {
        Self {
            values: vec![default; len],
            marker: PhantomData,
        }
    }
}

impl<H: Handle, V> PropertyMap<H, V> {
    #[must_use]
    pub fn from_vec(values: Vec<V>) -> Self {
        Self {
            values,
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, handle: H) -> Option<&V> {
        self.values.get(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (H, &V)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (H::from_index(i), v))
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<V> {
        self.values
    }
}

impl<H: Handle, V> Index<H> for PropertyMap<H, V> {
    type Output = V;
    fn index(&self, handle: H) -> &V {
        &self.values[handle.index()]
    }
}

impl<H: Handle, V> IndexMut<H> for PropertyMap<H, V> {
    fn index_mut(&mut self, handle: H) -> &mut V {
        &mut self.values[handle.index()]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::VertexId;

    #[test]
    fn tags_by_handle() {
        let mut map: PropertyMap<VertexId, Option<u8>> = PropertyMap::new(3, None);
        map[VertexId::new(1)] = Some(7);
        assert_eq!(map[VertexId::new(1)], Some(7));
        assert_eq!(map.get(VertexId::new(5)), None);
        let set: Vec<_> = map.iter().filter(|(_, v)| v.is_some()).map(|(h, _)| h).collect();
        assert_eq!(set, vec![VertexId::new(1)]);
    }
}
