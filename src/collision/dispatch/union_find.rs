use std::{cmp::Ordering, hash::Hash};

use ahash::AHashMap;

use crate::error::PhysicsError;

struct Element<T> {
    key: T,
    /// Index of the parent element, equal to this element's own index for roots
    parent: usize,
    rank: u32,
}

/// Disjoint sets over arbitrary keys, with path compression and union by rank.
///
/// Elements are never removed. Keys keep their insertion order, which also fixes the order of
/// [`DisjointSet::representatives`] and [`DisjointSet::members`].
pub struct DisjointSet<T> {
    elements: Vec<Element<T>>,
    index: AHashMap<T, usize>,
}

impl<T: Eq + Hash + Clone> Default for DisjointSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> DisjointSet<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: AHashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: &T) -> bool {
        self.index.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.index.clear();
    }

    /// Adds `key` as its own singleton set. Does nothing if it is already present.
    pub fn insert(&mut self, key: T) {
        self.insert_index(key);
    }

    fn insert_index(&mut self, key: T) -> usize {
        if let Some(&i) = self.index.get(&key) {
            return i;
        }

        let i = self.elements.len();
        self.elements.push(Element {
            key: key.clone(),
            parent: i,
            rank: 0,
        });
        self.index.insert(key, i);
        i
    }

    fn find_root(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.elements[root].parent != root {
            root = self.elements[root].parent;
        }

        let mut node = i;
        while node != root {
            let next = self.elements[node].parent;
            self.elements[node].parent = root;
            node = next;
        }

        root
    }

    /// Merges the sets of `a` and `b`, inserting either key if it is new.
    pub fn create_union(&mut self, a: T, b: T) {
        let a = self.insert_index(a);
        let b = self.insert_index(b);

        let x = self.find_root(a);
        let y = self.find_root(b);
        if x == y {
            return;
        }

        match self.elements[x].rank.cmp(&self.elements[y].rank) {
            Ordering::Less => self.elements[x].parent = y,
            Ordering::Greater => self.elements[y].parent = x,
            Ordering::Equal => {
                self.elements[y].parent = x;
                self.elements[x].rank += 1;
            }
        }
    }

    /// The representative of `key`'s set, or `None` if `key` was never inserted.
    pub fn find(&mut self, key: &T) -> Option<T> {
        let i = *self.index.get(key)?;
        let root = self.find_root(i);
        Some(self.elements[root].key.clone())
    }

    /// One key per set.
    pub fn representatives(&self) -> Vec<T> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(i, element)| element.parent == *i)
            .map(|(_, element)| element.key.clone())
            .collect()
    }

    /// Every key in the set whose representative is `representative`.
    pub fn members(&mut self, representative: &T) -> Result<Vec<T>, PhysicsError> {
        let root = match self.index.get(representative) {
            Some(&i) if self.elements[i].parent == i => i,
            _ => return Err(PhysicsError::NotARepresentative),
        };

        let mut members = Vec::new();
        for i in 0..self.elements.len() {
            if self.find_root(i) == root {
                members.push(self.elements[i].key.clone());
            }
        }

        Ok(members)
    }

    /// Every set at once, each listed with its representative first.
    ///
    /// Sets come in the order their first key was inserted.
    pub fn sets(&mut self) -> Vec<Vec<T>> {
        let mut set_of_root: AHashMap<usize, usize> = AHashMap::new();
        let mut sets: Vec<Vec<T>> = Vec::new();

        for i in 0..self.elements.len() {
            let root = self.find_root(i);
            let set = *set_of_root.entry(root).or_insert_with(|| {
                sets.push(Vec::new());
                sets.len() - 1
            });

            if i == root {
                sets[set].insert(0, self.elements[i].key.clone());
            } else {
                sets[set].push(self.elements[i].key.clone());
            }
        }

        sets
    }

    #[cfg(test)]
    fn depth(&self, key: &T) -> usize {
        let mut node = self.index[key];
        let mut depth = 0;
        while self.elements[node].parent != node {
            node = self.elements[node].parent;
            depth += 1;
        }

        depth
    }
}
