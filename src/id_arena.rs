use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::ops::Index;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

/// Typed handle into an [`IdArena`]. Handles are plain indices, so they are `Copy` and can be
/// stored by materials without borrowing the arena. Debug builds also record which arena minted
/// the handle, and lookups in any other arena panic.
pub struct Id<T> {
    idx: NonZeroU32,
    #[cfg(debug_assertions)]
    arena: u32,
    _ty: PhantomData<fn() -> T>,
}

// #[derive] bug means we have to impl these manually because of PhantomData
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.idx.cmp(&other.idx)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.idx.hash(state)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Id({})", self.idx)
    }
}

impl<T> Id<T> {
    fn idx(self) -> usize {
        self.idx.get() as usize - 1
    }
}

/// Append-only storage that owns its items for as long as the arena lives and hands out
/// [`Id`] handles to them.
#[derive(Debug)]
pub struct IdArena<T> {
    items: Vec<T>,
    #[cfg(debug_assertions)]
    tag: u32,
}

#[cfg(debug_assertions)]
fn next_arena_tag() -> u32 {
    static NEXT: AtomicU32 = AtomicU32::new(0);
    NEXT.fetch_add(1, AtomicOrdering::Relaxed)
}

impl<T> Default for IdArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdArena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            #[cfg(debug_assertions)]
            tag: next_arena_tag(),
        }
    }

    fn mint(&self, idx: NonZeroU32) -> Id<T> {
        Id {
            idx,
            #[cfg(debug_assertions)]
            arena: self.tag,
            _ty: PhantomData,
        }
    }

    pub fn insert(&mut self, item: T) -> Id<T> {
        self.items.push(item);
        let idx = NonZeroU32::new(self.items.len() as u32)
            .expect("arena length is non-zero after a push");
        self.mint(idx)
    }

    /// Looks up a handle. Handles are only minted by `insert` and items are never removed, so
    /// a handle from this arena is always in bounds; a handle from another arena is a bug.
    pub fn get(&self, id: Id<T>) -> &T {
        #[cfg(debug_assertions)]
        assert_eq!(id.arena, self.tag, "{:?} does not belong to this arena", id);
        &self.items[id.idx()]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.items.iter().enumerate().map(|(i, item)| {
            let idx = NonZeroU32::new(i as u32 + 1).expect("index + 1 is non-zero");
            (self.mint(idx), item)
        })
    }
}

impl<T> Index<Id<T>> for IdArena<T> {
    type Output = T;

    fn index(&self, index: Id<T>) -> &Self::Output {
        self.get(index)
    }
}
