use bumpalo::Bump;

/// Per-worker scratch memory for everything a single pixel sample allocates.
///
/// Values handed out borrow the arena, so the borrow checker rejects any use of them after
/// [`Arena::clear`], which needs `&mut self`. Destructors of allocated values never run; only
/// place plain data and references in here.
#[derive(Default)]
pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self { bump: Bump::with_capacity(bytes) }
    }

    /// Returns `size` bytes of zeroed scratch storage.
    pub fn allocate(&self, size: usize) -> &mut [u8] {
        self.bump.alloc_slice_fill_copy(size, 0u8)
    }

    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    /// Invalidates every allocation made so far without running any per-object cleanup.
    /// The underlying chunk is kept so the next sample allocates without going to the system.
    pub fn clear(&mut self) {
        self.bump.reset();
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}
