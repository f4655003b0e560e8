use std::num::NonZeroU64;

/// Opaque, never-zero handle into a [`HandleArena`].
///
/// Packs a slot index (low 32 bits) and a generation (high 32 bits).
/// Generations start at 1, so the raw value is never zero and zero
/// stays free as the "no engine" sentinel at FFI boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    fn new(index: u32, generation: u32) -> Self {
        let raw = (u64::from(generation) << 32) | u64::from(index);
        // generation >= 1 keeps the high half non-zero
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn into_raw(self) -> u64 {
        self.0.get()
    }

    fn index(self) -> usize {
        (self.0.get() & u64::from(u32::MAX)) as usize
    }

    fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }
}

struct Entry<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational arena: a removed handle never resolves again, even after
/// its slot is reused.
pub struct HandleArena<T> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleArena<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> Handle {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.value = Some(value);
            return Handle::new(index, entry.generation);
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 1,
            value: Some(value),
        });
        Handle::new(index, 1)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.entries
            .get(handle.index())
            .filter(|e| e.generation == handle.generation())
            .and_then(|e| e.value.as_ref())
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let entry = self.entries.get_mut(handle.index())?;
        if entry.generation != handle.generation() {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = match entry.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        self.free.push(handle.index() as u32);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
