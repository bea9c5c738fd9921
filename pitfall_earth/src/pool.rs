/// Fixed-capacity free list of renderables. The most recently released slot
/// is handed out first; the pool never grows and exhaustion is the caller's
/// to report.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    /// Indices of empty slots, next to hand out on top.
    free: Vec<usize>,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn acquire(&mut self, value: T) -> Option<usize> {
        let index = self.free.pop()?;
        self.slots[index] = Some(value);
        Some(index)
    }

    /// Returns false if the slot was already free.
    pub fn release(&mut self, index: usize) -> bool {
        let released = self.slots.get_mut(index).and_then(Option::take).is_some();
        if released {
            self.free.push(index);
        }
        released
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.free = (0..self.slots.len()).rev().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_free_slot_is_reused() {
        let mut pool = Pool::with_capacity(3);
        assert_eq!(pool.acquire('a'), Some(0));
        assert_eq!(pool.acquire('b'), Some(1));
        assert!(pool.release(0));
        assert!(!pool.release(0));
        assert_eq!(pool.acquire('c'), Some(0));
        assert_eq!(pool.live(), 2);
    }

    #[test]
    fn latest_release_is_handed_out_first() {
        let mut pool = Pool::with_capacity(4);
        for c in ['a', 'b', 'c', 'd'] {
            pool.acquire(c).unwrap();
        }
        assert!(pool.release(1));
        assert!(pool.release(3));
        assert!(!pool.release(3), "double release must not free the slot twice");
        assert!(!pool.release(9));
        assert_eq!(pool.acquire('e'), Some(3));
        assert_eq!(pool.acquire('f'), Some(1));
        assert_eq!(pool.acquire('g'), None);
        let live: Vec<_> = pool.iter().map(|(_, c)| *c).collect();
        assert_eq!(live, vec!['a', 'f', 'c', 'e']);
    }

    #[test]
    fn exhausted_pool_refuses() {
        let mut pool = Pool::with_capacity(1);
        pool.acquire(1).unwrap();
        assert_eq!(pool.acquire(2), None);
        pool.clear();
        assert_eq!(pool.live(), 0);
        assert_eq!(pool.acquire(3), Some(0));
    }
}
