//! Singly linked head/tail queue whose link lives inside the queued object.
//!
//! The list owns only topology: nodes are created and destroyed by their owner, and every
//! operation is pointer relinking without allocation. Nodes are shared (`Arc<T>`), so a node can
//! sit on a list while its owner keeps a handle to it. Searching is left to callers; walk with
//! [`IntrusiveList::iter`] and cut with [`IntrusiveList::detach_range`].
//!
//! Invariants: `first` is `None` iff `last` is `None`, and `last` never has a successor.

use std::fmt;
use std::sync::Arc;

/// Embedded `next` link.
pub struct Link<T> {
    next: spin::Mutex<Option<Arc<T>>>,
}

impl<T> Link<T> {
    pub const fn new() -> Self {
        Self {
            next: spin::Mutex::new(None),
        }
    }

    pub fn next(&self) -> Option<Arc<T>> {
        self.next.lock().clone()
    }

    pub fn has_next(&self) -> bool {
        self.next.lock().is_some()
    }

    /// Link `next` after this node, returning the previous successor.
    pub fn set_next(&self, next: Option<Arc<T>>) -> Option<Arc<T>> {
        std::mem::replace(&mut *self.next.lock(), next)
    }

    pub fn take_next(&self) -> Option<Arc<T>> {
        self.next.lock().take()
    }
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("has_next", &self.has_next())
            .finish()
    }
}

/// Types that embed a [`Link`].
pub trait Linked: Sized {
    fn link(&self) -> &Link<Self>;
}

pub struct IntrusiveList<T: Linked> {
    first: Option<Arc<T>>,
    last: Option<Arc<T>>,
}

impl<T: Linked> IntrusiveList<T> {
    pub const fn new() -> Self {
        Self {
            first: None,
            last: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        debug_assert_eq!(self.first.is_none(), self.last.is_none());
        self.first.is_none()
    }

    pub fn first(&self) -> Option<&Arc<T>> {
        self.first.as_ref()
    }

    pub fn last(&self) -> Option<&Arc<T>> {
        self.last.as_ref()
    }

    /// Number of entries. Walks the list.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Append an already linked chain `first..=last`.
    pub fn put_tail_chain(&mut self, first: Arc<T>, last: Arc<T>) {
        debug_assert!(!last.link().has_next(), "chain tail must be terminated");
        match &self.last {
            Some(tail) => {
                tail.link().set_next(Some(first));
            }
            None => self.first = Some(first),
        }
        self.last = Some(last);
    }

    /// Prepend an already linked chain `first..=last`.
    pub fn put_head_chain(&mut self, first: Arc<T>, last: Arc<T>) {
        debug_assert!(!last.link().has_next(), "chain tail must be terminated");
        match self.first.take() {
            Some(head) => {
                last.link().set_next(Some(head));
            }
            None => self.last = Some(last),
        }
        self.first = Some(first);
    }

    pub fn put_tail(&mut self, entry: Arc<T>) {
        self.put_tail_chain(entry.clone(), entry);
    }

    pub fn put_head(&mut self, entry: Arc<T>) {
        self.put_head_chain(entry.clone(), entry);
    }

    /// Move every entry of `src` to the tail of `self`, leaving `src` empty.
    pub fn concat(&mut self, src: &mut Self) {
        if let Some((first, last)) = src.detach_all() {
            self.put_tail_chain(first, last);
        }
    }

    /// Remove every entry at once, returning the chain ends.
    pub fn detach_all(&mut self) -> Option<(Arc<T>, Arc<T>)> {
        let first = self.first.take()?;
        debug_assert!(self.last.is_some(), "non-empty list must have a tail");
        let last = self.last.take().unwrap_or_else(|| first.clone());
        Some((first, last))
    }

    /// Detach the contiguous run that ends at `last` and starts right after `before`
    /// (`None` meaning the run starts at the head). Returns the first node of the run; the run
    /// stays linked internally and is terminated at `last`.
    pub fn detach_range(&mut self, before: Option<&Arc<T>>, last: &Arc<T>) -> Option<Arc<T>> {
        let after = last.link().take_next();
        let first = match before {
            Some(prev) => prev.link().set_next(after.clone()),
            None => std::mem::replace(&mut self.first, after.clone()),
        };
        if after.is_none() {
            self.last = before.cloned();
        }
        debug_assert_eq!(self.first.is_none(), self.last.is_none());
        first
    }

    /// Remove and return the head entry.
    pub fn pop_front(&mut self) -> Option<Arc<T>> {
        let first = self.first.take()?;
        self.first = first.link().take_next();
        if self.first.is_none() {
            self.last = None;
        }
        Some(first)
    }

    pub fn iter(&self) -> Iter<T> {
        Iter {
            next: self.first.clone(),
        }
    }

    /// Empty the list, handing back its previous contents as a new list.
    pub fn take(&mut self) -> Self {
        Self {
            first: self.first.take(),
            last: self.last.take(),
        }
    }
}

impl<T: Linked> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> Drop for IntrusiveList<T> {
    fn drop(&mut self) {
        // Unlink iteratively; recursive `Arc` drops overflow on long chains.
        while self.pop_front().is_some() {}
    }
}

impl<T: Linked> fmt::Debug for IntrusiveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrusiveList")
            .field("len", &self.len())
            .finish()
    }
}

/// Walks a list (or a detached chain) from a starting node.
pub struct Iter<T: Linked> {
    next: Option<Arc<T>>,
}

impl<T: Linked> Iter<T> {
    /// Walk a chain that is not owned by any list, e.g. the result of
    /// [`IntrusiveList::detach_range`].
    pub fn from_chain(first: Option<Arc<T>>) -> Self {
        Self { next: first }
    }
}

impl<T: Linked> Iterator for Iter<T> {
    type Item = Arc<T>;

    fn next(&mut self) -> Option<Arc<T>> {
        let cur = self.next.take()?;
        self.next = cur.link().next();
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Node {
        id: u32,
        link: Link<Node>,
    }

    impl Linked for Node {
        fn link(&self) -> &Link<Self> {
            &self.link
        }
    }

    fn node(id: u32) -> Arc<Node> {
        Arc::new(Node {
            id,
            link: Link::new(),
        })
    }

    fn ids(list: &IntrusiveList<Node>) -> Vec<u32> {
        list.iter().map(|n| n.id).collect()
    }

    #[test]
    fn empty_list_has_no_ends() {
        let list = IntrusiveList::<Node>::new();
        assert!(list.is_empty());
        assert!(list.first().is_none());
        assert!(list.last().is_none());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn put_head_and_tail_order() {
        let mut list = IntrusiveList::new();
        list.put_tail(node(2));
        list.put_head(node(1));
        list.put_tail(node(3));
        assert_eq!(ids(&list), vec![1, 2, 3]);
        assert_eq!(list.last().unwrap().id, 3);
        assert!(!list.last().unwrap().link().has_next());
    }

    #[test]
    fn put_chain_splices_in_constant_time() {
        let a = node(10);
        let b = node(11);
        a.link().set_next(Some(b.clone()));

        let mut list = IntrusiveList::new();
        list.put_tail(node(1));
        list.put_head_chain(a, b);
        assert_eq!(ids(&list), vec![10, 11, 1]);

        let c = node(20);
        let d = node(21);
        c.link().set_next(Some(d.clone()));
        list.put_tail_chain(c, d);
        assert_eq!(ids(&list), vec![10, 11, 1, 20, 21]);
    }

    #[test]
    fn concat_moves_everything() {
        let mut dst = IntrusiveList::new();
        let mut src = IntrusiveList::new();
        dst.put_tail(node(1));
        src.put_tail(node(2));
        src.put_tail(node(3));

        dst.concat(&mut src);
        assert!(src.is_empty());
        assert_eq!(ids(&dst), vec![1, 2, 3]);

        // Concatenating an empty list is a no-op.
        dst.concat(&mut src);
        assert_eq!(ids(&dst), vec![1, 2, 3]);
    }

    #[test]
    fn detach_range_from_middle_and_tail() {
        let nodes: Vec<_> = (0..5).map(node).collect();
        let mut list = IntrusiveList::new();
        for n in &nodes {
            list.put_tail(n.clone());
        }

        let run = list.detach_range(Some(&nodes[0]), &nodes[2]).unwrap();
        assert_eq!(
            Iter::from_chain(Some(run)).map(|n| n.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(ids(&list), vec![0, 3, 4]);

        let run = list.detach_range(Some(&nodes[3]), &nodes[4]).unwrap();
        assert_eq!(run.id, 4);
        assert_eq!(list.last().unwrap().id, 3);
        assert_eq!(ids(&list), vec![0, 3]);

        let run = list.detach_range(None, &nodes[3]).unwrap();
        assert_eq!(run.id, 0);
        assert!(list.is_empty());
    }

    #[test]
    fn pop_front_drains_in_order() {
        let mut list = IntrusiveList::new();
        for id in 0..3 {
            list.put_tail(node(id));
        }
        let drained: Vec<_> = std::iter::from_fn(|| list.pop_front())
            .map(|n| n.id)
            .collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(list.is_empty());
    }

    #[test]
    fn dropping_a_long_list_does_not_recurse() {
        let mut list = IntrusiveList::new();
        for id in 0..200_000 {
            list.put_tail(node(id));
        }
        drop(list);
    }
}
