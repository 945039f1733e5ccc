//! Persistent singly linked stack.
//!
//! The runtime snapshots its continuation and choice-point stacks constantly;
//! sharing tails makes every snapshot a pointer copy.

use std::rc::Rc;

struct Node<T> {
    head: T,
    tail: IList<T>,
}

pub struct IList<T>(Option<Rc<Node<T>>>);

impl<T> IList<T> {
    pub fn nil() -> Self {
        IList(None)
    }

    pub fn cons(head: T, tail: IList<T>) -> Self {
        IList(Some(Rc::new(Node { head, tail })))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn head(&self) -> Option<&T> {
        self.0.as_ref().map(|node| &node.head)
    }

    pub fn tail(&self) -> IList<T> {
        match &self.0 {
            Some(node) => node.tail.clone(),
            None => IList::nil(),
        }
    }

    /// Same underlying node, i.e. the same stack state.
    pub fn ptr_eq(&self, other: &IList<T>) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter { next: &self.0 }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

impl<T: Clone> IList<T> {
    pub fn split(&self) -> Option<(T, IList<T>)> {
        self.0
            .as_ref()
            .map(|node| (node.head.clone(), node.tail.clone()))
    }
}

impl<T> Clone for IList<T> {
    fn clone(&self) -> Self {
        IList(self.0.clone())
    }
}

impl<T> Default for IList<T> {
    fn default() -> Self {
        IList::nil()
    }
}

impl<T> Drop for IList<T> {
    fn drop(&mut self) {
        let mut next = self.0.take();
        while let Some(node) = next {
            match Rc::try_unwrap(node) {
                Ok(mut node) => next = node.tail.0.take(),
                Err(_) => break,
            }
        }
    }
}

pub struct Iter<'a, T> {
    next: &'a Option<Rc<Node<T>>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        self.next.as_ref().map(|node| {
            self.next = &node.tail.0;
            &node.head
        })
    }
}
