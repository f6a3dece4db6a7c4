use generational_arena::{Arena, Index};

/// Prev/next handles embedded in every arena node that can sit on a [`List`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
  pub(crate) prev: Option<Index>,
  pub(crate) next: Option<Index>,
}

/// Implemented by arena nodes so a [`List`] can reach their links.
pub(crate) trait Linked {
  fn links(&self) -> &Links;
  fn links_mut(&mut self) -> &mut Links;
}

// A doubly-linked list threaded through nodes that live in a shared
// `generational_arena::Arena`. The list only owns head/tail handles; the arena
// owns the nodes. Several lists may share one arena, which is how ARC keeps
// T1/T2/B1/B2 and the LFU family keeps one list per frequency bucket.
//
// Front is the most recently linked node, back the least recent.
#[derive(Debug, Default, Clone)]
pub(crate) struct List {
  head: Option<Index>,
  tail: Option<Index>,
  len: usize,
}

impl List {
  pub(crate) const fn new() -> Self {
    Self {
      head: None,
      tail: None,
      len: 0,
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline]
  pub(crate) fn front(&self) -> Option<Index> {
    self.head
  }

  #[inline]
  pub(crate) fn back(&self) -> Option<Index> {
    self.tail
  }

  // Links a node that is in the arena but on no list.
  pub(crate) fn push_front<T: Linked>(&mut self, nodes: &mut Arena<T>, index: Index) {
    let old_head = self.head;
    *nodes[index].links_mut() = Links {
      prev: None,
      next: old_head,
    };

    if let Some(old_head) = old_head {
      nodes[old_head].links_mut().prev = Some(index);
    } else {
      self.tail = Some(index);
    }

    self.head = Some(index);
    self.len += 1;
  }

  // Unlinks a node from this list. The node stays in the arena; its links are
  // reset so it can be pushed onto any list afterwards.
  pub(crate) fn unlink<T: Linked>(&mut self, nodes: &mut Arena<T>, index: Index) {
    let Links { prev, next } = *nodes[index].links();

    if let Some(prev) = prev {
      nodes[prev].links_mut().next = next;
    } else {
      // We are unlinking the head of the list.
      self.head = next;
    }

    if let Some(next) = next {
      nodes[next].links_mut().prev = prev;
    } else {
      // We are unlinking the tail of the list.
      self.tail = prev;
    }

    *nodes[index].links_mut() = Links::default();
    self.len -= 1;
  }

  pub(crate) fn move_to_front<T: Linked>(&mut self, nodes: &mut Arena<T>, index: Index) {
    if self.head != Some(index) {
      self.unlink(nodes, index);
      self.push_front(nodes, index);
    }
  }

  pub(crate) fn pop_front<T: Linked>(&mut self, nodes: &mut Arena<T>) -> Option<Index> {
    let index = self.front()?;
    self.unlink(nodes, index);
    Some(index)
  }

  pub(crate) fn pop_back<T: Linked>(&mut self, nodes: &mut Arena<T>) -> Option<Index> {
    let index = self.back()?;
    self.unlink(nodes, index);
    Some(index)
  }

  /// Forgets every node without touching the arena. Callers clear the arena
  /// themselves.
  pub(crate) fn reset(&mut self) {
    *self = Self::new();
  }

  /// Iterates handles from front (most recent) to back.
  pub(crate) fn iter<'a, T: Linked>(&self, nodes: &'a Arena<T>) -> Iter<'a, T> {
    Iter {
      nodes,
      cursor: self.head,
      remaining: self.len,
    }
  }
}

pub(crate) struct Iter<'a, T> {
  nodes: &'a Arena<T>,
  cursor: Option<Index>,
  remaining: usize,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
  type Item = (Index, &'a T);

  fn next(&mut self) -> Option<Self::Item> {
    let index = self.cursor?;
    let nodes: &'a Arena<T> = self.nodes;
    let node = &nodes[index];
    self.cursor = node.links().next;
    self.remaining = self.remaining.saturating_sub(1);
    Some((index, node))
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (self.remaining, Some(self.remaining))
  }
}
