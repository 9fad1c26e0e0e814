//! Doubly linked list over a slot arena.
//!
//! Slots are never freed: `erase` unlinks a node but keeps its value so the
//! node can be relinked later (the shuffle moves every node this way).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(u32);

#[derive(Debug, Clone)]
struct Slot<T> {
  value: T,
  prev: Option<ListId>,
  next: Option<ListId>,
  linked: bool,
}

#[derive(Debug, Clone)]
pub struct NodeList<T> {
  slots: Vec<Slot<T>>,
  head: Option<ListId>,
  tail: Option<ListId>,
  len: usize,
}

impl<T> Default for NodeList<T> {
  fn default() -> Self {
    Self {
      slots: Vec::new(),
      head: None,
      tail: None,
      len: 0,
    }
  }
}

impl<T> NodeList<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of linked nodes.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn get(&self, id: ListId) -> &T {
    &self.slots[id.0 as usize].value
  }

  pub fn is_linked(&self, id: ListId) -> bool {
    self.slots[id.0 as usize].linked
  }

  pub fn first(&self) -> Option<ListId> {
    self.head
  }

  pub fn last(&self) -> Option<ListId> {
    self.tail
  }

  pub fn next(&self, id: ListId) -> Option<ListId> {
    self.slots[id.0 as usize].next
  }

  /// Allocates a node for `value` and links it at the tail.
  pub fn push_back(&mut self, value: T) -> ListId {
    let id = ListId(self.slots.len() as u32);
    self.slots.push(Slot {
      value,
      prev: None,
      next: None,
      linked: false,
    });
    self.relink_back(id);
    id
  }

  /// Links a previously erased node at the tail. Linked nodes are left alone.
  pub fn relink_back(&mut self, id: ListId) {
    if self.slots[id.0 as usize].linked {
      return;
    }

    let tail = self.tail;
    {
      let slot = &mut self.slots[id.0 as usize];
      slot.prev = tail;
      slot.next = None;
      slot.linked = true;
    }
    match tail {
      Some(tail) => self.slots[tail.0 as usize].next = Some(id),
      None => self.head = Some(id),
    }
    self.tail = Some(id);
    self.len += 1;
  }

  /// Unlinks `id`. Erasing an unlinked node is a no-op.
  pub fn erase(&mut self, id: ListId) {
    let (prev, next) = {
      let slot = &mut self.slots[id.0 as usize];
      if !slot.linked {
        return;
      }
      slot.linked = false;
      (slot.prev.take(), slot.next.take())
    };

    match (prev, next) {
      (None, None) => {
        self.head = None;
        self.tail = None;
      }
      (None, Some(next)) => {
        self.slots[next.0 as usize].prev = None;
        self.head = Some(next);
      }
      (Some(prev), None) => {
        self.slots[prev.0 as usize].next = None;
        self.tail = Some(prev);
      }
      (Some(prev), Some(next)) => {
        self.slots[prev.0 as usize].next = Some(next);
        self.slots[next.0 as usize].prev = Some(prev);
      }
    }
    self.len -= 1;
  }

  /// The `index`-th linked node, counting from the head.
  pub fn nth(&self, index: usize) -> Option<ListId> {
    self.ids().nth(index)
  }

  pub fn ids(&self) -> Ids<'_, T> {
    Ids {
      list: self,
      cursor: self.head,
    }
  }

  pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
    self.ids().map(move |id| self.get(id))
  }
}

pub struct Ids<'a, T> {
  list: &'a NodeList<T>,
  cursor: Option<ListId>,
}

impl<T> Iterator for Ids<'_, T> {
  type Item = ListId;

  fn next(&mut self) -> Option<ListId> {
    let id = self.cursor?;
    self.cursor = self.list.next(id);
    Some(id)
  }
}
