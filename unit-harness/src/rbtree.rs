//! Append-only red-black tree backed by an arena.
//!
//! Nodes are addressed by [`NodeId`] and never removed. The parent link and
//! the node color share one word, mirroring the classic pointer-tagging
//! layout: bit 0 holds the color and the remaining bits hold `parent + 1`
//! (zero meaning "no parent").

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
  Red,
  Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
  Inserted(NodeId),
  Duplicate(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct ParentColor(u32);

impl ParentColor {
  const BLACK: u32 = 1;

  fn new(parent: Option<NodeId>, color: Color) -> Self {
    let mut packed = ParentColor(0);
    packed.set_parent(parent);
    packed.set_color(color);
    packed
  }

  fn parent(self) -> Option<NodeId> {
    match self.0 >> 1 {
      0 => None,
      raw => Some(NodeId(raw - 1)),
    }
  }

  fn color(self) -> Color {
    if self.0 & Self::BLACK != 0 {
      Color::Black
    } else {
      Color::Red
    }
  }

  fn set_parent(&mut self, parent: Option<NodeId>) {
    let raw = parent.map(|id| id.0 + 1).unwrap_or(0);
    self.0 = (raw << 1) | (self.0 & Self::BLACK);
  }

  fn set_color(&mut self, color: Color) {
    match color {
      Color::Black => self.0 |= Self::BLACK,
      Color::Red => self.0 &= !Self::BLACK,
    }
  }
}

#[derive(Debug, Clone)]
struct Node<K> {
  key: K,
  parent_color: ParentColor,
  left: Option<NodeId>,
  right: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct RbTree<K> {
  nodes: Vec<Node<K>>,
  root: Option<NodeId>,
}

impl<K> Default for RbTree<K> {
  fn default() -> Self {
    Self {
      nodes: Vec::new(),
      root: None,
    }
  }
}

impl<K> RbTree<K> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn get(&self, id: NodeId) -> &K {
    &self.nodes[id.index()].key
  }

  /// Inserts `key`, rejecting it when `cmp` reports an equal key already in
  /// the tree. The rejected key is dropped.
  pub fn insert(&mut self, key: K, mut cmp: impl FnMut(&K, &K) -> Ordering) -> Insertion {
    let mut parent = None;
    let mut went_left = false;
    let mut cursor = self.root;
    while let Some(id) = cursor {
      parent = Some(id);
      match cmp(&key, &self.nodes[id.index()].key) {
        Ordering::Less => {
          went_left = true;
          cursor = self.nodes[id.index()].left;
        }
        Ordering::Greater => {
          went_left = false;
          cursor = self.nodes[id.index()].right;
        }
        Ordering::Equal => return Insertion::Duplicate(id),
      }
    }

    let id = NodeId(self.nodes.len() as u32);
    self.nodes.push(Node {
      key,
      parent_color: ParentColor::new(parent, Color::Red),
      left: None,
      right: None,
    });
    match parent {
      None => self.root = Some(id),
      Some(p) if went_left => self.nodes[p.index()].left = Some(id),
      Some(p) => self.nodes[p.index()].right = Some(id),
    }
    self.insert_fixup(id);
    Insertion::Inserted(id)
  }

  /// Descends the tree with `compare`, which reports how the wanted key orders
  /// relative to the visited one. `compare` may compare a key prefix as long as
  /// the keys sharing that prefix are contiguous.
  pub fn find(&self, mut compare: impl FnMut(&K) -> Ordering) -> Option<NodeId> {
    let mut cursor = self.root;
    while let Some(id) = cursor {
      let node = &self.nodes[id.index()];
      cursor = match compare(&node.key) {
        Ordering::Less => node.left,
        Ordering::Greater => node.right,
        Ordering::Equal => return Some(id),
      };
    }
    None
  }

  /// Smallest key in the tree.
  pub fn first(&self) -> Option<NodeId> {
    self.root.map(|root| self.leftmost(root))
  }

  /// In-order successor of `id`.
  pub fn next(&self, id: NodeId) -> Option<NodeId> {
    if let Some(right) = self.nodes[id.index()].right {
      return Some(self.leftmost(right));
    }

    let mut child = id;
    let mut parent = self.parent(id);
    while let Some(p) = parent {
      if self.nodes[p.index()].right != Some(child) {
        break;
      }
      child = p;
      parent = self.parent(p);
    }
    parent
  }

  pub fn iter(&self) -> Iter<'_, K> {
    Iter {
      tree: self,
      cursor: self.first(),
    }
  }

  fn leftmost(&self, mut id: NodeId) -> NodeId {
    while let Some(left) = self.nodes[id.index()].left {
      id = left;
    }
    id
  }

  fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.nodes[id.index()].parent_color.parent()
  }

  fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
    self.nodes[id.index()].parent_color.set_parent(parent);
  }

  fn color(&self, id: Option<NodeId>) -> Color {
    match id {
      Some(id) => self.nodes[id.index()].parent_color.color(),
      None => Color::Black,
    }
  }

  fn set_color(&mut self, id: NodeId, color: Color) {
    self.nodes[id.index()].parent_color.set_color(color);
  }

  fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
    match parent {
      None => self.root = Some(new),
      Some(p) => {
        let node = &mut self.nodes[p.index()];
        if node.left == Some(old) {
          node.left = Some(new);
        } else {
          node.right = Some(new);
        }
      }
    }
  }

  fn rotate_left(&mut self, x: NodeId) {
    let Some(y) = self.nodes[x.index()].right else {
      return;
    };
    let y_left = self.nodes[y.index()].left;
    self.nodes[x.index()].right = y_left;
    if let Some(child) = y_left {
      self.set_parent(child, Some(x));
    }
    let x_parent = self.parent(x);
    self.set_parent(y, x_parent);
    self.replace_child(x_parent, x, y);
    self.nodes[y.index()].left = Some(x);
    self.set_parent(x, Some(y));
  }

  fn rotate_right(&mut self, x: NodeId) {
    let Some(y) = self.nodes[x.index()].left else {
      return;
    };
    let y_right = self.nodes[y.index()].right;
    self.nodes[x.index()].left = y_right;
    if let Some(child) = y_right {
      self.set_parent(child, Some(x));
    }
    let x_parent = self.parent(x);
    self.set_parent(y, x_parent);
    self.replace_child(x_parent, x, y);
    self.nodes[y.index()].right = Some(x);
    self.set_parent(x, Some(y));
  }

  fn insert_fixup(&mut self, mut node: NodeId) {
    while let Some(parent) = self.parent(node) {
      if self.color(Some(parent)) == Color::Black {
        break;
      }
      // A red parent is never the root, so the grandparent exists.
      let Some(grandparent) = self.parent(parent) else {
        break;
      };

      let parent_is_left = self.nodes[grandparent.index()].left == Some(parent);
      let uncle = if parent_is_left {
        self.nodes[grandparent.index()].right
      } else {
        self.nodes[grandparent.index()].left
      };

      if let Some(uncle) = uncle.filter(|u| self.color(Some(*u)) == Color::Red) {
        self.set_color(parent, Color::Black);
        self.set_color(uncle, Color::Black);
        self.set_color(grandparent, Color::Red);
        node = grandparent;
        continue;
      }

      let mut parent = parent;
      if parent_is_left {
        if self.nodes[parent.index()].right == Some(node) {
          self.rotate_left(parent);
          node = parent;
          parent = self.parent(node).unwrap_or(grandparent);
        }
        self.set_color(parent, Color::Black);
        self.set_color(grandparent, Color::Red);
        self.rotate_right(grandparent);
      } else {
        if self.nodes[parent.index()].left == Some(node) {
          self.rotate_right(parent);
          node = parent;
          parent = self.parent(node).unwrap_or(grandparent);
        }
        self.set_color(parent, Color::Black);
        self.set_color(grandparent, Color::Red);
        self.rotate_left(grandparent);
      }
    }

    if let Some(root) = self.root {
      self.set_color(root, Color::Black);
    }
  }

  /// Checks ordering and balance, returning the black height.
  #[cfg(test)]
  pub(crate) fn validate(&self, mut cmp: impl FnMut(&K, &K) -> Ordering) -> usize {
    fn walk<K>(
      tree: &RbTree<K>,
      id: Option<NodeId>,
      parent: Option<NodeId>,
      cmp: &mut dyn FnMut(&K, &K) -> Ordering,
    ) -> usize {
      let Some(id) = id else {
        return 1;
      };
      assert_eq!(tree.parent(id), parent, "parent link broken");
      let node = &tree.nodes[id.index()];
      if tree.color(Some(id)) == Color::Red {
        assert_eq!(tree.color(node.left), Color::Black, "red-red edge");
        assert_eq!(tree.color(node.right), Color::Black, "red-red edge");
      }
      if let Some(left) = node.left {
        assert_eq!(cmp(tree.get(left), &node.key), Ordering::Less);
      }
      if let Some(right) = node.right {
        assert_eq!(cmp(tree.get(right), &node.key), Ordering::Greater);
      }
      let left = walk(tree, node.left, Some(id), cmp);
      let right = walk(tree, node.right, Some(id), cmp);
      assert_eq!(left, right, "black height differs");
      left + usize::from(tree.color(Some(id)) == Color::Black)
    }

    assert_eq!(self.color(self.root), Color::Black, "root must be black");
    walk(self, self.root, None, &mut cmp)
  }
}

pub struct Iter<'a, K> {
  tree: &'a RbTree<K>,
  cursor: Option<NodeId>,
}

impl<'a, K> Iterator for Iter<'a, K> {
  type Item = (NodeId, &'a K);

  fn next(&mut self) -> Option<Self::Item> {
    let id = self.cursor?;
    self.cursor = self.tree.next(id);
    Some((id, self.tree.get(id)))
  }
}
