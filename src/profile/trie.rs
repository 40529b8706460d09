//! Compressed prefix tree over byte strings
//!
//! Children are keyed by a single byte. Each child carries the run of bytes
//! shared by every key continuing through it (`suffix`), so chains of
//! single-child nodes never exist. The root itself never holds a suffix:
//! its children are the first-level split of the whole key set, which is
//! what both the sampler and the discoverer inspect.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Node {
    /// A key ends exactly at the end of this node's suffix
    terminal: bool,
    /// Bytes following the edge byte, shared by all keys below this node
    suffix: Vec<u8>,
    children: BTreeMap<u8, Node>,
}

impl Node {
    fn leaf(rest: &[u8]) -> Self {
        Self {
            terminal: true,
            suffix: rest.to_vec(),
            children: BTreeMap::new(),
        }
    }

    /// Insert `rest` (the key bytes after this node's edge byte).
    /// Returns true if the key was not present before.
    fn insert(&mut self, rest: &[u8]) -> bool {
        let common = common_prefix_len(&self.suffix, rest);

        if common < self.suffix.len() {
            // Push the diverging tail of our suffix down into a new child.
            let tail = self.suffix.split_off(common);
            let child = Node {
                terminal: self.terminal,
                suffix: tail[1..].to_vec(),
                children: std::mem::take(&mut self.children),
            };
            self.children.insert(tail[0], child);
            self.terminal = false;
        }

        match rest[common..].split_first() {
            None => {
                let added = !self.terminal;
                self.terminal = true;
                added
            }
            Some((&edge, tail)) => match self.children.entry(edge) {
                Entry::Vacant(e) => {
                    e.insert(Node::leaf(tail));
                    true
                }
                Entry::Occupied(e) => e.into_mut().insert(tail),
            },
        }
    }

    fn is_empty(&self) -> bool {
        !self.terminal && self.children.is_empty()
    }

    fn count(&self) -> usize {
        usize::from(self.terminal) + self.children.values().map(Node::count).sum::<usize>()
    }

    /// Collect every key below this node; `path` is the full key up to and
    /// including this node's suffix.
    fn collect(&self, path: &mut Vec<u8>, out: &mut Vec<Vec<u8>>) {
        if self.terminal {
            out.push(path.clone());
        }
        for (&edge, child) in &self.children {
            let len = path.len();
            path.push(edge);
            path.extend_from_slice(&child.suffix);
            child.collect(path, out);
            path.truncate(len);
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// One first-level branch of a [`Trie`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch<'a> {
    /// Byte selecting this branch from the root
    pub first: u8,
    /// Compressed run shared by every key in this branch
    pub suffix: &'a [u8],
    /// A key equal to `first + suffix` was inserted
    pub terminal: bool,
}

impl Branch<'_> {
    /// `first + suffix`
    pub fn prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(self.suffix.len() + 1);
        prefix.push(self.first);
        prefix.extend_from_slice(self.suffix);
        prefix
    }
}

/// Radix trie used to discover key prefixes.
#[derive(Debug, Default)]
pub struct Trie {
    root: Node,
    len: usize,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a trie from an iterator of keys.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut trie = Self::new();
        for key in keys {
            trie.insert(key.as_ref());
        }
        trie
    }

    /// Add a key. Inserting a key twice leaves the structure unchanged.
    pub fn insert(&mut self, key: &[u8]) {
        if self.root.insert(key) {
            self.len += 1;
        }
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Is `key` itself stored?
    pub fn contains(&self, key: &[u8]) -> bool {
        match self.locate(key) {
            Some((node, path)) => path.len() == key.len() && node.terminal,
            None => false,
        }
    }

    /// True iff at least one stored key starts with `prefix`.
    pub fn has_prefix(&self, prefix: &[u8]) -> bool {
        self.locate(prefix)
            .map(|(node, _)| !node.is_empty())
            .unwrap_or(false)
    }

    /// Number of stored keys starting with `prefix`.
    pub fn count_prefix(&self, prefix: &[u8]) -> usize {
        self.locate(prefix)
            .map(|(node, _)| node.count())
            .unwrap_or(0)
    }

    /// Every stored key starting with `prefix`, in byte order.
    pub fn list_members(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        if let Some((node, mut path)) = self.locate(prefix) {
            node.collect(&mut path, &mut out);
        }
        out
    }

    /// First-level split of the whole trie.
    pub fn root_branches(&self) -> impl Iterator<Item = Branch<'_>> {
        self.root.children.iter().map(|(&first, node)| Branch {
            first,
            suffix: &node.suffix,
            terminal: node.terminal,
        })
    }

    /// Find the shallowest node whose subtree holds exactly the keys starting
    /// with `prefix`, together with that node's full path.
    fn locate(&self, prefix: &[u8]) -> Option<(&Node, Vec<u8>)> {
        let mut node = &self.root;
        let mut path = Vec::with_capacity(prefix.len());
        let mut rest = prefix;

        while let Some((&edge, tail)) = rest.split_first() {
            let child = node.children.get(&edge)?;
            path.push(edge);
            path.extend_from_slice(&child.suffix);

            if tail.len() <= child.suffix.len() {
                return child.suffix.starts_with(tail).then_some((child, path));
            }
            if !tail.starts_with(&child.suffix) {
                return None;
            }
            rest = &tail[child.suffix.len()..];
            node = child;
        }

        Some((node, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(trie: &Trie, prefix: &str) -> Vec<String> {
        trie.list_members(prefix.as_bytes())
            .into_iter()
            .map(|k| String::from_utf8(k).unwrap())
            .collect()
    }

    #[test]
    fn test_insert_and_contains() {
        let trie = Trie::from_keys(["user:1", "user:2", "session:abc"]);
        assert_eq!(trie.len(), 3);
        assert!(trie.contains(b"user:1"));
        assert!(trie.contains(b"session:abc"));
        assert!(!trie.contains(b"user:"));
        assert!(!trie.contains(b"user:3"));
    }

    #[test]
    fn test_reinsert_is_idempotent() {
        let mut trie = Trie::new();
        trie.insert(b"order:1");
        trie.insert(b"order:1");
        assert_eq!(trie.len(), 1);
        assert_eq!(keys(&trie, "order"), vec!["order:1"]);
    }

    #[test]
    fn test_root_branches_are_compressed() {
        let trie = Trie::from_keys(["order:1", "order:2", "log:1", "log:2", "x"]);
        let branches: Vec<_> = trie.root_branches().collect();
        assert_eq!(branches.len(), 3);

        assert_eq!(branches[0].first, b'l');
        assert_eq!(branches[0].suffix, b"og:");
        assert!(!branches[0].terminal);

        assert_eq!(branches[1].first, b'o');
        assert_eq!(branches[1].suffix, b"rder:");
        assert_eq!(branches[1].prefix(), b"order:".to_vec());

        assert_eq!(branches[2].first, b'x');
        assert!(branches[2].suffix.is_empty());
        assert!(branches[2].terminal);
    }

    #[test]
    fn test_split_keeps_terminal_on_shorter_key() {
        // "foo" then "foobar" then "fox": the "foo" leaf is split twice.
        let trie = Trie::from_keys(["foo", "foobar", "fox"]);
        assert!(trie.contains(b"foo"));
        assert!(trie.contains(b"foobar"));
        assert!(trie.contains(b"fox"));
        assert!(!trie.contains(b"fo"));

        let branch = trie.root_branches().next().unwrap();
        assert_eq!(branch.suffix, b"o");
        assert!(!branch.terminal);
        assert_eq!(keys(&trie, "foo"), vec!["foo", "foobar"]);
    }

    #[test]
    fn test_has_prefix_inside_compressed_run() {
        let trie = Trie::from_keys(["session:abc", "session:abd"]);
        assert!(trie.has_prefix(b""));
        assert!(trie.has_prefix(b"s"));
        assert!(trie.has_prefix(b"sess"));
        assert!(trie.has_prefix(b"session:ab"));
        assert!(trie.has_prefix(b"session:abd"));
        assert!(!trie.has_prefix(b"session:abe"));
        assert!(!trie.has_prefix(b"sessions"));
        assert!(!trie.has_prefix(b"session:abcd"));
    }

    #[test]
    fn test_list_members_and_count() {
        let trie = Trie::from_keys(["a:b:1", "a:b:2", "a:c:1", "b"]);
        assert_eq!(keys(&trie, "a:"), vec!["a:b:1", "a:b:2", "a:c:1"]);
        assert_eq!(keys(&trie, "a:b"), vec!["a:b:1", "a:b:2"]);
        assert_eq!(keys(&trie, "a:b:2"), vec!["a:b:2"]);
        assert!(keys(&trie, "c").is_empty());
        assert_eq!(trie.count_prefix(b""), 4);
        assert_eq!(trie.count_prefix(b"a:"), 3);
        assert_eq!(trie.count_prefix(b"z"), 0);
    }

    #[test]
    fn test_empty_key_and_empty_trie() {
        let empty = Trie::new();
        assert!(empty.is_empty());
        assert!(!empty.has_prefix(b""));
        assert!(empty.list_members(b"").is_empty());
        assert_eq!(empty.root_branches().count(), 0);

        let trie = Trie::from_keys(["", "a"]);
        assert_eq!(trie.len(), 2);
        assert!(trie.contains(b""));
        assert_eq!(trie.list_members(b"").len(), 2);
    }

    #[test]
    fn test_binary_keys() {
        let trie = Trie::from_keys([&b"\x00\xffkey"[..], &b"\x00\xfeother"[..]]);
        assert!(trie.has_prefix(b"\x00\xff"));
        assert_eq!(trie.list_members(b"\x00").len(), 2);
    }
}
