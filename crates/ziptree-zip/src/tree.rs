//! Directory tree view over an archive.
//!
//! [`ArchiveTree`] rebuilds the hierarchy implied by the `/`-separated entry
//! names. File nodes keep a reference to the shared [`ArchiveIndex`] and
//! inflate their bytes the first time they are asked for, caching the
//! result. Nodes can be replaced, renamed and added, and the whole tree can
//! be serialized back into a new archive.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::io::Write;
use std::ops::Index;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use ziptree_codec::{Progress, SharedCodec};

use crate::entry::CentralDirectoryEntry;
use crate::index::ArchiveIndex;
use crate::writer::ArchiveWriter;
use crate::{Error, Result};

/// A node in the tree: a directory or a file.
#[derive(Debug, Clone)]
pub enum Node {
    Directory(Directory),
    File(FileNode),
}

impl Node {
    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn as_dir(&self) -> Option<&Directory> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut Directory> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Self::File(file) => Some(file),
            Self::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileNode> {
        match self {
            Self::File(file) => Some(file),
            Self::Directory(_) => None,
        }
    }
}

impl From<Directory> for Node {
    fn from(dir: Directory) -> Self {
        Self::Directory(dir)
    }
}

impl From<FileNode> for Node {
    fn from(file: FileNode) -> Self {
        Self::File(file)
    }
}

/// A directory: named children, kept sorted by name.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    children: BTreeMap<String, Node>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of direct children.
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Get a direct child by name.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(name)
    }

    /// Direct children keyed by name.
    #[inline]
    pub fn children(&self) -> &BTreeMap<String, Node> {
        &self.children
    }

    /// Iterate over direct children in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Node> {
        self.children.iter()
    }

    /// Child names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.children.keys().map(String::as_str)
    }

    /// Insert or replace a direct child, returning the previous node.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        self.children.insert(name.into(), node.into())
    }

    /// Remove a direct child.
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }

    /// Move a child to a new name within this directory.
    ///
    /// Fails if `from` does not exist or `to` is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return if self.contains(from) {
                Ok(())
            } else {
                Err(Error::EntryNotFound(from.to_string()))
            };
        }
        if to.is_empty() || to.contains('/') {
            return Err(Error::InvalidName(to.to_string()));
        }
        if self.contains(to) {
            return Err(Error::PathConflict(to.to_string()));
        }

        let node = self
            .children
            .remove(from)
            .ok_or_else(|| Error::EntryNotFound(from.to_string()))?;
        self.children.insert(to.to_string(), node);
        Ok(())
    }

    /// Resolve a `/`-separated path relative to this directory.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let mut node = self.children.get(parts.next()?)?;
        for part in parts {
            node = node.as_dir()?.children.get(part)?;
        }
        Some(node)
    }

    pub fn lookup_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let mut node = self.children.get_mut(parts.next()?)?;
        for part in parts {
            node = node.as_dir_mut()?.children.get_mut(part)?;
        }
        Some(node)
    }

    /// Insert a node at a `/`-separated path, creating missing directories.
    ///
    /// Fails if an intermediate component is a file. Returns the node that
    /// was replaced, if any.
    pub fn insert_path(&mut self, path: &str, node: impl Into<Node>) -> Result<Option<Node>> {
        let mut parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        let name = parts.pop().ok_or_else(|| Error::InvalidName(path.to_string()))?;
        let parent = self.ensure_dirs(&parts, path)?;
        Ok(parent.insert(name, node))
    }

    /// Every file below this directory with its full path, depth first.
    pub fn files(&self) -> Vec<(String, &FileNode)> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    fn collect_files<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a FileNode)>) {
        for (name, node) in &self.children {
            match node {
                Node::File(file) => out.push((format!("{prefix}{name}"), file)),
                Node::Directory(dir) => dir.collect_files(&format!("{prefix}{name}/"), out),
            }
        }
    }

    fn ensure_dirs(&mut self, parts: &[&str], path: &str) -> Result<&mut Directory> {
        let mut dir = self;
        for part in parts {
            let node = dir
                .children
                .entry((*part).to_string())
                .or_insert_with(|| Node::Directory(Directory::new()));
            dir = match node {
                Node::Directory(child) => child,
                Node::File(_) => return Err(Error::PathConflict(path.to_string())),
            };
        }
        Ok(dir)
    }
}

impl Index<&str> for Directory {
    type Output = Node;

    /// Get a direct child by name.
    ///
    /// # Panics
    ///
    /// Panics if there is no child with that name.
    fn index(&self, name: &str) -> &Node {
        match self.children.get(name) {
            Some(node) => node,
            None => panic!("no entry named {name:?}"),
        }
    }
}

impl<'a> IntoIterator for &'a Directory {
    type Item = (&'a String, &'a Node);
    type IntoIter = btree_map::Iter<'a, String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}

enum Content {
    Memory(Arc<[u8]>),
    Archived {
        index: Arc<ArchiveIndex>,
        entry: CentralDirectoryEntry,
        cache: Mutex<Option<Arc<[u8]>>>,
    },
}

/// A file: either bytes held in memory or an archive entry that is
/// inflated on first access.
pub struct FileNode {
    content: Content,
}

impl FileNode {
    /// A file with the given contents.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            content: Content::Memory(data.into()),
        }
    }

    /// A file backed by an archive entry.
    pub fn archived(index: Arc<ArchiveIndex>, entry: CentralDirectoryEntry) -> Self {
        Self {
            content: Content::Archived {
                index,
                entry,
                cache: Mutex::new(None),
            },
        }
    }

    /// The archive entry backing this file, if any.
    pub fn entry(&self) -> Option<&CentralDirectoryEntry> {
        match &self.content {
            Content::Archived { entry, .. } => Some(entry),
            Content::Memory(_) => None,
        }
    }

    /// Whether the bytes are available without inflating.
    pub fn is_loaded(&self) -> bool {
        match &self.content {
            Content::Memory(_) => true,
            Content::Archived { cache, .. } => cache.lock().is_some(),
        }
    }

    /// Uncompressed size, known without inflating.
    pub fn size(&self) -> u64 {
        match &self.content {
            Content::Memory(data) => data.len() as u64,
            Content::Archived { entry, .. } => u64::from(entry.uncompressed_size()),
        }
    }

    /// The file's bytes.
    ///
    /// Archived files are inflated once; later calls return the cached
    /// bytes. A failed inflate leaves the cache empty so it can be retried.
    pub fn content(&self) -> Result<Arc<[u8]>> {
        self.content_with_progress(None)
    }

    /// The file's bytes, reporting inflate progress when not yet cached.
    ///
    /// The node's cache stays locked while `progress` runs, so the callback
    /// must not touch this node (`content`, `is_loaded`, `Debug`) or it
    /// deadlocks.
    pub fn content_with_progress(&self, progress: Option<Progress<'_>>) -> Result<Arc<[u8]>> {
        match &self.content {
            Content::Memory(data) => Ok(Arc::clone(data)),
            Content::Archived {
                index,
                entry,
                cache,
            } => {
                let mut cache = cache.lock();
                if let Some(data) = cache.as_ref() {
                    return Ok(Arc::clone(data));
                }

                let data: Arc<[u8]> = index.inflate_with_progress(entry, progress)?.into();
                *cache = Some(Arc::clone(&data));
                Ok(data)
            }
        }
    }

    /// Replace the contents, detaching the node from its archive.
    pub fn set_content(&mut self, data: impl Into<Arc<[u8]>>) {
        self.content = Content::Memory(data.into());
    }
}

impl Clone for FileNode {
    fn clone(&self) -> Self {
        let content = match &self.content {
            Content::Memory(data) => Content::Memory(Arc::clone(data)),
            Content::Archived {
                index,
                entry,
                cache,
            } => Content::Archived {
                index: Arc::clone(index),
                entry: entry.clone(),
                cache: Mutex::new(cache.lock().clone()),
            },
        };
        Self { content }
    }
}

impl fmt::Debug for FileNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("FileNode");
        if let Some(entry) = self.entry() {
            s.field("entry", &entry.name());
        }
        s.field("size", &self.size())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// The directory tree of an archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveTree {
    root: Directory,
}

impl ArchiveTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an archive and build its tree, using the default codec.
    pub fn open(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_index(Arc::new(ArchiveIndex::open(data)?))
    }

    /// Parse an archive and build its tree with a specific codec.
    pub fn open_with_codec(data: impl Into<Arc<[u8]>>, codec: SharedCodec) -> Result<Self> {
        Self::from_index(Arc::new(ArchiveIndex::open_with_codec(data, codec)?))
    }

    /// Build the tree of a parsed archive.
    ///
    /// Entries whose name ends in `/` are skipped; directories are implied
    /// by file paths. Nothing is inflated. A path that is both a file and a
    /// directory, or a file name stored twice, aborts the whole build.
    pub fn from_index(index: Arc<ArchiveIndex>) -> Result<Self> {
        let mut root = Directory::new();

        for entry in index.entries() {
            if entry.is_dir() {
                continue;
            }

            let mut parts: Vec<&str> = entry.components().collect();
            let Some(name) = parts.pop() else {
                continue;
            };

            let parent = root.ensure_dirs(&parts, entry.name())?;
            match parent.children.entry(name.to_string()) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(Node::File(FileNode::archived(Arc::clone(&index), entry.clone())));
                }
                btree_map::Entry::Occupied(_) => {
                    return Err(Error::PathConflict(entry.name().to_string()));
                }
            }
        }

        debug!("Built tree with {} top-level nodes", root.len());
        Ok(Self { root })
    }

    /// The root directory.
    #[inline]
    pub fn root(&self) -> &Directory {
        &self.root
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut Directory {
        &mut self.root
    }

    pub fn into_root(self) -> Directory {
        self.root
    }

    /// Resolve a `/`-separated path from the root.
    pub fn get(&self, path: &str) -> Option<&Node> {
        self.root.lookup(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.root.lookup_mut(path)
    }

    /// The file at `path`.
    pub fn file(&self, path: &str) -> Result<&FileNode> {
        self.get(path)
            .and_then(Node::as_file)
            .ok_or_else(|| Error::EntryNotFound(path.to_string()))
    }

    /// Add or replace a file, creating missing directories.
    pub fn insert_file(&mut self, path: &str, data: impl Into<Arc<[u8]>>) -> Result<()> {
        if self.get(path).is_some_and(Node::is_dir) {
            return Err(Error::PathConflict(path.to_string()));
        }
        self.root.insert_path(path, FileNode::new(data))?;
        Ok(())
    }

    /// Every file with its full path, depth first in name order.
    pub fn files(&self) -> Vec<(String, &FileNode)> {
        self.root.files()
    }

    /// Serialize the tree into a new archive, using the default codec.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.serialize_with_codec(ziptree_codec::default_codec())
    }

    pub fn serialize_with_codec(&self, codec: SharedCodec) -> Result<Vec<u8>> {
        self.write_to(Vec::new(), codec)
    }

    /// Serialize the tree into any writer, returning it when done.
    pub fn write_to<W: Write>(&self, writer: W, codec: SharedCodec) -> Result<W> {
        let mut writer = ArchiveWriter::with_codec(writer, codec);
        writer.add_directory(&self.root, "")?;
        writer.finish()
    }
}

impl From<Directory> for ArchiveTree {
    fn from(root: Directory) -> Self {
        Self { root }
    }
}

impl Index<&str> for ArchiveTree {
    type Output = Node;

    fn index(&self, name: &str) -> &Node {
        &self.root[name]
    }
}
