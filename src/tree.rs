use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::errors::{PlayerError, PlayerResult};
use crate::models::RemoteEntry;
use crate::notify::{Notice, Notifier};
use crate::services::webdav::DirectoryLister;

/// Handle to a node of a [`FileTree`]. Ids are never reused, so an id
/// kept across a re-expansion simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub entry: RemoteEntry,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Children have been fetched at least once
    loaded: bool,
    /// Children are shown
    expanded: bool,
}

impl TreeNode {
    fn new(entry: RemoteEntry, parent: Option<NodeId>) -> Self {
        Self {
            entry,
            parent,
            children: Vec::new(),
            loaded: false,
            expanded: false,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Directories show an expand indicator before their children are known
    pub fn is_expandable(&self) -> bool {
        self.entry.is_directory
    }
}

/// One line of the rendered tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: NodeId,
    pub depth: usize,
    pub display_name: String,
    pub is_directory: bool,
    pub expanded: bool,
}

/// Local mirror of the part of the remote tree the user has opened
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: HashMap<NodeId, TreeNode>,
    root: NodeId,
    next_id: u64,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTree {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, TreeNode::new(RemoteEntry::root(), None));

        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Child ids of a node, empty until its first expansion
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children()).unwrap_or(&[])
    }

    /// Entries of a node's children, in listing order
    pub fn child_entries(&self, id: NodeId) -> Vec<&RemoteEntry> {
        self.children(id)
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .map(|node| &node.entry)
            .collect()
    }

    /// Looks up a loaded node by its decoded relative path
    pub fn find_by_path(&self, relative_path: &str) -> Option<NodeId> {
        let wanted = relative_path.trim_matches('/');
        self.nodes
            .iter()
            .find(|(_, node)| node.entry.relative_path.trim_matches('/') == wanted)
            .map(|(id, _)| *id)
    }

    /// Discards the current children of `id` (and their subtrees) and
    /// attaches one fresh child per entry
    pub fn replace_children(&mut self, id: NodeId, entries: Vec<RemoteEntry>) -> PlayerResult<()> {
        let old_children = match self.nodes.get_mut(&id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return Err(PlayerError::invalid_argument("Unknown tree node")),
        };
        for child in old_children {
            self.remove_subtree(child);
        }

        let mut new_children = Vec::with_capacity(entries.len());
        for entry in entries {
            let child_id = NodeId(self.next_id);
            self.next_id += 1;
            self.nodes.insert(child_id, TreeNode::new(entry, Some(id)));
            new_children.push(child_id);
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = new_children;
            node.loaded = true;
            node.expanded = true;
        }
        Ok(())
    }

    /// Hides a node's children without discarding them
    pub fn collapse(&mut self, id: NodeId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if node.expanded => {
                node.expanded = false;
                true
            }
            _ => false,
        }
    }

    /// Depth-first rows below the root; only expanded directories
    /// contribute their children
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        self.collect_rows(self.root, 0, &mut rows);
        rows
    }

    fn collect_rows(&self, id: NodeId, depth: usize, rows: &mut Vec<VisibleRow>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if id != self.root && !node.expanded {
            return;
        }

        for child_id in &node.children {
            if let Some(child) = self.nodes.get(child_id) {
                rows.push(VisibleRow {
                    id: *child_id,
                    depth,
                    display_name: child.entry.display_name.clone(),
                    is_directory: child.entry.is_directory,
                    expanded: child.expanded,
                });
                self.collect_rows(*child_id, depth + 1, rows);
            }
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }
}

/// Expands tree nodes on demand, one remote listing per expansion
#[derive(Debug, Clone)]
pub struct TreeSynchronizer<L: DirectoryLister> {
    lister: L,
}

impl<L: DirectoryLister> TreeSynchronizer<L> {
    pub fn new(lister: L) -> Self {
        Self { lister }
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    /// Fetches the children of a directory node and replaces the previous
    /// ones. Grandchildren are never prefetched.
    ///
    /// On failure the existing children are left untouched, the error is
    /// logged and exactly one notice is sent. Returns the number of children.
    pub async fn expand(
        &self,
        tree: &mut FileTree,
        id: NodeId,
        notifier: &dyn Notifier,
    ) -> PlayerResult<usize> {
        let node = tree
            .node(id)
            .ok_or_else(|| PlayerError::invalid_argument("Unknown tree node"))?;

        if !node.entry.is_directory {
            return Err(PlayerError::NotADirectory {
                path: node.entry.relative_path.clone(),
            });
        }

        let path = node.entry.relative_path.clone();
        debug!("Navigating to directory: '{}'", path);

        match self.lister.list(&path).await {
            Ok(entries) => {
                let count = entries.len();
                tree.replace_children(id, entries)?;
                info!("File list retrieved for '{}': {} entries", path, count);
                Ok(count)
            }
            Err(e) => {
                error!("Failed to get file list for '{}': {}", path, e);
                notifier.notify(Notice::from_error(&e));
                Err(e)
            }
        }
    }

    /// Expands the root node
    pub async fn expand_root(
        &self,
        tree: &mut FileTree,
        notifier: &dyn Notifier,
    ) -> PlayerResult<usize> {
        let root = tree.root();
        self.expand(tree, root, notifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingNotifier, StaticLister};

    fn lister() -> StaticLister {
        StaticLister::new()
            .with_listing("", &["Videos/", "notes.txt"])
            .with_listing("Videos/", &["Videos/Movie.mp4", "Videos/Clips/"])
            .with_listing("Videos/Clips/", &["Videos/Clips/a.mkv"])
    }

    #[tokio::test]
    async fn test_root_expansion_is_lazy() {
        let lister = lister();
        let sync = TreeSynchronizer::new(lister.clone());
        let notifier = RecordingNotifier::new();
        let mut tree = FileTree::new();

        let count = sync.expand_root(&mut tree, &notifier).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(lister.calls(), 1);

        let videos = tree.find_by_path("Videos/").unwrap();
        let videos_node = tree.node(videos).unwrap();
        assert!(videos_node.is_expandable());
        assert!(!videos_node.is_loaded());
        assert!(tree.children(videos).is_empty());
    }

    #[tokio::test]
    async fn test_reexpansion_replaces_children() {
        let sync = TreeSynchronizer::new(lister());
        let notifier = RecordingNotifier::new();
        let mut tree = FileTree::new();

        sync.expand_root(&mut tree, &notifier).await.unwrap();
        let videos = tree.find_by_path("Videos/").unwrap();
        sync.expand(&mut tree, videos, &notifier).await.unwrap();
        let clips = tree.find_by_path("Videos/Clips/").unwrap();
        sync.expand(&mut tree, clips, &notifier).await.unwrap();
        assert_eq!(tree.len(), 1 + 2 + 2 + 1);

        // Re-expanding Videos drops the Clips subtree that was loaded below it
        sync.expand(&mut tree, videos, &notifier).await.unwrap();
        assert_eq!(tree.len(), 1 + 2 + 2);
        assert!(tree.node(clips).is_none());
        assert!(tree.find_by_path("Videos/Clips/a.mkv").is_none());
    }

    #[tokio::test]
    async fn test_expanding_file_is_rejected() {
        let lister = lister();
        let sync = TreeSynchronizer::new(lister.clone());
        let notifier = RecordingNotifier::new();
        let mut tree = FileTree::new();

        sync.expand_root(&mut tree, &notifier).await.unwrap();
        let notes = tree.find_by_path("notes.txt").unwrap();
        let err = sync.expand(&mut tree, notes, &notifier).await.unwrap_err();

        assert!(matches!(err, PlayerError::NotADirectory { .. }));
        assert_eq!(lister.calls(), 1);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_visible_rows_follow_expansion() {
        let sync = TreeSynchronizer::new(lister());
        let notifier = RecordingNotifier::new();
        let mut tree = FileTree::new();

        sync.expand_root(&mut tree, &notifier).await.unwrap();
        let videos = tree.find_by_path("Videos/").unwrap();
        sync.expand(&mut tree, videos, &notifier).await.unwrap();

        let rows: Vec<_> = tree
            .visible_rows()
            .into_iter()
            .map(|r| (r.depth, r.display_name))
            .collect();
        assert_eq!(
            rows,
            vec![
                (0, "Videos/".to_string()),
                (1, "Movie.mp4".to_string()),
                (1, "Clips/".to_string()),
                (0, "notes.txt".to_string()),
            ]
        );

        assert!(tree.collapse(videos));
        assert_eq!(tree.visible_rows().len(), 2);
        // Collapsing keeps the loaded children
        assert_eq!(tree.children(videos).len(), 2);
    }

    #[test]
    fn test_new_tree_is_empty() {
        let tree = FileTree::new();
        assert!(tree.is_empty());
        assert!(tree.visible_rows().is_empty());
        assert!(tree.node(tree.root()).unwrap().entry.is_root());
    }
}
