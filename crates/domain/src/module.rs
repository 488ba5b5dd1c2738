use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tessera_core::{AppResult, NonEmptyString};

use crate::ModuleId;
use crate::role::{active_by_default, normalize_optional};

/// Navigable application area, also the unit permissions bind to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    id: ModuleId,
    name: NonEmptyString,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default = "active_by_default")]
    is_active: bool,
    #[serde(default)]
    parent_id: Option<ModuleId>,
    #[serde(default)]
    sort_order: i32,
}

impl Module {
    /// Creates an active root module with sort order zero.
    pub fn new(id: ModuleId, name: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            description: None,
            path: None,
            icon: None,
            is_active: true,
            parent_id: None,
            sort_order: 0,
        })
    }

    /// Sets the optional description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = normalize_optional(description);
        self
    }

    /// Sets the navigation path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_optional(Some(path.into()));
        self
    }

    /// Sets the navigation icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = normalize_optional(Some(icon.into()));
        self
    }

    /// Sets whether the module is active.
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Sets the declared parent module.
    #[must_use]
    pub fn with_parent(mut self, parent_id: Option<ModuleId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Sets the ordering value among siblings.
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Returns the module identifier.
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the navigation path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns the navigation icon, if any.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Returns whether the module is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the declared parent module.
    #[must_use]
    pub fn parent_id(&self) -> Option<ModuleId> {
        self.parent_id
    }

    /// Returns the ordering value among siblings.
    #[must_use]
    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }

    /// Navigation ordering: sort order, then name, then id.
    #[must_use]
    pub fn navigation_cmp(&self, other: &Self) -> Ordering {
        self.sort_order
            .cmp(&other.sort_order)
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Module with its children attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleNode {
    /// Module at this position of the tree.
    #[serde(flatten)]
    pub module: Module,
    /// Child modules in navigation order.
    pub children: Vec<ModuleNode>,
}

impl ModuleNode {
    /// Returns the number of modules in this subtree, including itself.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children.iter());
        }
        count
    }
}

// Module chains can be arbitrarily deep; tear the tree down without recursion.
impl Drop for ModuleNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Parent link that was cut while building a forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokenParentLink {
    /// Module promoted to root.
    pub module_id: ModuleId,
    /// Declared parent that closed a cycle.
    pub parent_id: ModuleId,
}

/// Forest of modules built from a flat listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleForest {
    roots: Vec<ModuleNode>,
    broken_links: Vec<BrokenParentLink>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Pending,
    OnPath,
    Done,
}

impl ModuleForest {
    /// Builds a forest from a flat module listing.
    ///
    /// A module whose parent is missing or inactive becomes a root. Parent
    /// cycles are cut at the link that closes them, promoting that module to
    /// root, so every input module appears exactly once. Duplicate ids keep
    /// the last listed module.
    #[must_use]
    pub fn build(modules: impl IntoIterator<Item = Module>) -> Self {
        let mut nodes: Vec<Module> = Vec::new();
        let mut index_by_id: HashMap<ModuleId, usize> = HashMap::new();
        for module in modules {
            match index_by_id.get(&module.id) {
                Some(&index) => nodes[index] = module,
                None => {
                    index_by_id.insert(module.id, nodes.len());
                    nodes.push(module);
                }
            }
        }

        let mut broken_links = Vec::new();
        let mut parents: Vec<Option<usize>> = nodes
            .iter()
            .enumerate()
            .map(|(index, module)| {
                let parent_id = module.parent_id?;
                let parent_index = *index_by_id.get(&parent_id)?;
                if parent_index == index {
                    broken_links.push(BrokenParentLink {
                        module_id: module.id,
                        parent_id,
                    });
                    return None;
                }
                nodes[parent_index].is_active.then_some(parent_index)
            })
            .collect();

        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by(|left, right| nodes[*left].navigation_cmp(&nodes[*right]));

        let mut visits = vec![Visit::Pending; nodes.len()];
        for &start in &order {
            let mut path: Vec<usize> = Vec::new();
            let mut current = start;
            loop {
                match visits[current] {
                    Visit::Done => break,
                    Visit::OnPath => {
                        if let Some(&last) = path.last() {
                            broken_links.push(BrokenParentLink {
                                module_id: nodes[last].id,
                                parent_id: nodes[current].id,
                            });
                            parents[last] = None;
                        }
                        break;
                    }
                    Visit::Pending => {
                        visits[current] = Visit::OnPath;
                        path.push(current);
                        match parents[current] {
                            Some(parent) => current = parent,
                            None => break,
                        }
                    }
                }
            }
            for index in path {
                visits[index] = Visit::Done;
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut root_indexes = Vec::new();
        for &index in &order {
            match parents[index] {
                Some(parent) => children[parent].push(index),
                None => root_indexes.push(index),
            }
        }

        let roots = assemble(&root_indexes, &nodes, &children);

        Self {
            roots,
            broken_links,
        }
    }

    /// Returns root modules in navigation order.
    #[must_use]
    pub fn roots(&self) -> &[ModuleNode] {
        &self.roots
    }

    /// Consumes the forest and returns its roots.
    #[must_use]
    pub fn into_roots(self) -> Vec<ModuleNode> {
        self.roots
    }

    /// Returns parent links cut to break cycles.
    #[must_use]
    pub fn broken_links(&self) -> &[BrokenParentLink] {
        &self.broken_links
    }

    /// Returns the number of modules in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.iter().map(ModuleNode::subtree_len).sum()
    }

    /// Returns whether the forest has no modules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Assembles nodes bottom-up with an explicit stack.
///
/// `order` is already sorted, so children inherit navigation order.
fn assemble(root_indexes: &[usize], nodes: &[Module], children: &[Vec<usize>]) -> Vec<ModuleNode> {
    let mut built: Vec<Option<ModuleNode>> = vec![None; nodes.len()];
    let mut stack: Vec<(usize, bool)> = root_indexes
        .iter()
        .rev()
        .map(|index| (*index, false))
        .collect();

    while let Some((index, expanded)) = stack.pop() {
        if expanded {
            let node_children = children[index]
                .iter()
                .filter_map(|child| built[*child].take())
                .collect();
            built[index] = Some(ModuleNode {
                module: nodes[index].clone(),
                children: node_children,
            });
        } else {
            stack.push((index, true));
            stack.extend(children[index].iter().map(|child| (*child, false)));
        }
    }

    root_indexes
        .iter()
        .filter_map(|index| built[*index].take())
        .collect()
}
