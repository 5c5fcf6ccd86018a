use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Node of a catalog taxonomy tree.
///
/// Built once from a [`TaxonomyDocument`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyNode {
    pub id: String,
    pub name: String,
    /// 0 for the vertical root, +1 per level below it.
    pub depth: u32,
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, depth: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            depth,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TaxonomyNode::node_count).sum::<usize>()
    }
}

/// Published taxonomy document (`taxonomy.json`).
#[derive(Debug, Deserialize)]
pub struct TaxonomyDocument {
    pub verticals: Vec<Vertical>,
}

/// A top-level vertical with its categories as a flat list.
#[derive(Debug, Deserialize)]
pub struct Vertical {
    pub name: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub children: Vec<CategoryRef>,
}

/// Child pointer inside a [`Category`]; resolved by id.
#[derive(Debug, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
}

impl TaxonomyDocument {
    pub fn from_json(json: &str) -> Result<Self, TaxonomyError> {
        serde_json::from_str(json).map_err(TaxonomyError::Parse)
    }

    pub fn vertical(&self, name: &str) -> Result<&Vertical, TaxonomyError> {
        self.verticals
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| TaxonomyError::VerticalNotFound(name.to_string()))
    }

    /// Rebuild the tree rooted at the named vertical.
    pub fn build_tree(&self, vertical: &str) -> Result<TaxonomyNode, TaxonomyError> {
        self.vertical(vertical)?.build_tree()
    }
}

impl Vertical {
    /// Resolve the flat category list into a tree rooted at the level-0 category.
    pub fn build_tree(&self) -> Result<TaxonomyNode, TaxonomyError> {
        let by_id: HashMap<&str, &Category> =
            self.categories.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut roots = self.categories.iter().filter(|c| c.level == 0);
        let root = match (roots.next(), roots.next()) {
            (Some(root), None) => root,
            (None, _) => return Err(TaxonomyError::MissingRoot(self.name.clone())),
            (Some(_), Some(_)) => return Err(TaxonomyError::MultipleRoots(self.name.clone())),
        };

        let mut visiting = HashSet::new();
        build_node(root, 0, &by_id, &mut visiting)
    }
}

fn build_node<'a>(
    category: &'a Category,
    depth: u32,
    by_id: &HashMap<&str, &'a Category>,
    visiting: &mut HashSet<&'a str>,
) -> Result<TaxonomyNode, TaxonomyError> {
    if category.level != depth {
        return Err(TaxonomyError::DepthMismatch {
            id: category.id.clone(),
            declared: category.level,
            actual: depth,
        });
    }
    if !visiting.insert(category.id.as_str()) {
        return Err(TaxonomyError::Cycle(category.id.clone()));
    }

    let mut sibling_names = HashSet::new();
    let mut children = Vec::with_capacity(category.children.len());
    for child in &category.children {
        let resolved = by_id
            .get(child.id.as_str())
            .copied()
            .ok_or_else(|| TaxonomyError::UnknownChild {
                parent: category.id.clone(),
                child: child.id.clone(),
            })?;
        if !sibling_names.insert(resolved.name.as_str()) {
            return Err(TaxonomyError::DuplicateSibling {
                parent: category.name.clone(),
                name: resolved.name.clone(),
            });
        }
        children.push(build_node(resolved, depth + 1, by_id, visiting)?);
    }

    visiting.remove(category.id.as_str());

    Ok(TaxonomyNode {
        id: category.id.clone(),
        name: category.name.clone(),
        depth,
        children,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Failed to parse taxonomy document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Vertical not found: {0}")]
    VerticalNotFound(String),

    #[error("Vertical '{0}' has no level-0 category")]
    MissingRoot(String),

    #[error("Vertical '{0}' has more than one level-0 category")]
    MultipleRoots(String),

    #[error("Category {parent} references unknown child {child}")]
    UnknownChild { parent: String, child: String },

    #[error("Category {id} declares level {declared} but sits at depth {actual}")]
    DepthMismatch { id: String, declared: u32, actual: u32 },

    #[error("Category {0} is its own ancestor")]
    Cycle(String),

    #[error("Category '{parent}' has two children named '{name}'")]
    DuplicateSibling { parent: String, name: String },
}
