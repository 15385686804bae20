//! Folder navigation stack.

use cirrusdrive_common::ItemId;

/// Separator between folder names in the displayed path.
const PATH_SEPARATOR: &str = " / ";
/// Displayed name of the drive root.
const ROOT_NAME: &str = "Root";

/// One level of the navigation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: ItemId,
    pub name: String,
}

/// Path from the drive root to the current folder.
///
/// The root is always the first element and the stack is never empty; the
/// last element is the current folder.
#[derive(Debug, Clone)]
pub struct NavigationStack {
    crumbs: Vec<Crumb>,
}

impl NavigationStack {
    /// Create a stack positioned at the drive root.
    pub fn new() -> Self {
        Self {
            crumbs: vec![Crumb {
                id: ItemId::root(),
                name: ROOT_NAME.to_string(),
            }],
        }
    }

    /// Enter a folder. Callers must only push ids that identify folders.
    pub fn push(&mut self, id: ItemId, name: impl Into<String>) {
        self.crumbs.push(Crumb {
            id,
            name: name.into(),
        });
    }

    /// Leave the current folder; at the root this is a no-op. Returns the
    /// new current crumb.
    pub fn pop(&mut self) -> &Crumb {
        if self.crumbs.len() > 1 {
            self.crumbs.pop();
        }
        self.current()
    }

    /// Jump back to the drive root.
    pub fn reset_to_root(&mut self) {
        self.crumbs.truncate(1);
    }

    /// The current folder crumb.
    pub fn current(&self) -> &Crumb {
        self.crumbs.last().expect("navigation stack is never empty")
    }

    /// Number of levels, including the root.
    pub fn depth(&self) -> usize {
        self.crumbs.len()
    }

    /// All crumbs from root to current.
    pub fn crumbs(&self) -> &[Crumb] {
        &self.crumbs
    }

    /// Human-readable path: folder names joined root-to-current, with the
    /// root itself shown as "Root" only at the top level.
    pub fn path_display(&self) -> String {
        if self.crumbs.len() == 1 {
            ROOT_NAME.to_string()
        } else {
            self.crumbs[1..]
                .iter()
                .map(|crumb| crumb.name.as_str())
                .collect::<Vec<_>>()
                .join(PATH_SEPARATOR)
        }
    }
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new()
    }
}
