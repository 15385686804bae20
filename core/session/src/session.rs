//! Drive session: the authenticated gateway for file operations.

use serde::{Deserialize, Serialize};

use cirrusdrive_common::{Error, ItemId, Result};
use cirrusdrive_graph::{DriveItem, GraphClient};

use crate::nav::{Crumb, NavigationStack};

/// A file or folder as presented to the interface layer.
///
/// Produced fresh on every listing and immutable once returned; nothing is
/// cached across renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub size: Option<u64>,
}

impl From<DriveItem> for DirectoryEntry {
    fn from(item: DriveItem) -> Self {
        let is_folder = item.is_folder();
        Self {
            id: item.id,
            name: item.name,
            is_folder,
            size: item.size,
        }
    }
}

/// An authenticated drive session scoped to a current folder.
///
/// Owns the token state (through its client) and the navigation stack;
/// every remote operation goes through the same authenticated request path.
/// Navigation methods take `&mut self`, so operations on one session are
/// serialized by ownership.
pub struct DriveSession {
    client: GraphClient,
    nav: NavigationStack,
}

impl DriveSession {
    /// Create a session positioned at the drive root.
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            nav: NavigationStack::new(),
        }
    }

    /// Id of the current folder.
    pub fn current_folder_id(&self) -> &ItemId {
        &self.nav.current().id
    }

    /// Human-readable location, for display after every operation.
    pub fn current_path(&self) -> String {
        self.nav.path_display()
    }

    /// Breadcrumbs from root to the current folder.
    pub fn breadcrumbs(&self) -> &[Crumb] {
        self.nav.crumbs()
    }

    /// Fetch the children of the current folder.
    ///
    /// Always a fresh remote fetch. The result is ordered with folders
    /// first, then case-insensitively by name; the interface layer relies
    /// on this ordering.
    pub async fn list_current(&self) -> Result<Vec<DirectoryEntry>> {
        let items = self
            .client
            .list_children(self.nav.current().id.as_str())
            .await?;

        let mut entries: Vec<DirectoryEntry> = items.into_iter().map(Into::into).collect();
        entries.sort_by(|a, b| {
            b.is_folder
                .cmp(&a.is_folder)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        Ok(entries)
    }

    /// Enter a folder. The listing is not refreshed here; call
    /// [`DriveSession::list_current`] afterwards.
    ///
    /// # Errors
    /// - `InvalidInput` if the entry is not a folder; the stack is untouched
    pub fn enter_folder(&mut self, entry: &DirectoryEntry) -> Result<()> {
        if !entry.is_folder {
            return Err(Error::InvalidInput(format!("Not a folder: {}", entry.name)));
        }

        self.nav.push(ItemId::new(entry.id.as_str()), entry.name.as_str());
        tracing::debug!(folder = %entry.name, "Entered folder");
        Ok(())
    }

    /// Leave the current folder; a no-op at the root. Returns the new
    /// current folder id.
    pub fn go_back(&mut self) -> &ItemId {
        &self.nav.pop().id
    }

    /// Jump back to the drive root.
    pub fn reset_to_root(&mut self) {
        self.nav.reset_to_root();
    }

    /// Create a folder under the current folder. On a name collision the
    /// remote renames the new folder; the returned entry carries the name
    /// actually assigned.
    pub async fn create_folder(&self, name: &str) -> Result<DirectoryEntry> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Folder name cannot be empty".to_string(),
            ));
        }

        let item = self
            .client
            .create_folder(self.nav.current().id.as_str(), name)
            .await?;
        Ok(item.into())
    }

    /// Delete an item anywhere in the drive by its absolute id.
    pub async fn delete_item(&self, item_id: &str) -> Result<()> {
        self.client.delete_item(item_id).await
    }

    /// Upload raw bytes as a named file into the current folder, with the
    /// same rename-on-collision behavior as [`DriveSession::create_folder`].
    pub async fn upload_file(&self, data: Vec<u8>, filename: &str) -> Result<DirectoryEntry> {
        if filename.trim().is_empty() {
            return Err(Error::InvalidInput("Filename cannot be empty".to_string()));
        }

        let item = self
            .client
            .upload(self.nav.current().id.as_str(), filename, data)
            .await?;
        Ok(item.into())
    }

    /// Download the raw content of an item. Persisting it to local storage
    /// is the caller's concern.
    pub async fn download_file(&self, item_id: &str) -> Result<Vec<u8>> {
        self.client.download(item_id).await
    }
}
