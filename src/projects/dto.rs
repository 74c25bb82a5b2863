use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FolderList {
    pub folders: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub folder: String,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileContent {
    pub folder: String,
    pub path: String,
    pub content: String,
}

/// Differences between the owner's storage area and the registry.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileReport {
    /// On disk, but no record points at them.
    pub orphaned_folders: Vec<String>,
    /// Recorded, but the folder is gone.
    pub missing_folders: Vec<String>,
}
