use std::path::PathBuf;

/// A file received in a multipart request, held in memory until persisted.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A file written under the uploads directory, not yet referenced by a row.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub original_name: String,
    pub stored_name: String,
    pub path: PathBuf,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
}
