pub mod filesystem;

pub use filesystem::{validate_file_name, ArtifactStore, UploadStore};
