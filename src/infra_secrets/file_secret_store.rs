use crate::domain_port::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One file per secret under `dir`. A `/` in the secret name maps to `_`
/// in the file name, so `fintrack/jwt-kid` is read from `fintrack_jwt-kid`.
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSecretStore { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, SecretError> {
        let file_name = name.replace('/', "_");
        if file_name.is_empty() || file_name.starts_with('.') {
            return Err(SecretError::NotFound(name.to_string()));
        }
        Ok(self.dir.join(Path::new(&file_name)))
    }
}

#[async_trait::async_trait]
impl SecretStore for FileSecretStore {
    async fn fetch_secret(&self, name: &str) -> Result<String, SecretError> {
        let path = self.path_for(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SecretError::NotFound(name.to_string())),
            Err(e) => Err(SecretError::Store(format!("{}: {e}", path.display()))),
        }
    }
}
