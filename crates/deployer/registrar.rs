use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::types::DeploymentRecord;

#[derive(Debug, thiserror::Error)]
pub enum RegistrarError {
    #[error("Deployment store IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Failed to (de)serialize deployment {name}: {source}")]
    Json {
        name: String,
        source: serde_json::Error,
    },
    #[error("Invalid deployment name `{0}`")]
    InvalidName(String),
}

/// Persistence of confirmed deployments, keyed by name.
pub trait DeploymentRegistrar: Send + Sync {
    /// Overwrites any previous record under the same name.
    fn save(&self, record: &DeploymentRecord) -> Result<(), RegistrarError>;

    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, RegistrarError>;

    /// Every record, sorted by name.
    fn all(&self) -> Result<Vec<DeploymentRecord>, RegistrarError>;
}

/// One pretty-printed JSON file per deployment under `<deployments-dir>/<network>/`.
#[derive(Debug, Clone)]
pub struct FileRegistrar {
    dir: PathBuf,
}

impl FileRegistrar {
    pub fn new(deployments_dir: impl AsRef<Path>, network: &str) -> Self {
        Self {
            dir: deployments_dir.as_ref().join(network),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> Result<PathBuf, RegistrarError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(RegistrarError::InvalidName(name.to_owned()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn read(path: &Path, name: &str) -> Result<DeploymentRecord, RegistrarError> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|source| RegistrarError::Json {
            name: name.to_owned(),
            source,
        })
    }
}

impl DeploymentRegistrar for FileRegistrar {
    fn save(&self, record: &DeploymentRecord) -> Result<(), RegistrarError> {
        let path = self.path(&record.name)?;
        fs::create_dir_all(&self.dir)?;
        let json =
            serde_json::to_string_pretty(record).map_err(|source| RegistrarError::Json {
                name: record.name.clone(),
                source,
            })?;
        fs::write(&path, format!("{json}\n"))?;
        debug!(name = %record.name, path = %path.display(), "Saved deployment");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<DeploymentRecord>, RegistrarError> {
        let path = self.path(name)?;
        match Self::read(&path, name) {
            Ok(record) => Ok(Some(record)),
            Err(RegistrarError::IO(err)) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn all(&self) -> Result<Vec<DeploymentRecord>, RegistrarError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            records.push(Self::read(&path, name)?);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timelocks_common::{Address, H256};

    fn record(name: &str, byte: u8) -> DeploymentRecord {
        DeploymentRecord {
            name: name.to_owned(),
            address: Address::repeat_byte(byte),
            transaction_hash: H256::repeat_byte(byte),
            receipt: None,
            args: None,
        }
    }

    #[test]
    fn saves_and_reads_back_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let registrar = FileRegistrar::new(dir.path(), "goerli");

        assert!(registrar.get("TimelockFactory").unwrap().is_none());
        registrar.save(&record("TimelockFactory", 0xfa)).unwrap();

        let saved = registrar.get("TimelockFactory").unwrap().unwrap();
        assert_eq!(saved.address, Address::repeat_byte(0xfa));
        assert!(dir.path().join("goerli/TimelockFactory.json").exists());
    }

    #[test]
    fn stores_lower_case_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let registrar = FileRegistrar::new(dir.path(), "goerli");
        registrar.save(&record("Timelock-x-1", 0xab)).unwrap();

        let raw = fs::read_to_string(dir.path().join("goerli/Timelock-x-1.json")).unwrap();
        assert!(raw.contains("0xabababababababababababababababababababab"));
        assert!(!raw.contains("0xAB"));
    }

    #[test]
    fn lists_sorted_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let registrar = FileRegistrar::new(dir.path(), "goerli");
        assert!(registrar.all().unwrap().is_empty());

        registrar.save(&record("Timelock-b", 2)).unwrap();
        registrar.save(&record("Timelock-a", 1)).unwrap();
        fs::write(registrar.dir().join(".chainId"), "5").unwrap();

        let names: Vec<_> = registrar
            .all()
            .unwrap()
            .into_iter()
            .map(|record| record.name)
            .collect();
        assert_eq!(names, vec!["Timelock-a", "Timelock-b"]);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let registrar = FileRegistrar::new(dir.path(), "goerli");
        let err = registrar.save(&record("../escape", 1)).unwrap_err();
        assert!(matches!(err, RegistrarError::InvalidName(_)));
    }
}
