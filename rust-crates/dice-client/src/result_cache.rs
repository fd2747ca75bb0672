use crate::bet_result::FormattedBetResult;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tracing::{
    debug,
    warn,
};

pub const CACHE_KEY_PREFIX: &str = "lastBet@";
pub const CACHE_FILE: &str = "last_bets.json";

pub fn cache_key(account: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{account}")
}

/// String-keyed persistent storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: String) -> Result<()>;
}

/// All entries in one JSON object on disk.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CACHE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read(&self.path)
            .wrap_err_with(|| format!("Failed to read cache file {:?}", self.path))?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&data)
            .wrap_err_with(|| format!("Cache file {:?} is not a JSON object", self.path))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = ?self.path, "discarding unreadable cache file");
                BTreeMap::new()
            }
        };
        entries.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create cache directory {:?}", parent))?;
        }
        let json = serde_json::to_vec_pretty(&entries)
            .wrap_err("Failed to serialize cache entries")?;
        fs::write(&self.path, json)
            .wrap_err_with(|| format!("Failed to write cache file {:?}", self.path))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Arc<Mutex<HashMap<String, String>>> {
        self.entries.clone()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| eyre!("in-memory store lock poisoned"))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| eyre!("in-memory store lock poisoned"))?;
        guard.insert(key.to_string(), value);
        Ok(())
    }
}

/// Remembers the most recent settled wager per account.
#[derive(Clone, Debug)]
pub struct ResultCache<S> {
    store: S,
}

impl<S: KeyValueStore> ResultCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn save(&self, account: &str, result: &FormattedBetResult) -> Result<()> {
        let json =
            serde_json::to_string(result).wrap_err("Failed to serialize bet result")?;
        self.store.set(&cache_key(account), json)?;
        debug!(%account, "cached last bet");
        Ok(())
    }

    /// Anything missing or unreadable is reported as absent.
    pub fn load(&self, account: &str) -> Option<FormattedBetResult> {
        let raw = match self.store.get(&cache_key(account)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%account, error = %e, "failed to read result cache");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(%account, error = %e, "ignoring malformed cache entry");
                None
            }
        }
    }
}
