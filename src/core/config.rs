use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,      // Root of the <db>/<collection>/<document>.json tree
    pub pretty_json: bool,          // Indent document files
    pub lock_storage: bool,         // Hold <storage_path>/.lock while open
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            pretty_json: true,
            lock_storage: true,
        }
    }
}

impl Config {
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    pub fn with_lock_storage(mut self, lock: bool) -> Self {
        self.lock_storage = lock;
        self
    }
}
