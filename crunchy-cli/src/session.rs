use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

pub const CONFIG_DIR_ENV: &str = "CRUNCHY_CLI_CONFIG_DIR";
const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Session {
    Credentials { username: String, password: String },
    RefreshToken { token: String },
}

impl Session {
    /// Parses `USER:PASSWORD`. The password itself may contain more colons.
    pub fn from_credentials(s: &str) -> Result<Self> {
        let Some((username, password)) = s.split_once(':') else {
            bail!("credentials must be given as USER:PASSWORD.");
        };

        if username.trim().is_empty() {
            bail!("credentials are missing the user name.");
        }

        Ok(Self::Credentials {
            username: username.trim().to_owned(),
            password: password.to_owned(),
        })
    }

    pub fn from_refresh_token(token: &str) -> Result<Self> {
        let token = token.trim();

        if token.is_empty() {
            bail!("refresh token cannot be empty.");
        }

        Ok(Self::RefreshToken {
            token: token.to_owned(),
        })
    }

    /// Human readable description which never contains the secret.
    pub fn describe(&self) -> String {
        match self {
            Self::Credentials { username, .. } => format!("user {}", username),
            Self::RefreshToken { .. } => "refresh token".to_owned(),
        }
    }
}

pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new<T: Into<PathBuf>>(dir: T) -> Self {
        Self { dir: dir.into() }
    }

    /// `$CRUNCHY_CLI_CONFIG_DIR` or the platform config directory.
    pub fn locate() -> Result<Self> {
        if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|x| !x.is_empty()) {
            return Ok(Self::new(dir));
        }

        let dirs = ProjectDirs::from("", "", "crunchy-cli")
            .ok_or_else(|| anyhow!("could not determine a config directory, set {}.", CONFIG_DIR_ENV))?;
        Ok(Self::new(dirs.config_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn load(&self) -> Result<Option<Session>> {
        let path = self.path();

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("could not read {}", path.display())),
        };

        let session = serde_json::from_slice(&data)
            .with_context(|| format!("could not deserialize session from {}", path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("could not create {}", self.dir.display()))?;

        let path = self.path();
        let mut file = open_private(&path)
            .with_context(|| format!("could not write {}", path.display()))?;
        serde_json::to_writer_pretty(&mut file, session)?;
        file.flush()?;
        Ok(())
    }

    /// Returns false if there was no stored session.
    pub fn remove(&self) -> Result<bool> {
        let path = self.path();

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("could not delete {}", path.display())),
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}
