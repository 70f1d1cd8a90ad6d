use crate::error::LauncherError;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

/// Variables a shell maintains for itself; importing them from a sourced
/// script's environment dump would leak the setup shell's state.
const SHELL_INTERNAL_VARS: &[&str] = &["_", "SHLVL", "PWD", "OLDPWD"];

/// Owned snapshot of a process environment
///
/// The launcher reads the live environment exactly once and threads this
/// snapshot through every step, the child receives it explicitly. Names and
/// values are kept as raw OS strings so nothing is lost on the way to the
/// child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

#[cfg(unix)]
fn os_string(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn os_string(bytes: &[u8]) -> OsString {
    String::from_utf8_lossy(bytes).into_owned().into()
}

impl Environment {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        std::env::vars_os().collect()
    }

    /// Value of `key` if it is set and valid unicode
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_os(key).and_then(OsStr::to_str)
    }

    pub fn get_os(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    /// Value of `key` only if it is set and non-empty
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn set<K: Into<OsString>, V: Into<OsString>>(&mut self, key: K, value: V) {
        self.vars.insert(key.into(), value.into());
    }

    /// Adopt the environment a sourced script ended with.
    ///
    /// `sourced` replaces this snapshot, so variables the script unset are
    /// gone afterwards. Shell-internal variables are never part of a dump
    /// and keep their value from before sourcing.
    pub fn apply_sourced(&mut self, sourced: Environment) {
        let mut vars = sourced.vars;
        for name in SHELL_INTERNAL_VARS {
            if let Some(value) = self.vars.remove(OsStr::new(name)) {
                vars.insert(OsString::from(*name), value);
            }
        }
        self.vars = vars;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &OsStr> {
        self.vars.keys().map(OsString::as_os_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Parse the NUL-separated output of `env -0` as produced after sourcing
    /// a setup script. Shell-internal variables are dropped.
    pub fn from_env_dump(dump: &[u8]) -> Result<Self, LauncherError> {
        let mut env = Environment::default();

        for entry in dump.split(|b| *b == 0).filter(|entry| !entry.is_empty()) {
            let split = entry.iter().position(|b| *b == b'=').ok_or_else(|| {
                LauncherError::PrerequisiteEnvironment(format!(
                    "malformed entry: {:?}",
                    String::from_utf8_lossy(entry)
                ))
            })?;
            let (key, value) = (&entry[..split], &entry[split + 1..]);

            if key.is_empty() || SHELL_INTERNAL_VARS.iter().any(|var| var.as_bytes() == key) {
                continue;
            }
            env.set(os_string(key), os_string(value));
        }

        Ok(env)
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
