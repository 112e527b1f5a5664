//! The allow-list and its on-disk form, the policy artifact.
//!
//! An artifact is plain text: every maximal run of decimal digits is one
//! syscall number and every other byte is a separator. Artifacts written here
//! hold one number per line, sorted.

use std::collections::btree_set;
use std::collections::BTreeSet;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// A deduplicated set of permitted syscall numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    syscalls: BTreeSet<u32>,
}

impl AllowList {
    pub fn new() -> AllowList {
        AllowList::default()
    }

    /// Parses the text of a policy artifact. Digit runs too large for a
    /// syscall number are skipped like any other noise.
    pub fn parse(data: &[u8]) -> AllowList {
        let mut list = AllowList::new();

        for run in data.split(|b| !b.is_ascii_digit()).filter(|r| !r.is_empty()) {
            let mut value: u32 = 0;
            let mut overflow = false;
            for &digit in run {
                match value.checked_mul(10).and_then(|v| v.checked_add(u32::from(digit - b'0'))) {
                    Some(v) => value = v,
                    None => {
                        overflow = true;
                        break;
                    }
                }
            }

            if !overflow {
                list.insert(value);
            }
        }

        list
    }

    pub fn insert(&mut self, nr: u32) -> bool {
        self.syscalls.insert(nr)
    }

    /// Whether the syscall is permitted. Never allocates, so it is safe to
    /// call from the SIGSYS handler.
    pub fn contains(&self, nr: i64) -> bool {
        match u32::try_from(nr) {
            Ok(nr) => self.syscalls.contains(&nr),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.syscalls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syscalls.is_empty()
    }

    /// Iterates the syscall numbers in ascending order.
    pub fn iter(&self) -> btree_set::Iter<'_, u32> {
        self.syscalls.iter()
    }

    /// Adds every number of `other`, returning how many were new.
    pub fn union_with(&mut self, other: &AllowList) -> usize {
        let before = self.len();
        self.syscalls.extend(other.iter().copied());
        self.len() - before
    }

    /// Renders the artifact text: one number per line, ascending.
    pub fn to_artifact(&self) -> String {
        let mut out = String::new();
        for nr in self.iter() {
            out.push_str(&nr.to_string());
            out.push('\n');
        }
        out
    }
}

impl FromIterator<u32> for AllowList {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> AllowList {
        AllowList {
            syscalls: iter.into_iter().collect(),
        }
    }
}

/// Loads the allow-list at `path`. A missing, empty or number-free file is an
/// error; there is no permissive fallback.
pub fn load(path: &Path) -> Result<AllowList> {
    let data = match fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            return Err(Error::PolicyOpen {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    if data.is_empty() {
        return Err(Error::PolicyEmpty(path.to_path_buf()));
    }

    let list = AllowList::parse(&data);
    if list.is_empty() {
        return Err(Error::PolicyNoSyscalls(path.to_path_buf()));
    }

    debug!(path = %path.display(), syscalls = list.len(), "loaded policy");
    Ok(list)
}

/// Loads the allow-list for the executable this process is running.
pub fn load_for_current_exe(config: &Config) -> Result<AllowList> {
    let exe = env::current_exe().map_err(Error::ExecutableUnresolved)?;
    load(&config.policy_path(&exe)?)
}

/// Unions `session` into the artifact at `path`, creating it if needed, and
/// returns the merged set. The artifact is held under an exclusive advisory
/// lock for the whole read-modify-write, so concurrent merges serialize.
pub fn merge(path: &Path, session: &AllowList) -> Result<AllowList> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    FileExt::lock_exclusive(&file)?;

    // The lock is released when `file` is closed on return.
    let merged = merge_locked(&mut file, session)?;
    debug!(path = %path.display(), syscalls = merged.len(), "merged policy");
    Ok(merged)
}

fn merge_locked(file: &mut File, session: &AllowList) -> io::Result<AllowList> {
    let mut data = vec![];
    file.read_to_end(&mut data)?;

    let mut merged = AllowList::parse(&data);
    merged.union_with(session);

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(merged.to_artifact().as_bytes())?;
    file.sync_all()?;

    Ok(merged)
}
