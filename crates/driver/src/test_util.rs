//! Stand-ins for the native compiler, for use in testing.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Held by every live [`FakeGcc`]. A script that is being written while
/// another test forks cannot be executed (`ETXTBSY`), so fake compilers are
/// used one at a time.
static EXCLUSIVE: Mutex<()> = Mutex::new(());

/// A shell script standing in for `gcc`, along with an empty plugin file,
/// living in a scratch directory that is removed on drop.
pub struct FakeGcc {
    dir:    PathBuf,
    _guard: MutexGuard<'static, ()>,
}

impl FakeGcc {
    /// Creates a fake compiler that runs the shell `body`.
    pub fn new(body: &str) -> std::io::Result<Self> {
        let guard = EXCLUSIVE.lock().unwrap_or_else(PoisonError::into_inner);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("gbr-driver-{}-{id}", std::process::id()));
        fs::create_dir_all(&dir)?;

        let gcc = Self {
            dir,
            _guard: guard,
        };
        fs::write(gcc.path(), format!("#!/bin/sh\n{body}\n"))?;
        fs::set_permissions(gcc.path(), fs::Permissions::from_mode(0o755))?;
        fs::write(gcc.plugin(), [])?;

        Ok(gcc)
    }

    /// Gets the path of the compiler script.
    pub fn path(&self) -> PathBuf {
        self.dir.join("gcc")
    }

    /// Gets the path of the plugin.
    pub fn plugin(&self) -> PathBuf {
        self.dir.join("gimple-plugin.so")
    }

    /// Gets the scratch directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for FakeGcc {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}
