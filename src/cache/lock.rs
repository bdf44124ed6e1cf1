#![allow(unsafe_code)]

//! Cross-process exclusive lock guarding cache mutation.
//!
//! One lock file (`<cacheDir>/.lock`) is locked whole-file for the duration
//! of a multi-file write. POSIX record locks are process-scoped, so the
//! file lock is paired with a process-local mutex to serialize threads of
//! the same process as well. Readers never take the lock.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;

static PROCESS_GATE: Mutex<()> = Mutex::new(());

/// Held for the duration of one atomic multi-file cache write. Released on
/// drop, on every exit path.
pub struct CacheLock {
    file: File,
    _gate: MutexGuard<'static, ()>,
}

impl CacheLock {
    /// Blocks until both the process gate and the file lock are held.
    pub fn acquire(path: &Path) -> Result<CacheLock> {
        let gate = PROCESS_GATE.lock().unwrap_or_else(|err| err.into_inner());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        sys::lock_exclusive(&file)?;
        Ok(CacheLock { file, _gate: gate })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(_err) = sys::unlock(&self.file) {
            #[cfg(debug_assertions)]
            eprintln!("failed to release cache lock: {_err:?}");
        }
    }
}

#[cfg(unix)]
mod sys {
    use super::*;

    pub fn lock_exclusive(file: &File) -> io::Result<()> {
        fcntl_whole_file(file, libc::F_WRLCK)
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        fcntl_whole_file(file, libc::F_UNLCK)
    }

    fn fcntl_whole_file(file: &File, kind: libc::c_int) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        // l_len == 0 locks to end-of-file, i.e. the whole file.
        let mut flock = libc::flock {
            l_type: kind as libc::c_short,
            l_whence: libc::SEEK_SET as _,
            l_start: 0,
            l_len: 0,
            l_pid: 0,
        };
        loop {
            let res = unsafe { libc::fcntl(fd, libc::F_SETLKW, &mut flock) };
            if res == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::*;
    use std::mem::zeroed;
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, UnlockFileEx, LOCKFILE_EXCLUSIVE_LOCK,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    pub fn lock_exclusive(file: &File) -> io::Result<()> {
        unsafe {
            let mut overlapped: OVERLAPPED = zeroed();
            let res = LockFileEx(
                file.as_raw_handle() as isize,
                LOCKFILE_EXCLUSIVE_LOCK,
                0,
                u32::MAX,
                u32::MAX,
                &mut overlapped,
            );
            if res != 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        unsafe {
            let mut overlapped: OVERLAPPED = zeroed();
            let res = UnlockFileEx(
                file.as_raw_handle() as isize,
                0,
                u32::MAX,
                u32::MAX,
                &mut overlapped,
            );
            if res != 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use super::*;

    pub fn lock_exclusive(_file: &File) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locking unsupported on this platform",
        ))
    }

    pub fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}
