//! Marker-file locking for single-writer access to shared state files.
//!
//! The dedup store is load-at-start / save-at-end shared state; concurrent
//! jobs writing it must be serialized. The lock is a sibling `.lock` file
//! created with `create_new`, which is atomic on the filesystems we care
//! about, and removed on drop.

use std::{
	fs::OpenOptions,
	io,
	path::{Path, PathBuf},
	thread,
	time::{Duration, Instant},
};

/// An exclusive lock over a file, held until dropped.
pub struct FileLock {
	lock_path: PathBuf,
}

impl FileLock {
	/// Try to acquire the lock once. Fails with `AlreadyExists` if another
	/// holder has it.
	pub fn acquire(file_path: &Path) -> io::Result<Self> {
		let lock_path = Self::lock_path_for(file_path);

		OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&lock_path)?;

		Ok(FileLock { lock_path })
	}

	/// Acquire the lock, waiting up to `timeout` for the current holder to
	/// release it.
	pub fn acquire_blocking(file_path: &Path, timeout: Duration) -> io::Result<Self> {
		let deadline = Instant::now() + timeout;

		loop {
			match Self::acquire(file_path) {
				Ok(lock) => return Ok(lock),
				Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
					if Instant::now() >= deadline {
						return Err(io::Error::new(
							io::ErrorKind::TimedOut,
							format!(
								"Timed out waiting for lock on {}",
								file_path.display()
							),
						));
					}
					thread::sleep(Duration::from_millis(50));
				}
				Err(e) => return Err(e),
			}
		}
	}

	/// Whether a lock marker currently exists for the given file.
	pub fn is_locked(file_path: &Path) -> bool {
		Self::lock_path_for(file_path).exists()
	}

	fn lock_path_for(file_path: &Path) -> PathBuf {
		let extension = file_path
			.extension()
			.map(|e| e.to_string_lossy().to_string())
			.unwrap_or_default();
		file_path.with_extension(format!("{}.lock", extension))
	}
}

impl Drop for FileLock {
	fn drop(&mut self) {
		let _ = std::fs::remove_file(&self.lock_path);
	}
}
