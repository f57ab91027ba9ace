use std::{
	fs,
	path::{Path, PathBuf},
	time::UNIX_EPOCH,
};

/// Check whether a regular file exists at `path`.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
	path.as_ref().is_file()
}

/// Check whether a directory exists at `path`.
pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
	path.as_ref().is_dir()
}

/// Remove a file. Removing a file that does not exist is not an error.
pub fn remove_file<P: AsRef<Path>>(path: P) -> bool {
	let path = path.as_ref();
	if !path.is_file() {
		return true;
	}
	match fs::remove_file(path) {
		Ok(()) => true,
		Err(e) => {
			log::warn!("Error removing {}: {}", path.display(), e);
			false
		}
	}
}

/// Remove a directory and its contents recursively.
pub fn remove_dir<P: AsRef<Path>>(path: P) -> bool {
	let path = path.as_ref();
	if !path.is_dir() {
		return true;
	}
	match fs::remove_dir_all(path) {
		Ok(()) => true,
		Err(e) => {
			log::warn!("Error removing {}: {}", path.display(), e);
			false
		}
	}
}

/// The current working directory as a string.
pub fn current_dir() -> Option<String> {
	match std::env::current_dir() {
		Ok(x) => Some(x.to_string_lossy().into_owned()),
		Err(e) => {
			log::warn!("Error getting cwd: {}", e);
			None
		}
	}
}

pub(crate) fn ensure_dir(path: &Path) -> bool {
	match fs::create_dir_all(path) {
		Ok(()) => true,
		Err(e) => {
			log::warn!("Error creating directory {}: {}", path.display(), e);
			false
		}
	}
}

// Seconds-granularity mtime. None when the path cannot be stat'ed.
pub(crate) fn mtime_secs(path: &Path) -> Option<u64> {
	let modified = fs::metadata(path).and_then(|md| md.modified()).ok()?;
	match modified.duration_since(UNIX_EPOCH) {
		Ok(d) => Some(d.as_secs()),
		Err(_) => Some(0),
	}
}

pub(crate) fn is_glob_pattern(s: &str) -> bool {
	s.contains('*') || s.contains('?') || s.contains('[')
}

// Expand a glob pattern to matching paths, in the order the walker yields
// them. Unreadable entries are skipped with a warning.
pub(crate) fn expand_glob(pattern: &str) -> Vec<PathBuf> {
	let entries = match glob::glob(pattern) {
		Ok(x) => x,
		Err(e) => {
			log::warn!("Bad glob pattern '{}': {}", pattern, e);
			return Vec::new();
		}
	};
	let mut paths = Vec::new();
	for entry in entries {
		match entry {
			Ok(path) => paths.push(path),
			Err(e) => log::warn!("Error expanding '{}': {}", pattern, e),
		}
	}
	paths
}

pub(crate) fn join_path(a: &Path, b: &str) -> PathBuf {
	let b_path = Path::new(b);
	if b_path.is_absolute() {
		b_path.to_owned()
	} else {
		a.join(b_path)
	}
}
