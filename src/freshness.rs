//! The freshness oracle: pure mtime comparisons deciding what gets rebuilt.
//!
//! All comparisons are strict `>` on seconds-granularity mtimes; ties count
//! as fresh. Generated `.d` files are never consulted — only the direct
//! source's mtime matters.

use std::path::Path;

use crate::misc::mtime_secs;

/// Does `src` need recompiling into `obj`?
pub(crate) fn needs_recompile(src: &Path, obj: &Path) -> bool {
	let src_mtime = match mtime_secs(src) {
		Some(x) => x,
		// An unreadable source will fail loudly in the compiler; treat it as
		// stale so the failure surfaces there.
		None => return true,
	};
	let obj_mtime = match mtime_secs(obj) {
		Some(x) => x,
		None => return true,
	};
	src_mtime > obj_mtime
}

/// Does the artifact at `output` need re-linking from `objs`, given the
/// artifacts of the target's dependencies?
pub(crate) fn needs_relink<'a>(
	output: &Path,
	objs: impl IntoIterator<Item = &'a std::path::PathBuf>,
	dep_outputs: impl IntoIterator<Item = &'a std::path::PathBuf>,
) -> bool {
	let out_mtime = match mtime_secs(output) {
		Some(x) => x,
		None => return true,
	};
	for obj in objs {
		match mtime_secs(obj) {
			Some(t) if t > out_mtime => return true,
			Some(_) => {}
			None => return true,
		}
	}
	for dep in dep_outputs {
		// A missing dependency artifact is skipped; its own build step is
		// responsible for reporting it.
		if let Some(t) = mtime_secs(dep) {
			if t > out_mtime {
				return true;
			}
		}
	}
	false
}
