//! The build driver: a depth-first walk over the target graph with cycle
//! detection, dispatching command execution, compilation, and linking.
//!
//! The walk is sequential. Ordering guarantees: all of a target's transitive
//! command and target dependencies complete (or record a failure) before its
//! own build step; post-commands run strictly after the link step; top-level
//! targets are visited in registration order. A single error flag
//! short-circuits everything downstream.

use std::path::PathBuf;

use crate::{
	command::CommandId,
	freshness,
	misc,
	process,
	target::{Target, TargetId, TargetKind},
	toolchain::{synth, Family, Toolchain},
	Build,
};

pub(crate) struct Walk {
	visited: Vec<bool>,
	in_stack: Vec<bool>,
	pub(crate) error: bool,
}

impl Walk {
	pub(crate) fn new(target_count: usize) -> Walk {
		Walk {
			visited: vec![false; target_count],
			in_stack: vec![false; target_count],
			error: false,
		}
	}
}

impl Build {
	pub(crate) fn visit_target(&mut self, id: TargetId, walk: &mut Walk, tc: &Toolchain) {
		if walk.error {
			return;
		}
		let i = id.0;
		if i >= self.targets.len() {
			return;
		}
		if walk.in_stack[i] {
			eprintln!("mortar: circular dependency involving '{}'", self.targets[i].name);
			walk.error = true;
			return;
		}
		if walk.visited[i] {
			return;
		}
		walk.in_stack[i] = true;

		let pre_commands = self.targets[i].pre_commands.clone();
		for cmd in pre_commands {
			self.visit_command(cmd, &mut walk.error);
			if walk.error {
				walk.in_stack[i] = false;
				return;
			}
		}

		let deps = self.targets[i].deps.clone();
		for dep in deps {
			self.visit_target(dep, walk, tc);
			if walk.error {
				walk.in_stack[i] = false;
				return;
			}
		}

		if self.build_step(id, tc) != 0 {
			walk.error = true;
			walk.in_stack[i] = false;
			return;
		}

		let post_commands = self.targets[i].post_commands.clone();
		for cmd in post_commands {
			self.visit_command(cmd, &mut walk.error);
			if walk.error {
				walk.in_stack[i] = false;
				return;
			}
		}

		walk.visited[i] = true;
		walk.in_stack[i] = false;
	}

	// Memoized command execution: dependencies first, each command at most
	// once per run.
	pub(crate) fn visit_command(&mut self, id: CommandId, error: &mut bool) {
		if *error || id.0 >= self.commands.len() {
			return;
		}
		if self.commands[id.0].executed {
			if self.commands[id.0].result != 0 {
				*error = true;
			}
			return;
		}
		let deps = self.commands[id.0].deps.clone();
		for dep in deps {
			self.visit_command(dep, error);
			if *error {
				return;
			}
		}
		if self.exec_command(id) != 0 {
			*error = true;
		}
	}

	pub(crate) fn exec_command(&mut self, id: CommandId) -> i32 {
		let (name, line) = {
			let cmd = &self.commands[id.0];
			(cmd.name.clone(), cmd.command_line.clone())
		};
		log::info!("COMMAND {}", name);
		let rc = process::run_shell(&line);
		let cmd = &mut self.commands[id.0];
		cmd.executed = true;
		cmd.result = rc;
		if rc != 0 {
			eprintln!("mortar: command failed: {}", name);
		}
		rc
	}

	// Compile stale sources, then archive or link if stale. Proxies own no
	// sources; their artifact is produced by the subproject build command.
	fn build_step(&self, id: TargetId, tc: &Toolchain) -> i32 {
		let t = &self.targets[id.0];
		if t.kind == TargetKind::Proxy {
			return 0;
		}

		let objs: Vec<PathBuf> = t.sources.iter().map(|src| t.object_path(src)).collect();
		for (src, obj) in t.sources.iter().zip(objs.iter()) {
			if freshness::needs_recompile(std::path::Path::new(src), obj) {
				log::info!("COMPILE {}", src);
				if self.compile_source(t, src, obj, tc) != 0 {
					return 1;
				}
			}
		}

		let dep_outputs: Vec<PathBuf> = t
			.deps
			.iter()
			.filter_map(|dep| self.targets.get(dep.0))
			.map(|dep| dep.output_path.clone())
			.collect();
		if freshness::needs_relink(&t.output_path, &objs, &dep_outputs) {
			log::info!("LINK {}", t.output_path.display());
			if let Some(parent) = t.output_path.parent() {
				misc::ensure_dir(parent);
			}
			let deps: Vec<&Target> = t.deps.iter().filter_map(|dep| self.targets.get(dep.0)).collect();
			let line = match t.kind {
				TargetKind::StaticLibrary => synth::archive_line(tc, t, &objs),
				_ => synth::link_line(tc, t, &objs, &deps),
			};
			let (rc, output) = process::run_shell_capture(&line);
			if rc != 0 {
				eprint!("{}", String::from_utf8_lossy(&output));
				eprintln!("mortar: linking failed for {}", t.output_path.display());
				return 1;
			}
		}
		0
	}

	fn compile_source(&self, t: &Target, src: &str, obj: &PathBuf, tc: &Toolchain) -> i32 {
		if let Some(obj_dir) = &t.obj_dir {
			misc::ensure_dir(obj_dir);
		}
		let line = synth::compile_line(tc, &self.settings, t, src, obj);
		let (rc, output) = process::run_shell_capture(&line);

		// MSVC reports headers on stdout via /showIncludes; scavenge them
		// into an informational makefile-format .d stub.
		if tc.family == Family::Msvc && self.settings.dep_tracking {
			write_dep_stub(obj, src, &output);
		}

		if rc != 0 {
			eprint!("{}", String::from_utf8_lossy(&output));
			eprintln!("mortar: compilation failed for {}", src);
		}
		rc
	}
}

fn write_dep_stub(obj: &PathBuf, src: &str, compiler_output: &[u8]) {
	const INCLUDE_TAG: &str = "Note: including file:";
	let mut dep = format!("{}: {}", obj.display(), src);
	for line in String::from_utf8_lossy(compiler_output).lines() {
		if let Some(pos) = line.find(INCLUDE_TAG) {
			let header = line[pos + INCLUDE_TAG.len()..].trim();
			if !header.is_empty() {
				dep += &format!(" \\\n  {}", header);
			}
		}
	}
	dep.push('\n');
	let dep_path = format!("{}.d", obj.display());
	if let Err(e) = std::fs::write(&dep_path, dep) {
		log::warn!("Error writing {}: {}", dep_path, e);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dep_stub_collects_show_includes_lines() {
		let dir = tempfile::tempdir().expect("temp dir");
		let obj = dir.path().join("m.o");
		let output = b"m.c\nNote: including file: C:\\inc\\m.h\nNote: including file:   C:\\inc\\deep.h\nother noise\n";
		write_dep_stub(&obj, "m.c", output);

		let text = std::fs::read_to_string(format!("{}.d", obj.display())).expect("read stub");
		assert!(text.starts_with(&format!("{}: m.c", obj.display())));
		assert!(text.contains("C:\\inc\\m.h"));
		assert!(text.contains("C:\\inc\\deep.h"));
		assert!(!text.contains("other noise"));
	}
}
