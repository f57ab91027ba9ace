//! In-process build orchestrator for C projects.
//!
//! The embedding program is the build script: it registers targets and
//! commands on a [`Build`], wires them into a dependency graph, and hands its
//! command-line arguments to [`Build::run`].
//!
//! ```no_run
//! let mut build = mortar::Build::new();
//! build.set_output_dir("build");
//! let lib = build.static_library("math");
//! build.add_source(lib, "math.c");
//! let exe = build.executable("calc");
//! build.add_source(exe, "calc.c");
//! build.link_target(exe, lib);
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! std::process::exit(build.run(&args));
//! ```

pub mod command;
mod compile_commands;
mod freshness;
mod misc;
mod process;
mod scheduler;
mod selfbuild;
mod settings;
mod subproject;
pub mod target;
pub mod toolchain;

use std::path::{Path, PathBuf};

pub use command::CommandId;
pub use compile_commands::CompileCommand;
pub use misc::{current_dir, dir_exists, file_exists, remove_dir, remove_file};
pub use settings::Settings;
pub use subproject::SubprojectId;
pub use target::{Target, TargetId, TargetKind};

use command::{Command, Subcommand, SubcommandCallback};
use compile_commands::CompileCommandIndex;
use scheduler::Walk;
use subproject::{child_invocation, Subproject};
use toolchain::Toolchain;

/// The build graph and its settings. One per process invocation.
pub struct Build {
	pub(crate) targets: Vec<Target>,
	pub(crate) commands: Vec<Command>,
	pub(crate) subprojects: Vec<Subproject>,
	pub(crate) subcommands: Vec<Subcommand>,
	pub(crate) settings: Settings,
	pub(crate) compile_commands: CompileCommandIndex,
}

impl Default for Build {
	fn default() -> Build {
		Build::new()
	}
}

impl Build {
	pub fn new() -> Build {
		Build {
			targets: Vec::new(),
			commands: Vec::new(),
			subprojects: Vec::new(),
			subcommands: Vec::new(),
			settings: Settings::default(),
			compile_commands: CompileCommandIndex::default(),
		}
	}

	// --- Target registration -------------------------------------------------

	pub fn executable(&mut self, name: &str) -> TargetId {
		self.register_target(name, TargetKind::Executable)
	}

	pub fn static_library(&mut self, name: &str) -> TargetId {
		self.register_target(name, TargetKind::StaticLibrary)
	}

	pub fn shared_library(&mut self, name: &str) -> TargetId {
		self.register_target(name, TargetKind::SharedLibrary)
	}

	fn register_target(&mut self, name: &str, kind: TargetKind) -> TargetId {
		let id = TargetId(self.targets.len());
		self.targets.push(Target::new(name, kind, &self.settings.output_dir));
		id
	}

	pub fn target(&self, id: TargetId) -> Option<&Target> {
		self.targets.get(id.0)
	}

	pub fn find_target(&self, name: &str) -> Option<TargetId> {
		self.targets.iter().position(|t| t.name == name).map(TargetId)
	}

	// --- Target attribute mutators -------------------------------------------

	/// Add a source file. Glob patterns are expanded here, at registration
	/// time; a pattern matching nothing adds nothing.
	pub fn add_source(&mut self, id: TargetId, source: &str) {
		if misc::is_glob_pattern(source) {
			let matches = misc::expand_glob(source);
			if matches.is_empty() {
				log::warn!("No files found matching pattern '{}'", source);
				return;
			}
			if let Some(t) = self.targets.get_mut(id.0) {
				t.sources.extend(matches.iter().map(|p| p.to_string_lossy().into_owned()));
			}
			return;
		}
		if !misc::file_exists(source) {
			log::warn!("Source file '{}' does not exist", source);
		}
		if let Some(t) = self.targets.get_mut(id.0) {
			t.sources.push(source.to_owned());
		}
	}

	pub fn add_include_dir(&mut self, id: TargetId, dir: &str) {
		Build::push_dir_entry(&mut self.targets, id, dir, |t| &mut t.include_dirs);
	}

	pub fn add_library_dir(&mut self, id: TargetId, dir: &str) {
		Build::push_dir_entry(&mut self.targets, id, dir, |t| &mut t.library_dirs);
	}

	fn push_dir_entry(targets: &mut [Target], id: TargetId, dir: &str, list: fn(&mut Target) -> &mut Vec<String>) {
		let t = match targets.get_mut(id.0) {
			Some(x) => x,
			None => return,
		};
		if misc::is_glob_pattern(dir) {
			let matches: Vec<String> = misc::expand_glob(dir)
				.into_iter()
				.filter(|p| p.is_dir())
				.map(|p| p.to_string_lossy().into_owned())
				.collect();
			if matches.is_empty() {
				log::warn!("No directories found matching pattern '{}'", dir);
				return;
			}
			list(t).extend(matches);
		} else {
			list(t).push(dir.to_owned());
		}
	}

	pub fn add_link_lib(&mut self, id: TargetId, lib: &str) {
		let t = match self.targets.get_mut(id.0) {
			Some(x) => x,
			None => return,
		};
		if misc::is_glob_pattern(lib) {
			let matches = misc::expand_glob(lib);
			if matches.is_empty() {
				log::warn!("No libraries found matching pattern '{}'", lib);
				return;
			}
			t.link_libs.extend(matches.iter().map(|p| p.to_string_lossy().into_owned()));
		} else {
			t.link_libs.push(lib.to_owned());
		}
	}

	pub fn add_define(&mut self, id: TargetId, macro_name: &str) {
		if let Some(t) = self.targets.get_mut(id.0) {
			t.defines.push(macro_name.to_owned());
		}
	}

	pub fn add_define_val(&mut self, id: TargetId, macro_name: &str, value: &str) {
		if let Some(t) = self.targets.get_mut(id.0) {
			t.defines.push(format!("{}={}", macro_name, value));
		}
	}

	/// Toggle a boolean feature flag: `NAME=1` or `NAME=0`.
	pub fn set_flag(&mut self, id: TargetId, flag: &str, value: bool) {
		self.add_define_val(id, flag, if value { "1" } else { "0" });
	}

	/// Append to this target's cflags override. When set, the override
	/// replaces the global cflags for the target's compilations.
	pub fn add_cflags(&mut self, id: TargetId, cflags: &str) {
		if let Some(t) = self.targets.get_mut(id.0) {
			match &mut t.cflags {
				Some(existing) => {
					existing.push(' ');
					existing.push_str(cflags);
				}
				None => t.cflags = Some(cflags.to_owned()),
			}
		}
	}

	pub fn add_ldflags(&mut self, id: TargetId, ldflags: &str) {
		if let Some(t) = self.targets.get_mut(id.0) {
			match &mut t.ldflags {
				Some(existing) => {
					existing.push(' ');
					existing.push_str(ldflags);
				}
				None => t.ldflags = Some(ldflags.to_owned()),
			}
		}
	}

	/// Declare that `dependant` links against `dependency`: the dependency is
	/// built first and its artifact is linked into the dependant.
	pub fn link_target(&mut self, dependant: TargetId, dependency: TargetId) {
		if dependency.0 >= self.targets.len() {
			return;
		}
		if let Some(t) = self.targets.get_mut(dependant.0) {
			t.deps.push(dependency);
		}
	}

	// --- Commands ------------------------------------------------------------

	pub fn command(&mut self, name: &str, command_line: &str) -> CommandId {
		let id = CommandId(self.commands.len());
		self.commands.push(Command::new(name, command_line));
		id
	}

	pub fn add_command_dependency(&mut self, cmd: CommandId, dependency: CommandId) {
		if dependency.0 >= self.commands.len() {
			return;
		}
		if let Some(c) = self.commands.get_mut(cmd.0) {
			c.deps.push(dependency);
		}
	}

	pub fn add_pre_command(&mut self, id: TargetId, cmd: CommandId) {
		if cmd.0 >= self.commands.len() {
			return;
		}
		if let Some(t) = self.targets.get_mut(id.0) {
			t.pre_commands.push(cmd);
		}
	}

	pub fn add_post_command(&mut self, id: TargetId, cmd: CommandId) {
		if cmd.0 >= self.commands.len() {
			return;
		}
		if let Some(t) = self.targets.get_mut(id.0) {
			t.post_commands.push(cmd);
		}
	}

	/// Run a command (and its dependency closure) immediately, outside `run`.
	/// Memoized like every command execution: at most once per invocation.
	pub fn run_command_now(&mut self, id: CommandId) -> i32 {
		if id.0 >= self.commands.len() {
			return -1;
		}
		let deps = self.commands[id.0].deps.clone();
		for dep in deps {
			let rc = self.run_command_now(dep);
			if rc != 0 {
				return rc;
			}
		}
		if self.commands[id.0].executed {
			return self.commands[id.0].result;
		}
		self.exec_command(id)
	}

	// --- Subcommands ---------------------------------------------------------

	pub fn register_subcommand(&mut self, name: &str, target: TargetId, command_line: &str) {
		self.subcommands.push(Subcommand {
			name: name.to_owned(),
			target,
			command_line: Some(command_line.to_owned()),
			callback: None,
		});
	}

	pub fn register_subcommand_callback(&mut self, name: &str, target: TargetId, callback: SubcommandCallback) {
		self.subcommands.push(Subcommand {
			name: name.to_owned(),
			target,
			command_line: None,
			callback: Some(callback),
		});
	}

	// --- Subprojects ---------------------------------------------------------

	/// Declare a subproject: a sibling directory with its own build-script
	/// executable speaking the same protocol.
	pub fn subproject(&mut self, alias: &str, directory: &str, driver_exe: &str) -> SubprojectId {
		let build_line = child_invocation(directory, driver_exe, "");
		let build_cmd = self.command(&format!("build subproject {}", alias), &build_line);
		let id = SubprojectId(self.subprojects.len());
		self.subprojects.push(Subproject {
			alias: alias.to_owned(),
			directory: directory.to_owned(),
			driver_exe: driver_exe.to_owned(),
			build_cmd,
			manifest_loaded: false,
			targets: Vec::new(),
		});
		id
	}

	/// Fetch one of the subproject's targets by name as a proxy target in
	/// this graph. The proxy depends on the subproject build command and can
	/// be passed to [`Build::link_target`] like any library target.
	pub fn subproject_target(&mut self, sub: SubprojectId, name: &str) -> Option<TargetId> {
		if sub.0 >= self.subprojects.len() {
			return None;
		}
		self.load_manifest(sub);

		let sp = &self.subprojects[sub.0];
		let record_idx = match sp.targets.iter().position(|t| t.name == name) {
			Some(x) => x,
			None => {
				log::warn!("Subproject '{}' has no target named '{}'", sp.alias, name);
				return None;
			}
		};
		if let Some(existing) = sp.targets[record_idx].proxy {
			return Some(existing);
		}

		let record = &sp.targets[record_idx];
		let proxy_name = format!("{}_{}", sp.alias, record.name);
		let output_path = misc::join_path(Path::new(&sp.directory), &record.output_path);
		let mut proxy = Target::new_proxy(&proxy_name, record.kind, output_path);
		proxy.pre_commands.push(sp.build_cmd);

		let id = TargetId(self.targets.len());
		self.targets.push(proxy);
		self.subprojects[sub.0].targets[record_idx].proxy = Some(id);
		Some(id)
	}

	fn load_manifest(&mut self, sub: SubprojectId) {
		if self.subprojects[sub.0].manifest_loaded {
			return;
		}
		let line = {
			let sp = &self.subprojects[sub.0];
			child_invocation(&sp.directory, &sp.driver_exe, "--manifest")
		};
		let (rc, output) = process::run_shell_capture(&line);
		if rc != 0 {
			log::warn!("Failed to get manifest from subproject '{}'", self.subprojects[sub.0].alias);
			return;
		}
		let targets = subproject::parse_manifest(&String::from_utf8_lossy(&output));
		let sp = &mut self.subprojects[sub.0];
		sp.targets = targets;
		sp.manifest_loaded = true;
	}

	// --- Global settings -----------------------------------------------------

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	/// Set the output directory for all build artifacts. Derived paths of
	/// already-registered targets are recomputed.
	pub fn set_output_dir(&mut self, dir: &str) {
		self.settings.output_dir = PathBuf::from(dir);
		let output_dir = self.settings.output_dir.clone();
		for t in &mut self.targets {
			t.rederive_paths(&output_dir);
		}
	}

	pub fn set_parallelism(&mut self, jobs: usize) {
		self.settings.parallelism = jobs.max(1);
	}

	pub fn set_compiler(&mut self, compiler_exe: &str) {
		self.settings.compiler_exe = Some(compiler_exe.to_owned());
	}

	pub fn set_archiver(&mut self, archiver_exe: &str) {
		self.settings.archiver_exe = Some(archiver_exe.to_owned());
	}

	pub fn set_linker(&mut self, linker_exe: &str) {
		self.settings.linker_exe = Some(linker_exe.to_owned());
	}

	pub fn set_toolchain_file(&mut self, path: &str) {
		self.settings.toolchain_file = Some(PathBuf::from(path));
	}

	pub fn add_global_cflags(&mut self, flags: &str) {
		self.settings.global_cflags.push(flags.to_owned());
	}

	pub fn add_global_ldflags(&mut self, flags: &str) {
		self.settings.global_ldflags.push(flags.to_owned());
	}

	pub fn add_global_define(&mut self, macro_name: &str) {
		self.settings.global_defines.push(macro_name.to_owned());
	}

	pub fn add_global_define_val(&mut self, macro_name: &str, value: &str) {
		self.settings.global_defines.push(format!("{}={}", macro_name, value));
	}

	pub fn set_global_flag(&mut self, flag: &str, value: bool) {
		self.add_global_define_val(flag, if value { "1" } else { "0" });
	}

	pub fn enable_compile_commands(&mut self, enabled: bool) {
		self.settings.generate_compile_commands = enabled;
	}

	pub fn enable_dep_tracking(&mut self, enabled: bool) {
		self.settings.dep_tracking = enabled;
	}

	pub fn set_rebuild_command(&mut self, command_line: &str) {
		self.settings.rebuild_command = Some(command_line.to_owned());
	}

	// --- Self-rebuild --------------------------------------------------------

	/// Rebuild and re-exec the build script if any of `sources` is newer than
	/// the running executable. Call this first in `main`, passing the process
	/// arguments (without the program name) unchanged.
	pub fn self_rebuild_if_needed(&self, args: &[String], sources: &[&str]) {
		selfbuild::self_rebuild_if_needed(self.settings.rebuild_command.as_deref(), args, sources);
	}

	// --- Run -----------------------------------------------------------------

	/// Execute the requested CLI verb. Returns the process exit code: 0 on
	/// success, non-zero on any failure.
	///
	/// Verbs: no argument builds every registered target; `clean` removes
	/// build outputs; `--manifest` prints the target manifest to stdout; a
	/// registered subcommand name builds its target then runs it; a target
	/// name builds just that target's dependency closure. Anything else falls
	/// back to a full build.
	pub fn run(&mut self, args: &[String]) -> i32 {
		let tc = Toolchain::resolve(&self.settings);

		// The index is rebuilt before any building so it is valid even when
		// the build itself fails.
		self.compile_commands.reset();
		if self.settings.generate_compile_commands {
			self.collect_compile_commands(&tc);
		}

		match args.first().map(String::as_str) {
			Some("--manifest") => {
				print!("{}", self.render_manifest());
				0
			}
			Some("clean") => self.clean(),
			Some(verb) => {
				if let Some(idx) = self.subcommands.iter().position(|sc| sc.name == verb) {
					return self.run_subcommand(idx, &tc);
				}
				if let Some(id) = self.find_target(verb) {
					return self.build_targets(&[id], &tc);
				}
				// Unknown verbs fall through to a full build.
				self.build_all(&tc)
			}
			None => self.build_all(&tc),
		}
	}

	fn build_all(&mut self, tc: &Toolchain) -> i32 {
		let roots: Vec<TargetId> = (0..self.targets.len()).map(TargetId).collect();
		self.build_targets(&roots, tc)
	}

	fn build_targets(&mut self, roots: &[TargetId], tc: &Toolchain) -> i32 {
		let mut walk = Walk::new(self.targets.len());
		for &root in roots {
			self.visit_target(root, &mut walk, tc);
			if walk.error {
				break;
			}
		}
		if walk.error {
			eprintln!("mortar: build failed");
			return 1;
		}
		if self.settings.generate_compile_commands {
			if let Err(e) = self.compile_commands.write(&self.settings.output_dir) {
				log::warn!("Error writing compile_commands.json: {}", e);
			}
		}
		log::info!("Build succeeded");
		0
	}

	fn run_subcommand(&mut self, idx: usize, tc: &Toolchain) -> i32 {
		let root = self.subcommands[idx].target;
		if self.build_targets(&[root], tc) != 0 {
			return 1;
		}
		let name = self.subcommands[idx].name.clone();
		if let Some(line) = self.subcommands[idx].command_line.clone() {
			log::info!("SUBCMD {}: {}", name, line);
			return process::run_shell(&line);
		}
		if let Some(mut callback) = self.subcommands[idx].callback.take() {
			log::info!("SUBCMD {} (callback)", name);
			callback();
			self.subcommands[idx].callback = Some(callback);
		}
		0
	}

	/// Remove build outputs: subprojects first (failures are warnings), then
	/// every target's object directory and artifact, then the output
	/// directory itself. The in-memory graph is untouched.
	pub fn clean(&mut self) -> i32 {
		log::info!("CLEAN {}", self.settings.output_dir.display());
		for sp in &self.subprojects {
			log::info!("CLEAN subproject {}", sp.alias);
			let line = child_invocation(&sp.directory, &sp.driver_exe, "clean");
			if process::run_shell(&line) != 0 {
				log::warn!("Failed to clean subproject '{}'", sp.alias);
			}
		}
		for t in &self.targets {
			if let Some(obj_dir) = &t.obj_dir {
				misc::remove_dir(obj_dir);
			}
			misc::remove_file(&t.output_path);
		}
		misc::remove_dir(&self.settings.output_dir);
		0
	}

	// --- Manifest emission ---------------------------------------------------

	pub(crate) fn render_manifest(&self) -> String {
		use subproject::ManifestKind;
		let mut out = String::new();
		for t in &self.targets {
			let kind = match t.kind {
				TargetKind::StaticLibrary => ManifestKind::StaticLib,
				TargetKind::SharedLibrary => ManifestKind::SharedLib,
				TargetKind::Executable => ManifestKind::Executable,
				TargetKind::Proxy => continue,
			};
			out += &subproject::manifest_line(kind, &t.name, &t.output_path.to_string_lossy());
			out.push('\n');
		}
		out
	}

	// --- Compile-commands index ----------------------------------------------

	fn collect_compile_commands(&mut self, tc: &Toolchain) {
		let directory = misc::current_dir().unwrap_or_default();
		let mut entries = Vec::new();
		for t in &self.targets {
			if t.kind == TargetKind::Proxy {
				continue;
			}
			for src in &t.sources {
				let obj = t.object_path(src);
				let line = toolchain::synth::compile_line(tc, &self.settings, t, src, &obj);
				entries.push((directory.clone(), line, src.clone()));
			}
		}
		for (directory, command, file) in entries {
			self.compile_commands.record(directory, command, file);
		}
	}

	/// The entries the compile-commands exporter recorded for this run.
	pub fn compile_command_entries(&self) -> &[CompileCommand] {
		self.compile_commands.entries()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registration_order_is_preserved() {
		let mut build = Build::new();
		let a = build.static_library("alpha");
		let b = build.executable("beta");
		assert_eq!(a, TargetId(0));
		assert_eq!(b, TargetId(1));
		assert_eq!(build.find_target("alpha"), Some(a));
		assert_eq!(build.find_target("beta"), Some(b));
		assert_eq!(build.find_target("gamma"), None);
	}

	#[test]
	fn derived_paths_follow_output_dir() {
		let mut build = Build::new();
		let lib = build.static_library("math");
		#[cfg(unix)]
		assert_eq!(build.target(lib).unwrap().output_path, PathBuf::from("build/libmath.a"));
		assert_eq!(build.target(lib).unwrap().obj_dir.as_deref(), Some(Path::new("build/obj_math")));

		build.set_output_dir("out");
		#[cfg(unix)]
		assert_eq!(build.target(lib).unwrap().output_path, PathBuf::from("out/libmath.a"));
		assert_eq!(build.target(lib).unwrap().obj_dir.as_deref(), Some(Path::new("out/obj_math")));
	}

	#[test]
	fn target_cflags_append_on_repeat() {
		let mut build = Build::new();
		let lib = build.static_library("math");
		build.add_cflags(lib, "-g");
		build.add_cflags(lib, "-O0");
		assert_eq!(build.target(lib).unwrap().cflags.as_deref(), Some("-g -O0"));
	}

	#[test]
	fn defines_and_flags() {
		let mut build = Build::new();
		let lib = build.static_library("math");
		build.add_define(lib, "FAST");
		build.add_define_val(lib, "DEPTH", "4");
		build.set_flag(lib, "TRACE", true);
		build.set_flag(lib, "SLOW", false);
		assert_eq!(build.target(lib).unwrap().defines, vec!["FAST", "DEPTH=4", "TRACE=1", "SLOW=0"]);
	}

	#[test]
	fn manifest_lists_non_proxy_targets_in_order() {
		let mut build = Build::new();
		build.static_library("math");
		build.executable("calc");
		let manifest = build.render_manifest();
		#[cfg(unix)]
		assert_eq!(manifest, "static_lib math build/libmath.a\nexecutable calc build/calc\n");
	}

	#[test]
	fn out_of_range_ids_are_ignored() {
		let mut build = Build::new();
		let ghost = TargetId(42);
		build.add_source(ghost, "nope.c");
		build.add_define(ghost, "X");
		build.link_target(ghost, ghost);
		assert!(build.target(ghost).is_none());
	}
}
