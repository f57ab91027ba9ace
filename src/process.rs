//! OS-neutral shell spawning. Commands are single shell lines evaluated by
//! the host shell; the caller is responsible for quoting.

use std::process::{Command, Stdio};

fn shell_command(line: &str) -> Command {
	if cfg!(windows) {
		let mut cmd = Command::new("cmd");
		cmd.arg("/C").arg(line);
		cmd
	} else {
		let mut cmd = Command::new("sh");
		cmd.arg("-c").arg(line);
		cmd
	}
}

// Exit codes are normalized so 0 is success; a killed or unspawnable process
// reports -1.
fn exit_code(status: std::io::Result<std::process::ExitStatus>) -> i32 {
	match status {
		Ok(st) => st.code().unwrap_or(-1),
		Err(e) => {
			log::error!("Error spawning shell command: {}", e);
			-1
		}
	}
}

/// Run a shell line with inherited stdio. Returns the process exit code.
pub(crate) fn run_shell(line: &str) -> i32 {
	log::debug!("run: {}", line);
	exit_code(shell_command(line).status())
}

/// Run a shell line capturing stdout until EOF. Stderr inherits.
pub(crate) fn run_shell_capture(line: &str) -> (i32, Vec<u8>) {
	log::debug!("run (capture): {}", line);
	let output = shell_command(line)
		.stdout(Stdio::piped())
		.stderr(Stdio::inherit())
		.output();
	match output {
		Ok(out) => (out.status.code().unwrap_or(-1), out.stdout),
		Err(e) => {
			log::error!("Error spawning shell command: {}", e);
			(-1, Vec::new())
		}
	}
}

/// Replace the current process image with `exe`, passing `args` unchanged.
///
/// On Unix this is a true exec: the new image inherits stdio and reports its
/// status to the invoking shell directly. Windows has no exec, so the closest
/// equivalent is spawn-wait-exit with the child's status.
pub(crate) fn exec_replace(exe: &std::path::Path, args: &[String]) -> ! {
	#[cfg(unix)]
	{
		use std::os::unix::process::CommandExt;
		let err = Command::new(exe).args(args).exec();
		log::error!("Error executing {}: {}", exe.display(), err);
		std::process::exit(1);
	}
	#[cfg(not(unix))]
	{
		let status = Command::new(exe).args(args).status();
		std::process::exit(exit_code(status));
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	#[test]
	fn exit_codes_are_normalized() {
		assert_eq!(run_shell("true"), 0);
		assert_eq!(run_shell("exit 3"), 3);
	}

	#[test]
	fn capture_reads_stdout_only() {
		let (rc, out) = run_shell_capture("echo hello; echo ignored >&2");
		assert_eq!(rc, 0);
		assert_eq!(String::from_utf8_lossy(&out), "hello\n");
	}

	#[test]
	fn capture_reports_failure_with_partial_output() {
		let (rc, out) = run_shell_capture("echo partial; exit 2");
		assert_eq!(rc, 2);
		assert_eq!(String::from_utf8_lossy(&out), "partial\n");
	}
}
