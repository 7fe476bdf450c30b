//! Invocation of the native compiler to obtain the GIMPLE of a source file.

use std::{
    io::Read,
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use gbr_errors::driver::{Error, Result};
use itertools::Itertools;
use tracing::{info, warn};

use crate::config::GccConfig;

/// How often a running compiler is checked for exit when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs the native compiler described by `config` on `source`, returning the
/// JSON that the GIMPLE plugin wrote to standard output.
///
/// # Errors
///
/// - [`Error::Io`] if the compiler cannot be started or its output cannot be
///   read.
/// - [`Error::NativeCompileFailed`] if the compiler exits unsuccessfully.
/// - [`Error::NativeCompileTimedOut`] if the compiler is still running when
///   the configured timeout elapses.
pub fn compile_to_gimple(config: &GccConfig, source: &Path) -> Result<Vec<u8>> {
    let args = config.arguments(source);
    info!("{} {}", config.compiler.display(), args.iter().join(" "));

    let mut command = Command::new(&config.compiler);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut command);
    let mut child = command.spawn()?;

    // Both pipes are drained concurrently, as a compiler that fills one of them
    // would otherwise block forever.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match config.timeout {
        Some(timeout) => wait_with_timeout(&mut child, timeout)?,
        None => Some(child.wait()?),
    };
    let Some(status) = status else {
        // Every process holding the pipes was killed along with the group, so
        // the readers finish.
        for (name, reader) in [("stdout", stdout), ("stderr", stderr)] {
            match collect(reader) {
                Ok(output) if !output.is_empty() => warn!(
                    "{name} of the killed compiler: {}",
                    String::from_utf8_lossy(&output).trim_end()
                ),
                Ok(_) => (),
                Err(e) => warn!("Could not read the {name} of the killed compiler: {e}"),
            }
        }
        return Err(Error::NativeCompileTimedOut(config.timeout.unwrap_or_default()));
    };

    let stdout = collect(stdout)?;
    let stderr = String::from_utf8_lossy(&collect(stderr)?).into_owned();

    if !status.success() {
        return Err(Error::NativeCompileFailed {
            status: status.code(),
            stderr,
        });
    }
    if !stderr.is_empty() {
        warn!("{}", stderr.trim_end());
    }

    Ok(stdout)
}

/// Waits for `child` to exit for at most `timeout`, killing it if it does not.
///
/// Returns [`None`] if the child was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            kill_process_group(child)?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Makes the compiler the leader of a new process group.
///
/// `gcc` runs `cc1`, and hence the plugin, as a child of its own, so a timeout
/// has to take down the whole group.
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Kills every process in the group led by `child`.
#[cfg(unix)]
fn kill_process_group(child: &Child) -> Result<()> {
    let pid = libc::pid_t::try_from(child.id()).map_err(|e| Error::Io(e.to_string()))?;

    // SAFETY: `kill` takes no pointers, and a negative pid addresses the group.
    if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
        let error = std::io::Error::last_os_error();
        // The group may have exited since it was last polled.
        if error.raw_os_error() != Some(libc::ESRCH) {
            return Err(error.into());
        }
    }

    Ok(())
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> Result<()> {
    child.kill()?;
    Ok(())
}

/// Reads everything from `pipe` on a thread of its own.
fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

/// Gets the output read by `reader`.
fn collect(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    let output = reader
        .join()
        .map_err(|_| Error::Io("the compiler output reader panicked".to_string()))??;
    Ok(output)
}

#[cfg(all(test, unix))]
mod test {
    use std::time::{Duration, Instant};

    use gbr_errors::driver::Error;

    use crate::{config::GccConfigBuilder, gcc::compile_to_gimple, test_util::FakeGcc};

    #[test]
    fn returns_the_plugin_output() -> anyhow::Result<()> {
        let gcc = FakeGcc::new("echo '{}'; echo 'note: nothing to do' >&2")?;
        let config = GccConfigBuilder::new(gcc.plugin()).with_compiler(gcc.path()).build()?;

        let output = compile_to_gimple(&config, "main.c".as_ref())?;
        assert_eq!(output, b"{}\n");

        Ok(())
    }

    #[test]
    fn passes_the_command_line() -> anyhow::Result<()> {
        let gcc = FakeGcc::new(r#"echo "$@""#)?;
        let config = GccConfigBuilder::new(gcc.plugin())
            .with_compiler(gcc.path())
            .with_include_dir("inc")
            .build()?;

        let output = compile_to_gimple(&config, "main.c".as_ref())?;
        let expected = format!(
            "-c -S -O0 -fplugin={} -I inc main.c -o /dev/null\n",
            gcc.plugin().display()
        );
        assert_eq!(String::from_utf8(output)?, expected);

        Ok(())
    }

    #[test]
    fn failures_carry_stderr_verbatim() -> anyhow::Result<()> {
        let gcc = FakeGcc::new("echo 'main.c:1:1: error: expected identifier' >&2; exit 1")?;
        let config = GccConfigBuilder::new(gcc.plugin()).with_compiler(gcc.path()).build()?;

        let result = compile_to_gimple(&config, "main.c".as_ref());
        assert_eq!(
            result,
            Err(Error::NativeCompileFailed {
                status: Some(1),
                stderr: "main.c:1:1: error: expected identifier\n".to_string(),
            })
        );

        Ok(())
    }

    #[test]
    fn slow_compilers_are_killed() -> anyhow::Result<()> {
        let gcc = FakeGcc::new("exec sleep 10")?;
        let timeout = Duration::from_millis(100);
        let config = GccConfigBuilder::new(gcc.plugin())
            .with_compiler(gcc.path())
            .with_timeout(timeout)
            .build()?;

        let result = compile_to_gimple(&config, "main.c".as_ref());
        assert_eq!(result, Err(Error::NativeCompileTimedOut(timeout)));

        Ok(())
    }

    #[test]
    fn timeouts_kill_the_compilers_subprocesses() -> anyhow::Result<()> {
        // Without `exec` the shell waits on `sleep`, which holds the pipes.
        let gcc = FakeGcc::new("sleep 5; echo done")?;
        let timeout = Duration::from_millis(100);
        let config = GccConfigBuilder::new(gcc.plugin())
            .with_compiler(gcc.path())
            .with_timeout(timeout)
            .build()?;

        let start = Instant::now();
        let result = compile_to_gimple(&config, "main.c".as_ref());
        assert_eq!(result, Err(Error::NativeCompileTimedOut(timeout)));
        assert!(start.elapsed() < Duration::from_secs(3));

        Ok(())
    }

    #[test]
    fn missing_compilers_are_io_errors() -> anyhow::Result<()> {
        let gcc = FakeGcc::new("exit 0")?;
        let config = GccConfigBuilder::new(gcc.plugin())
            .with_compiler("/nonexistent/gcc")
            .build()?;

        let result = compile_to_gimple(&config, "main.c".as_ref());
        assert!(matches!(result, Err(Error::Io(_))));

        Ok(())
    }
}
