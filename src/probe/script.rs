// src/probe/script.rs
use super::{process, ProbeError};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ScriptProbe {
    timeout: Duration,
}

enum Finish {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl ScriptProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run the script to completion, bounded by both the local timeout and the
    /// shared token. Whichever fires first kills the script's process group.
    pub async fn run(
        &self,
        ctx: &CancellationToken,
        path: &Path,
        args: &[String],
    ) -> Result<(), ProbeError> {
        if ctx.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        debug!(script = %path.display(), timeout = ?self.timeout, "executing script");

        let mut command = Command::new(path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process::isolate(&mut command);

        let mut child = command.spawn()?;
        let pgid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // stdout and stderr interleaved in arrival order
        let combined = Mutex::new(Vec::new());

        let finish = tokio::select! {
            biased;
            _ = ctx.cancelled() => Finish::Cancelled,
            (status, _) = async {
                tokio::join!(
                    child.wait(),
                    async { tokio::try_join!(drain(stdout, &combined), drain(stderr, &combined)) },
                )
            } => Finish::Exited(status),
            _ = sleep(self.timeout) => Finish::TimedOut,
        };

        let output = || {
            let bytes = combined.lock().unwrap_or_else(PoisonError::into_inner);
            let text = String::from_utf8_lossy(&bytes).trim_end().to_string();
            text
        };

        match finish {
            Finish::Exited(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(ProbeError::Exit {
                        status,
                        output: output(),
                    })
                }
            }
            Finish::TimedOut => {
                process::terminate_tree(&mut child, pgid);
                let _ = child.wait().await;
                Err(ProbeError::Killed {
                    after: self.timeout,
                    output: output(),
                })
            }
            Finish::Cancelled => {
                process::terminate_tree(&mut child, pgid);
                let _ = child.wait().await;
                Err(ProbeError::Cancelled)
            }
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(
    reader: Option<R>,
    sink: &Mutex<Vec<u8>>,
) -> std::io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&chunk[..n]);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Instant;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "ok.sh", "echo ok");

        let probe = ScriptProbe::new(Duration::from_secs(5));
        let result = probe.run(&CancellationToken::new(), &script, &[]).await;
        assert!(result.is_ok(), "{:?}", result);
    }

    #[tokio::test]
    async fn test_args_are_passed() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "args.sh", r#"[ "$1" = "--mode" ] && [ "$2" = "fast" ]"#);

        let probe = ScriptProbe::new(Duration::from_secs(5));
        let args = vec!["--mode".to_string(), "fast".to_string()];
        assert!(probe.run(&CancellationToken::new(), &script, &args).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_captures_combined_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "fail.sh", "echo to-stdout\necho to-stderr 1>&2\nexit 3");

        let probe = ScriptProbe::new(Duration::from_secs(5));
        let err = probe
            .run(&CancellationToken::new(), &script, &[])
            .await
            .unwrap_err();

        match &err {
            ProbeError::Exit { status, output } => {
                assert_eq!(status.code(), Some(3));
                assert!(output.contains("to-stdout"));
                assert!(output.contains("to-stderr"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!err.is_cancellation());
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slow.sh", "echo started\nsleep 10");

        let probe = ScriptProbe::new(Duration::from_millis(300));
        let start = Instant::now();
        let err = probe
            .run(&CancellationToken::new(), &script, &[])
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(5));
        match err {
            ProbeError::Killed { after, output } => {
                assert_eq!(after, Duration::from_millis(300));
                assert!(output.contains("started"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shared_cancellation_wins_over_longer_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "slow.sh", "sleep 10");

        let ctx = CancellationToken::new();
        let trigger = ctx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let probe = ScriptProbe::new(Duration::from_secs(30));
        let start = Instant::now();
        let err = probe.run(&ctx, &script, &[]).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancellation_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");
        let script = write_script(
            dir.path(),
            "spawner.sh",
            &format!("sleep 30 &\necho $! > {}\nwait", pid_file.display()),
        );

        let ctx = CancellationToken::new();
        let trigger = ctx.clone();
        let watched = pid_file.clone();
        tokio::spawn(async move {
            while !watched.exists() {
                sleep(Duration::from_millis(20)).await;
            }
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let probe = ScriptProbe::new(Duration::from_secs(30));
        let err = probe.run(&ctx, &script, &[]).await.unwrap_err();
        assert!(err.is_cancellation());

        let pid: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        // The grandchild is either gone or a zombie awaiting its reaper.
        let mut dead = false;
        for _ in 0..100 {
            match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Err(_) => dead = true,
                Ok(stat) => dead = stat.contains(") Z") || stat.contains(") X"),
            }
            if dead {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert!(dead, "descendant {} outlived the cancelled probe", pid);
    }
}
