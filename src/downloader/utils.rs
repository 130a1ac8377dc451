// Process helpers shared by the yt-dlp boundary

use std::ffi::OsStr;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;

use super::errors::ExtractionError;

/// Run a program to completion, collecting stdout and stderr.
///
/// No timeout: transfers and probes run as long as yt-dlp needs.
pub async fn run_output<I, S>(program: &OsStr, args: I) -> Result<std::process::Output, ExtractionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = spawn_piped(program, args)?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(read_all(stdout_pipe));
    let stderr_task = tokio::spawn(read_all(stderr_pipe));

    let status = child.wait().await?;
    let stdout = join_reader(stdout_task).await?;
    let stderr = join_reader(stderr_task).await?;

    Ok(std::process::Output { status, stdout, stderr })
}

/// Start a program with piped stdout/stderr and no stdin
pub fn spawn_piped<I, S>(program: &OsStr, args: I) -> Result<tokio::process::Child, ExtractionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| {
            let name = program.to_string_lossy().into_owned();
            if source.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::ToolNotFound(name)
            } else {
                ExtractionError::Spawn { program: name, source }
            }
        })
}

/// Read a pipe to the end; a missing pipe reads as empty
pub async fn read_all<R>(pipe: Option<R>) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

pub async fn join_reader(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ExtractionError> {
    task.await
        .map_err(|e| ExtractionError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
        .map_err(ExtractionError::from)
}
