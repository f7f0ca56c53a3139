use anyhow::{anyhow, bail, Result};
use std::io::Write;
use std::process::{Child, Command, Stdio};
use tracing::debug;

pub trait Clipboard: Send + Sync {
    fn copy_text(&self, text: &str) -> Result<()>;
}

/// Copies through the first clipboard tool that works on this platform.
pub struct SystemClipboard;

type Tool = (&'static str, &'static [&'static str]);

const MACOS_TOOLS: &[Tool] = &[("pbcopy", &[])];
const WINDOWS_TOOLS: &[Tool] = &[("clip", &[])];
const UNIX_TOOLS: &[Tool] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

fn clipboard_tools() -> &'static [Tool] {
    if cfg!(target_os = "macos") {
        MACOS_TOOLS
    } else if cfg!(target_os = "windows") {
        WINDOWS_TOOLS
    } else {
        UNIX_TOOLS
    }
}

impl Clipboard for SystemClipboard {
    fn copy_text(&self, text: &str) -> Result<()> {
        let tools = clipboard_tools();
        for (program, args) in tools {
            match copy_with(program, args, text) {
                Ok(()) => return Ok(()),
                Err(e) => debug!("Clipboard tool '{}' unavailable: {}", program, e),
            }
        }
        let names: Vec<&str> = tools.iter().map(|(program, _)| *program).collect();
        Err(anyhow!("no clipboard command available (tried {})", names.join(", ")))
    }
}

fn copy_with(program: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    feed_and_wait(&mut child, text)
        .map_err(|e| anyhow!("clipboard command '{}' failed: {}", program, e))
}

/// Writes `text` to the child's stdin and always reaps the child, even when
/// the write fails.
fn feed_and_wait(child: &mut Child, text: &str) -> Result<()> {
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;
    if !status.success() {
        bail!("exited with {}", status);
    }
    Ok(())
}
