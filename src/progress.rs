//! Progress bars and a log writer that prints above them

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Bar tracking processed files of an index job
pub fn job_progress_bar(workspace: &str) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new(0));
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");
    bar.set_style(style);
    bar.set_message(workspace.to_string());
    bar
}

/// Spinner for an operation of unknown length
pub fn spinner(message: &str) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new_spinner());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar.set_message(message.to_string());
    bar
}

/// `MakeWriter` for `tracing-subscriber` that routes log lines through the
/// shared `MultiProgress` so they do not tear active bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::default()
    }
}

/// Line-buffering writer; each complete line is printed above the bars
#[derive(Default)]
pub struct LogWriter {
    pending: Vec<u8>,
}

impl LogWriter {
    fn emit(line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let _ = multi_progress().println(text.trim_end_matches('\r'));
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            Self::emit(&line[..line.len() - 1]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            Self::emit(&self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
