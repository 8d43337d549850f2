use std::ops::ControlFlow;

use dbgfetch::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

const PB_STYLE: &str = "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// A terminal progress bar fed by a lookup's progress reports.
///
/// Several servers report at once; the bar follows whichever is furthest.
pub struct DownloadBar {
    pb: ProgressBar,
}

impl DownloadBar {
    pub fn new(prefix: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        let pb = match PB_TEMPLATE.as_ref() {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        };
        pb.set_prefix(prefix.to_string());
        Self { pb }
    }

    pub fn sink(&self) -> ProgressSink {
        let pb = self.pb.clone();
        ProgressSink::new(move |p| {
            if let Some(total) = p.total_bytes {
                if pb.length() != Some(total) {
                    pb.set_length(total);
                }
            }
            if p.bytes_downloaded >= pb.position() {
                pb.set_position(p.bytes_downloaded);
                pb.set_message(format!("server #{}", p.server));
            }
            ControlFlow::Continue(())
        })
    }

    pub fn finish(self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }

    pub fn abandon(self) {
        self.pb.abandon();
    }
}
