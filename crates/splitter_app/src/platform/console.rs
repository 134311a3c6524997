use std::io::{self, Write};

use splitter_core::{Severity, StatusLine, UiCommand};

/// Terminal projection of [`UiCommand`]s. Only changes are printed, so
/// re-applying an unchanged render produces no output.
pub struct Console<W: Write> {
    out: W,
    selected_file: Option<String>,
    progress_label: Option<String>,
    status: Option<StatusLine>,
}

impl Console<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            selected_file: None,
            progress_label: None,
            status: None,
        }
    }

    pub fn apply(&mut self, commands: Vec<UiCommand>) -> io::Result<()> {
        for command in commands {
            match command {
                UiCommand::ShowSelectedFile(name) => {
                    if name != self.selected_file {
                        if let Some(name) = &name {
                            writeln!(self.out, "File: {name}")?;
                        }
                        self.selected_file = name;
                    }
                }
                UiCommand::ShowProgress(progress) => {
                    let label = progress.map(|p| p.label);
                    if label != self.progress_label {
                        if let Some(label) = &label {
                            writeln!(self.out, "{label}")?;
                        }
                        self.progress_label = label;
                    }
                }
                UiCommand::ShowStatus(status) => {
                    if status != self.status {
                        if let Some(status) = &status {
                            writeln!(self.out, "{}{}", prefix(status.severity), status.text)?;
                        }
                        self.status = status;
                    }
                }
                // No button on a terminal.
                UiCommand::SetSubmitEnabled { .. } => {}
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn prefix(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "OK: ",
        Severity::Error => "Error: ",
    }
}
