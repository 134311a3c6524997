use crate::{Contract, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub severity: Severity,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub percent: u8,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub phase: Phase,
    pub selected_file: Option<String>,
    pub max_part_mb: f64,
    /// Present only while a job is in flight.
    pub progress: Option<ProgressView>,
    pub status: Option<StatusLine>,
    pub submit_enabled: bool,
    pub busy: bool,
    pub contract: Contract,
    pub dirty: bool,
}

/// Abstract UI operations produced from a view model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    ShowSelectedFile(Option<String>),
    /// `None` hides the progress indicator.
    ShowProgress(Option<ProgressView>),
    ShowStatus(Option<StatusLine>),
    SetSubmitEnabled { enabled: bool, label: &'static str },
}

pub const SUBMIT_LABEL: &str = "Split and download ZIP";
pub const SUBMIT_LABEL_UPLOADING: &str = "Uploading...";
pub const SUBMIT_LABEL_PROCESSING: &str = "Processing...";

/// Maps a view model to the full set of UI commands. Always emits every
/// command, so applying the output twice leaves the UI unchanged.
pub fn render(view: &AppViewModel) -> Vec<UiCommand> {
    let label = match view.phase {
        Phase::Uploading
            if view.contract == Contract::SingleShot
                && view.progress.as_ref().is_some_and(|p| p.percent >= 100) =>
        {
            SUBMIT_LABEL_PROCESSING
        }
        Phase::Uploading => SUBMIT_LABEL_UPLOADING,
        Phase::Uploaded | Phase::Processing => SUBMIT_LABEL_PROCESSING,
        Phase::Idle | Phase::Completed | Phase::Failed => SUBMIT_LABEL,
    };

    vec![
        UiCommand::ShowSelectedFile(view.selected_file.clone()),
        UiCommand::ShowProgress(view.progress.clone()),
        UiCommand::ShowStatus(view.status.clone()),
        UiCommand::SetSubmitEnabled {
            enabled: view.submit_enabled,
            label,
        },
    ]
}

pub(crate) fn progress_label(phase: Phase, percent: u8, contract: Contract) -> String {
    match phase {
        Phase::Uploading if percent >= 100 && contract == Contract::SingleShot => {
            "Upload complete. Processing PDF...".to_string()
        }
        Phase::Uploading => format!("Uploading... {percent}%"),
        Phase::Uploaded => "Upload complete. Waiting for the server...".to_string(),
        Phase::Processing => format!("Processing PDF... {percent}%"),
        Phase::Idle | Phase::Completed | Phase::Failed => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_view_enables_submit_and_hides_progress() {
        let view = AppViewModel {
            submit_enabled: true,
            ..AppViewModel::default()
        };
        let cmds = render(&view);
        assert!(cmds.contains(&UiCommand::ShowProgress(None)));
        assert!(cmds.contains(&UiCommand::SetSubmitEnabled {
            enabled: true,
            label: SUBMIT_LABEL
        }));
    }

    #[test]
    fn render_is_deterministic() {
        let view = AppViewModel {
            phase: Phase::Processing,
            progress: Some(ProgressView {
                percent: 40,
                label: progress_label(Phase::Processing, 40, Contract::Streamed),
            }),
            busy: true,
            ..AppViewModel::default()
        };
        assert_eq!(render(&view), render(&view));
    }

    #[test]
    fn single_shot_upload_at_full_reads_as_processing() {
        assert_eq!(
            progress_label(Phase::Uploading, 100, Contract::SingleShot),
            "Upload complete. Processing PDF..."
        );
        assert_eq!(
            progress_label(Phase::Uploading, 100, Contract::Streamed),
            "Uploading... 100%"
        );
    }

    fn uploading_at(percent: u8, contract: Contract) -> AppViewModel {
        AppViewModel {
            phase: Phase::Uploading,
            progress: Some(ProgressView {
                percent,
                label: progress_label(Phase::Uploading, percent, contract),
            }),
            busy: true,
            contract,
            ..AppViewModel::default()
        }
    }

    fn submit_label(view: &AppViewModel) -> &'static str {
        render(view)
            .into_iter()
            .find_map(|cmd| match cmd {
                UiCommand::SetSubmitEnabled { label, .. } => Some(label),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn submit_label_agrees_with_progress_label_at_full_upload() {
        let streamed = uploading_at(100, Contract::Streamed);
        assert_eq!(streamed.progress.as_ref().unwrap().label, "Uploading... 100%");
        assert_eq!(submit_label(&streamed), SUBMIT_LABEL_UPLOADING);

        let single = uploading_at(100, Contract::SingleShot);
        assert_eq!(
            single.progress.as_ref().unwrap().label,
            "Upload complete. Processing PDF..."
        );
        assert_eq!(submit_label(&single), SUBMIT_LABEL_PROCESSING);
    }
}
