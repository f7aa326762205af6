//! Error display for the binary.

use colored::Colorize;
use lisa_playbook::PlaybookError;

use crate::pool::PoolError;
use crate::session::SessionError;

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let playbook = err.downcast_ref::<PlaybookError>().or_else(|| {
        err.downcast_ref::<SessionError>().and_then(|e| match e {
            SessionError::Playbook(inner) => Some(inner),
            _ => None,
        })
    });

    if let Some(playbook) = playbook {
        return match playbook {
            PlaybookError::Io { .. } => Some("Check the --playbook path."),
            PlaybookError::Schema { .. } | PlaybookError::Shape(_) => {
                Some("Playbook keys are `targets` and `criteria`; see the playbook schema.")
            }
            PlaybookError::DuplicateTarget(_) => Some("Target names must be unique."),
            _ => None,
        };
    }

    if let Some(session) = err.downcast_ref::<SessionError>() {
        return match session {
            SessionError::UnknownPlatform { .. } => {
                Some("Use a registered platform or set --default-platform.")
            }
            SessionError::CatalogIo { .. } | SessionError::CatalogFormat(_) => {
                Some("--tests expects the JSON catalog exported by the host engine.")
            }
            _ => None,
        };
    }

    match err.downcast_ref::<PoolError>() {
        Some(e) if e.is_configuration_error() => Some("Check the platform name in the playbook."),
        _ => None,
    }
}
