// src/extractors/status.rs
use crate::extractors::annex::WaitlistFolioSet;
use serde::Serialize;

// Status labels as written in the "Estado Postulación" column
const SELECTED_TEXT: &str = "Seleccionada";
const DISQUALIFIED_TEXT: &str = "Fuera de bases";
const NOT_SELECTED_TEXT: &str = "No seleccionada";

/// Final status stored for an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    Selected,
    Waitlisted,
    NotSelected,
    Disqualified,
}

impl StatusCode {
    pub const ALL: [StatusCode; 4] = [
        StatusCode::Selected,
        StatusCode::Waitlisted,
        StatusCode::NotSelected,
        StatusCode::Disqualified,
    ];

    /// Unique key of the row in the `statuses` table.
    pub fn slug(self) -> &'static str {
        match self {
            StatusCode::Selected => "selected",
            StatusCode::Waitlisted => "waitlisted",
            StatusCode::NotSelected => "not-selected",
            StatusCode::Disqualified => "disqualified",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            StatusCode::Selected => "Seleccionado",
            StatusCode::Waitlisted => "En Lista de Espera",
            StatusCode::NotSelected => "No Seleccionado",
            StatusCode::Disqualified => "Fuera de Bases",
        }
    }
}

/// Maps the status column of a row to a [`StatusCode`].
///
/// "No seleccionada" is split in two by looking the folio up in the waitlist
/// annex; a folio that could not be read is never on the waitlist. Any other
/// text, including a missing column, gives `None` and the row is dropped.
pub fn resolve_status(
    status_text: Option<&str>,
    folio: Option<i64>,
    waitlist: &WaitlistFolioSet,
) -> Option<StatusCode> {
    match status_text?.trim() {
        SELECTED_TEXT => Some(StatusCode::Selected),
        DISQUALIFIED_TEXT => Some(StatusCode::Disqualified),
        NOT_SELECTED_TEXT => match folio {
            Some(folio) if waitlist.contains(folio) => Some(StatusCode::Waitlisted),
            _ => Some(StatusCode::NotSelected),
        },
        _ => None,
    }
}
