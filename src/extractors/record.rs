// src/extractors/record.rs
use crate::extractors::annex::RawRow;
use crate::extractors::status::StatusCode;
use crate::utils::error::ExtractError;

const NO_SCORE: &str = "-";

/// An applicant ready to be written, keyed by `folio`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedApplicant {
    pub folio: i64,
    pub full_name: String,
    pub score: Option<f64>,
    pub year: i32,
    pub institution_name: String,
    pub status: StatusCode,
}

/// Reads a folio, tolerating surrounding whitespace only.
pub fn parse_folio(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Converts a score in Chilean notation ("6,5") to a number.
/// `-`, an empty cell or a missing column mean "no score".
pub fn parse_score(text: Option<&str>) -> Result<Option<f64>, String> {
    let text = match text.map(str::trim) {
        None | Some("") | Some(NO_SCORE) => return Ok(None),
        Some(text) => text,
    };
    match text.replace(',', ".").parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(Some(score)),
        _ => Err(text.to_string()),
    }
}

/// Builds the record to store from a row whose status is already resolved.
///
/// Only an unreadable folio rejects the row. An unreadable score is stored as
/// `None` and handed back as a warning next to the record.
pub fn normalize_row(
    row: &RawRow,
    year: i32,
    status: StatusCode,
) -> Result<(ResolvedApplicant, Option<ExtractError>), ExtractError> {
    let folio_text = row.folio.as_deref().unwrap_or_default();
    let folio = parse_folio(folio_text).ok_or_else(|| ExtractError::MalformedFolio {
        line: row.line,
        text: folio_text.to_string(),
    })?;

    let (score, score_warning) = match parse_score(row.score_text.as_deref()) {
        Ok(score) => (score, None),
        Err(text) => (None, Some(ExtractError::MalformedScore { line: row.line, text })),
    };

    let applicant = ResolvedApplicant {
        folio,
        full_name: row.name.as_deref().unwrap_or_default().trim().to_string(),
        score,
        year,
        // A stray delimiter can survive inside a quoted cell
        institution_name: row.institution.as_deref().unwrap_or_default().replace(';', ""),
        status,
    };
    Ok((applicant, score_warning))
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::annex::parse_row;

    #[test]
    fn test_parse_score_decimal_comma() {
        assert_eq!(parse_score(Some("6,5")), Ok(Some(6.5)));
        assert_eq!(parse_score(Some("7.0")), Ok(Some(7.0)));
        assert_eq!(parse_score(Some(" 5,25 ")), Ok(Some(5.25)));
        assert_eq!(parse_score(Some("-")), Ok(None));
        assert_eq!(parse_score(Some(" - ")), Ok(None));
        assert_eq!(parse_score(Some("")), Ok(None));
        assert_eq!(parse_score(None), Ok(None));
        assert_eq!(parse_score(Some("seis")), Err("seis".to_string()));
        assert!(parse_score(Some("NaN")).is_err());
    }

    #[test]
    fn test_parse_folio() {
        assert_eq!(parse_folio("1001"), Some(1001));
        assert_eq!(parse_folio(" 1001 "), Some(1001));
        assert_eq!(parse_folio("10a1"), None);
        assert_eq!(parse_folio(""), None);
    }

    #[test]
    fn test_normalize_selected_row() {
        let row = parse_row(4, "1;1001;Juan Perez ;Liceo A;6,5;Seleccionada").unwrap();
        let (applicant, warning) = normalize_row(&row, 2025, StatusCode::Selected).unwrap();
        assert!(warning.is_none());
        assert_eq!(
            applicant,
            ResolvedApplicant {
                folio: 1001,
                full_name: "Juan Perez".to_string(),
                score: Some(6.5),
                year: 2025,
                institution_name: "Liceo A".to_string(),
                status: StatusCode::Selected,
            }
        );
    }

    #[test]
    fn test_normalize_strips_semicolons_from_institution() {
        let row = parse_row(1, r#"1;1004;Rosa Diaz;"Liceo; Bicentenario";-;Seleccionada"#).unwrap();
        let (applicant, _) = normalize_row(&row, 2025, StatusCode::Selected).unwrap();
        assert_eq!(applicant.institution_name, "Liceo Bicentenario");
        assert_eq!(applicant.score, None);
    }

    #[test]
    fn test_normalize_rejects_bad_folio() {
        let row = parse_row(12, "1;N/A;Juan;Liceo A;6,5;Seleccionada").unwrap();
        match normalize_row(&row, 2025, StatusCode::Selected) {
            Err(ExtractError::MalformedFolio { line, text }) => {
                assert_eq!(line, 12);
                assert_eq!(text, "N/A");
            }
            other => panic!("Expected MalformedFolio, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_keeps_row_with_unreadable_score() {
        let row = parse_row(13, "1;1001;Juan;Liceo A;6,5 pts;Seleccionada").unwrap();
        let (applicant, warning) = normalize_row(&row, 2025, StatusCode::Selected).unwrap();
        assert_eq!(applicant.folio, 1001);
        assert_eq!(applicant.score, None);
        assert_eq!(applicant.status, StatusCode::Selected);
        match warning {
            Some(ExtractError::MalformedScore { line, text }) => {
                assert_eq!(line, 13);
                assert_eq!(text, "6,5 pts");
            }
            other => panic!("Expected MalformedScore warning, got {:?}", other),
        }
    }
}
