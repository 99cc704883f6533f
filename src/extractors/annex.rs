// src/extractors/annex.rs

// --- Imports ---
use crate::extractors::record::parse_folio;
use crate::utils::error::ExtractError;
use std::collections::HashSet;
use std::path::Path;

// --- Constants ---
/// Any line containing this token starts a new annex, whatever its title.
pub const ANNEX_MARKER: &str = "ANEXO ";
/// Full list of received applications, one row per applicant.
pub const APPLICATIONS_ANNEX: &str = "ANEXO 1: POSTULACIONES RECIBIDAS";
/// Applicants that were not selected but sit on the waiting list.
pub const WAITLIST_ANNEX: &str = "ANEXO 5: SELECCIONADAS EN LISTA DE ESPERA";

const ROW_DELIMITER: u8 = b';';
const UTF8_BOM: &str = "\u{feff}";

// --- Data Structures ---

/// One data line of an annex, mapped by position: `#;Folio;Nombre;Institución;Puntaje;Estado`.
/// Fields past the sixth are ignored, missing ones stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize, // 1-based line number in the source file
    pub index: Option<String>,
    pub folio: Option<String>,
    pub name: Option<String>,
    pub institution: Option<String>,
    pub score_text: Option<String>,
    pub status_text: Option<String>,
}

/// Folios listed in the waitlist annex. Built once per run, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitlistFolioSet(HashSet<i64>);

impl WaitlistFolioSet {
    pub fn contains(&self, folio: i64) -> bool {
        self.0.contains(&folio)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<i64> for WaitlistFolioSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A results export made of several titled annexes concatenated in one text file.
#[derive(Debug, Clone)]
pub struct AnnexFile {
    lines: Vec<String>,
}

impl AnnexFile {
    /// Reads the whole file into memory as trimmed lines.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ExtractError::FileNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                // Spreadsheet exports on Windows come out as Windows-1252
                tracing::warn!("{} is not valid UTF-8, decoding as Windows-1252", path.display());
                let (text, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
                text.into_owned()
            }
        };

        let annex = Self::from_text(&text);
        tracing::debug!("Read {} lines from {}", annex.lines.len(), path.display());
        Ok(annex)
    }

    pub fn from_text(text: &str) -> Self {
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
        let lines = text.lines().map(|line| line.trim().to_string()).collect();
        Self { lines }
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Collects the data rows of every annex whose title contains `annex_title`.
    ///
    /// A section runs from its title line to the next line carrying [`ANNEX_MARKER`]
    /// (any annex, not only the next matching one) or to the end of the file. The
    /// line right after the title is the header and is skipped, as are blank lines.
    /// Rows that fail to tokenize are returned as errors in place so callers can
    /// report them by line.
    pub fn section_rows(&self, annex_title: &str) -> Vec<Result<RawRow, ExtractError>> {
        let mut rows = Vec::new();
        let mut active = false;
        let mut header_index: Option<usize> = None;

        for (idx, line) in self.lines.iter().enumerate() {
            if line.contains(ANNEX_MARKER) {
                if active {
                    active = false;
                    header_index = None;
                }
                if line.contains(annex_title) {
                    tracing::trace!("Annex '{}' starts at line {}", annex_title, idx + 1);
                    active = true;
                    header_index = Some(idx + 1);
                }
                continue;
            }

            if !active || header_index == Some(idx) || line.is_empty() {
                continue;
            }

            rows.push(parse_row(idx + 1, line));
        }

        rows
    }

    /// Folios of the waitlist annex. Rows with a missing or non-numeric folio are left out.
    pub fn waitlist_folios(&self) -> WaitlistFolioSet {
        self.section_rows(WAITLIST_ANNEX)
            .into_iter()
            .filter_map(|row| match row {
                Ok(row) => {
                    let folio = row.folio.as_deref().and_then(parse_folio);
                    if folio.is_none() {
                        tracing::debug!("Ignoring waitlist line {}: folio {:?}", row.line, row.folio);
                    }
                    folio
                }
                Err(e) => {
                    tracing::debug!("Ignoring waitlist row: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Splits one physical line on `;` into the six positional fields.
/// Quotes are honored within the line; a record never spans lines.
pub fn parse_row(line_no: usize, line: &str) -> Result<RawRow, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(ROW_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    let has_record = reader.read_record(&mut record).map_err(|e| ExtractError::RowParse {
        line: line_no,
        message: e.to_string(),
    })?;

    if !has_record {
        return Ok(RawRow { line: line_no, ..Default::default() });
    }
    let mut fields = record.iter().map(str::to_string);

    Ok(RawRow {
        line: line_no,
        index: fields.next(),
        folio: fields.next(),
        name: fields.next(),
        institution: fields.next(),
        score_text: fields.next(),
        status_text: fields.next(),
    })
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Resultados Becas Municipales 2025
ANEXO 1: POSTULACIONES RECIBIDAS (listado general)
#;Folio;Nombre;Institución;Puntaje;Estado Postulación
1;1001;Juan Perez;Liceo A;6,5;Seleccionada

2;1002;Maria Lopez;Liceo B;-;No seleccionada
ANEXO 2: POSTULACIONES FUERA DE BASES
#;Folio;Nombre;Institución;Puntaje;Motivo
9;9009;Ana Rojas;Liceo C;-;Fuera de bases
ANEXO 5: SELECCIONADAS EN LISTA DE ESPERA
#;Folio;Nombre;Institución;Puntaje;Estado
1;1002;Maria Lopez;Liceo B;-;-
2;abc;Sin Folio;Liceo B;-;-
3;;Vacio;Liceo B;-;-
";

    fn folios(rows: &[Result<RawRow, ExtractError>]) -> Vec<String> {
        rows.iter()
            .map(|r| r.as_ref().unwrap().folio.clone().unwrap())
            .collect()
    }

    #[test]
    fn test_section_rows_stop_at_next_annex() {
        let annex = AnnexFile::from_text(SAMPLE);
        let rows = annex.section_rows(APPLICATIONS_ANNEX);
        assert_eq!(folios(&rows), vec!["1001", "1002"], "Rows from ANEXO 2 must not leak in");

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.line, 4);
        assert_eq!(first.name.as_deref(), Some("Juan Perez"));
        assert_eq!(first.score_text.as_deref(), Some("6,5"));
        assert_eq!(first.status_text.as_deref(), Some("Seleccionada"));
    }

    #[test]
    fn test_rows_between_unrelated_annexes_are_ignored() {
        let text = "\
ANEXO 3: OTRA COSA
#;Folio;Nombre;Institución;Puntaje;Estado
1;7777;Fantasma;Liceo Z;7,0;Seleccionada
ANEXO 4: TAMPOCO
#;Folio;Nombre;Institución;Puntaje;Estado
1;8888;Otro;Liceo Z;7,0;Seleccionada
";
        let annex = AnnexFile::from_text(text);
        assert!(annex.section_rows(APPLICATIONS_ANNEX).is_empty());
        assert!(annex.waitlist_folios().is_empty());
    }

    #[test]
    fn test_missing_annex_yields_no_rows() {
        let annex = AnnexFile::from_text("solo texto\n1;2;3;4;5;6\n");
        assert!(annex.section_rows(WAITLIST_ANNEX).is_empty());
    }

    #[test]
    fn test_repeated_annex_title_accumulates_rows() {
        let text = "\
ANEXO 1: POSTULACIONES RECIBIDAS (parte 1)
#;Folio;Nombre;Institución;Puntaje;Estado Postulación
1;1001;Juan Perez;Liceo A;6,5;Seleccionada
ANEXO 1: POSTULACIONES RECIBIDAS (parte 2)
#;Folio;Nombre;Institución;Puntaje;Estado Postulación
2;1002;Maria Lopez;Liceo B;-;No seleccionada
";
        let annex = AnnexFile::from_text(text);
        assert_eq!(folios(&annex.section_rows(APPLICATIONS_ANNEX)), vec!["1001", "1002"]);
    }

    #[test]
    fn test_header_is_only_the_line_after_the_title() {
        // A blank line right after the title takes the header slot, so the
        // header text itself then shows up as a row.
        let text = "ANEXO 1: POSTULACIONES RECIBIDAS\n\n#;Folio;Nombre\n";
        let rows = AnnexFile::from_text(text).section_rows(APPLICATIONS_ANNEX);
        assert_eq!(folios(&rows), vec!["Folio"]);
    }

    #[test]
    fn test_waitlist_folios_skip_non_numeric() {
        let annex = AnnexFile::from_text(SAMPLE);
        let waitlist = annex.waitlist_folios();
        assert_eq!(waitlist.len(), 1);
        assert!(waitlist.contains(1002));
        assert!(!waitlist.contains(1001));
    }

    #[test]
    fn test_parse_row_is_positional() {
        let row = parse_row(7, "3;1003;Pedro, Soto;Colegio X").unwrap();
        assert_eq!(row.line, 7);
        assert_eq!(row.index.as_deref(), Some("3"));
        assert_eq!(row.name.as_deref(), Some("Pedro, Soto"), "Commas are not delimiters");
        assert_eq!(row.institution.as_deref(), Some("Colegio X"));
        assert_eq!(row.score_text, None);
        assert_eq!(row.status_text, None);

        let long = parse_row(1, "1;2;3;4;5;6;7;8").unwrap();
        assert_eq!(long.status_text.as_deref(), Some("6"));
    }

    #[test]
    fn test_parse_row_keeps_quoted_semicolons() {
        let row = parse_row(1, r#"1;1004;Rosa Diaz;"Liceo; Bicentenario";5,0;Seleccionada"#).unwrap();
        assert_eq!(row.institution.as_deref(), Some("Liceo; Bicentenario"));
        assert_eq!(row.status_text.as_deref(), Some("Seleccionada"));
    }

    #[test]
    fn test_from_text_strips_bom_and_carriage_returns() {
        let annex = AnnexFile::from_text("\u{feff}ANEXO 1: POSTULACIONES RECIBIDAS\r\nh\r\n  1;5;N;I;-;Seleccionada  \r\n");
        assert_eq!(annex.lines()[0], APPLICATIONS_ANNEX);
        let rows = annex.section_rows(APPLICATIONS_ANNEX);
        assert_eq!(folios(&rows), vec!["5"]);
        assert_eq!(rows[0].as_ref().unwrap().status_text.as_deref(), Some("Seleccionada"));
    }

    #[test]
    fn test_open_missing_file() {
        let result = AnnexFile::open("/definitely/not/here.csv");
        assert!(matches!(result, Err(ExtractError::FileNotFound(_))));
    }

    #[test]
    fn test_open_decodes_windows_1252_punctuation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp1252.csv");
        // Curly quotes live in the 0x80-0x9F range that Latin-1 leaves to control codes
        let mut bytes = b"ANEXO 1: POSTULACIONES RECIBIDAS\n#;Folio\n1;10;Ana;Liceo ".to_vec();
        bytes.push(0x93);
        bytes.extend_from_slice(b"Sol");
        bytes.push(0x94);
        bytes.extend_from_slice(b";-;Seleccionada\n");
        std::fs::write(&path, bytes).unwrap();

        let annex = AnnexFile::open(&path).unwrap();
        let rows = annex.section_rows(APPLICATIONS_ANNEX);
        assert_eq!(rows[0].as_ref().unwrap().institution.as_deref(), Some("Liceo \u{201c}Sol\u{201d}"));
    }

    #[test]
    fn test_open_decodes_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        // "Institución" with ó encoded as a single 0xF3 byte
        let mut bytes = b"ANEXO 1: POSTULACIONES RECIBIDAS\n#;Folio\n1;10;Ana;Instituci".to_vec();
        bytes.push(0xF3);
        bytes.extend_from_slice(b"n;-;Seleccionada\n");
        std::fs::write(&path, bytes).unwrap();

        let annex = AnnexFile::open(&path).unwrap();
        let rows = annex.section_rows(APPLICATIONS_ANNEX);
        assert_eq!(rows[0].as_ref().unwrap().institution.as_deref(), Some("Institución"));
    }
}
