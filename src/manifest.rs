use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::csv_loader::load_sequence_from_csv;
use crate::error::MatchError;
use crate::preprocess::prepare;
use crate::types::{normalize_label, LabeledSequence};

/// Fila del manifiesto JSONL (los campos no usados se ignoran)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestRow {
    #[serde(default)]
    pub label: String,
    pub csv_path: PathBuf,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Convierte "a, B ," en {"a", "b"}
pub fn parse_label_filter(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(normalize_label)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Lee el manifiesto filtrando por sesión (si no está vacía) y por
/// etiquetas (si el conjunto no está vacío). Las etiquetas se normalizan.
pub fn read_manifest(
    path: impl AsRef<Path>,
    session: &str,
    labels: &BTreeSet<String>,
) -> Result<Vec<ManifestRow>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("No se pudo abrir el manifiesto {:?}", path))?;

    let mut rows = Vec::new();
    for (line_idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Error leyendo {:?}", path))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut row: ManifestRow = serde_json::from_str(line)
            .with_context(|| format!("Línea {} inválida en {:?}", line_idx + 1, path))?;

        if !session.is_empty() && row.session_id.as_deref() != Some(session) {
            continue;
        }
        row.label = normalize_label(&row.label);
        if !labels.is_empty() && !labels.contains(&row.label) {
            continue;
        }
        rows.push(row);
    }

    debug!("Manifiesto {:?}: {} filas seleccionadas", path, rows.len());
    Ok(rows)
}

/// Lee y prepara cada grabación del manifiesto
pub fn load_labeled_sequences(
    rows: &[ManifestRow],
    max_points: i64,
    use_znorm: bool,
) -> Result<Vec<LabeledSequence>> {
    if rows.is_empty() {
        return Err(MatchError::EmptySelection {
            reason: "ninguna fila del manifiesto pasa los filtros".to_string(),
        }
        .into());
    }

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let raw = load_sequence_from_csv(&row.csv_path)?;
        let seq = prepare(&raw, max_points, use_znorm)
            .with_context(|| format!("No se pudo preparar {:?}", row.csv_path))?;
        items.push(LabeledSequence::new(&row.label, row.csv_path.clone(), seq));
    }

    info!(
        "Cargadas {} secuencias ({} etiquetas)",
        items.len(),
        items.iter().map(|x| x.label.as_str()).collect::<BTreeSet<_>>().len()
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn manifest(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_label_filter_parsing() {
        let labels = parse_label_filter(" Swipe_Left, idle ,,");
        assert_eq!(
            labels.into_iter().collect::<Vec<_>>(),
            vec!["idle".to_string(), "swipe_left".to_string()]
        );
        assert!(parse_label_filter("").is_empty());
    }

    #[test]
    fn test_filters_and_normalizes() {
        let file = manifest(&[
            r#"{"session_id": "s1", "label": " Swipe_Left ", "csv_path": "a.csv", "repeat_index": 1}"#,
            "",
            r#"{"session_id": "s2", "label": "idle", "csv_path": "b.csv"}"#,
            r#"{"session_id": "s1", "label": "idle", "csv_path": "c.csv"}"#,
        ]);

        let all = read_manifest(file.path(), "", &BTreeSet::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].label, "swipe_left");

        let s1 = read_manifest(file.path(), "s1", &BTreeSet::new()).unwrap();
        assert_eq!(s1.len(), 2);

        let idle = read_manifest(file.path(), "s1", &parse_label_filter("idle")).unwrap();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].csv_path, PathBuf::from("c.csv"));
    }

    #[test]
    fn test_row_without_session_skipped_by_session_filter() {
        let file = manifest(&[r#"{"label": "idle", "csv_path": "x.csv"}"#]);
        assert!(read_manifest(file.path(), "s1", &BTreeSet::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_selection() {
        let err = load_labeled_sequences(&[], 180, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchError>(),
            Some(MatchError::EmptySelection { .. })
        ));
    }
}
