use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::ReaderBuilder;

use crate::types::{FeatureVector, Sequence, FEATURE_COLUMNS, NUM_CHANNELS};

/// Carga una secuencia IMU desde un CSV con cabecera
/// ts_us,ax,ay,az,gx,gy,gz. Las columnas se buscan por nombre y la marca
/// temporal se ignora.
pub fn load_sequence_from_csv(path: impl AsRef<Path>) -> Result<Sequence> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Cabecera inválida en {:?}", path))?
        .clone();
    let mut columns = [0usize; NUM_CHANNELS];
    for (slot, name) in columns.iter_mut().zip(FEATURE_COLUMNS) {
        *slot = match headers.iter().position(|h| h == name) {
            Some(idx) => idx,
            None => bail!("Falta la columna '{}' en {:?}", name, path),
        };
    }

    let mut seq = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;

        let mut point: FeatureVector = [0.0; NUM_CHANNELS];
        for (c, &col) in columns.iter().enumerate() {
            let raw = record.get(col).unwrap_or("");
            point[c] = raw.parse().with_context(|| {
                format!(
                    "{} inválido ('{}') en fila {} de {:?}",
                    FEATURE_COLUMNS[c],
                    raw,
                    row_idx + 1,
                    path
                )
            })?;
        }
        seq.push(point);
    }

    ensure!(!seq.is_empty(), "El CSV {:?} no contiene muestras", path);
    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_reads_feature_columns() {
        let file = write_csv("ts_us,ax,ay,az,gx,gy,gz\n100,1,2,3,4,5,6\n200,-1,0,0.5,10,20,30\n");
        let seq = load_sequence_from_csv(file.path()).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[0], [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(seq[1], [-1.0, 0.0, 0.5, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_column_order_by_name() {
        let file = write_csv("gz,gy,gx,az,ay,ax,ts_us\n6,5,4,3,2,1,0\n");
        let seq = load_sequence_from_csv(file.path()).unwrap();
        assert_eq!(seq[0], [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_empty_csv_fails() {
        let file = write_csv("ts_us,ax,ay,az,gx,gy,gz\n");
        assert!(load_sequence_from_csv(file.path()).is_err());
    }

    #[test]
    fn test_missing_column_fails() {
        let file = write_csv("ts_us,ax,ay,az,gx,gy\n1,1,1,1,1,1\n");
        let err = load_sequence_from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("gz"));
    }

    #[test]
    fn test_bad_value_fails() {
        let file = write_csv("ts_us,ax,ay,az,gx,gy,gz\n1,1,x,1,1,1,1\n");
        assert!(load_sequence_from_csv(file.path()).is_err());
    }
}
