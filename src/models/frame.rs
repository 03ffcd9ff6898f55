use anyhow::Result;
use polars::prelude::*;

use super::columns::{ARQUIVO, LINHA};
use crate::report::RowRef;

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Values of a column as text; a missing column reads as all-null.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };

    let casted = column.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();

    Ok(values)
}

pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };

    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_iter().collect())
}

pub fn set_string_column(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

pub fn set_constant_column(df: &mut DataFrame, name: &str, value: Option<&str>) -> Result<()> {
    let values = vec![value.map(str::to_string); df.height()];
    set_string_column(df, name, values)
}

/// Source file and line of every row, read from the provenance columns.
pub fn row_refs(df: &DataFrame) -> Result<Vec<RowRef>> {
    let arquivos = string_values(df, ARQUIVO)?;
    let linhas = string_values(df, LINHA)?;

    Ok(arquivos
        .into_iter()
        .zip(linhas)
        .map(|(arquivo, linha)| {
            RowRef::new(
                arquivo.unwrap_or_default(),
                linha.and_then(|l| l.parse().ok()),
            )
        })
        .collect())
}

/// Trims, collapses inner whitespace and turns blanks into nulls.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    let collapsed = value?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Series::new(ARQUIVO.into(), vec!["a.csv", "a.csv"]).into(),
            Series::new(LINHA.into(), vec!["2", "3"]).into(),
            Series::new("valor".into(), vec![Some(1.5), None]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_missing_column_reads_as_null() {
        let df = sample();
        assert_eq!(string_values(&df, "nao_existe").unwrap(), vec![None, None]);
        assert!(!has_column(&df, "nao_existe"));
    }

    #[test]
    fn test_numeric_column_read_as_text() {
        let df = sample();
        let values = string_values(&df, "valor").unwrap();
        assert_eq!(values[1], None);
        assert!(values[0].as_deref().unwrap().starts_with("1.5"));
        assert_eq!(f64_values(&df, "valor").unwrap(), vec![Some(1.5), None]);
    }

    #[test]
    fn test_row_refs() {
        let df = sample();
        let rows = row_refs(&df).unwrap();
        assert_eq!(rows[1], RowRef::new("a.csv", Some(3)));
    }

    #[test]
    fn test_set_columns() {
        let mut df = sample();
        set_constant_column(&mut df, "tipo", Some("OS")).unwrap();
        set_string_column(&mut df, "valor", vec![Some("x".into()), None]).unwrap();
        assert_eq!(string_values(&df, "tipo").unwrap(), vec![Some("OS".into()), Some("OS".into())]);
        assert_eq!(string_values(&df, "valor").unwrap()[0].as_deref(), Some("x"));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  Loja   Centro ")).as_deref(), Some("Loja Centro"));
        assert_eq!(clean_text(Some("   ")), None);
        assert_eq!(clean_text(None), None);
    }
}
