use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::debug;

/// Stacks per-store frames whose column sets differ. The result has the union
/// of all columns in first-seen order; columns a frame lacks are null.
pub fn merge_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut columns: Vec<String> = Vec::new();
    for df in &frames {
        for name in df.get_column_names() {
            if !columns.iter().any(|c| c == name.as_str()) {
                columns.push(name.to_string());
            }
        }
    }

    let mut merged: Option<DataFrame> = None;
    for mut df in frames {
        let height = df.height();
        for name in &columns {
            let dtype = df.column(name).ok().map(|c| c.dtype().clone());
            match dtype {
                Some(DataType::String) => {}
                Some(_) => {
                    let casted = df.column(name)?.cast(&DataType::String)?;
                    df.with_column(casted)?;
                }
                None => {
                    df.with_column(Series::full_null(name.as_str().into(), height, &DataType::String))?;
                }
            }
        }

        let aligned = df.select(columns.iter().map(String::as_str))?;
        merged = match merged {
            None => Some(aligned),
            Some(mut acc) => {
                acc.vstack_mut(&aligned)
                    .context("Failed to stack store frames")?;
                Some(acc)
            }
        };
    }

    let merged = merged.unwrap_or_else(DataFrame::empty);
    debug!("Merged frame has {} rows and {} columns", merged.height(), merged.width());

    Ok(merged)
}
