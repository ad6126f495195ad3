use polars::prelude::*;

/// Expected columns of a bar table.
pub struct BarSchema;

impl BarSchema {
    /// Columns every bar table must carry.
    pub const REQUIRED: [&'static str; 7] =
        ["ticker", "date", "open", "high", "low", "close", "volume"];

    /// Order-flow columns; zero-filled when absent.
    pub const OPTIONAL: [&'static str; 5] = [
        "buy_pressure",
        "sell_pressure",
        "foreign_buy",
        "foreign_sell",
        "foreign_net",
    ];

    const NUMERIC: [&'static str; 5] = ["open", "high", "low", "close", "volume"];

    /// Canonical schema, as written by `bars_to_frame`.
    pub fn schema() -> Schema {
        let mut fields = vec![
            Field::new("ticker".into(), DataType::String),
            Field::new("date".into(), DataType::Date),
        ];
        for name in Self::NUMERIC.iter().chain(Self::OPTIONAL.iter()) {
            fields.push(Field::new((*name).into(), DataType::Float64));
        }
        Schema::from_iter(fields)
    }

    /// Validate a frame. Every missing required column is reported at once.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();

        let missing: Vec<String> = Self::REQUIRED
            .iter()
            .filter(|name| !actual.contains(name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }

        for name in Self::NUMERIC.iter().chain(Self::OPTIONAL.iter()) {
            if let Some(dtype) = actual.get(name) {
                if !is_numeric(dtype) {
                    return Err(SchemaError::TypeMismatch {
                        column: name.to_string(),
                        actual: dtype.clone(),
                    });
                }
            }
        }

        match actual.get("date") {
            Some(DataType::Date) | Some(DataType::String) | None => {}
            Some(other) => {
                return Err(SchemaError::TypeMismatch {
                    column: "date".into(),
                    actual: other.clone(),
                })
            }
        }

        Ok(())
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column {column} has unsupported type {actual:?}")]
    TypeMismatch { column: String, actual: DataType },
}
