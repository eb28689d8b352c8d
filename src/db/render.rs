// ABOUTME: Renders tiberius cell values as display strings
// ABOUTME: Mirrors what a JDBC getString call shows for each SQL Server type

use tiberius::{ColumnData, Row};

/// Render cell `index` of `row`; `None` for SQL NULL
pub fn cell_to_string(row: &Row, index: usize) -> Option<String> {
    let data = row.cells().nth(index).map(|(_, data)| data)?;

    match data {
        ColumnData::DateTime(Some(_))
        | ColumnData::SmallDateTime(Some(_))
        | ColumnData::DateTime2(Some(_)) => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .ok()
            .flatten()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        ColumnData::DateTimeOffset(Some(_)) => row
            .try_get::<chrono::DateTime<chrono::FixedOffset>, _>(index)
            .ok()
            .flatten()
            .map(|dt| dt.to_rfc3339()),
        ColumnData::Date(Some(_)) => row
            .try_get::<chrono::NaiveDate, _>(index)
            .ok()
            .flatten()
            .map(|d| d.format("%Y-%m-%d").to_string()),
        ColumnData::Time(Some(_)) => row
            .try_get::<chrono::NaiveTime, _>(index)
            .ok()
            .flatten()
            .map(|t| t.format("%H:%M:%S%.f").to_string()),
        _ => column_data_to_string(data),
    }
}

/// Render the non-temporal cell kinds
pub fn column_data_to_string(data: &ColumnData<'_>) -> Option<String> {
    match data {
        ColumnData::Bit(Some(b)) => Some(if *b { "1" } else { "0" }.to_string()),
        ColumnData::U8(Some(v)) => Some(v.to_string()),
        ColumnData::I16(Some(v)) => Some(v.to_string()),
        ColumnData::I32(Some(v)) => Some(v.to_string()),
        ColumnData::I64(Some(v)) => Some(v.to_string()),
        ColumnData::F32(Some(v)) => Some(format!("{:?}", v)),
        ColumnData::F64(Some(v)) => Some(format!("{:?}", v)),
        ColumnData::Numeric(Some(n)) => Some(n.to_string()),
        ColumnData::String(Some(s)) => Some(s.to_string()),
        ColumnData::Guid(Some(g)) => Some(g.to_string().to_uppercase()),
        ColumnData::Binary(Some(b)) => Some(format!("0x{}", hex::encode_upper(b.as_ref()))),
        ColumnData::Xml(Some(xml)) => Some(xml.to_string()),
        _ => None,
    }
}
