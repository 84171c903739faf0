//! Bulk property import from CSV
//!
//! Headers are matched ignoring case, accents and punctuation, so
//! `Baños`, `banos` and `BANOS` all name the bathrooms column. Valid rows are
//! created together in one batch; invalid rows are reported by line.

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::paths;
use sara_domain::text::fold_key;
use sara_domain::{Clp, NewProperty, PropertyId, PropertyKind, Role, ValidationErrors};
use sara_store::WriteBatch;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Recognized columns (folded form) and whether they are required
const COLUMNS: [(&str, bool); 10] = [
    ("nombre", true),
    ("direccion", true),
    ("comuna", true),
    ("region", true),
    ("tipo", true),
    ("dormitorios", true),
    ("banos", true),
    ("metroscuadrados", true),
    ("precio", true),
    ("descripcion", false),
];

/// Problem with one CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line in the file (the header is line 1)
    pub line: u64,
    /// What went wrong
    pub message: String,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Properties created
    pub created: Vec<PropertyId>,
    /// Rejected rows
    pub errors: Vec<RowError>,
}

/// CSV import service
#[derive(Debug, Clone)]
pub struct BulkUploadService {
    ctx: Arc<Context>,
}

impl BulkUploadService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Import properties for the caller
    ///
    /// # Errors
    /// `Validation` for empty files, missing headers or too many rows;
    /// per-row problems are reported in the [`BulkReport`] instead
    pub async fn import_csv(&self, principal: &Principal, data: &[u8]) -> Result<BulkReport, SaraError> {
        principal.require(&[Role::Arrendador], "import properties")?;
        let rows = parse(data, self.ctx.config.limits.max_bulk_rows)?;
        let owner = self.ctx.require_profile(&principal.uid).await?;
        let now = self.ctx.now();

        let mut report = BulkReport::default();
        let mut batch = WriteBatch::new();
        for row in rows {
            match row.result {
                Ok(new) => {
                    let property = new.into_property(principal.uid.clone(), owner.name.clone(), now);
                    batch.create(paths::property(property.id), &property)?;
                    report.created.push(property.id);
                }
                Err(message) => report.errors.push(RowError { line: row.line, message }),
            }
        }
        if !batch.is_empty() {
            self.ctx.store.commit(batch).await?;
        }
        tracing::info!(
            owner = %principal.uid,
            created = report.created.len(),
            rejected = report.errors.len(),
            "Bulk import finished"
        );
        Ok(report)
    }
}

/// A parsed data row
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) line: u64,
    pub(crate) result: Result<NewProperty, String>,
}

fn delimiter(data: &[u8]) -> u8 {
    let header = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = header.iter().filter(|b| **b == b';').count();
    let commas = header.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Parse the whole file into rows
pub(crate) fn parse(data: &[u8], max_rows: usize) -> Result<Vec<ParsedRow>, SaraError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data);
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationErrors::single("file", "is empty").into());
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter(data))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ValidationErrors::single("file", format!("unreadable header: {e}")))?
        .clone();
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (fold_key(h), i))
        .collect();
    let missing: Vec<&str> = COLUMNS
        .iter()
        .filter(|(name, required)| *required && !index.contains_key(*name))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationErrors::single(
            "file",
            format!("missing required columns: {}", missing.join(", ")),
        )
        .into());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let (line, result) = match record {
            Ok(record) => {
                if record.iter().all(str::is_empty) {
                    continue;
                }
                let line = record.position().map_or(0, csv::Position::line);
                let field = |name: &str| {
                    index
                        .get(name)
                        .and_then(|i| record.get(*i))
                        .unwrap_or_default()
                };
                (line, row_to_property(&field))
            }
            Err(e) => (
                e.position().map_or(0, csv::Position::line),
                Err(format!("unreadable row: {e}")),
            ),
        };
        rows.push(ParsedRow { line, result });
        if rows.len() > max_rows {
            return Err(ValidationErrors::single(
                "file",
                format!("has more than {max_rows} rows"),
            )
            .into());
        }
    }
    if rows.is_empty() {
        return Err(ValidationErrors::single("file", "has no data rows").into());
    }
    Ok(rows)
}

fn row_to_property<'a>(field: &dyn Fn(&str) -> &'a str) -> Result<NewProperty, String> {
    let mut problems = Vec::new();
    let mut number = |column: &str, parsed: Option<u64>| -> u64 {
        parsed.unwrap_or_else(|| {
            problems.push(format!("{column}: {:?} is not a number", field(column)));
            0
        })
    };
    let bedrooms = number("dormitorios", parse_count(field("dormitorios")));
    let bathrooms = number("banos", parse_count(field("banos")));
    let area = number("metroscuadrados", parse_area(field("metroscuadrados")));
    let price = number("precio", parse_money(field("precio")));

    let kind = field("tipo").parse::<PropertyKind>().unwrap_or_else(|e| {
        problems.push(format!("tipo: {e}"));
        PropertyKind::Otro
    });
    let new = NewProperty {
        name: field("nombre").to_string(),
        address: field("direccion").to_string(),
        commune: field("comuna").to_string(),
        region: field("region").to_string(),
        kind,
        bedrooms: u8::try_from(bedrooms).unwrap_or(u8::MAX),
        bathrooms: u8::try_from(bathrooms).unwrap_or(u8::MAX),
        area_m2: u32::try_from(area).unwrap_or(u32::MAX),
        rent: Clp(i64::try_from(price).unwrap_or(i64::MAX)),
        description: field("descripcion").to_string(),
    };
    if let Err(errors) = new.validate() {
        problems.extend(
            errors
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message)),
        );
    }
    if problems.is_empty() {
        Ok(new)
    } else {
        Err(problems.join("; "))
    }
}

fn parse_count(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

/// `45`, `45,5` or `45.5` square meters, rounded
///
/// Oversized values saturate and fail the area range check later.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_area(raw: &str) -> Option<u64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

/// `$450.000`, `450000` or `450 000` pesos
fn parse_money(raw: &str) -> Option<u64> {
    let digits: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '\u{a0}'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Nombre,Dirección,Comuna,Región,Tipo,Dormitorios,Baños,Metros Cuadrados,Precio,Descripción\n";

    #[test]
    fn money_and_area_formats() {
        assert_eq!(parse_money("$450.000"), Some(450_000));
        assert_eq!(parse_money("450000"), Some(450_000));
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_area("45,5"), Some(46));
        assert_eq!(parse_area("-3"), None);
        assert_eq!(parse_area("1e30"), Some(u64::MAX));
        assert_eq!(parse_area("inf"), None);
    }

    #[test]
    fn accented_headers_and_line_numbers() {
        let csv = format!(
            "{HEADER}Casa Ñuñoa,Irarrázaval 1000,Ñuñoa,Metropolitana,casa,3,2,120,$900.000,Patio\n\
             Mala,x,Ñuñoa,Metropolitana,castillo,3,2,120,0,\n"
        );
        let rows = parse(csv.as_bytes(), 100).unwrap();
        assert_eq!(rows.len(), 2);
        let ok = rows[0].result.as_ref().unwrap();
        assert_eq!(ok.kind, PropertyKind::Casa);
        assert_eq!(ok.rent, Clp(900_000));
        assert_eq!(rows[1].line, 3);
        let err = rows[1].result.as_ref().unwrap_err();
        assert!(err.contains("tipo"));
        assert!(err.contains("rent"));
        assert!(err.contains("address"));
    }

    #[test]
    fn semicolon_files() {
        let csv = "nombre;direccion;comuna;region;tipo;dormitorios;banos;metros_cuadrados;precio\n\
                   Depto Centro;San Diego 100;Santiago;Metropolitana;departamento;1;1;40;350000\n";
        let rows = parse(csv.as_bytes(), 10).unwrap();
        assert!(rows[0].result.is_ok());
    }

    #[test]
    fn whole_file_errors() {
        assert!(parse(b"", 10).is_err());
        assert!(parse(b"nombre,direccion\nx,y\n", 10).is_err());
        assert!(parse(HEADER.as_bytes(), 10).is_err());
        let mut csv = HEADER.to_string();
        for i in 0..3 {
            csv.push_str(&format!("Casa {i},Calle Larga {i},Maipú,Metropolitana,casa,2,1,60,300000,\n"));
        }
        assert!(parse(csv.as_bytes(), 2).is_err());
        assert_eq!(parse(csv.as_bytes(), 3).unwrap().len(), 3);
    }
}
