//! Report assembly: join zonal sums back onto administrative attributes,
//! derive percentage columns, and write the augmented outputs.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::{CsvWriter, NamedFrom}, series::Series};
use shapefile::dbase::{FieldValue, Record};

use crate::vector::{field_string, write_polygon_layer, FieldDef, FieldKind, PolygonLayer};
use crate::zonal::ZonalRecord;

/// Assemble the attribute table for one output subset: key columns from the
/// layer records, `pop_total`, one `pop_<label>` per category, and one
/// `pct_<label>` per category.
///
/// Rows follow the layer's feature order; sums are joined by position.
/// Percentages for a polygon with zero total population are 0 by convention,
/// never NaN, so no-overlap polygons rank at the bottom instead of poisoning
/// the table.
pub fn build_table(
    layer: &PolygonLayer,
    sums: &[ZonalRecord],
    labels: &[String],
    key_fields: &[String],
) -> Result<DataFrame> {
    if layer.len() != sums.len() {
        bail!("layer has {} features but {} zonal records", layer.len(), sums.len());
    }

    let mut columns = Vec::new();
    for field in key_fields {
        let values: Vec<String> = layer
            .records
            .iter()
            .map(|record| field_string(record, field))
            .collect::<Result<_>>()?;
        columns.push(Series::new(field.as_str().into(), values).into());
    }

    let totals: Vec<f64> = sums.iter().map(|s| s.total).collect();
    columns.push(Series::new("pop_total".into(), totals.clone()).into());
    for (i, label) in labels.iter().enumerate() {
        let pops: Vec<f64> = sums.iter().map(|s| s.categories[i]).collect();
        let pcts: Vec<f64> = pops
            .iter()
            .zip(&totals)
            .map(|(pop, total)| if *total > 0.0 { 100.0 * pop / total } else { 0.0 })
            .collect();
        columns.push(Series::new(format!("pop_{label}").as_str().into(), pops).into());
        columns.push(Series::new(format!("pct_{label}").as_str().into(), pcts).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Write one output subset: `<name>.shp/.shx/.dbf` with appended numeric
/// attributes plus `<name>.csv` of the full table.
///
/// Everything lands in a temporary directory first and is renamed into place
/// only after all writes succeed, so a failed run leaves no partial output.
pub fn write_output(
    out_dir: &Path,
    name: &str,
    layer: &PolygonLayer,
    sums: &[ZonalRecord],
    labels: &[String],
    key_fields: &[String],
    force: bool,
) -> Result<()> {
    let mut table = build_table(layer, sums, labels, key_fields)?;

    let final_shp = out_dir.join(format!("{name}.shp"));
    if final_shp.exists() && !force {
        bail!("output already exists (use --force to overwrite): {}", final_shp.display());
    }

    // Rebuild records with just the key fields plus the appended sums.
    let mut fields = Vec::new();
    for field in key_fields {
        fields.push(FieldDef { name: field.clone(), kind: FieldKind::Character(100) });
    }
    fields.push(FieldDef { name: "pop_total".to_string(), kind: FieldKind::Numeric });
    for label in labels {
        fields.push(FieldDef { name: format!("pop_{label}"), kind: FieldKind::Numeric });
    }

    let records: Vec<Record> = layer
        .records
        .iter()
        .zip(sums)
        .map(|(record, sum)| {
            let mut out = Record::default();
            for field in key_fields {
                let value = field_string(record, field)?;
                out.insert(field.clone(), FieldValue::Character(Some(value)));
            }
            out.insert("pop_total".to_string(), FieldValue::Numeric(Some(sum.total)));
            for (label, pop) in labels.iter().zip(&sum.categories) {
                out.insert(format!("pop_{label}"), FieldValue::Numeric(Some(*pop)));
            }
            Ok(out)
        })
        .collect::<Result<_>>()?;
    let augmented = PolygonLayer { crs: layer.crs.clone(), geoms: layer.geoms.clone(), records };

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;
    let staging = tempfile::tempdir_in(out_dir).context("failed to create staging directory")?;

    write_polygon_layer(&staging.path().join(format!("{name}.shp")), &augmented, &fields)?;
    let csv_path = staging.path().join(format!("{name}.csv"));
    let csv_file = fs::File::create(&csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;
    CsvWriter::new(csv_file).finish(&mut table).context("failed to write CSV table")?;

    // Finalize: rename every staged artifact into place.
    for ext in ["shp", "shx", "dbf", "csv"] {
        let from = staging.path().join(format!("{name}.{ext}"));
        if from.exists() {
            fs::rename(&from, out_dir.join(format!("{name}.{ext}")))
                .with_context(|| format!("failed to finalize {name}.{ext}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use geo::polygon;

    fn test_layer(n: usize) -> PolygonLayer {
        let records = (0..n)
            .map(|i| {
                let mut r = Record::default();
                r.insert("TS".to_string(), FieldValue::Character(Some(format!("Township {i}"))));
                r
            })
            .collect();
        PolygonLayer {
            crs: Some(Crs::wgs84()),
            geoms: vec![
                geo::MultiPolygon(vec![polygon![
                    (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0),
                ]]);
                n
            ],
            records,
        }
    }

    fn sums() -> Vec<ZonalRecord> {
        vec![
            ZonalRecord { total: 100.0, categories: vec![80.0, 20.0] },
            ZonalRecord { total: 0.0, categories: vec![0.0, 0.0] },
        ]
    }

    #[test]
    fn table_has_expected_columns_and_percentages() {
        let labels = vec!["lt7".to_string(), "9".to_string()];
        let keys = vec!["TS".to_string()];
        let table = build_table(&test_layer(2), &sums(), &labels, &keys).unwrap();
        assert_eq!(
            table.get_column_names_str(),
            vec!["TS", "pop_total", "pop_lt7", "pct_lt7", "pop_9", "pct_9"]
        );
        let pct9: Vec<f64> = table
            .column("pct_9")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(pct9[0], 20.0);
        // Zero total population yields 0%, not NaN.
        assert_eq!(pct9[1], 0.0);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let labels = vec!["lt7".to_string(), "9".to_string()];
        assert!(build_table(&test_layer(3), &sums(), &labels, &["TS".to_string()]).is_err());
    }

    #[test]
    fn write_output_produces_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let labels = vec!["lt7".to_string(), "9".to_string()];
        let keys = vec!["TS".to_string()];
        write_output(dir.path(), "subset", &test_layer(2), &sums(), &labels, &keys, false).unwrap();
        for ext in ["shp", "shx", "dbf", "csv"] {
            assert!(dir.path().join(format!("subset.{ext}")).exists(), "missing .{ext}");
        }
        // Second run without --force refuses to clobber.
        assert!(
            write_output(dir.path(), "subset", &test_layer(2), &sums(), &labels, &keys, false)
                .is_err()
        );
        // With force it succeeds.
        write_output(dir.path(), "subset", &test_layer(2), &sums(), &labels, &keys, true).unwrap();
    }
}
