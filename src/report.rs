//! Spreadsheet report writer

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::error::AppError;
use crate::inventory::{total_quantity, InventoryRecord};

const HEADERS: [&str; 4] = ["Nombre", "Nombre de producto", "Cantidad disponible", "Imagen"];
const COLUMN_WIDTHS: [f64; 4] = [20.0, 25.0, 18.0, 20.0];
const NO_IMAGE: &str = "Sin imagen";

/// Rows between two progress reports
const PROGRESS_EVERY: usize = 10;

/// Writes inventory records to an `.xlsx` workbook
#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    /// Fixed generation time; `None` uses the current local time
    generated_at: Option<DateTime<Local>>,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamp(generated_at: DateTime<Local>) -> Self {
        Self {
            generated_at: Some(generated_at),
        }
    }

    /// `inventario_ghl_<YYYYmmdd_HHMMSS>.xlsx`
    pub fn default_file_name(now: &DateTime<Local>) -> String {
        format!("inventario_ghl_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
    }

    /// Write `records` to `output` (or a timestamped file in the working
    /// directory) and return the path written.
    pub fn write(
        &self,
        records: &[InventoryRecord],
        output: Option<&Path>,
        progress: Option<&dyn Fn(&str)>,
    ) -> Result<PathBuf, AppError> {
        let report = |message: &str| {
            if let Some(progress) = progress {
                progress(message);
            }
        };

        let now = self.generated_at.unwrap_or_else(Local::now);
        let path = match output {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(Self::default_file_name(&now)),
        };

        report("Creating report structure...");

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(format!("Inventario_{}", now.format("%d-%m-%Y")))?;

        let header_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x366092))
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin);
        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        report("Adding inventory rows...");
        write_rows(worksheet, records, &report)?;

        report("Applying layout...");
        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        write_summary(worksheet, records, &now)?;

        report("Saving file...");
        workbook.save(&path)?;

        tracing::info!(path = %path.display(), rows = records.len(), "Report written");

        Ok(path)
    }
}

fn write_rows(
    worksheet: &mut Worksheet,
    records: &[InventoryRecord],
    report: &dyn Fn(&str),
) -> Result<(), AppError> {
    let quantity_format = Format::new().set_align(FormatAlign::Center);
    let total = records.len();

    for (i, record) in records.iter().enumerate() {
        if i % PROGRESS_EVERY == 0 {
            report(&format!("Processing product {} of {}", i + 1, total));
        }

        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, &record.name)?;
        worksheet.write_string(row, 1, &record.product_name)?;
        worksheet.write_number_with_format(
            row,
            2,
            record.available_quantity as f64,
            &quantity_format,
        )?;
        worksheet.write_string(row, 3, record.image_url().unwrap_or(NO_IMAGE))?;
    }

    Ok(())
}

/// Totals block, one blank row below the data
fn write_summary(
    worksheet: &mut Worksheet,
    records: &[InventoryRecord],
    now: &DateTime<Local>,
) -> Result<(), AppError> {
    let summary_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::RGB(0xE6E6E6));

    let first = records.len() as u32 + 2;

    worksheet.write_string_with_format(first, 0, "Total de productos:", &summary_format)?;
    worksheet.write_number_with_format(first, 1, records.len() as f64, &summary_format)?;

    worksheet.write_string_with_format(first + 1, 0, "Total cantidad disponible:", &summary_format)?;
    worksheet.write_number_with_format(
        first + 1,
        1,
        total_quantity(records) as f64,
        &summary_format,
    )?;

    worksheet.write_string_with_format(first + 2, 0, "Fecha de generación:", &summary_format)?;
    worksheet.write_string_with_format(
        first + 2,
        1,
        now.format("%d/%m/%Y %H:%M").to_string(),
        &summary_format,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn record(name: &str, quantity: u64, image: &str) -> InventoryRecord {
        InventoryRecord {
            name: name.to_string(),
            product_name: format!("{} Pro", name),
            available_quantity: quantity,
            image: image.to_string(),
        }
    }

    #[test]
    fn test_default_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(
            ReportWriter::default_file_name(&now),
            "inventario_ghl_20240305_140709.xlsx"
        );
    }

    #[test]
    fn test_write_creates_xlsx() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("report.xlsx");
        let records: Vec<_> = (0..25)
            .map(|i| record(&format!("item-{}", i), i, if i % 2 == 0 { "http://x/y.png" } else { "" }))
            .collect();

        let messages = RefCell::new(Vec::new());
        let progress = |m: &str| messages.borrow_mut().push(m.to_string());

        let now = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let written = ReportWriter::with_timestamp(now)
            .write(&records, Some(&output), Some(&progress))
            .unwrap();
        assert_eq!(written, output);

        let bytes = std::fs::read(&output).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");

        let messages = messages.borrow();
        let row_updates = messages
            .iter()
            .filter(|m| m.starts_with("Processing product"))
            .count();
        assert_eq!(row_updates, 3);
    }

    #[test]
    fn test_write_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("empty.xlsx");

        ReportWriter::new().write(&[], Some(&output), None).unwrap();
        assert!(output.is_file());
    }
}
