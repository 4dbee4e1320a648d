//! CSV export of the sales in a report range, one row per sold item.

use crate::models::AppData;
use crate::stats::{self, DateRange};
use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::Serialize;

pub const HEADER: [&str; 9] = [
    "ID Venta",
    "Fecha",
    "Usuario",
    "Total $",
    "Total Bs",
    "Tasa Cambio",
    "Producto",
    "Cantidad",
    "Subtotal $",
];

#[derive(Serialize)]
struct ExportRow<'a> {
    sale_id: u64,
    sold_at: String,
    operator: &'a str,
    total_ref: Decimal,
    total_local: Decimal,
    rate_used: Decimal,
    product: &'a str,
    quantity: Decimal,
    subtotal_ref: Decimal,
}

pub fn file_name(range: &DateRange) -> String {
    format!(
        "reporte_ventas_{}_{}.csv",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    )
}

/// The header row is always written, even when the range holds no sales.
pub fn sales_csv(data: &AppData, range: &DateRange) -> Result<Vec<u8>, csv::Error> {
    let mut sales = stats::sales_in(data, range);
    sales.sort_by_key(|sale| (sale.sold_at, sale.id));

    let mut wrt = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wrt.write_record(HEADER)?;
    for sale in sales {
        for item in &sale.items {
            wrt.serialize(ExportRow {
                sale_id: sale.id,
                sold_at: sale.sold_at.format("%Y-%m-%d %H:%M").to_string(),
                operator: &sale.operator,
                total_ref: sale.total_ref,
                total_local: sale.total_local,
                rate_used: sale.rate_used,
                product: &item.product_name,
                quantity: item.quantity,
                subtotal_ref: item.subtotal_ref,
            })?;
        }
    }
    wrt.into_inner().map_err(|err| err.into_error().into())
}
