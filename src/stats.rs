use crate::cisterns;
use crate::money::saturating_sum;
use crate::models::{AppData, ControlReport, DashboardResponse, MethodTotal, RangeQuery, Sale};
use chrono::{Datelike, Duration, Local, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: &'static str,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn build_dashboard(data: &AppData) -> DashboardResponse {
    build_dashboard_at(today(), data)
}

pub fn build_dashboard_at(today: NaiveDate, data: &AppData) -> DashboardResponse {
    let todays_sales: Vec<&Sale> = data
        .sales
        .iter()
        .filter(|sale| sale.sold_at.date() == today)
        .collect();

    let by_method = method_totals(todays_sales.iter().copied());
    let collected_ref = saturating_sum(
        by_method
            .iter()
            .filter(|total| !total.is_local_currency)
            .map(|total| total.total),
    );
    let collected_local = saturating_sum(
        by_method
            .iter()
            .filter(|total| total.is_local_currency)
            .map(|total| total.total),
    );

    let mut daily_labels = Vec::with_capacity(7);
    let mut daily_liters: Vec<Decimal> = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        daily_labels.push(date.format("%d/%m").to_string());
        daily_liters.push(saturating_sum(
            data.sales
                .iter()
                .filter(|sale| sale.sold_at.date() == date)
                .map(liters_in),
        ));
    }

    DashboardResponse {
        date: today,
        liters_available: cisterns::current_level(data),
        liters_sold_today: saturating_sum(todays_sales.iter().map(|sale| liters_in(sale))),
        collected_ref,
        collected_local,
        by_method,
        daily_labels,
        daily_liters,
    }
}

/// Turns the `rango` / `fecha_inicio` / `fecha_fin` query into dates.
///
/// Anything unusable, including a custom range that ends before it starts, falls back
/// to the last seven days.
pub fn resolve_range(query: &RangeQuery, today: NaiveDate) -> DateRange {
    let weekly = DateRange {
        start: today - Duration::days(6),
        end: today,
        label: "semanal",
    };
    match query.rango.as_deref().unwrap_or("semanal") {
        "mensual" => DateRange {
            start: today.with_day(1).unwrap_or(today),
            end: today,
            label: "mensual",
        },
        "anual" => DateRange {
            start: NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
            end: today,
            label: "anual",
        },
        "personalizado" => {
            let parse = |raw: &Option<String>| {
                raw.as_deref()
                    .and_then(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok())
            };
            match (parse(&query.fecha_inicio), parse(&query.fecha_fin)) {
                (Some(start), Some(end)) if start <= end => DateRange {
                    start,
                    end,
                    label: "personalizado",
                },
                _ => weekly,
            }
        }
        _ => weekly,
    }
}

pub fn build_report(data: &AppData, query: &RangeQuery) -> ControlReport {
    build_report_at(today(), data, query)
}

pub fn build_report_at(today: NaiveDate, data: &AppData, query: &RangeQuery) -> ControlReport {
    let range = resolve_range(query, today);
    let in_range: Vec<&Sale> = sales_in(data, &range);

    let mut per_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for sale in &in_range {
        let day_total = per_day.entry(sale.sold_at.date()).or_default();
        *day_total = day_total.saturating_add(sale.total_ref);
    }

    let mut date_labels = Vec::new();
    let mut daily_totals = Vec::new();
    for day in range.days() {
        date_labels.push(day.format("%Y-%m-%d").to_string());
        daily_totals.push(per_day.get(&day).copied().unwrap_or(Decimal::ZERO));
    }

    ControlReport {
        start_date: range.start,
        end_date: range.end,
        range: range.label.to_string(),
        total_sales_ref: saturating_sum(in_range.iter().map(|sale| sale.total_ref)),
        total_sales_local: saturating_sum(in_range.iter().map(|sale| sale.total_local)),
        liters_sold: saturating_sum(in_range.iter().map(|sale| liters_in(sale))),
        by_method: method_totals(in_range.iter().copied()),
        date_labels,
        daily_totals,
    }
}

pub fn sales_in<'a>(data: &'a AppData, range: &DateRange) -> Vec<&'a Sale> {
    data.sales
        .iter()
        .filter(|sale| range.contains(sale.sold_at.date()))
        .collect()
}

fn liters_in(sale: &Sale) -> Decimal {
    saturating_sum(
        sale.items
            .iter()
            .filter(|item| item.kind.is_bulk_liquid())
            .map(|item| item.quantity),
    )
}

/// Collected amounts per payment method, largest first.
fn method_totals<'a>(sales: impl Iterator<Item = &'a Sale>) -> Vec<MethodTotal> {
    let mut totals: BTreeMap<String, MethodTotal> = BTreeMap::new();
    for payment in sales.flat_map(|sale| sale.payments.iter()) {
        let entry = totals.entry(payment.method.clone()).or_insert_with(|| MethodTotal {
            method: payment.method.clone(),
            is_local_currency: payment.is_local_currency,
            total: Decimal::ZERO,
        });
        entry.total = entry.total.saturating_add(payment.amount);
    }
    let mut totals: Vec<_> = totals.into_values().collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total));
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductKind, SaleItem, SaleKind, SalePayment};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(id: u64, date: NaiveDate, total: i64, liters: i64, payments: &[(&str, bool, i64)]) -> Sale {
        Sale {
            id,
            operator: "caja".into(),
            sold_at: date.and_hms_opt(10, 0, 0).unwrap(),
            total_ref: Decimal::new(total, 0),
            total_local: Decimal::new(total * 40, 0),
            rate_used: Decimal::new(40, 0),
            kind: SaleKind::Normal,
            items: vec![SaleItem {
                product_code: "L".into(),
                product_name: "Litro".into(),
                kind: ProductKind::WaterByLiter,
                quantity: Decimal::new(liters, 0),
                subtotal_ref: Decimal::new(total, 0),
                subtotal_local: Decimal::new(total * 40, 0),
            }],
            payments: payments
                .iter()
                .map(|(method, local, amount)| SalePayment {
                    method: method.to_string(),
                    is_local_currency: *local,
                    amount: Decimal::new(*amount, 0),
                })
                .collect(),
        }
    }

    fn query(rango: &str, start: Option<&str>, end: Option<&str>) -> RangeQuery {
        RangeQuery {
            rango: Some(rango.into()),
            fecha_inicio: start.map(String::from),
            fecha_fin: end.map(String::from),
        }
    }

    #[test]
    fn ranges_resolve_from_today() {
        let today = day(2026, 3, 18);
        let weekly = resolve_range(&RangeQuery::default(), today);
        assert_eq!((weekly.start, weekly.end, weekly.label), (day(2026, 3, 12), today, "semanal"));
        assert_eq!(resolve_range(&query("mensual", None, None), today).start, day(2026, 3, 1));
        assert_eq!(resolve_range(&query("anual", None, None), today).start, day(2026, 1, 1));

        let custom = resolve_range(&query("personalizado", Some("2026-02-01"), Some("2026-02-10")), today);
        assert_eq!((custom.start, custom.end), (day(2026, 2, 1), day(2026, 2, 10)));
    }

    #[test]
    fn bad_custom_ranges_fall_back_to_weekly() {
        let today = day(2026, 3, 18);
        for q in [
            query("personalizado", Some("01/02/2026"), Some("2026-02-10")),
            query("personalizado", Some("2026-02-10"), Some("2026-02-01")),
            query("personalizado", None, None),
            query("trimestral", None, None),
        ] {
            assert_eq!(resolve_range(&q, today).label, "semanal");
        }
    }

    #[test]
    fn report_fills_every_day_in_range() {
        let today = day(2026, 3, 18);
        let mut data = AppData::default();
        data.sales.push(sale(1, day(2026, 3, 13), 10, 100, &[("Divisa $", false, 10)]));
        data.sales.push(sale(2, day(2026, 3, 13), 4, 0, &[("Pago Móvil", true, 160)]));
        data.sales.push(sale(3, day(2026, 3, 1), 99, 5, &[("Divisa $", false, 99)]));

        let report = build_report_at(today, &data, &RangeQuery::default());
        assert_eq!(report.date_labels.len(), 7);
        assert_eq!(report.date_labels[0], "2026-03-12");
        assert_eq!(report.daily_totals[1], Decimal::new(14, 0));
        assert_eq!(report.daily_totals[0], Decimal::ZERO);
        assert_eq!(report.total_sales_ref, Decimal::new(14, 0));
        assert_eq!(report.liters_sold, Decimal::new(100, 0));
        assert_eq!(report.by_method[0].method, "Pago Móvil");
        assert_eq!(report.by_method.len(), 2);
    }

    #[test]
    fn dashboard_splits_today_by_currency() {
        let today = day(2026, 3, 18);
        let mut data = AppData::default();
        data.sales.push(sale(1, today, 10, 50, &[("Divisa $", false, 5), ("Efectivo BsD", true, 200)]));
        data.sales.push(sale(2, today - Duration::days(2), 3, 30, &[("Divisa $", false, 3)]));

        let dashboard = build_dashboard_at(today, &data);
        assert_eq!(dashboard.liters_sold_today, Decimal::new(50, 0));
        assert_eq!(dashboard.collected_ref, Decimal::new(5, 0));
        assert_eq!(dashboard.collected_local, Decimal::new(200, 0));
        assert_eq!(dashboard.daily_labels.len(), 7);
        assert_eq!(dashboard.daily_labels[6], "18/03");
        assert_eq!(dashboard.daily_liters[4], Decimal::new(30, 0));
        assert_eq!(dashboard.liters_available, Decimal::ZERO);
    }
}
