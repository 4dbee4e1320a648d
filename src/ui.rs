use crate::bootstrap::PagePayload;
use crate::csrf;
use crate::deliveries;
use crate::models::{DashboardResponse, Delivery};
use crate::money;

/// Escapes text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// JSON placed inside a `<script type="application/json">` block.
fn script_json(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn layout(title: &str, body: &str) -> String {
    LAYOUT_HTML
        .replace("{{TITLE}}", title)
        .replace("{{STYLE}}", STYLE)
        .replace("{{BODY}}", body)
}

pub fn render_dashboard(dashboard: &DashboardResponse) -> String {
    let labels = serde_json::to_string(&dashboard.daily_labels).unwrap_or_else(|_| "[]".to_string());
    let values = serde_json::to_string(&dashboard.daily_liters).unwrap_or_else(|_| "[]".to_string());
    let methods: String = dashboard
        .by_method
        .iter()
        .map(|total| {
            let amount = if total.is_local_currency {
                money::format_local(total.total)
            } else {
                money::format_ref(total.total)
            };
            format!(
                "<li><span>{}</span><strong>{}</strong></li>",
                escape_html(&total.method),
                amount
            )
        })
        .collect();

    let body = DASHBOARD_HTML
        .replace("{{DATE}}", &dashboard.date.format("%d/%m/%Y").to_string())
        .replace("{{AVAILABLE}}", &dashboard.liters_available.normalize().to_string())
        .replace("{{SOLD}}", &dashboard.liters_sold_today.normalize().to_string())
        .replace("{{COLLECTED_REF}}", &money::format_ref(dashboard.collected_ref))
        .replace("{{COLLECTED_LOCAL}}", &money::format_local(dashboard.collected_local))
        .replace("{{METHODS}}", &methods)
        .replace("{{LABELS}}", &script_json(&labels))
        .replace("{{VALUES}}", &script_json(&values));
    layout("Panel", &body)
}

pub fn render_sales(payload: &PagePayload, csrf_token: &str) -> String {
    let warning = payload
        .warning
        .as_deref()
        .map(|text| format!("<p class=\"banner warn\">{}</p>", escape_html(text)))
        .unwrap_or_default();
    let body = SALES_HTML
        .replace("{{WARNING}}", &warning)
        .replace("{{FORM_FIELD}}", csrf::FORM_FIELD)
        .replace("{{CSRF}}", &escape_html(csrf_token))
        .replace("{{PRODUCTS}}", &script_json(&payload.products_json()))
        .replace("{{METHODS}}", &script_json(&payload.payment_methods_json()))
        .replace("{{RATE}}", &script_json(&payload.exchange_rate_json()));
    layout("Ventas", &body)
}

/// The sign-in form; `error` is shown above it after a refused attempt.
pub fn render_login(error: Option<&str>) -> String {
    let error = error
        .map(|message| format!(r#"<p class="banner error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    layout("Iniciar sesión", &LOGIN_HTML.replace("{{ERROR}}", &error))
}

pub fn render_deliveries(rows: &[Delivery], query: &str) -> String {
    let rows_html: String = if rows.is_empty() {
        "<tr><td colspan=\"6\" class=\"hint\">Sin deliveries registrados.</td></tr>".to_string()
    } else {
        rows.iter()
            .map(|delivery| {
                format!(
                    "<tr data-delivery-id=\"{id}\" title=\"{title}\"><td>{date}</td><td>{time}</td><td>{name}</td>\
                     <td>{address}</td><td>{liters}</td>\
                     <td><button class=\"btn-danger\" data-delete=\"{id}\" type=\"button\">Eliminar</button></td></tr>",
                    id = delivery.id,
                    title = escape_html(&deliveries::row_text(delivery)),
                    date = delivery.date.format("%Y-%m-%d"),
                    time = delivery.time.format("%H:%M"),
                    name = escape_html(&delivery.customer_name),
                    address = escape_html(&delivery.address),
                    liters = delivery.liters_delivered.normalize(),
                )
            })
            .collect()
    };
    let body = DELIVERIES_HTML
        .replace("{{QUERY}}", &escape_html(query))
        .replace("{{ROWS}}", &rows_html);
    layout("Deliveries", &body)
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}} · Agua</title>
  <style>{{STYLE}}</style>
</head>
<body>
  <nav class="nav">
    <a href="/">Panel</a>
    <a href="/ventas/">Ventas</a>
    <a href="/deliveries">Deliveries</a>
    <a href="/logout">Salir</a>
  </nav>
  <main class="app">
{{BODY}}
  </main>
  <script>
    const csrfToken = () => {
      const match = document.cookie.match(/(?:^|;\s*)csrftoken=([^;]+)/);
      return match ? decodeURIComponent(match[1]) : '';
    };
  </script>
</body>
</html>
"#;

const STYLE: &str = r#"
    :root {
      --bg-1: #eef6fb;
      --bg-2: #bfe3f5;
      --ink: #1f2d3a;
      --accent: #0f8ac7;
      --accent-2: #27465e;
      --danger: #c63b2b;
      --ok: #2d7a4b;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(39, 70, 94, 0.16);
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #e2f1f8 60%, #f4f9fc 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      padding: 24px 18px 48px;
    }

    .nav {
      display: flex;
      gap: 18px;
      justify-content: center;
      margin-bottom: 20px;
    }

    .nav a {
      color: var(--accent-2);
      font-weight: 600;
      text-decoration: none;
    }

    .app {
      width: min(960px, 100%);
      margin: 0 auto;
      background: var(--card);
      border-radius: 24px;
      box-shadow: var(--shadow);
      padding: 32px;
      display: grid;
      gap: 24px;
    }

    h1 { margin: 0; font-size: clamp(1.8rem, 4vw, 2.4rem); }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .stat {
      background: white;
      border-radius: 16px;
      padding: 16px;
      border: 1px solid rgba(39, 70, 94, 0.08);
      display: grid;
      gap: 6px;
    }

    .stat .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: #6d7c88;
    }

    .stat .value { font-size: 1.5rem; font-weight: 600; color: var(--accent-2); }
    .text-success { color: var(--ok); }
    .text-danger { color: var(--danger); }

    button {
      border: none;
      border-radius: 999px;
      padding: 10px 18px;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent);
      color: white;
    }

    button:disabled { opacity: 0.5; cursor: not-allowed; }
    .btn-danger { background: var(--danger); }

    input, select {
      padding: 8px 10px;
      border-radius: 10px;
      border: 1px solid rgba(39, 70, 94, 0.2);
      font: inherit;
    }

    table { width: 100%; border-collapse: collapse; }
    th, td { text-align: left; padding: 8px; border-bottom: 1px solid rgba(39, 70, 94, 0.08); }

    .row { display: flex; flex-wrap: wrap; gap: 10px; align-items: center; }
    .list { list-style: none; margin: 0; padding: 0; display: grid; gap: 8px; }
    .list li { display: flex; justify-content: space-between; gap: 12px; }
    .banner { margin: 0; padding: 12px 16px; border-radius: 12px; }
    .banner.warn { background: #fff4d6; }
    .banner.error { background: #fde3df; color: var(--danger); }
    .hint { color: #6d7c88; font-size: 0.9rem; }
    .status { min-height: 1.2em; }

    #chart { width: 100%; height: 240px; display: block; }
    .chart-bar { fill: var(--accent); }
    .chart-label { fill: #6d7c88; font-size: 11px; }
"#;

const DASHBOARD_HTML: &str = r#"
    <header>
      <h1>Panel del día</h1>
      <p class="hint">{{DATE}}</p>
    </header>

    <section class="panel">
      <div class="stat"><span class="label">Litros disponibles</span><span class="value">{{AVAILABLE}}</span></div>
      <div class="stat"><span class="label">Litros vendidos hoy</span><span class="value">{{SOLD}}</span></div>
      <div class="stat"><span class="label">Recaudado $</span><span class="value">{{COLLECTED_REF}}</span></div>
      <div class="stat"><span class="label">Recaudado BsD</span><span class="value">{{COLLECTED_LOCAL}}</span></div>
    </section>

    <section>
      <h2>Por método de pago</h2>
      <ul class="list">{{METHODS}}</ul>
    </section>

    <section>
      <h2>Litros vendidos, últimos 7 días</h2>
      <svg id="chart" role="img"></svg>
    </section>

    <script id="labels" type="application/json">{{LABELS}}</script>
    <script id="values" type="application/json">{{VALUES}}</script>
    <script>
      (() => {
        const labels = JSON.parse(document.getElementById('labels').textContent);
        const values = JSON.parse(document.getElementById('values').textContent).map(Number);
        const chart = document.getElementById('chart');
        const width = 600;
        const height = 240;
        const pad = 30;
        const max = Math.max(1, ...values);
        const step = (width - pad * 2) / Math.max(1, values.length);
        let svg = '';
        values.forEach((value, index) => {
          const barHeight = ((height - pad * 2) * value) / max;
          const x = pad + index * step + step * 0.15;
          const y = height - pad - barHeight;
          svg += `<rect class="chart-bar" x="${x}" y="${y}" width="${step * 0.7}" height="${barHeight}" rx="6" />`;
          svg += `<text class="chart-label" x="${x + step * 0.35}" y="${height - 10}" text-anchor="middle">${labels[index]}</text>`;
          svg += `<text class="chart-label" x="${x + step * 0.35}" y="${y - 6}" text-anchor="middle">${value}</text>`;
        });
        chart.setAttribute('viewBox', `0 0 ${width} ${height}`);
        chart.innerHTML = svg;
      })();
    </script>
"#;

const SALES_HTML: &str = r#"
    <header>
      <h1>Nueva venta</h1>
    </header>
    {{WARNING}}
    <p id="banner" class="banner error" hidden></p>

    <section class="row">
      <select id="product"></select>
      <input id="liters" type="number" min="0" step="0.01" placeholder="Litros" hidden />
      <button id="add-item" type="button">Agregar</button>
      <span id="item-warning" class="text-danger"></span>
    </section>

    <section>
      <h2>Productos</h2>
      <ul id="lines" class="list"></ul>
    </section>

    <section>
      <h2>Pagos</h2>
      <div id="payments" class="list"></div>
      <button id="add-payment" type="button">Agregar pago</button>
    </section>

    <section class="panel">
      <div class="stat"><span class="label">Total $</span><span id="total-ref" class="value">$0.00</span></div>
      <div class="stat"><span class="label">Total BsD</span><span id="total-local" class="value">BsD 0.00</span></div>
      <div class="stat"><span class="label">Saldo</span><span id="balance" class="value">$0.00</span></div>
    </section>

    <form id="sale-form" method="post" action="/ventas/">
      <input type="hidden" name="{{FORM_FIELD}}" value="{{CSRF}}" />
      <input type="hidden" id="items-field" name="items" value="[]" />
      <input type="hidden" id="pagos-field" name="pagos" value="[]" />
      <button id="finalize" type="submit" disabled>Agregue productos</button>
      <p id="status" class="status"></p>
    </form>

    <script id="productos-data" type="application/json">{{PRODUCTS}}</script>
    <script id="metodos-pago-data" type="application/json">{{METHODS}}</script>
    <script id="tasa-actual-data" type="application/json">{{RATE}}</script>
    <script>
      (() => {
        const banner = document.getElementById('banner');
        let products = [];
        let methods = [];
        try {
          products = JSON.parse(document.getElementById('productos-data').textContent);
          methods = JSON.parse(document.getElementById('metodos-pago-data').textContent);
          JSON.parse(document.getElementById('tasa-actual-data').textContent);
        } catch (err) {
          banner.textContent = 'Error crítico al cargar datos del sistema (precios, tasa). Recargue la página.';
          banner.hidden = false;
          return;
        }

        const items = [];
        const rows = [];
        let nextRow = 0;

        const productSelect = document.getElementById('product');
        const liters = document.getElementById('liters');
        const itemWarning = document.getElementById('item-warning');
        const paymentsEl = document.getElementById('payments');
        const finalize = document.getElementById('finalize');

        products.forEach((product) => {
          const option = document.createElement('option');
          option.value = product.codigo;
          option.textContent = product.nombre;
          option.dataset.tipo = product.tipo;
          productSelect.appendChild(option);
        });

        const selectedIsLiquid = () => {
          const option = productSelect.selectedOptions[0];
          return option && option.dataset.tipo === 'agua_litros';
        };
        const syncLiters = () => { liters.hidden = !selectedIsLiquid(); };
        productSelect.addEventListener('change', syncLiters);
        syncLiters();

        const collectPayments = () => rows
          .filter((row) => row.amount.value.trim() !== '' && Number(row.amount.value) > 0)
          .map((row) => ({ monto: row.amount.value.trim(), metodo_pago: row.method.value }));

        const refresh = async () => {
          const pagos = collectPayments();
          const res = await fetch('/api/ventas/preview', {
            method: 'POST',
            headers: { 'content-type': 'application/json', 'X-CSRFToken': csrfToken() },
            body: JSON.stringify({ items, pagos })
          });
          if (!res.ok) {
            throw new Error(await res.text());
          }
          const view = await res.json();
          document.getElementById('total-ref').textContent = view.sale_total_ref;
          document.getElementById('total-local').textContent = view.sale_total_local;
          const balance = document.getElementById('balance');
          balance.textContent = view.balance_text;
          balance.className = `value text-${view.balance_tone}`;
          const lines = document.getElementById('lines');
          lines.innerHTML = '';
          view.lines.forEach((line) => {
            const li = document.createElement('li');
            const text = document.createElement('span');
            text.textContent = line.text;
            const remove = document.createElement('button');
            remove.type = 'button';
            remove.className = 'btn-danger';
            remove.textContent = 'Quitar';
            remove.addEventListener('click', () => {
              items.splice(line.index, 1);
              refresh().catch(showError);
            });
            li.append(text, remove);
            lines.appendChild(li);
          });
          finalize.textContent = view.finalize.label;
          finalize.disabled = !view.finalize.enabled;
          document.getElementById('items-field').value = JSON.stringify(items);
          document.getElementById('pagos-field').value = JSON.stringify(pagos);
        };

        const showError = (err) => {
          document.getElementById('status').textContent = err.message;
        };

        document.getElementById('add-item').addEventListener('click', () => {
          itemWarning.textContent = '';
          const codigo = productSelect.value;
          if (!codigo) {
            itemWarning.textContent = 'Seleccione un producto.';
            return;
          }
          let cantidad = 1;
          if (selectedIsLiquid()) {
            cantidad = Number(liters.value);
            if (!(cantidad > 0)) {
              itemWarning.textContent = 'Ingrese una cantidad válida de litros.';
              return;
            }
          }
          const existing = items.find((item) => item.codigo === codigo);
          if (existing) {
            existing.cantidad = Number(existing.cantidad) + cantidad;
          } else {
            items.push({ codigo, cantidad });
          }
          liters.value = '';
          refresh().catch(showError);
        });

        document.getElementById('add-payment').addEventListener('click', () => {
          if (!methods.length) {
            return;
          }
          const wrap = document.createElement('div');
          wrap.className = 'row';
          const amount = document.createElement('input');
          amount.type = 'number';
          amount.step = '0.01';
          amount.placeholder = 'Monto';
          const method = document.createElement('select');
          methods.forEach((m) => {
            const option = document.createElement('option');
            option.value = m.nombre;
            option.textContent = m.nombre;
            method.appendChild(option);
          });
          const remove = document.createElement('button');
          remove.type = 'button';
          remove.className = 'btn-danger';
          remove.textContent = 'Quitar';
          const row = { id: nextRow += 1, amount, method };
          remove.addEventListener('click', () => {
            rows.splice(rows.indexOf(row), 1);
            wrap.remove();
            refresh().catch(showError);
          });
          amount.addEventListener('input', () => refresh().catch(showError));
          method.addEventListener('change', () => refresh().catch(showError));
          wrap.append(amount, method, remove);
          paymentsEl.appendChild(wrap);
          rows.push(row);
        });

        document.getElementById('sale-form').addEventListener('submit', async (event) => {
          event.preventDefault();
          const body = new URLSearchParams(new FormData(event.target));
          const res = await fetch('/ventas/', { method: 'POST', body });
          if (!res.ok) {
            showError(new Error(await res.text()));
            return;
          }
          const receipt = await res.json();
          document.getElementById('status').textContent = `Venta #${receipt.id} registrada.`;
          setTimeout(() => window.location.reload(), 800);
        });

        refresh().catch(showError);
      })();
    </script>
"#;

const LOGIN_HTML: &str = r#"
    <header>
      <h1>Iniciar sesión</h1>
    </header>
    {{ERROR}}
    <form class="row" method="post" action="/login">
      <label>Usuario <input name="username" autocomplete="username" required /></label>
      <label>Contraseña <input name="password" type="password" autocomplete="current-password" required /></label>
      <button type="submit">Entrar</button>
    </form>
"#;

const DELIVERIES_HTML: &str = r#"
    <header>
      <h1>Deliveries</h1>
    </header>

    <form class="row" method="get" action="/deliveries">
      <input name="q" value="{{QUERY}}" placeholder="Buscar" />
      <button type="submit">Buscar</button>
    </form>

    <table>
      <thead>
        <tr><th>Fecha</th><th>Hora</th><th>Cliente</th><th>Dirección</th><th>Litros</th><th></th></tr>
      </thead>
      <tbody id="rows">{{ROWS}}</tbody>
    </table>
    <p id="status" class="status"></p>

    <script>
      document.querySelectorAll('[data-delete]').forEach((button) => {
        button.addEventListener('click', async () => {
          if (!confirm('¿Eliminar este delivery?')) {
            return;
          }
          const id = button.dataset.delete;
          try {
            const res = await fetch(`/delete-delivery/${id}/`, {
              method: 'POST',
              headers: { 'X-CSRFToken': csrfToken() }
            });
            if (!res.ok) {
              throw new Error(await res.text());
            }
            const row = document.querySelector(`tr[data-delivery-id="${id}"]`);
            if (row) {
              row.remove();
            }
          } catch (err) {
            document.getElementById('status').textContent = 'No se pudo eliminar el delivery.';
          }
        });
      });
    </script>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppData, MethodTotal};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn sales_page_embeds_the_three_blobs() {
        let payload = PagePayload::from_store(&AppData::default());
        let html = render_sales(&payload, "tok");
        assert!(html.contains(r#"<script id="productos-data" type="application/json">[]</script>"#));
        assert!(html.contains(r#"<script id="tasa-actual-data" type="application/json">"1.00"</script>"#));
        assert!(html.contains(r#"name="csrfmiddlewaretoken" value="tok""#));
        assert!(html.contains("No hay una tasa de cambio registrada"));
    }

    #[test]
    fn delivery_rows_are_escaped_and_tagged() {
        let delivery = Delivery {
            id: 7,
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            time: chrono::NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
            customer_name: "<b>Ana</b>".into(),
            address: "Calle \"2\"".into(),
            liters_delivered: Decimal::new(400, 1),
        };
        let html = render_deliveries(&[delivery], "");
        assert!(html.contains(r#"data-delivery-id="7""#));
        assert!(html.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(html.contains("Calle &quot;2&quot;"));
        assert!(html.contains("<td>40</td>"));
    }

    #[test]
    fn login_error_is_escaped() {
        let html = render_login(Some("<bad>"));
        assert!(html.contains(r#"<form class="row" method="post" action="/login">"#));
        assert!(html.contains("&lt;bad&gt;"));
        assert!(!render_login(None).contains("banner error"));
    }

    #[test]
    fn dashboard_chart_data_is_embedded() {
        let dashboard = DashboardResponse {
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            liters_available: Decimal::new(500, 0),
            liters_sold_today: Decimal::ZERO,
            collected_ref: Decimal::new(12, 0),
            collected_local: Decimal::ZERO,
            by_method: vec![MethodTotal {
                method: "Divisa $".into(),
                is_local_currency: false,
                total: Decimal::new(12, 0),
            }],
            daily_labels: vec!["02/04".into()],
            daily_liters: vec![Decimal::new(3, 0)],
        };
        let html = render_dashboard(&dashboard);
        assert!(html.contains(r#"<script id="labels" type="application/json">["02/04"]</script>"#));
        assert!(html.contains(r#"<script id="values" type="application/json">["3"]</script>"#));
        assert!(html.contains("<strong>$12.00</strong>"));
    }
}
