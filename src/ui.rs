use crate::services::ServiceCategory;
use crate::stats::Period;

pub fn render_dashboard(default_period: Period) -> String {
    let options = Period::ALL
        .iter()
        .map(|period| {
            let selected = if *period == default_period { " selected" } else { "" };
            format!("<option value=\"{period}\"{selected}>{period}</option>")
        })
        .collect::<String>();

    layout("Services Impact", "dashboard", DASHBOARD_BODY.replace("{{PERIOD_OPTIONS}}", &options))
}

pub fn render_contact_log() -> String {
    let options = ServiceCategory::ALL
        .iter()
        .map(|category| format!("<option value=\"{}\">{category}</option>", category.key()))
        .collect::<String>();

    layout("Contact Log", "contacts", CONTACT_LOG_BODY.replace("{{SERVICE_OPTIONS}}", &options))
}

pub fn render_users() -> String {
    layout("User Management", "users", USERS_BODY.to_string())
}

fn layout(title: &str, active: &str, body: String) -> String {
    let nav = [("dashboard", "/", "Impact"), ("contacts", "/contact-log", "Contact log"), ("users", "/admin/users", "Users")]
        .iter()
        .map(|(key, href, label)| {
            let class = if *key == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{href}\"{class}>{label}</a>")
        })
        .collect::<String>();

    LAYOUT_HTML
        .replace("{{TITLE}}", title)
        .replace("{{NAV}}", &nav)
        .replace("{{BODY}}", &body)
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}} · Casework</title>
  <style>
    @import url('https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&family=Fraunces:wght@600&display=swap');

    :root {
      --bg-1: #f3f1ea;
      --bg-2: #cfe3dc;
      --ink: #24302e;
      --accent: #e0683f;
      --accent-2: #2f5854;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(47, 88, 84, 0.16);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #eef4ef 60%, #f7f5ef 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      padding: 24px 18px 48px;
    }

    nav {
      display: flex;
      gap: 8px;
      justify-content: center;
      margin-bottom: 20px;
    }

    nav a {
      padding: 8px 16px;
      border-radius: 999px;
      color: var(--accent-2);
      text-decoration: none;
      font-weight: 600;
    }

    nav a.active {
      background: white;
      box-shadow: 0 8px 16px rgba(47, 88, 84, 0.12);
    }

    .app {
      width: min(1040px, 100%);
      margin: 0 auto;
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 32px;
      display: grid;
      gap: 24px;
    }

    h1 {
      font-family: "Fraunces", "Georgia", serif;
      font-size: clamp(1.8rem, 4vw, 2.4rem);
      margin: 0;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .stat {
      background: white;
      border-radius: 18px;
      padding: 18px;
      border: 1px solid rgba(47, 88, 84, 0.08);
    }

    .stat .label {
      display: block;
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #7d8682;
    }

    .stat .value {
      display: block;
      font-size: 1.6rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .filters {
      display: flex;
      flex-wrap: wrap;
      gap: 12px;
      align-items: end;
    }

    label {
      display: grid;
      gap: 4px;
      font-size: 0.85rem;
      color: #5d6663;
    }

    input, select {
      padding: 8px 12px;
      border-radius: 12px;
      border: 1px solid rgba(47, 88, 84, 0.2);
      font: inherit;
    }

    button {
      border: none;
      border-radius: 999px;
      padding: 10px 18px;
      font: inherit;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent-2);
      color: white;
    }

    button.secondary {
      background: rgba(47, 88, 84, 0.1);
      color: var(--accent-2);
    }

    table {
      width: 100%;
      border-collapse: collapse;
      background: white;
      border-radius: 16px;
      overflow: hidden;
    }

    th, td {
      text-align: left;
      padding: 10px 12px;
      border-bottom: 1px solid rgba(47, 88, 84, 0.08);
      font-size: 0.92rem;
    }

    th {
      font-size: 0.75rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: #7d8682;
    }

    .badge {
      display: inline-block;
      padding: 2px 10px;
      border-radius: 999px;
      font-size: 0.8rem;
      font-weight: 600;
      background: rgba(47, 88, 84, 0.1);
    }

    .badge.high { background: #d7f0df; color: #236b3d; }
    .badge.medium { background: #fbecc9; color: #8a5d06; }
    .badge.low { background: #f8d9d2; color: #a2361f; }

    .bars {
      display: flex;
      align-items: end;
      gap: 4px;
      height: 160px;
      padding: 12px;
      background: white;
      border-radius: 16px;
    }

    .bars div {
      flex: 1;
      background: var(--accent);
      border-radius: 6px 6px 0 0;
      min-height: 2px;
    }

    .status {
      min-height: 1.2em;
      color: #5d6663;
    }

    .status[data-type="error"] {
      color: #c63b2b;
    }

    .hidden {
      display: none;
    }
  </style>
  <script>
    const setStatus = (message, type) => {
      const el = document.getElementById('status');
      el.textContent = message;
      el.dataset.type = type || '';
    };

    const api = async (url, options) => {
      const res = await fetch(url, options);
      const body = await res.json().catch(() => ({}));
      if (!res.ok || body.success === false) {
        throw new Error((body.error && body.error.message) || 'Request failed');
      }
      return body.data;
    };

    const escapeHtml = (value) => String(value ?? '')
      .replace(/&/g, '&amp;')
      .replace(/</g, '&lt;')
      .replace(/>/g, '&gt;');
  </script>
</head>
<body>
  <nav>{{NAV}}</nav>
  <main class="app">
{{BODY}}
  </main>
</body>
</html>
"#;

const DASHBOARD_BODY: &str = r#"    <header>
      <h1>Services impact</h1>
    </header>
    <section class="filters">
      <label>Period
        <select id="period">{{PERIOD_OPTIONS}}</select>
      </label>
      <label id="start-wrap" class="hidden">Start
        <input id="start" type="date" />
      </label>
      <label id="end-wrap" class="hidden">End
        <input id="end" type="date" />
      </label>
      <button id="apply" type="button">Apply</button>
    </section>
    <p id="status" class="status"></p>
    <section class="panel">
      <div class="stat"><span class="label">Requested</span><span id="total-requested" class="value">0</span></div>
      <div class="stat"><span class="label">Provided</span><span id="total-provided" class="value">0</span></div>
      <div class="stat"><span class="label">Gap</span><span id="total-gap" class="value">0</span></div>
      <div class="stat"><span class="label">Completion</span><span id="overall" class="value">0%</span></div>
    </section>
    <section>
      <div id="trend" class="bars"></div>
    </section>
    <table>
      <thead>
        <tr><th>Service</th><th>Requested</th><th>Provided</th><th>Gap</th><th>Completion</th><th>Impact</th></tr>
      </thead>
      <tbody id="services"></tbody>
    </table>
  <script>
    const periodSelect = document.getElementById('period');

    const syncInputs = () => {
      const period = periodSelect.value;
      document.getElementById('start-wrap').classList.toggle('hidden', period !== 'Specific Date' && period !== 'Custom Date Range');
      document.getElementById('end-wrap').classList.toggle('hidden', period !== 'Custom Date Range');
    };

    const load = async () => {
      const params = new URLSearchParams({ period: periodSelect.value });
      const start = document.getElementById('start').value;
      const end = document.getElementById('end').value;
      if (start) params.set('startDate', start);
      if (end) params.set('endDate', end);

      setStatus('Loading...', 'info');
      const data = await api(`/api/analytics/services-impact?${params}`);

      document.getElementById('total-requested').textContent = data.summary.totalRequested;
      document.getElementById('total-provided').textContent = data.summary.totalProvided;
      document.getElementById('total-gap').textContent = data.summary.totalGap;
      document.getElementById('overall').textContent = `${data.summary.overallCompletionRate}%`;

      const rows = data.services.map((s) => `<tr>
        <td>${escapeHtml(s.name)}</td><td>${s.requested}</td><td>${s.provided}</td><td>${s.gap}</td>
        <td>${s.completionRate}%</td><td><span class="badge ${s.impact}">${s.impact}</span></td></tr>`);
      document.getElementById('services').innerHTML = rows.join('') || '<tr><td colspan="6">No services recorded for this period.</td></tr>';

      const peak = Math.max(1, ...data.trends.map((t) => t.requested));
      document.getElementById('trend').innerHTML = data.trends
        .map((t) => `<div title="${escapeHtml(t.label)}: ${t.provided}/${t.requested}" style="height:${(t.requested / peak) * 100}%"></div>`)
        .join('');
      setStatus('', '');
    };

    periodSelect.addEventListener('change', syncInputs);
    document.getElementById('apply').addEventListener('click', () => load().catch((err) => setStatus(err.message, 'error')));
    syncInputs();
    load().catch((err) => setStatus(err.message, 'error'));
  </script>"#;

const CONTACT_LOG_BODY: &str = r#"    <header>
      <h1>Contact log</h1>
    </header>
    <section class="filters">
      <label>Client <input id="client" type="search" /></label>
      <label>Provider <input id="provider" type="search" /></label>
      <label>Service
        <select id="service"><option value="all">All services</option>{{SERVICE_OPTIONS}}</select>
      </label>
      <label>From <input id="start" type="date" /></label>
      <label>To <input id="end" type="date" /></label>
      <button id="search" type="button">Search</button>
      <button id="retry" type="button" class="secondary hidden">Retry</button>
    </section>
    <p id="status" class="status"></p>
    <table>
      <thead>
        <tr><th>Date</th><th>Client</th><th>Provider</th><th>Requested</th><th>Provided</th><th>Comments</th></tr>
      </thead>
      <tbody id="contacts"></tbody>
    </table>
    <p id="pages" class="status"></p>
  <script>
    const retry = document.getElementById('retry');

    const load = async () => {
      const params = new URLSearchParams();
      for (const [key, id] of [['client', 'client'], ['provider', 'provider'], ['service', 'service'], ['startDate', 'start'], ['endDate', 'end']]) {
        const value = document.getElementById(id).value.trim();
        if (value) params.set(key, value);
      }

      retry.classList.add('hidden');
      setStatus('Loading...', 'info');
      const data = await api(`/api/contacts?${params}`);

      document.getElementById('contacts').innerHTML = data.contacts.map((c) => `<tr>
        <td>${escapeHtml(c.contactDate)}</td><td>${escapeHtml(c.clientName)}</td><td>${escapeHtml(c.providerName)}</td>
        <td>${escapeHtml(c.servicesRequested.join(', '))}</td>
        <td>${escapeHtml(c.servicesProvided.map((s) => s.service).join(', '))}</td>
        <td>${escapeHtml(c.comments)}</td></tr>`).join('') || '<tr><td colspan="6">No contacts match these filters.</td></tr>';
      document.getElementById('pages').textContent = `${data.pagination.total} contacts`;
      setStatus('', '');
    };

    const run = () => load().catch((err) => {
      setStatus(err.message, 'error');
      retry.classList.remove('hidden');
    });

    document.getElementById('search').addEventListener('click', run);
    retry.addEventListener('click', run);
    run();
  </script>"#;

const USERS_BODY: &str = r#"    <header>
      <h1>Users</h1>
    </header>
    <form id="add-user" class="filters">
      <label>Email <input id="email" type="email" required /></label>
      <label>Role <select id="role"></select></label>
      <button type="submit">Add user</button>
    </form>
    <p id="status" class="status"></p>
    <table>
      <thead>
        <tr><th>Email</th><th>Role</th><th>Permissions</th><th>Status</th><th></th></tr>
      </thead>
      <tbody id="users"></tbody>
    </table>
  <script>
    let roles = [];

    const loadRoles = async () => {
      roles = await api('/api/admin/roles');
      document.getElementById('role').innerHTML = roles
        .map((r, i) => `<option value="${i}">${escapeHtml(r.role)}</option>`)
        .join('');
    };

    const loadUsers = async () => {
      const users = await api('/api/admin/users');
      document.getElementById('users').innerHTML = users.map((u) => `<tr>
        <td>${escapeHtml(u.email)}</td>
        <td><span class="badge">${escapeHtml(u.role)}</span></td>
        <td>${escapeHtml(u.permissionSummary.join(', '))}</td>
        <td>${u.active ? 'Active' : 'Inactive'}</td>
        <td><button type="button" class="secondary" data-id="${u.id}" data-active="${u.active}">
          ${u.active ? 'Deactivate' : 'Activate'}</button></td></tr>`).join('');
    };

    document.getElementById('users').addEventListener('click', (event) => {
      const button = event.target.closest('button[data-id]');
      if (!button) return;
      const activate = button.dataset.active !== 'true';
      if (!confirm(`${activate ? 'Activate' : 'Deactivate'} this user?`)) return;
      api(`/api/admin/users/${button.dataset.id}`, {
        method: 'PATCH',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify({ active: activate })
      })
        .then(loadUsers)
        .then(() => setStatus('Saved', 'ok'))
        .catch((err) => setStatus(err.message, 'error'));
    });

    document.getElementById('add-user').addEventListener('submit', (event) => {
      event.preventDefault();
      const template = roles[Number(document.getElementById('role').value)];
      const payload = { email: document.getElementById('email').value, ...(template ? template.permissions : {}) };
      api('/api/admin/users', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify(payload)
      })
        .then(() => {
          document.getElementById('email').value = '';
          return loadUsers();
        })
        .then(() => setStatus('User added', 'ok'))
        .catch((err) => setStatus(err.message, 'error'));
    });

    Promise.all([loadRoles(), loadUsers()]).catch((err) => setStatus(err.message, 'error'));
  </script>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_lists_every_period() {
        let html = render_dashboard(Period::ThisMonth);
        assert!(html.contains("<option value=\"This Month\" selected>This Month</option>"));
        assert!(html.contains("Custom Date Range"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn contact_log_offers_service_filters() {
        let html = render_contact_log();
        assert!(html.contains("<option value=\"mental_health\">Mental Health</option>"));
        assert!(html.contains("Retry"));
        assert!(html.contains("<a href=\"/contact-log\" class=\"active\">"));
    }
}
