use crate::cache::KeyedView;
use crate::config::{CalendarConfig, Category};
use crate::models::DateRange;
use chrono::{Datelike, NaiveDate};
use std::fmt::Write;

const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

/// Number of `.opt-N` colour rules in the stylesheet; slots beyond it wrap.
const PALETTE_SIZE: usize = 4;

pub fn render_index(
    config: &CalendarConfig,
    range: DateRange,
    keyed: &KeyedView,
    today: NaiveDate,
) -> String {
    let month = range.month_param();
    let calendars: String = config
        .categories()
        .iter()
        .enumerate()
        .map(|(index, category)| render_category(index, category, range, keyed, today))
        .collect();

    INDEX_HTML
        .replace("{{MONTH_LABEL}}", &range.label())
        .replace("{{MONTH}}", &month)
        .replace("{{PREV}}", &month_link(range.previous_month(), &month))
        .replace("{{NEXT}}", &month_link(range.next_month(), &month))
        .replace("{{CALENDARS}}", &calendars)
}

fn month_link(range: Option<DateRange>, fallback: &str) -> String {
    range
        .map(|range| range.month_param())
        .unwrap_or_else(|| fallback.to_string())
}

fn render_category(
    index: usize,
    category: &Category,
    range: DateRange,
    keyed: &KeyedView,
    today: NaiveDate,
) -> String {
    let month = range.month_param();
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<section class="calendar"><h2>{}</h2><ul class="legend">"#,
        escape_html(&category.title)
    );
    for (slot, option) in category.options.iter().enumerate() {
        let _ = write!(
            html,
            r#"<li><span class="swatch opt-{}"></span>{}</li>"#,
            slot % PALETTE_SIZE,
            escape_html(&option.label)
        );
    }
    html.push_str(r#"</ul><div class="grid">"#);

    for weekday in WEEKDAYS {
        let _ = write!(html, r#"<span class="weekday">{weekday}</span>"#);
    }
    for _ in 0..range.start().weekday().num_days_from_monday() {
        html.push_str(r#"<span class="blank"></span>"#);
    }

    for date in range.days() {
        let active = category
            .options
            .iter()
            .enumerate()
            .find(|(_, option)| keyed.is_active(&option.key, date));
        let (class, title) = match active {
            Some((slot, option)) => (
                format!("opt-{}", slot % PALETTE_SIZE),
                escape_html(&option.label),
            ),
            None => ("none".to_string(), String::new()),
        };
        let today_class = if date == today { " today" } else { "" };

        let _ = write!(
            html,
            r#"<form method="post" action="/click"><input type="hidden" name="date" value="{date}" /><input type="hidden" name="category" value="{index}" /><input type="hidden" name="month" value="{month}" /><button class="cell {class}{today_class}" title="{title}">{day}</button></form>"#,
            day = date.day()
        );
    }

    html.push_str("</div></section>");
    html
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Habit Calendar</title>
  <style>
    :root {
      --bg: #1e1e1e;
      --ink: #d4d4d4;
      --muted: #8a8a8a;
      --cell: #2a2a2a;
      --opt-0: #4caf50;
      --opt-1: #2196f3;
      --opt-2: #ff9800;
      --opt-3: #e91e63;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      padding: 16px;
    }

    header {
      display: flex;
      align-items: center;
      justify-content: center;
      gap: 12px;
      font-size: 0.9rem;
      font-weight: 600;
    }

    header a {
      color: var(--muted);
      text-decoration: none;
      font-size: 1.4rem;
    }

    header a:hover {
      color: var(--ink);
    }

    main {
      display: flex;
      gap: 16px;
      overflow-x: auto;
      padding-top: 12px;
    }

    .calendar h2 {
      margin: 0 0 6px;
      font-size: 0.85rem;
      text-align: center;
    }

    .legend {
      list-style: none;
      display: flex;
      gap: 8px;
      justify-content: center;
      margin: 0 0 8px;
      padding: 0;
      font-size: 0.7rem;
      color: var(--muted);
    }

    .swatch {
      display: inline-block;
      width: 8px;
      height: 8px;
      border-radius: 2px;
      margin-right: 4px;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(7, 28px);
      gap: 3px;
    }

    .weekday {
      font-size: 0.65rem;
      color: var(--muted);
      text-align: center;
    }

    .grid form {
      margin: 0;
    }

    .cell {
      width: 28px;
      height: 28px;
      border: none;
      border-radius: 4px;
      background: var(--cell);
      color: var(--ink);
      font-size: 0.7rem;
      cursor: pointer;
    }

    .cell.today {
      outline: 1px solid var(--muted);
    }

    .opt-0 { background: var(--opt-0); }
    .opt-1 { background: var(--opt-1); }
    .opt-2 { background: var(--opt-2); }
    .opt-3 { background: var(--opt-3); }
  </style>
</head>
<body>
  <header>
    <a href="/?month={{PREV}}" title="Previous month">&lsaquo;</a>
    <span>{{MONTH_LABEL}}</span>
    <a href="/?month={{MONTH}}" title="Refresh">&#8635;</a>
    <a href="/?month={{NEXT}}" title="Next month">&rsaquo;</a>
  </header>
  <main>
    {{CALENDARS}}
  </main>
</body>
</html>
"#;
