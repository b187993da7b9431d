use arnold_runner::MigrationStatus;

/// Render the status table shown by `arnold status`.
pub fn render_status(source: &str, statuses: &[MigrationStatus]) -> String {
    let version = env!("CARGO_PKG_VERSION");

    let id_w = statuses
        .iter()
        .map(|s| s.identifier.len())
        .max()
        .unwrap_or(0)
        .max("Migration".len());
    let applied = statuses.iter().filter(|s| s.applied).count();
    let summary = format!("{applied} applied, {} pending", statuses.len() - applied);

    let state_w = "applied (ignored)".len();
    let mut when_w = "YYYY-MM-DD HH:MM:SS".len();
    // the last column absorbs any extra width a long source line needs
    let full_line = source.chars().count().max(summary.len()) + 4;
    when_w += full_line.saturating_sub(id_w + state_w + when_w + 10);
    let width = id_w + state_w + when_w + 10; // borders and padding

    let title = format!("Arnold v{version}");
    let title_dashes = width.saturating_sub(2 + title.len() + 5); // ╭╮ and "─── " + " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));
    let row = |a: &str, b: &str, c: &str| {
        format!("│ {:<id_w$} │ {:<state_w$} │ {:<when_w$} │", a, b, c)
    };

    let mut out = Vec::with_capacity(statuses.len() + 6);
    out.push(top);
    out.push(format!("│ {:<w$} │", source, w = width - 4));
    out.push(row("Migration", "State", "Applied at"));
    out.push(row(
        &"─".repeat(id_w),
        &"─".repeat(state_w),
        &"─".repeat(when_w),
    ));

    if statuses.is_empty() {
        out.push(row("(none)", "", ""));
    }
    for status in statuses {
        let state = match (status.applied, status.ignored) {
            (true, false) => "applied",
            (true, true) => "applied (ignored)",
            (false, false) => "pending",
            (false, true) => "ignored",
        };
        let when = status
            .applied_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        out.push(row(&status.identifier, state, &when));
    }

    out.push(format!("│ {:<w$} │", summary, w = width - 4));
    out.push(bottom);
    out.join("\n")
}
