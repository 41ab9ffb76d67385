//! Format workspace snapshots and session listings as text.

use crate::tree::EntryKind;
use crate::workspace::types::{SessionRow, WorkspaceSnapshot};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Format a workspace snapshot as a table of paths.
pub fn format_snapshot_text(data: &WorkspaceSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Sandbox tree")));
    out.push_str(&format!("  Base prefix: {}\n", data.base_prefix));
    out.push_str(&format!("  Nodes: {}\n\n", data.node_count));

    if data.entries.is_empty() {
        out.push_str("  (empty)\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Kind", "Size"]);
    for entry in &data.entries {
        let kind = match entry.kind {
            EntryKind::Folder => "dir",
            EntryKind::File => "file",
        };
        let size = entry
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![entry.path.clone(), kind.to_string(), size]);
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// Format the session listing.
pub fn format_sessions_text(rows: &[SessionRow]) -> String {
    if rows.is_empty() {
        return "No sessions\n".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["", "Session", "Name", "State"]);
    for row in rows {
        let marker = if row.active { "*" } else { "" };
        table.add_row(vec![
            marker.to_string(),
            row.id.to_string(),
            row.display_name.clone(),
            row.state.clone(),
        ]);
    }
    format!("{}\n", table)
}
