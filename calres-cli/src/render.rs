//! Colored terminal rendering for calres-core types.

use calres_core::job::JobReport;
use calres_core::sync::{
    BackendDiff, BackendOutcome, BackendReport, DiffCounts, DiffKind, ItemDiff, ItemSync,
    KindReport, MetadataDiff,
};
use calres_core::{CachedItem, ItemKind};
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for DiffKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            DiffKind::Create => symbol.green().to_string(),
            DiffKind::Update => symbol.yellow().to_string(),
            DiffKind::Delete => symbol.red().to_string(),
        }
    }
}

fn colorize_diff(kind: DiffKind, text: &str) -> String {
    match kind {
        DiffKind::Create => text.green().to_string(),
        DiffKind::Update => text.yellow().to_string(),
        DiffKind::Delete => text.red().to_string(),
    }
}

impl Render for ItemKind {
    fn render(&self) -> String {
        match self {
            ItemKind::Resource => "🧰 resources".bold().to_string(),
            ItemKind::Room => "🚪 rooms".bold().to_string(),
        }
    }
}

impl Render for CachedItem {
    fn render(&self) -> String {
        let mut line = format!("{} {}", self.fields.display_name, self.external_id.dimmed());
        if !self.fields.email.is_empty() {
            line.push_str(&format!(" <{}>", self.fields.email));
        }
        if !self.fields.group_restrictions.is_empty() {
            let groups = format!("[{}]", self.fields.group_restrictions.join(", "));
            line.push_str(&format!(" {}", groups.dimmed()));
        }
        line
    }
}

impl Render for ItemDiff {
    fn render(&self) -> String {
        let name = colorize_diff(self.kind, self.display_name());
        format!("{} {} {}", self.kind.render(), name, self.external_id.dimmed())
    }
}

impl Render for MetadataDiff {
    fn render(&self) -> String {
        let value = match (&self.old, &self.new) {
            (Some(old), Some(new)) => format!("{} -> {}", old.dimmed(), new),
            (_, Some(value)) | (Some(value), None) => value.to_string(),
            (None, None) => String::new(),
        };
        format!("{} {}: {}", self.kind.render(), self.key, value)
    }
}

impl Render for ItemSync {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        match &self.item {
            Some(diff) => lines.push(diff.render()),
            None => lines.push(format!("  {}", self.external_id.dimmed())),
        }
        for meta in &self.metadata {
            lines.push(format!("   {}", meta.render()));
        }
        lines.join("\n")
    }
}

/// Threshold for compact view (show counts instead of individual items)
const COMPACT_THRESHOLD: usize = 5;

fn render_counts(counts: DiffCounts, noun: &str, lines: &mut Vec<String>) {
    if counts.created > 0 {
        let label = format!("({} new {})", counts.created, noun);
        lines.push(format!("   {} {}", "+".green(), label.green()));
    }
    if counts.updated > 0 {
        let label = format!("({} changed {})", counts.updated, noun);
        lines.push(format!("   {} {}", "~".yellow(), label.yellow()));
    }
    if counts.deleted > 0 {
        let label = format!("({} removed {})", counts.deleted, noun);
        lines.push(format!("   {} {}", "-".red(), label.red()));
    }
}

/// Rendering that can collapse long change lists into counts
pub trait SummaryRender {
    fn render(&self, verbose: bool) -> String;
}

impl SummaryRender for BackendDiff {
    fn render(&self, verbose: bool) -> String {
        if self.is_empty() && self.unreachable.is_empty() {
            return "   No changes".dimmed().to_string();
        }

        let mut lines = Vec::new();
        let changes = self.to_delete.len() + self.to_sync.len();

        if verbose || changes <= COMPACT_THRESHOLD {
            for diff in &self.to_delete {
                lines.push(format!("   {}", diff.render()));
            }
            for sync in &self.to_sync {
                lines.extend(sync.render().lines().map(|l| format!("   {}", l)));
            }
        } else {
            render_counts(self.counts(), self.kind.plural(), &mut lines);
            render_counts(self.metadata_counts(), "metadata values", &mut lines);
        }

        for id in &self.unreachable {
            lines.push(format!("   {} {} {}", "?".yellow(), id, "(could not be fetched)".dimmed()));
        }

        lines.join("\n")
    }
}

impl SummaryRender for BackendReport {
    fn render(&self, verbose: bool) -> String {
        let header = format!("  {}", self.backend_id.bold());
        let body = match &self.outcome {
            BackendOutcome::Synced { diff, failed } => {
                let mut body = diff.render(verbose);
                for item in failed {
                    body.push_str(&format!(
                        "\n   {} {} {}",
                        "!".red(),
                        item.external_id,
                        format!("(not written: {})", item.reason).dimmed()
                    ));
                }
                body
            }
            BackendOutcome::Skipped { reason, transient } => {
                let label = if *transient { "Unavailable" } else { "Skipped" };
                format!("   {} {}", format!("{}:", label).yellow(), reason.dimmed())
            }
            BackendOutcome::Failed { reason } => {
                format!("   {} {}", "Failed:".red(), reason)
            }
        };
        format!("{}\n{}", header, body)
    }
}

impl SummaryRender for KindReport {
    fn render(&self, verbose: bool) -> String {
        let mut lines = vec![self.kind.render()];

        if self.backends.is_empty() && self.orphaned.is_empty() {
            lines.push("   No backends configured".dimmed().to_string());
        }

        for backend in &self.backends {
            lines.push(backend.render(verbose));
        }

        for id in &self.orphaned {
            lines.push(format!(
                "  {} {}",
                id.bold(),
                "(not configured, cached items kept)".yellow()
            ));
        }

        lines.join("\n")
    }
}

impl SummaryRender for JobReport {
    fn render(&self, verbose: bool) -> String {
        let mut sections: Vec<String> = self.kinds.iter().map(|k| k.render(verbose)).collect();

        for (kind, reason) in &self.failures {
            sections.push(format!("{}\n   {} {}", kind.render(), "Failed:".red(), reason));
        }

        sections.join("\n\n")
    }
}
