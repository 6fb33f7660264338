use anyhow::Result;
use calres_core::ItemKind;
use calres_core::config::CalresConfig;
use calres_core::store::SqliteStore;
use owo_colors::OwoColorize;

use crate::render::SummaryRender;
use crate::singleton;
use crate::utils::tui;

pub async fn run(config: &CalresConfig, kind: Option<ItemKind>, verbose: bool) -> Result<()> {
    let database = config.database_path();
    let _lock = singleton::acquire_lock(&database)?;
    let mut store = SqliteStore::open(&database)?;

    let kinds = match kind {
        Some(kind) => vec![kind],
        None => ItemKind::ALL.to_vec(),
    };

    let job = config.job();
    let label = kinds.iter().map(|k| k.plural()).collect::<Vec<_>>().join(" and ");
    let spinner = tui::create_spinner(format!("Updating {}...", label));
    let report = job.run_kinds(&kinds, &mut store).await;
    spinner.finish_and_clear();

    println!("{}\n", report.render(verbose));

    let changes = report
        .kinds
        .iter()
        .map(|k| {
            let counts = k.counts();
            counts.created + counts.updated + counts.deleted
        })
        .sum::<usize>();
    let skipped = report.kinds.iter().map(|k| k.skipped().count()).sum::<usize>();
    let failed = report.kinds.iter().map(|k| k.failed().count()).sum::<usize>();

    if changes == 0 {
        println!("{}", "Cache is up to date".dimmed());
    } else {
        println!("{} {} item changes written", "✓".green(), changes);
    }
    if skipped > 0 {
        println!(
            "{} {} backend(s) skipped, their cached items were kept",
            "!".yellow(),
            skipped
        );
    }
    if failed > 0 {
        println!(
            "{} {} backend(s) were only partly written, the next run retries the rest",
            "!".red(),
            failed
        );
    }

    if let Some((kind, _)) = report.failures.first() {
        anyhow::bail!("Updating {} failed", kind.plural());
    }

    Ok(())
}
