use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args};
use indexmap::IndexMap;
use time::Date;
use unicode_segmentation::UnicodeSegmentation;

use crate::app::App;
use crate::config::AppConfig;
use crate::index::calendar::checkbox_label;
use crate::index::{render_text, CalendarGrid, ReviewIndex, ReviewRowRef};
use crate::model::{format_date, parse_date, SnippetDraft, SnippetEdit};
use crate::reconcile::{check, ReconcileError, Reconciler, WritePlan};
use crate::schedule::SnippetId;
use crate::storage::{ReviewTable, SchemaStatus, SheetGateway, StoredRow};

const PREVIEW_GRAPHEMES: usize = 48;

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Snippet text. If omitted, read from stdin.
    #[arg()]
    pub content: Option<String>,
    /// Snippet type (defaults to schedule.default_type)
    #[arg(long = "type", short = 't')]
    pub snippet_type: Option<String>,
    /// Creation date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
    /// Comma-separated review offsets in days (defaults to schedule.offsets)
    #[arg(long)]
    pub offsets: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ToggleArgs {
    /// Snippet identifier, e.g. 20240101-01
    pub id: String,
    /// Review date as YYYY-MM-DD
    pub date: String,
    /// Completion state to record
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub completed: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Snippet identifier
    pub id: String,
    /// New snippet type
    #[arg(long = "type", short = 't')]
    pub snippet_type: Option<String>,
    /// New creation date as YYYY-MM-DD; reviews move with it
    #[arg(long)]
    pub date: Option<String>,
    /// New snippet text
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Snippet identifier
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<String>,
    /// Number of weeks to show (defaults to calendar.weeks)
    #[arg(long)]
    pub weeks: Option<u8>,
}

#[derive(Args, Debug, Clone)]
pub struct DueArgs {
    /// Date to report on (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
}

/// What every non-interactive command runs against.
pub struct CommandContext<'a, G: SheetGateway + ?Sized> {
    pub config: &'a AppConfig,
    pub sheet: &'a G,
    pub today: Date,
    pub dry_run: bool,
}

impl<'a, G: SheetGateway + ?Sized> CommandContext<'a, G> {
    fn engine(&self) -> Reconciler<'a, G> {
        Reconciler::new(self.sheet).dry_run(self.dry_run)
    }
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

/// Fills in the snippet text from piped stdin when it was not given inline.
pub fn with_stdin_content(mut args: AddArgs) -> Result<AddArgs> {
    if args.content.is_none() {
        args.content = read_stdin()?;
    }
    Ok(args)
}

pub fn add_snippet<G: SheetGateway + ?Sized>(
    ctx: &CommandContext<'_, G>,
    args: AddArgs,
) -> Result<String> {
    let content = args.content.unwrap_or_default().trim().to_string();
    if content.is_empty() {
        bail!("snippet content cannot be empty");
    }
    let snippet_type = resolve_type(ctx.config, args.snippet_type.as_deref())?;
    let date_created = match args.date.as_deref() {
        Some(raw) => parse_date_arg(raw)?,
        None => ctx.today,
    };
    let offsets = args
        .offsets
        .unwrap_or_else(|| ctx.config.schedule.offsets.clone());
    let draft = SnippetDraft::new(snippet_type, date_created, offsets).with_content(content);

    let outcome = ctx.engine().add(&draft).context("adding snippet")?;
    let mut out = String::new();
    let verb = if ctx.dry_run { "Would add" } else { "Added" };
    let first_due = outcome
        .rows
        .iter()
        .filter_map(|row| row.review_date)
        .min()
        .map(format_date)
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "{verb} snippet {} with {} review{} (first due {first_due})",
        outcome.snippet.id,
        outcome.rows.len(),
        plural(outcome.rows.len())
    );
    push_plan(&mut out, ctx.dry_run, &outcome.plan);
    Ok(out)
}

pub fn toggle_review<G: SheetGateway + ?Sized>(
    ctx: &CommandContext<'_, G>,
    args: ToggleArgs,
) -> Result<String> {
    let id = parse_id(&args.id)?;
    let date = parse_date_arg(&args.date)?;
    let outcome = ctx
        .engine()
        .toggle(id.as_str(), date, args.completed)
        .with_context(|| format!("toggling review of {id} on {}", format_date(date)))?;

    let state = if args.completed { "done" } else { "not done" };
    let mut out = String::new();
    if outcome.plan.is_empty() {
        let _ = writeln!(
            out,
            "Review of {id} on {} is already {state}",
            format_date(date)
        );
        return Ok(out);
    }
    let verb = if ctx.dry_run { "Would mark" } else { "Marked" };
    let _ = writeln!(out, "{verb} review of {id} on {} as {state}", format_date(date));
    push_plan(&mut out, ctx.dry_run, &outcome.plan);
    Ok(out)
}

pub fn edit_snippet<G: SheetGateway + ?Sized>(
    ctx: &CommandContext<'_, G>,
    args: EditArgs,
) -> Result<String> {
    let id = parse_id(&args.id)?;
    if args.snippet_type.is_none() && args.date.is_none() && args.content.is_none() {
        bail!("nothing to change; pass --type, --date or --content");
    }
    let engine = ctx.engine();
    let table = engine.load().context("reading the review sheet")?;
    let current = table
        .rows_for(id.as_str())
        .next()
        .ok_or_else(|| ReconcileError::UnknownSnippet(id.to_string()))?;

    let snippet_type = match args.snippet_type.as_deref() {
        Some(name) => resolve_type(ctx.config, Some(name))?,
        None => current.review.snippet_type.clone(),
    };
    let date_created = match args.date.as_deref() {
        Some(raw) => parse_date_arg(raw)?,
        None => current
            .review
            .date_created
            .with_context(|| format!("snippet {id} has no readable creation date; pass --date"))?,
    };
    let content = match args.content {
        Some(content) if content.trim().is_empty() => bail!("snippet content cannot be empty"),
        Some(content) => content.trim().to_string(),
        None => current.review.content.clone(),
    };
    let edit = SnippetEdit {
        snippet_type,
        date_created,
        content,
    };

    let outcome = engine
        .edit_in(&table, id.as_str(), &edit)
        .with_context(|| format!("editing snippet {id}"))?;
    let mut out = String::new();
    if outcome.plan.is_empty() {
        let _ = writeln!(out, "Snippet {id} is unchanged");
        return Ok(out);
    }
    let verb = if ctx.dry_run { "Would update" } else { "Updated" };
    let _ = write!(out, "{verb} snippet {id}");
    if outcome.snippet_id != outcome.previous_id {
        let _ = write!(out, " (now {})", outcome.snippet_id);
    }
    let _ = writeln!(out, ", {} review{}", outcome.rows, plural(outcome.rows));
    push_plan(&mut out, ctx.dry_run, &outcome.plan);
    Ok(out)
}

pub fn delete_snippet<G: SheetGateway + ?Sized>(
    ctx: &CommandContext<'_, G>,
    args: DeleteArgs,
) -> Result<String> {
    let id = parse_id(&args.id)?;
    let outcome = ctx
        .engine()
        .delete(id.as_str())
        .with_context(|| format!("deleting snippet {id}"))?;
    let mut out = String::new();
    let verb = if ctx.dry_run { "Would delete" } else { "Deleted" };
    let _ = writeln!(
        out,
        "{verb} snippet {id} ({} review{} removed)",
        outcome.removed,
        plural(outcome.removed)
    );
    push_plan(&mut out, ctx.dry_run, &outcome.plan);
    Ok(out)
}

pub fn list_snippets<G: SheetGateway + ?Sized>(ctx: &CommandContext<'_, G>) -> Result<String> {
    let table = load_table(ctx)?;
    let summaries = summarize(&table);
    if summaries.is_empty() {
        return Ok("No snippets yet.\n".to_string());
    }
    let mut out = String::new();
    for summary in summaries.values() {
        let next = summary
            .next_due
            .map(format_date)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{}  {:<6}  {}  {}/{} done  next {next}  {}",
            summary.snippet_id,
            summary.snippet_type,
            summary
                .date_created
                .map(format_date)
                .unwrap_or_else(|| "????-??-??".to_string()),
            summary.completed,
            summary.reviews,
            preview(&summary.content)
        );
    }
    Ok(out)
}

pub fn show_calendar<G: SheetGateway + ?Sized>(
    ctx: &CommandContext<'_, G>,
    args: CalendarArgs,
) -> Result<String> {
    let today = match args.today.as_deref() {
        Some(raw) => parse_date_arg(raw)?,
        None => ctx.today,
    };
    let weeks = args.weeks.unwrap_or(ctx.config.calendar.weeks);
    let table = load_table(ctx)?;
    let index = ReviewIndex::build(table.indexed());
    let grid = CalendarGrid::rolling(today, weeks);
    Ok(render_text(&grid, &index, Some(today)))
}

pub fn show_due<G: SheetGateway + ?Sized>(
    ctx: &CommandContext<'_, G>,
    args: DueArgs,
) -> Result<String> {
    let date = match args.date.as_deref() {
        Some(raw) => parse_date_arg(raw)?,
        None => ctx.today,
    };
    let table = load_table(ctx)?;
    let index = ReviewIndex::build(table.indexed());

    let mut out = String::new();
    let due = index.on(date);
    let overdue: Vec<&ReviewRowRef> = index.overdue(date).collect();
    if due.is_empty() && overdue.is_empty() {
        let _ = writeln!(out, "Nothing due on {}", format_date(date));
        return Ok(out);
    }
    if !due.is_empty() {
        let _ = writeln!(out, "Due {}:", format_date(date));
        for entry in due {
            push_entry(&mut out, &table, entry, None);
        }
    }
    if !overdue.is_empty() {
        let _ = writeln!(out, "Overdue:");
        for entry in overdue {
            push_entry(&mut out, &table, entry, Some(entry.review_date));
        }
    }
    Ok(out)
}

pub fn check_sheet<G: SheetGateway + ?Sized>(ctx: &CommandContext<'_, G>) -> Result<String> {
    let table = load_table(ctx)?;
    let report = check(&table);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} row{} across {} snippet{}",
        report.rows,
        plural(report.rows),
        report.snippets,
        plural(report.snippets)
    );
    if let SchemaStatus::Degraded { missing } = &report.status {
        let names: Vec<&str> = missing.iter().map(|column| column.header()).collect();
        let _ = writeln!(out, "missing columns: {}", names.join(", "));
    }
    push_rows(&mut out, "blank rows", &report.blank_rows);
    push_rows(&mut out, "rows without a snippet id", &report.missing_id_rows);
    push_rows(&mut out, "rows without a readable review date", &report.undated_rows);
    if !report.fragmented.is_empty() {
        let _ = writeln!(
            out,
            "snippets split across the sheet: {}",
            report.fragmented.join(", ")
        );
    }
    if report.is_healthy() {
        let _ = writeln!(out, "sheet looks healthy");
    }
    Ok(out)
}

#[derive(Debug, Clone)]
struct SnippetSummary {
    snippet_id: String,
    snippet_type: String,
    date_created: Option<Date>,
    content: String,
    reviews: usize,
    completed: usize,
    next_due: Option<Date>,
}

/// One entry per snippet, in the order snippets first appear in the sheet.
fn summarize(table: &ReviewTable) -> IndexMap<&str, SnippetSummary> {
    let mut summaries: IndexMap<&str, SnippetSummary> = IndexMap::new();
    for stored in table.rows() {
        let review = &stored.review;
        if review.snippet_id.is_empty() {
            continue;
        }
        let summary = summaries
            .entry(review.snippet_id.as_str())
            .or_insert_with(|| SnippetSummary {
                snippet_id: review.snippet_id.clone(),
                snippet_type: review.snippet_type.clone(),
                date_created: review.date_created,
                content: review.content.clone(),
                reviews: 0,
                completed: 0,
                next_due: None,
            });
        summary.reviews += 1;
        if review.completed {
            summary.completed += 1;
        } else if let Some(date) = review.review_date {
            summary.next_due = Some(summary.next_due.map_or(date, |due| due.min(date)));
        }
    }
    summaries
}

fn load_table<G: SheetGateway + ?Sized>(ctx: &CommandContext<'_, G>) -> Result<ReviewTable> {
    ctx.engine().load().context("reading the review sheet")
}

fn push_entry(out: &mut String, table: &ReviewTable, entry: &ReviewRowRef, due: Option<Date>) {
    let row: Option<&StoredRow> = table.row(entry.row);
    let (snippet_type, content) = row
        .map(|stored| (stored.review.snippet_type.as_str(), stored.review.content.as_str()))
        .unwrap_or(("", ""));
    let _ = write!(out, "  {}  {:<6}", checkbox_label(entry), snippet_type);
    if let Some(due) = due {
        let _ = write!(out, "  {}", format_date(due));
    }
    let _ = writeln!(out, "  {}", preview(content));
}

fn push_rows(out: &mut String, label: &str, rows: &[usize]) {
    if rows.is_empty() {
        return;
    }
    let rows: Vec<String> = rows.iter().map(|row| row.to_string()).collect();
    let _ = writeln!(out, "{label}: {}", rows.join(", "));
}

fn push_plan(out: &mut String, dry_run: bool, plan: &WritePlan) {
    if dry_run {
        let _ = writeln!(out, "{plan}");
    }
}

fn resolve_type(config: &AppConfig, requested: Option<&str>) -> Result<String> {
    let registry = config.schedule.registry();
    let Some(requested) = requested else {
        return Ok(config.schedule.default_type.clone());
    };
    match registry.resolve(requested) {
        Some(name) => Ok(name.to_string()),
        None => bail!(
            "unknown snippet type '{}' (expected one of: {})",
            requested.trim(),
            registry.all().collect::<Vec<_>>().join(", ")
        ),
    }
}

fn parse_id(raw: &str) -> Result<SnippetId> {
    raw.trim()
        .parse::<SnippetId>()
        .with_context(|| format!("'{raw}' is not a snippet id"))
}

fn parse_date_arg(raw: &str) -> Result<Date> {
    match parse_date(raw) {
        Some(date) => Ok(date),
        None => bail!("invalid date '{raw}', expected YYYY-MM-DD"),
    }
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or("").trim();
    let mut graphemes = line.graphemes(true);
    let head: String = graphemes.by_ref().take(PREVIEW_GRAPHEMES).collect();
    if graphemes.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
