use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use time::macros::format_description;
use time::Date;

use crate::config::{AppConfig, ConfigPaths};
use crate::journaling::DraftJournal;
use crate::model::{format_date, SnippetDraft};
use crate::storage::SheetHandle;
use crate::ui;

mod actions;
pub mod state;

use self::actions::ActionDispatcher;
pub use state::{CalendarState, DeleteSnippetOverlay, FormField, FormMode, OverlayState, SnippetForm};

enum Action {
    Quit,
    PreviousDay,
    NextDay,
    PreviousWeek,
    NextWeek,
    CycleEntry,
    ToggleEntry,
    NewSnippet,
    EditSnippet,
    DeleteSnippet,
    Today,
    Refresh,
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub sheet: SheetHandle,
    state: CalendarState,
    journal: DraftJournal,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        sheet: SheetHandle,
        paths: ConfigPaths,
        today: Date,
    ) -> Result<Self> {
        let journal =
            DraftJournal::new(paths.drafts_dir()).context("initialising draft journal")?;
        let mut state = CalendarState::new(today, config.calendar.weeks);
        let table = ActionDispatcher::new(&sheet)
            .reload()
            .context("loading reviews for initial state")?;
        state.load(table);
        if let Some(saved) = journal.restore()? {
            let saved_at = saved
                .saved_at
                .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .unwrap_or_else(|_| "an earlier session".to_string());
            state.set_status_message(Some(format!(
                "Unsaved snippet draft from {saved_at}; press 'a' to resume it."
            )));
        }
        Ok(Self {
            config,
            sheet,
            state,
            journal,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| ui::draw_app(frame, &self.state))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            if event::poll(self.tick_rate).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            KeyCode::Char('h') | KeyCode::Left => Some(Action::PreviousDay),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::NextDay),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::PreviousWeek),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::NextWeek),
            KeyCode::Tab => Some(Action::CycleEntry),
            KeyCode::Char(' ') if plain => Some(Action::ToggleEntry),
            KeyCode::Char('a') if plain => Some(Action::NewSnippet),
            KeyCode::Char('e') if plain => Some(Action::EditSnippet),
            KeyCode::Char('d') if plain => Some(Action::DeleteSnippet),
            KeyCode::Char('t') if plain => Some(Action::Today),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::PreviousDay => self.state.move_days(-1),
            Action::NextDay => self.state.move_days(1),
            Action::PreviousWeek => self.state.move_days(-7),
            Action::NextWeek => self.state.move_days(7),
            Action::CycleEntry => self.state.cycle_entry(),
            Action::ToggleEntry => self.handle_toggle(),
            Action::NewSnippet => self.open_new_form(),
            Action::EditSnippet => {
                if !self.state.open_edit_selected() {
                    self.state
                        .set_status_message(Some("Select a review to edit its snippet"));
                }
            }
            Action::DeleteSnippet => {
                if !self.state.open_delete_selected() {
                    self.state
                        .set_status_message(Some("Select a review to delete its snippet"));
                }
            }
            Action::Today => self.state.go_today(),
            Action::Refresh => {
                if self.refresh() {
                    self.state.set_status_message(Some("Reloaded reviews"));
                }
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::Snippet(_)) => {
                match key.code {
                    KeyCode::Esc => self.cancel_form(),
                    KeyCode::Enter => self.submit_form(),
                    KeyCode::Tab => {
                        if let Some(form) = self.state.form_mut() {
                            form.next_field();
                        }
                    }
                    KeyCode::BackTab => {
                        if let Some(form) = self.state.form_mut() {
                            form.previous_field();
                        }
                    }
                    KeyCode::Up | KeyCode::Down => self.cycle_form_type(),
                    KeyCode::Backspace => {
                        if self.state.form_mut().map(SnippetForm::pop_char) == Some(true) {
                            self.journal_form();
                        }
                    }
                    KeyCode::Char(ch)
                        if !key.modifiers.intersects(
                            KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER,
                        ) =>
                    {
                        if self.state.form_mut().map(|form| form.push_char(ch)) == Some(true) {
                            self.journal_form();
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::DeleteSnippet(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter => self.submit_delete(),
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    /// Re-reads the sheet; failures stay on the status line.
    fn refresh(&mut self) -> bool {
        match ActionDispatcher::new(&self.sheet).reload() {
            Ok(table) => {
                self.state.load(table);
                true
            }
            Err(err) => {
                tracing::error!(?err, "failed to reload reviews");
                self.state
                    .set_status_message(Some(format!("Reload failed: {err:#}")));
                false
            }
        }
    }

    fn handle_toggle(&mut self) {
        let (Some(entry), Some(schema)) = (
            self.state.selected_entry().cloned(),
            self.state.schema().cloned(),
        ) else {
            self.state.set_status_message(Some("No review selected"));
            return;
        };
        let completed = !entry.completed;
        match ActionDispatcher::new(&self.sheet).toggle(&schema, &entry, completed) {
            Ok(_) => {
                let state = if completed { "done" } else { "not done" };
                self.state
                    .set_status_message(Some(format!("Marked {} as {state}", entry.label)));
            }
            Err(err) => {
                tracing::error!(?err, "failed to toggle review");
                self.state
                    .set_status_message(Some(format!("Toggle failed: {err:#}")));
            }
        }
        self.refresh();
    }

    fn open_new_form(&mut self) {
        let restored = match self.journal.restore() {
            Ok(saved) => saved.map(|saved| saved.draft),
            Err(err) => {
                tracing::error!(?err, "failed to read snippet draft");
                None
            }
        };
        let resumed = restored.is_some();
        let draft = restored.unwrap_or_else(|| {
            SnippetDraft::new(
                self.config.schedule.default_type.clone(),
                self.state.cursor,
                self.config.schedule.offsets.clone(),
            )
        });
        self.state.open_form(SnippetForm::from_draft(&draft));
        let message = if resumed {
            "Resumed unsaved draft. Tab next field • Enter save • Esc discard"
        } else {
            "Tab next field • Enter save • Esc cancel"
        };
        self.state.set_status_message(Some(message));
    }

    fn journal_form(&self) {
        let Some(form) = self.state.form() else {
            return;
        };
        if !form.is_new() {
            return;
        }
        if let Err(err) = self.journal.save(&form.snapshot()) {
            tracing::error!(?err, "failed to journal snippet draft");
        }
    }

    fn cycle_form_type(&mut self) {
        let registry = self.config.schedule.registry();
        let Some(form) = self.state.form_mut() else {
            return;
        };
        if form.focus != FormField::SnippetType {
            return;
        }
        form.snippet_type = registry.next_after(&form.snippet_type).to_string();
        form.error = None;
        self.journal_form();
    }

    fn cancel_form(&mut self) {
        let was_new = self.state.form().map(SnippetForm::is_new).unwrap_or(false);
        self.state.close_overlay();
        if was_new {
            if let Err(err) = self.journal.discard() {
                tracing::error!(?err, "failed to discard snippet draft");
            }
            self.state.set_status_message(Some("Canceled new snippet"));
        } else {
            self.state.set_status_message(Some("Edit canceled"));
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.state.form().cloned() else {
            return;
        };
        let registry = self.config.schedule.registry();
        let Some(snippet_type) = registry.resolve(&form.snippet_type).map(str::to_string) else {
            let expected = registry.all().collect::<Vec<_>>().join(", ");
            self.set_form_error(format!("type must be one of: {expected}"));
            return;
        };
        let result = match &form.mode {
            FormMode::New => self.submit_new(&form, snippet_type),
            FormMode::Edit { snippet_id } => self.submit_edit(&form, snippet_id, snippet_type),
        };
        if let Err(message) = result {
            self.set_form_error(message);
        }
    }

    fn submit_new(&mut self, form: &SnippetForm, snippet_type: String) -> Result<(), String> {
        let mut draft = form.to_draft()?;
        draft.snippet_type = snippet_type;
        let outcome = ActionDispatcher::new(&self.sheet)
            .add(&draft)
            .map_err(|err| {
                tracing::error!(?err, "failed to add snippet");
                format!("{err:#}")
            })?;
        if let Err(err) = self.journal.discard() {
            tracing::error!(?err, "failed to discard snippet draft");
        }
        self.state.close_overlay();
        self.refresh();
        self.state
            .select_snippet(outcome.snippet.id.as_str(), outcome.snippet.date_created);
        self.state.set_status_message(Some(format!(
            "Added snippet {} with {} reviews",
            outcome.snippet.id,
            outcome.rows.len()
        )));
        Ok(())
    }

    fn submit_edit(
        &mut self,
        form: &SnippetForm,
        snippet_id: &str,
        snippet_type: String,
    ) -> Result<(), String> {
        let mut edit = form.to_edit()?;
        edit.snippet_type = snippet_type;
        let outcome = ActionDispatcher::new(&self.sheet)
            .edit(snippet_id, &edit)
            .map_err(|err| {
                tracing::error!(?err, "failed to edit snippet");
                format!("{err:#}")
            })?;
        self.state.close_overlay();
        self.refresh();
        let message = if outcome.plan.is_empty() {
            format!("Snippet {snippet_id} is unchanged")
        } else if outcome.snippet_id != outcome.previous_id {
            format!(
                "Updated snippet {snippet_id} (now {}, created {})",
                outcome.snippet_id,
                format_date(edit.date_created)
            )
        } else {
            format!("Updated snippet {snippet_id}")
        };
        self.state.set_status_message(Some(message));
        Ok(())
    }

    fn submit_delete(&mut self) {
        let Some(overlay) = self.state.delete_overlay().cloned() else {
            return;
        };
        self.state.close_overlay();
        match ActionDispatcher::new(&self.sheet).delete(&overlay.snippet_id) {
            Ok(outcome) => {
                self.state.set_status_message(Some(format!(
                    "Deleted snippet {} ({} reviews)",
                    overlay.snippet_id, outcome.removed
                )));
            }
            Err(err) => {
                tracing::error!(?err, "failed to delete snippet");
                self.state
                    .set_status_message(Some(format!("Delete failed: {err:#}")));
            }
        }
        self.refresh();
    }

    fn set_form_error(&mut self, message: String) {
        if let Some(form) = self.state.form_mut() {
            form.error = Some(message);
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("leaving alternate screen")?;
    terminal.show_cursor().context("showing cursor")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{self, SheetGateway};
    use tempfile::TempDir;
    use time::macros::date;

    fn setup_app() -> Result<(TempDir, App)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted(temp.path());
        paths.ensure_directories()?;
        let mut config = AppConfig::default();
        config.storage.database_path = paths.database_path.clone();
        let sheet = storage::init(&paths, &config.storage)?;
        let app = App::new(Arc::new(config), sheet, paths, date!(2024 - 01 - 01))?;
        Ok((temp, app))
    }

    fn reopen(temp: &TempDir) -> Result<App> {
        let paths = ConfigPaths::rooted(temp.path());
        let mut config = AppConfig::default();
        config.storage.database_path = paths.database_path.clone();
        let sheet = storage::init(&paths, &config.storage)?;
        App::new(Arc::new(config), sheet, paths, date!(2024 - 01 - 01))
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn add_toggle_and_delete_from_the_calendar() -> Result<()> {
        let (_temp, mut app) = setup_app()?;
        press(&mut app, KeyCode::Char('a'));
        assert!(app.state().form().is_some());
        type_text(&mut app, "carpe diem");
        assert!(app.journal.path().exists());
        press(&mut app, KeyCode::Enter);

        assert!(app.state().overlay().is_none());
        assert!(!app.journal.path().exists());
        assert_eq!(app.sheet.row_count()?, 6);
        assert_eq!(app.state().cursor, date!(2024 - 01 - 02));
        let entry = app.state().selected_entry().cloned().expect("new review selected");
        assert_eq!(entry.snippet_id, "20240101-01");
        assert!(!entry.completed);

        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.sheet.bulk_read()?[1][5], "TRUE");
        assert!(app.state().selected_entry().map(|e| e.completed).unwrap_or(false));

        press(&mut app, KeyCode::Char('d'));
        assert!(app.state().delete_overlay().is_some());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.sheet.row_count()?, 1);
        assert_eq!(
            app.state().status_message(),
            Some("Deleted snippet 20240101-01 (5 reviews)")
        );
        Ok(())
    }

    #[test]
    fn unfinished_drafts_are_restored_in_the_next_session() -> Result<()> {
        let (temp, mut app) = setup_app()?;
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "half a thought");
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        drop(app);

        let mut app = reopen(&temp)?;
        assert!(app
            .state()
            .status_message()
            .unwrap_or_default()
            .starts_with("Unsaved snippet draft"));
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(
            app.state().form().map(|form| form.content.as_str()),
            Some("half a thoughtq")
        );

        press(&mut app, KeyCode::Esc);
        assert!(!app.journal.path().exists());
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
        Ok(())
    }

    #[test]
    fn arrow_keys_cycle_the_snippet_type() -> Result<()> {
        let (_temp, mut app) = setup_app()?;
        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Down);
        assert_eq!(app.state().form().map(|f| f.snippet_type.as_str()), Some("note"));

        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.state().form().map(|f| f.snippet_type.as_str()), Some("quote"));
        Ok(())
    }

    #[test]
    fn failed_submit_keeps_the_form_and_its_text() -> Result<()> {
        let (_temp, mut app) = setup_app()?;
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "unscheduled");
        press(&mut app, KeyCode::Tab);
        for _ in 0.."1,3,7,14,30".len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, "soon");
        press(&mut app, KeyCode::Enter);

        let form = app.state().form().expect("form stays open");
        assert_eq!(form.content, "unscheduled");
        assert!(form
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("no usable review offsets"));
        assert_eq!(app.sheet.row_count()?, 1);
        Ok(())
    }

    #[test]
    fn edit_form_moves_the_snippet() -> Result<()> {
        let (_temp, mut app) = setup_app()?;
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "move me");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::BackTab);
        for _ in 0.."2024-01-01".len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, "2024-01-03");
        press(&mut app, KeyCode::Enter);

        assert!(app.state().overlay().is_none());
        let rows = app.sheet.bulk_read()?;
        assert_eq!(rows[1][2], "20240103-01");
        assert_eq!(rows[1][4], "2024-01-04");
        Ok(())
    }
}
