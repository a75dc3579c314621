//! Main application logic and TUI event loop.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    Frame, Terminal,
};

use crate::analytics::{
    filter_by_gpa, Analytics, CohortMetrics, CourseStatistics, OverallSummary, StudentStanding,
    ThresholdDirection, HONOR_GPA, PASSING_GPA,
};
use crate::cli::AppConfig;
use crate::data::{
    Course, CourseFilter, CourseId, CourseSort, DeletePolicy, GradeFilter, GradeId, GradeRecord,
    GradeSort, Letter, SeedOutcome, Storage, StudentFilter, StudentId, StudentSort,
};
use crate::error::Result as StoreResult;
use crate::ui::{
    chart::{DistributionChart, StandingChart},
    form::{ConfirmDialog, FormAction, FormPopup, FormState, Submission},
    widgets::{
        CourseStatsPanel, CourseTable, GradeTable, Notice, SetupPanel, StatusBar,
        StudentShortList, StudentTable, SummaryPanel, TabBar,
    },
    HelpOverlay, Theme,
};

/// Input poll timeout; data is only re-read after a change or on `r`
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Top-level screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Students,
    Courses,
    Grades,
    Analytics,
    Setup,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Dashboard,
        Tab::Students,
        Tab::Courses,
        Tab::Grades,
        Tab::Analytics,
        Tab::Setup,
    ];

    pub const TITLES: [&'static str; 6] = [
        "Dashboard",
        "Students",
        "Courses",
        "Grades",
        "Analytics",
        "Setup",
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn searchable(self) -> bool {
        matches!(self, Tab::Students | Tab::Courses | Tab::Grades)
    }

    fn hint(self) -> &'static str {
        match self {
            Tab::Dashboard => "[Tab] Switch view",
            Tab::Students => "[a] Add [e] Edit [d] Delete [g] Grade [o] Sort [/] Search",
            Tab::Courses => "[a] Add [e] Edit [d] Delete [o] Sort [/] Search",
            Tab::Grades => "[a] Assign [e] Edit [d] Delete [L] Latest/History [o] Sort [/] Search",
            Tab::Analytics => "[j/k] Course [g] Grade",
            Tab::Setup => "[i] Create tables [s] Sample data [R] Reset",
        }
    }
}

/// Destructive action waiting for a yes/no answer
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    DeleteStudent { id: StudentId, name: String },
    DeleteCourse { id: CourseId, code: String },
    DeleteGrade(GradeId),
    ResetDatabase,
}

impl PendingAction {
    fn prompt(&self, policy: DeletePolicy) -> String {
        let grades = match policy {
            DeletePolicy::Cascade => "Their grades are deleted too.",
            DeletePolicy::Restrict => "Refused while grades exist.",
        };
        match self {
            PendingAction::DeleteStudent { name, .. } => {
                format!("Delete student {name}? {grades}")
            }
            PendingAction::DeleteCourse { code, .. } => format!("Delete course {code}? {grades}"),
            PendingAction::DeleteGrade(id) => format!("Delete grade #{id}?"),
            PendingAction::ResetDatabase => {
                "Drop every table and all data, then recreate an empty schema?".to_string()
            }
        }
    }
}

/// What keystrokes currently drive
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Browse,
    Search,
    Form(FormState),
    Confirm(PendingAction),
}

/// Main application state
pub struct App {
    config: AppConfig,
    theme: Theme,
    storage: Storage,
    schema_ready: bool,

    /// Every student with GPA, unfiltered
    report: Vec<StudentStanding>,
    /// Students matching the current search
    students: Vec<StudentStanding>,
    courses: Vec<Course>,
    grades: Vec<GradeRecord>,
    summary: Option<OverallSummary>,
    cohort: Option<CohortMetrics>,
    course_stats: Vec<CourseStatistics>,

    tab: Tab,
    mode: Mode,
    search: String,
    latest_only: bool,
    student_sort: StudentSort,
    course_sort: CourseSort,
    grade_sort: GradeSort,
    selected_student: usize,
    selected_course: usize,
    selected_grade: usize,
    selected_stats: usize,

    show_help: bool,
    should_quit: bool,
    notice: Option<Notice>,
}

fn move_selection(selected: &mut usize, len: usize, key: KeyCode) {
    if len == 0 {
        return;
    }
    match key {
        KeyCode::Down | KeyCode::Char('j') => *selected = (*selected + 1) % len,
        KeyCode::Up | KeyCode::Char('k') => *selected = (*selected + len - 1) % len,
        KeyCode::Home => *selected = 0,
        KeyCode::End => *selected = len - 1,
        _ => {}
    }
}

fn clamp(selected: &mut usize, len: usize) {
    if *selected >= len {
        *selected = len.saturating_sub(1);
    }
}

impl App {
    /// Create a new App instance
    pub fn new(config: AppConfig, storage: Storage) -> Result<Self> {
        let mut app = App {
            config,
            theme: Theme::default(),
            storage,
            schema_ready: false,
            report: Vec::new(),
            students: Vec::new(),
            courses: Vec::new(),
            grades: Vec::new(),
            summary: None,
            cohort: None,
            course_stats: Vec::new(),
            tab: Tab::Dashboard,
            mode: Mode::Browse,
            search: String::new(),
            latest_only: true,
            student_sort: StudentSort::default(),
            course_sort: CourseSort::default(),
            grade_sort: GradeSort::default(),
            selected_student: 0,
            selected_course: 0,
            selected_grade: 0,
            selected_stats: 0,
            show_help: false,
            should_quit: false,
            notice: None,
        };

        app.refresh().context("Failed to load data")?;
        if !app.schema_ready {
            app.tab = Tab::Setup;
            app.notice = Some(Notice::Error(
                "Database schema is missing. Press i to create it.".to_string(),
            ));
        }

        Ok(app)
    }

    /// Search text applied to `tab`, if any
    fn query_for(&self, tab: Tab) -> Option<String> {
        let query = self.search.trim();
        (self.tab == tab && !query.is_empty()).then(|| query.to_string())
    }

    /// Re-read everything from the database
    fn refresh(&mut self) -> StoreResult<()> {
        self.schema_ready = self.storage.schema_exists()?;
        if !self.schema_ready {
            self.report.clear();
            self.students.clear();
            self.courses.clear();
            self.grades.clear();
            self.summary = None;
            self.cohort = None;
            self.course_stats.clear();
            return Ok(());
        }

        let student_query = self.query_for(Tab::Students);
        let course_query = self.query_for(Tab::Courses);
        let grade_query = self.query_for(Tab::Grades);

        let analytics = Analytics::new(&self.storage);
        let report = analytics.student_report()?;

        // Search and order come from the repository, GPA columns from the report
        let by_id: HashMap<StudentId, &StudentStanding> =
            report.iter().map(|row| (row.student.id, row)).collect();
        self.students = self
            .storage
            .list_students(&StudentFilter {
                search: student_query,
                sort: self.student_sort,
            })?
            .iter()
            .filter_map(|s| by_id.get(&s.id).map(|row| (*row).clone()))
            .collect();
        self.courses = self.storage.list_courses(&CourseFilter {
            search: course_query,
            sort: self.course_sort,
        })?;
        self.grades = self.storage.list_grades(&GradeFilter {
            search: grade_query,
            latest_only: self.latest_only,
            sort: self.grade_sort,
            ..Default::default()
        })?;
        self.summary = Some(analytics.overall_summary()?);
        self.cohort = Some(CohortMetrics::from_standings(&report));
        self.course_stats = analytics.all_course_statistics()?;
        self.report = report;

        clamp(&mut self.selected_student, self.students.len());
        clamp(&mut self.selected_course, self.courses.len());
        clamp(&mut self.selected_grade, self.grades.len());
        clamp(&mut self.selected_stats, self.course_stats.len());
        Ok(())
    }

    /// Set an error message to display (non-fatal)
    pub fn set_error(&mut self, message: String) {
        self.notice = Some(Notice::Error(message));
    }

    fn report_outcome(&mut self, outcome: StoreResult<String>) {
        match outcome {
            Ok(message) => self.notice = Some(Notice::Info(message)),
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(error = %e, "database unavailable");
                } else {
                    tracing::warn!(error = %e, "action failed");
                }
                self.set_error(e.to_string());
            }
        }
    }

    /// Data entry is refused until the tables exist
    fn require_schema(&mut self) -> bool {
        if !self.schema_ready {
            self.set_error("Database schema is missing. Open Setup (6) and press i.".to_string());
        }
        self.schema_ready
    }

    fn switch_tab(&mut self, tab: Tab) -> Result<()> {
        if tab == self.tab {
            return Ok(());
        }
        let had_query = !self.search.is_empty();
        self.tab = tab;
        self.search.clear();
        if had_query {
            self.refresh()?;
        }
        Ok(())
    }

    fn open_form(&mut self, form: FormState) {
        if self.require_schema() {
            self.mode = Mode::Form(form);
        }
    }

    fn confirm(&mut self, action: PendingAction) {
        self.mode = Mode::Confirm(action);
    }

    /// Handle keyboard input
    pub fn handle_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if modifiers.contains(KeyModifiers::CONTROL) && key == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }

        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Form(form) => return self.handle_form_key(form, key),
            Mode::Confirm(action) => return self.handle_confirm_key(action, key),
            Mode::Search => return self.handle_search_key(key),
            Mode::Browse => {}
        }

        // Global shortcuts
        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return Ok(());
            }
            KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return Ok(());
            }
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return Ok(());
            }
            KeyCode::Char('r') => {
                self.refresh()?;
                self.notice = Some(Notice::Info("Refreshed".to_string()));
                return Ok(());
            }
            KeyCode::Tab => return self.switch_tab(self.tab.next()),
            KeyCode::BackTab => return self.switch_tab(self.tab.prev()),
            KeyCode::Char(c @ '1'..='6') => {
                let index = c as usize - '1' as usize;
                return self.switch_tab(Tab::ALL[index]);
            }
            _ => {}
        }

        // If help is shown, don't process other keys
        if self.show_help {
            return Ok(());
        }

        if key == KeyCode::Char('/') && self.tab.searchable() {
            if self.require_schema() {
                self.mode = Mode::Search;
            }
            return Ok(());
        }
        if key == KeyCode::Esc {
            self.notice = None;
            return Ok(());
        }

        match self.tab {
            Tab::Dashboard => Ok(()),
            Tab::Students => self.handle_students_key(key),
            Tab::Courses => self.handle_courses_key(key),
            Tab::Grades => self.handle_grades_key(key),
            Tab::Analytics => self.handle_analytics_key(key),
            Tab::Setup => self.handle_setup_key(key),
        }
    }

    fn handle_students_key(&mut self, key: KeyCode) -> Result<()> {
        let selected = self.students.get(self.selected_student).map(|r| r.student.clone());
        match key {
            KeyCode::Char('a') => self.open_form(FormState::add_student()),
            KeyCode::Char('e') => {
                if let Some(student) = selected {
                    self.open_form(FormState::edit_student(&student));
                }
            }
            KeyCode::Char('g') => {
                if let Some(student) = selected {
                    self.open_form(FormState::assign_grade(Some(student.id), None));
                }
            }
            KeyCode::Char('d') => {
                if let Some(student) = selected {
                    self.confirm(PendingAction::DeleteStudent {
                        id: student.id,
                        name: student.name,
                    });
                }
            }
            KeyCode::Char('o') => {
                self.student_sort = self.student_sort.next();
                self.refresh()?;
                self.notice = Some(Notice::Info(format!(
                    "Students sorted by {}",
                    self.student_sort.label()
                )));
            }
            _ => move_selection(&mut self.selected_student, self.students.len(), key),
        }
        Ok(())
    }

    fn handle_courses_key(&mut self, key: KeyCode) -> Result<()> {
        let selected = self.courses.get(self.selected_course).cloned();
        match key {
            KeyCode::Char('a') => self.open_form(FormState::add_course()),
            KeyCode::Char('e') => {
                if let Some(course) = selected {
                    self.open_form(FormState::edit_course(&course));
                }
            }
            KeyCode::Char('d') => {
                if let Some(course) = selected {
                    self.confirm(PendingAction::DeleteCourse {
                        id: course.id,
                        code: course.code,
                    });
                }
            }
            KeyCode::Char('o') => {
                self.course_sort = self.course_sort.next();
                self.refresh()?;
                self.notice = Some(Notice::Info(format!(
                    "Courses sorted by {}",
                    self.course_sort.label()
                )));
            }
            _ => move_selection(&mut self.selected_course, self.courses.len(), key),
        }
        Ok(())
    }

    fn handle_grades_key(&mut self, key: KeyCode) -> Result<()> {
        let selected = self.grades.get(self.selected_grade).cloned();
        match key {
            KeyCode::Char('a') => self.open_form(FormState::assign_grade(None, None)),
            KeyCode::Char('e') => {
                if let Some(record) = selected {
                    self.open_form(FormState::edit_grade(&record));
                }
            }
            KeyCode::Char('d') => {
                if let Some(record) = selected {
                    self.confirm(PendingAction::DeleteGrade(record.grade.id));
                }
            }
            KeyCode::Char('L') => {
                self.latest_only = !self.latest_only;
                self.refresh()?;
            }
            KeyCode::Char('o') => {
                self.grade_sort = self.grade_sort.next();
                self.refresh()?;
                self.notice = Some(Notice::Info(format!(
                    "Grades sorted by {}",
                    self.grade_sort.label()
                )));
            }
            _ => move_selection(&mut self.selected_grade, self.grades.len(), key),
        }
        Ok(())
    }

    fn handle_analytics_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Char('g') => {
                if let Some(stats) = self.course_stats.get(self.selected_stats) {
                    let course = stats.course.id;
                    self.open_form(FormState::assign_grade(None, Some(course)));
                }
            }
            _ => move_selection(&mut self.selected_stats, self.course_stats.len(), key),
        }
        Ok(())
    }

    fn handle_setup_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Char('i') => {
                let outcome = self
                    .storage
                    .ensure_schema()
                    .map(|()| "Schema ready".to_string());
                self.report_outcome(outcome);
                self.refresh()?;
            }
            KeyCode::Char('s') => {
                let outcome = self.seed();
                self.report_outcome(outcome);
                self.refresh()?;
            }
            KeyCode::Char('R') => self.confirm(PendingAction::ResetDatabase),
            _ => {}
        }
        Ok(())
    }

    fn seed(&self) -> StoreResult<String> {
        self.storage.ensure_schema()?;
        Ok(match self.storage.seed_sample_data()? {
            SeedOutcome::Seeded {
                students,
                courses,
                grades,
            } => format!("Loaded {students} students, {courses} courses and {grades} grades"),
            SeedOutcome::Skipped => {
                "Database already holds data; sample data not loaded".to_string()
            }
        })
    }

    fn handle_form_key(&mut self, mut form: FormState, key: KeyCode) -> Result<()> {
        match form.handle_key(key) {
            FormAction::None => self.mode = Mode::Form(form),
            FormAction::Cancel => {}
            FormAction::Submit => match form.submission().and_then(|s| self.apply(s)) {
                Ok(message) => {
                    self.notice = Some(Notice::Info(message));
                    self.refresh()?;
                }
                Err(e) => {
                    tracing::debug!(error = %e, kind = ?form.kind, "form rejected");
                    form.error = Some(e.to_string());
                    self.mode = Mode::Form(form);
                }
            },
        }
        Ok(())
    }

    /// Write a submitted form to the database
    fn apply(&self, submission: Submission) -> StoreResult<String> {
        match submission {
            Submission::CreateStudent(input) => {
                let id = self.storage.create_student(&input)?;
                Ok(format!("Added student #{id} {}", input.name))
            }
            Submission::UpdateStudent(id, input) => {
                let student = self.storage.update_student(id, &input)?;
                Ok(format!("Updated student #{} {}", student.id, student.name))
            }
            Submission::CreateCourse(input) => {
                let id = self.storage.create_course(&input)?;
                Ok(format!("Added course #{id} {}", input.code))
            }
            Submission::UpdateCourse(id, input) => {
                let course = self.storage.update_course(id, &input)?;
                Ok(format!("Updated course #{} {}", course.id, course.code))
            }
            Submission::CreateGrade(input) => {
                let id = self.storage.create_grade(&input)?;
                Ok(format!(
                    "Recorded grade #{id}: {:.1} ({})",
                    input.score,
                    Letter::from_score(input.score)
                ))
            }
            Submission::UpdateGrade(id, update) => {
                let grade = self.storage.update_grade(id, &update)?;
                Ok(format!(
                    "Updated grade #{}: {:.1} ({})",
                    grade.id,
                    grade.score,
                    grade.letter()
                ))
            }
        }
    }

    fn handle_confirm_key(&mut self, action: PendingAction, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let outcome = self.execute(&action);
                self.report_outcome(outcome);
                self.refresh()?;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.notice = Some(Notice::Info("Cancelled".to_string()));
            }
            _ => self.mode = Mode::Confirm(action),
        }
        Ok(())
    }

    fn execute(&self, action: &PendingAction) -> StoreResult<String> {
        match action {
            PendingAction::DeleteStudent { id, name } => {
                let removed = self.storage.delete_student(*id)?;
                Ok(format!("Deleted student {name} and {removed} grade(s)"))
            }
            PendingAction::DeleteCourse { id, code } => {
                let removed = self.storage.delete_course(*id)?;
                Ok(format!("Deleted course {code} and {removed} grade(s)"))
            }
            PendingAction::DeleteGrade(id) => {
                self.storage.delete_grade(*id)?;
                Ok(format!("Deleted grade #{id}"))
            }
            PendingAction::ResetDatabase => {
                self.storage.reset_schema()?;
                Ok("Database reset; all tables are empty".to_string())
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyCode) -> Result<()> {
        match key {
            KeyCode::Enter => return Ok(()),
            KeyCode::Esc => self.search.clear(),
            KeyCode::Backspace => {
                self.search.pop();
                self.mode = Mode::Search;
            }
            KeyCode::Char(c) => {
                self.search.push(c);
                self.mode = Mode::Search;
            }
            _ => {
                self.mode = Mode::Search;
                return Ok(());
            }
        }
        match self.tab {
            Tab::Students => self.selected_student = 0,
            Tab::Courses => self.selected_course = 0,
            Tab::Grades => self.selected_grade = 0,
            _ => {}
        }
        self.refresh()?;
        Ok(())
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let size = frame.area();

        // Main layout: tabs, body, footer
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Tabs
                Constraint::Min(5),    // Body
                Constraint::Length(2), // Status bar
            ])
            .split(size);

        TabBar::new(&Tab::TITLES, self.tab.index(), &self.theme).render(frame, main_chunks[0]);

        let body = main_chunks[1];
        let focused = matches!(self.mode, Mode::Browse | Mode::Search);
        match self.tab {
            Tab::Dashboard => self.render_dashboard(frame, body),
            Tab::Students => {
                StudentTable::new(&self.students, self.selected_student, &self.theme)
                    .render(frame, body, focused)
            }
            Tab::Courses => CourseTable::new(&self.courses, self.selected_course, &self.theme)
                .render(frame, body, focused),
            Tab::Grades => GradeTable::new(
                &self.grades,
                self.selected_grade,
                self.latest_only,
                &self.theme,
            )
            .render(frame, body, focused),
            Tab::Analytics => self.render_analytics(frame, body, focused),
            Tab::Setup => {
                let location = self
                    .storage
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "in memory".to_string());
                SetupPanel::new(
                    &self.config.db.label(),
                    &location,
                    self.schema_ready,
                    self.storage.delete_policy(),
                    &self.theme,
                )
                .render(frame, body);
            }
        }

        // Render status bar
        let context = format!("{} | {}", self.config.db.label(), self.tab.hint());
        let search = matches!(self.mode, Mode::Search).then_some(self.search.as_str());
        StatusBar::new(&context, search, self.notice.as_ref(), &self.theme)
            .render(frame, main_chunks[2]);

        match &self.mode {
            Mode::Form(form) => FormPopup::new(form, &self.theme).render(frame, size),
            Mode::Confirm(action) => {
                let prompt = action.prompt(self.storage.delete_policy());
                ConfirmDialog::new(&prompt, &self.theme).render(frame, size);
            }
            Mode::Browse | Mode::Search => {}
        }

        // Render help overlay if active
        if self.show_help {
            let help = HelpOverlay::new(&self.theme);
            help.render(frame, size);
        }
    }

    fn render_dashboard(&self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[0]);
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        SummaryPanel::new(self.summary.as_ref(), self.cohort.as_ref(), &self.theme)
            .render(frame, top[0]);
        let cohort = self.cohort.clone().unwrap_or_else(|| CohortMetrics::from_standings(&[]));
        StandingChart::new(&cohort, &self.theme).render(frame, top[1]);

        let at_risk = filter_by_gpa(&self.report, PASSING_GPA, ThresholdDirection::Below);
        let honors = filter_by_gpa(&self.report, HONOR_GPA, ThresholdDirection::AtOrAbove);
        StudentShortList::new("Needs attention", &at_risk, &self.theme).render(frame, bottom[0]);
        StudentShortList::new("Honor roll", &honors, &self.theme).render(frame, bottom[1]);
    }

    fn render_analytics(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);
        let detail = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(columns[1]);

        let courses: Vec<Course> = self.course_stats.iter().map(|s| s.course.clone()).collect();
        CourseTable::new(&courses, self.selected_stats, &self.theme).render(
            frame,
            columns[0],
            focused,
        );

        let stats = self.course_stats.get(self.selected_stats);
        CourseStatsPanel::new(stats, &self.theme).render(frame, detail[0]);
        if let Some(stats) = stats {
            DistributionChart::new(&stats.distribution, "Grade Distribution", &self.theme)
                .render(frame, detail[1]);
        }
    }
}

/// Restore terminal to normal state
fn restore_terminal() {
    // Best effort cleanup - ignore errors since we may be in a panic
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Run the TUI application
pub fn run(config: AppConfig, storage: Storage) -> Result<()> {
    // Create app before touching the terminal so load errors print normally
    let mut app = App::new(config, storage).context("Failed to initialize application")?;

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        restore_terminal();
        return Err(e).context("Failed to setup terminal");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(t) => t,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to create terminal");
        }
    };

    tracing::info!(database = %app.config.db.label(), "dashboard started");
    let result = run_main_loop(&mut terminal, &mut app);

    // Always restore terminal, regardless of result
    restore_terminal();
    terminal.show_cursor().ok();

    result
}

/// Main application loop
fn run_main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Render - if this fails, we should exit
        terminal.draw(|f| app.render(f))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Err(e) = app.handle_input(key.code, key.modifiers) {
                        tracing::error!(error = %e, "input handling failed");
                        app.set_error(format!("Input error: {e}"));
                    }
                }
            }
        }

        if app.should_quit {
            tracing::info!("dashboard closed");
            return Ok(());
        }
    }
}
