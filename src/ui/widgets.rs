//! UI widgets for the gradebook dashboard.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Frame,
};

use super::theme::Theme;
use crate::analytics::{CohortMetrics, CourseStatistics, OverallSummary, StudentStanding};
use crate::data::{Course, DeletePolicy, GradeRecord};

/// Transient message shown in the status bar
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(text) | Notice::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

fn panel<'a>(title: String, focused: bool, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .title_style(theme.title_style())
        .borders(Borders::ALL)
        .border_type(if focused {
            BorderType::Double
        } else {
            BorderType::Plain
        })
        .border_style(theme.panel_border(focused))
}

fn render_table(
    frame: &mut Frame,
    area: Rect,
    table: Table,
    selected: usize,
    len: usize,
) {
    let mut state = TableState::default();
    if len > 0 {
        state.select(Some(selected.min(len - 1)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn format_mean(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

/// Tab strip across the top of the screen
pub struct TabBar<'a> {
    titles: &'a [&'a str],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> TabBar<'a> {
    pub fn new(titles: &'a [&'a str], selected: usize, theme: &'a Theme) -> Self {
        TabBar {
            titles,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = self
            .titles
            .iter()
            .enumerate()
            .map(|(i, t)| Line::from(format!("{} {t}", i + 1)))
            .collect();

        let tabs = Tabs::new(titles)
            .select(self.selected)
            .block(
                Block::default()
                    .title(" gradebook ")
                    .title_style(self.theme.title_style())
                    .borders(Borders::BOTTOM)
                    .border_style(self.theme.border_style()),
            )
            .style(self.theme.normal_style())
            .highlight_style(self.theme.highlight_style())
            .divider("|");

        frame.render_widget(tabs, area);
    }
}

/// Student list with GPA and standing
pub struct StudentTable<'a> {
    rows: &'a [StudentStanding],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> StudentTable<'a> {
    pub fn new(rows: &'a [StudentStanding], selected: usize, theme: &'a Theme) -> Self {
        StudentTable {
            rows,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let header = Row::new(["ID", "Name", "Email", "GPA", "Credits", "Standing"])
            .style(self.theme.header_style());

        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| {
                let (gpa, credits) = match &row.gpa {
                    Some(g) => (format!("{:.2}", g.gpa), g.credits.to_string()),
                    None => ("-".to_string(), "0".to_string()),
                };
                let standing = match row.standing {
                    Some(s) => Cell::from(s.short_label()).style(self.theme.standing_style(s)),
                    None => Cell::from("No grades").style(self.theme.dimmed_style()),
                };
                let name = if row.failing {
                    Cell::from(Line::from(vec![
                        Span::raw(row.student.name.clone()),
                        Span::styled(" !", self.theme.error_style()),
                    ]))
                } else {
                    Cell::from(row.student.name.clone())
                };
                Row::new(vec![
                    Cell::from(row.student.id.to_string()),
                    name,
                    Cell::from(row.student.email.clone()),
                    Cell::from(gpa),
                    Cell::from(credits),
                    standing,
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(5),
                Constraint::Percentage(28),
                Constraint::Percentage(36),
                Constraint::Length(6),
                Constraint::Length(8),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .block(panel(
            format!(" Students ({}) ", self.rows.len()),
            focused,
            self.theme,
        ))
        .row_highlight_style(self.theme.highlight_style())
        .highlight_symbol("> ");

        render_table(frame, area, table, self.selected, self.rows.len());
    }
}

/// Course catalog table
pub struct CourseTable<'a> {
    courses: &'a [Course],
    selected: usize,
    theme: &'a Theme,
}

impl<'a> CourseTable<'a> {
    pub fn new(courses: &'a [Course], selected: usize, theme: &'a Theme) -> Self {
        CourseTable {
            courses,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let header = Row::new(["ID", "Code", "Name", "Credits"]).style(self.theme.header_style());

        let rows: Vec<Row> = self
            .courses
            .iter()
            .map(|c| {
                Row::new(vec![
                    c.id.to_string(),
                    c.code.clone(),
                    c.name.clone(),
                    c.credits.to_string(),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(5),
                Constraint::Length(12),
                Constraint::Min(20),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(panel(
            format!(" Courses ({}) ", self.courses.len()),
            focused,
            self.theme,
        ))
        .row_highlight_style(self.theme.highlight_style())
        .highlight_symbol("> ");

        render_table(frame, area, table, self.selected, self.courses.len());
    }
}

/// Grade records joined with student and course names
pub struct GradeTable<'a> {
    records: &'a [GradeRecord],
    selected: usize,
    latest_only: bool,
    theme: &'a Theme,
}

impl<'a> GradeTable<'a> {
    pub fn new(
        records: &'a [GradeRecord],
        selected: usize,
        latest_only: bool,
        theme: &'a Theme,
    ) -> Self {
        GradeTable {
            records,
            selected,
            latest_only,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let header = Row::new(["ID", "Student", "Course", "Score", "Grade", "Recorded"])
            .style(self.theme.header_style());

        let rows: Vec<Row> = self
            .records
            .iter()
            .map(|r| {
                let letter = r.grade.letter();
                Row::new(vec![
                    Cell::from(r.grade.id.to_string()),
                    Cell::from(r.student_name.clone()),
                    Cell::from(r.course_code.clone()),
                    Cell::from(format!("{:.1}", r.grade.score)),
                    Cell::from(letter.as_str())
                        .style(Style::default().fg(self.theme.letter_color(letter))),
                    Cell::from(r.grade.recorded_at.format("%Y-%m-%d %H:%M").to_string()),
                ])
            })
            .collect();

        let view = if self.latest_only { "latest" } else { "history" };
        let table = Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Percentage(30),
                Constraint::Length(12),
                Constraint::Length(7),
                Constraint::Length(6),
                Constraint::Length(17),
            ],
        )
        .header(header)
        .block(panel(
            format!(" Grades: {view} ({}) ", self.records.len()),
            focused,
            self.theme,
        ))
        .row_highlight_style(self.theme.highlight_style())
        .highlight_symbol("> ");

        render_table(frame, area, table, self.selected, self.records.len());
    }
}

/// Headline numbers for the dashboard
pub struct SummaryPanel<'a> {
    summary: Option<&'a OverallSummary>,
    cohort: Option<&'a CohortMetrics>,
    theme: &'a Theme,
}

impl<'a> SummaryPanel<'a> {
    pub fn new(
        summary: Option<&'a OverallSummary>,
        cohort: Option<&'a CohortMetrics>,
        theme: &'a Theme,
    ) -> Self {
        SummaryPanel {
            summary,
            cohort,
            theme,
        }
    }

    fn line(&self, label: &str, value: String) -> Line<'static> {
        Line::from(vec![
            Span::styled(format!("  {label:<18}"), self.theme.dimmed_style()),
            Span::styled(value, self.theme.normal_style().add_modifier(Modifier::BOLD)),
        ])
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![Line::from("")];
        match self.summary {
            Some(s) => {
                lines.push(self.line("Students", s.student_count.to_string()));
                lines.push(self.line("Courses", s.course_count.to_string()));
                lines.push(self.line("Grades", s.grade_count.to_string()));
                lines.push(self.line("Recorded (all)", s.recorded_grade_count.to_string()));
                lines.push(self.line("Average score", format_mean(s.overall_mean)));
            }
            None => lines.push(Line::styled("  No data", self.theme.dimmed_style())),
        }
        if let Some(c) = self.cohort {
            lines.push(Line::from(""));
            lines.push(self.line("Average GPA", format_mean(c.average_gpa)));
            lines.push(self.line("Pass rate", format!("{:.1}%", c.pass_rate)));
            lines.push(self.line("Honor rate", format!("{:.1}%", c.honor_rate)));
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<18}", "At risk"), self.theme.dimmed_style()),
                Span::styled(c.at_risk.to_string(), self.theme.error_style()),
            ]));
        }

        let paragraph = Paragraph::new(lines).block(panel(" Overview ".to_string(), false, self.theme));
        frame.render_widget(paragraph, area);
    }
}

/// Short ranked list of students, e.g. the honor roll
pub struct StudentShortList<'a> {
    title: &'a str,
    rows: &'a [&'a StudentStanding],
    theme: &'a Theme,
}

impl<'a> StudentShortList<'a> {
    pub fn new(title: &'a str, rows: &'a [&'a StudentStanding], theme: &'a Theme) -> Self {
        StudentShortList { title, rows, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = if self.rows.is_empty() {
            vec![Line::styled("  None", self.theme.dimmed_style())]
        } else {
            self.rows
                .iter()
                .map(|row| {
                    let style = row
                        .standing
                        .map_or(self.theme.normal_style(), |s| self.theme.standing_style(s));
                    Line::from(vec![
                        Span::styled(format!("  {:>5}  ", format_mean(row.gpa_value())), style),
                        Span::raw(row.student.name.clone()),
                    ])
                })
                .collect()
        };

        let paragraph = Paragraph::new(lines)
            .block(panel(format!(" {} ({}) ", self.title, self.rows.len()), false, self.theme));
        frame.render_widget(paragraph, area);
    }
}

/// Numbers for the selected course
pub struct CourseStatsPanel<'a> {
    stats: Option<&'a CourseStatistics>,
    theme: &'a Theme,
}

impl<'a> CourseStatsPanel<'a> {
    pub fn new(stats: Option<&'a CourseStatistics>, theme: &'a Theme) -> Self {
        CourseStatsPanel { stats, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let Some(stats) = self.stats else {
            let paragraph = Paragraph::new("Select a course")
                .style(self.theme.dimmed_style())
                .block(panel(" Course ".to_string(), false, self.theme));
            frame.render_widget(paragraph, area);
            return;
        };

        let range = match (stats.min, stats.max) {
            (Some(min), Some(max)) => format!("{min:.1} - {max:.1}"),
            _ => "-".to_string(),
        };
        let mean = match (stats.mean, stats.mean_letter()) {
            (Some(mean), Some(letter)) => format!("{mean:.2} ({letter})"),
            _ => "No grades".to_string(),
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Students graded: ", self.theme.dimmed_style()),
                Span::raw(stats.count.to_string()),
            ]),
            Line::from(vec![
                Span::styled("Mean: ", self.theme.dimmed_style()),
                Span::raw(mean),
            ]),
            Line::from(vec![
                Span::styled("Range: ", self.theme.dimmed_style()),
                Span::raw(range),
            ]),
            Line::from(""),
            Line::styled("Top students", self.theme.header_style()),
        ];
        for (rank, top) in stats.top_students.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::raw(format!("{}. {} ", rank + 1, top.name)),
                Span::styled(
                    format!("{:.1} {}", top.score, top.letter),
                    Style::default().fg(self.theme.letter_color(top.letter)),
                ),
            ]));
        }

        let title = format!(
            " {} {} ({} cr) ",
            stats.course.code, stats.course.name, stats.course.credits
        );
        let paragraph = Paragraph::new(lines)
            .block(panel(title, false, self.theme))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

/// Connection and schema status on the Setup tab
pub struct SetupPanel<'a> {
    connection: &'a str,
    location: &'a str,
    schema_ready: bool,
    delete_policy: DeletePolicy,
    theme: &'a Theme,
}

impl<'a> SetupPanel<'a> {
    pub fn new(
        connection: &'a str,
        location: &'a str,
        schema_ready: bool,
        delete_policy: DeletePolicy,
        theme: &'a Theme,
    ) -> Self {
        SetupPanel {
            connection,
            location,
            schema_ready,
            delete_policy,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let schema = if self.schema_ready {
            Span::styled("ready", self.theme.info_style())
        } else {
            Span::styled("missing (press i to create)", self.theme.error_style())
        };
        let policy = match self.delete_policy {
            DeletePolicy::Cascade => "cascade (grades removed with their owner)",
            DeletePolicy::Restrict => "restrict (refuse while grades exist)",
        };

        let lines = vec![
            Line::from(""),
            Line::from(vec![
                Span::styled("  Connection  ", self.theme.dimmed_style()),
                Span::raw(self.connection.to_string()),
            ]),
            Line::from(vec![
                Span::styled("  Database    ", self.theme.dimmed_style()),
                Span::raw(self.location.to_string()),
            ]),
            Line::from(vec![Span::styled("  Schema      ", self.theme.dimmed_style()), schema]),
            Line::from(vec![
                Span::styled("  On delete   ", self.theme.dimmed_style()),
                Span::raw(policy),
            ]),
            Line::from(""),
            Line::styled("  [i] Create tables   [s] Load sample data   [R] Reset", self.theme.title_style()),
        ];

        let paragraph = Paragraph::new(lines)
            .block(panel(" Setup ".to_string(), true, self.theme))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    context: &'a str,
    search: Option<&'a str>,
    notice: Option<&'a Notice>,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(
        context: &'a str,
        search: Option<&'a str>,
        notice: Option<&'a Notice>,
        theme: &'a Theme,
    ) -> Self {
        StatusBar {
            context,
            search,
            notice,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some(query) = self.search {
            Line::from(vec![
                Span::styled("Search: ", self.theme.title_style()),
                Span::raw(format!("{query}_")),
                Span::styled("  [Enter] Keep [Esc] Clear", self.theme.dimmed_style()),
            ])
        } else if let Some(notice) = self.notice {
            if notice.is_error() {
                Line::styled(format!("Error: {}", notice.text()), self.theme.error_style())
            } else {
                Line::styled(notice.text().to_string(), self.theme.info_style())
            }
        } else {
            Line::from(format!("{} | [h] Help [q] Quit", self.context))
        };

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(self.theme.border_style()),
        );

        frame.render_widget(paragraph, area);
    }
}
