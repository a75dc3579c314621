//! Record entry forms and the confirmation dialog.
//!
//! `FormState` owns the text being edited and turns it into a typed,
//! validated record on submit; `FormPopup` only draws it.

use crossterm::event::KeyCode;
use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::help::centered_rect;
use super::theme::Theme;
use crate::data::{
    Course, CourseId, GradeId, GradeRecord, GradeUpdate, NewCourse, NewGrade, NewStudent,
    Student, StudentId,
};
use crate::error::{Error, Result};

/// Which record a form creates or edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    AddStudent,
    EditStudent(StudentId),
    AddCourse,
    EditCourse(CourseId),
    AssignGrade,
    EditGrade(GradeId),
}

impl FormKind {
    pub fn title(&self) -> String {
        match self {
            FormKind::AddStudent => "Add Student".to_string(),
            FormKind::EditStudent(id) => format!("Edit Student #{id}"),
            FormKind::AddCourse => "Add Course".to_string(),
            FormKind::EditCourse(id) => format!("Edit Course #{id}"),
            FormKind::AssignGrade => "Assign Grade".to_string(),
            FormKind::EditGrade(id) => format!("Edit Grade #{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
}

impl FormField {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        FormField {
            label,
            value: value.into(),
        }
    }
}

/// Typed result of a submitted form
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    CreateStudent(NewStudent),
    UpdateStudent(StudentId, NewStudent),
    CreateCourse(NewCourse),
    UpdateCourse(CourseId, NewCourse),
    CreateGrade(NewGrade),
    UpdateGrade(GradeId, GradeUpdate),
}

/// What a key press did to the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub kind: FormKind,
    pub fields: Vec<FormField>,
    pub focused: usize,
    pub error: Option<String>,
}

impl FormState {
    fn new(kind: FormKind, fields: Vec<FormField>) -> Self {
        FormState {
            kind,
            fields,
            focused: 0,
            error: None,
        }
    }

    pub fn add_student() -> Self {
        Self::new(
            FormKind::AddStudent,
            vec![FormField::new("Name", ""), FormField::new("Email", "")],
        )
    }

    pub fn edit_student(student: &Student) -> Self {
        Self::new(
            FormKind::EditStudent(student.id),
            vec![
                FormField::new("Name", student.name.clone()),
                FormField::new("Email", student.email.clone()),
            ],
        )
    }

    pub fn add_course() -> Self {
        Self::new(
            FormKind::AddCourse,
            vec![
                FormField::new("Name", ""),
                FormField::new("Code", ""),
                FormField::new("Credits", "3"),
            ],
        )
    }

    pub fn edit_course(course: &Course) -> Self {
        Self::new(
            FormKind::EditCourse(course.id),
            vec![
                FormField::new("Name", course.name.clone()),
                FormField::new("Code", course.code.clone()),
                FormField::new("Credits", course.credits.to_string()),
            ],
        )
    }

    /// Grade entry, optionally prefilled with a student and course
    pub fn assign_grade(student: Option<StudentId>, course: Option<CourseId>) -> Self {
        let mut form = Self::new(
            FormKind::AssignGrade,
            vec![
                FormField::new("Student ID", student.map(|s| s.to_string()).unwrap_or_default()),
                FormField::new("Course ID", course.map(|c| c.to_string()).unwrap_or_default()),
                FormField::new("Score", ""),
            ],
        );
        form.focused = match (student, course) {
            (Some(_), Some(_)) => 2,
            (Some(_), None) => 1,
            _ => 0,
        };
        form
    }

    pub fn edit_grade(record: &GradeRecord) -> Self {
        let mut form = Self::new(
            FormKind::EditGrade(record.grade.id),
            vec![
                FormField::new("Student", record.student_name.clone()),
                FormField::new("Course", record.course_code.clone()),
                FormField::new("Score", format!("{}", record.grade.score)),
            ],
        );
        form.focused = 2;
        form
    }

    /// Fields shown read-only
    fn is_locked(&self, index: usize) -> bool {
        matches!(self.kind, FormKind::EditGrade(_)) && index < 2
    }

    fn focus_next(&mut self) {
        let len = self.fields.len();
        for step in 1..=len {
            let candidate = (self.focused + step) % len;
            if !self.is_locked(candidate) {
                self.focused = candidate;
                return;
            }
        }
    }

    fn focus_prev(&mut self) {
        let len = self.fields.len();
        for step in 1..=len {
            let candidate = (self.focused + len - step) % len;
            if !self.is_locked(candidate) {
                self.focused = candidate;
                return;
            }
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> FormAction {
        match code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter => return FormAction::Submit,
            KeyCode::Tab | KeyCode::Down => self.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.focus_prev(),
            KeyCode::Backspace => {
                if !self.is_locked(self.focused) {
                    self.fields[self.focused].value.pop();
                }
            }
            KeyCode::Char(c) => {
                if !self.is_locked(self.focused) {
                    self.fields[self.focused].value.push(c);
                }
            }
            _ => {}
        }
        FormAction::None
    }

    fn value(&self, index: usize) -> &str {
        self.fields[index].value.trim()
    }

    fn parse_id(&self, index: usize, field: &'static str) -> Result<i64> {
        self.value(index)
            .parse()
            .map_err(|_| Error::validation(field, "must be a whole number"))
    }

    fn parse_score(&self, index: usize) -> Result<f64> {
        self.value(index)
            .parse()
            .map_err(|_| Error::validation("score", "must be a number"))
    }

    /// Parse and validate the entered text into a typed record
    pub fn submission(&self) -> Result<Submission> {
        match self.kind {
            FormKind::AddStudent | FormKind::EditStudent(_) => {
                let input = NewStudent::new(self.value(0), self.value(1)).validated()?;
                Ok(match self.kind {
                    FormKind::EditStudent(id) => Submission::UpdateStudent(id, input),
                    _ => Submission::CreateStudent(input),
                })
            }
            FormKind::AddCourse | FormKind::EditCourse(_) => {
                let credits: u32 = self
                    .value(2)
                    .parse()
                    .map_err(|_| Error::validation("credits", "must be a positive whole number"))?;
                let input = NewCourse::new(self.value(0), self.value(1), credits).validated()?;
                Ok(match self.kind {
                    FormKind::EditCourse(id) => Submission::UpdateCourse(id, input),
                    _ => Submission::CreateCourse(input),
                })
            }
            FormKind::AssignGrade => {
                let student = StudentId(self.parse_id(0, "student_id")?);
                let course = CourseId(self.parse_id(1, "course_id")?);
                let input = NewGrade::new(student, course, self.parse_score(2)?).validated()?;
                Ok(Submission::CreateGrade(input))
            }
            FormKind::EditGrade(id) => {
                let update = GradeUpdate {
                    score: self.parse_score(2)?,
                }
                .validated()?;
                Ok(Submission::UpdateGrade(id, update))
            }
        }
    }
}

/// Popup drawing a `FormState`
pub struct FormPopup<'a> {
    form: &'a FormState,
    theme: &'a Theme,
}

impl<'a> FormPopup<'a> {
    pub fn new(form: &'a FormState, theme: &'a Theme) -> Self {
        FormPopup { form, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let mut lines = vec![Line::from("")];
        for (i, field) in self.form.fields.iter().enumerate() {
            let focused = i == self.form.focused;
            let value_style = if self.form.is_locked(i) {
                self.theme.dimmed_style()
            } else if focused {
                self.theme.highlight_style()
            } else {
                self.theme.normal_style()
            };
            let cursor = if focused { "_" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {:<12}", field.label),
                    if focused {
                        self.theme.title_style()
                    } else {
                        self.theme.dimmed_style()
                    },
                ),
                Span::styled(format!(" {}{cursor} ", field.value), value_style),
            ]));
            lines.push(Line::from(""));
        }

        if let Some(error) = &self.form.error {
            lines.push(Line::styled(format!("  {error}"), self.theme.error_style()));
            lines.push(Line::from(""));
        }
        lines.push(Line::styled(
            "  [Enter] Save  [Tab] Next field  [Esc] Cancel",
            self.theme.dimmed_style(),
        ));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!(" {} ", self.form.kind.title()))
                    .title_alignment(Alignment::Center)
                    .title_style(self.theme.title_style())
                    .borders(Borders::ALL)
                    .border_style(self.theme.focused_border_style())
                    .style(self.theme.surface_style()),
            )
            .wrap(Wrap { trim: false });

        frame.render_widget(paragraph, popup_area);
    }
}

/// Yes/no prompt for destructive actions
pub struct ConfirmDialog<'a> {
    prompt: &'a str,
    theme: &'a Theme,
}

impl<'a> ConfirmDialog<'a> {
    pub fn new(prompt: &'a str, theme: &'a Theme) -> Self {
        ConfirmDialog { prompt, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(50, 25, area);
        frame.render_widget(Clear, popup_area);

        let lines = vec![
            Line::from(""),
            Line::from(self.prompt.to_string()),
            Line::from(""),
            Line::styled("[y] Yes   [n] No", self.theme.title_style()),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" Confirm ")
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_style(self.theme.error_style())
                    .style(self.theme.surface_style()),
            );

        frame.render_widget(paragraph, popup_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(form: &mut FormState, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyCode::Char(c));
        }
    }

    #[test]
    fn test_student_form_submission() {
        let mut form = FormState::add_student();
        type_text(&mut form, "Ada Lovelace");
        form.handle_key(KeyCode::Tab);
        type_text(&mut form, "ada@example.com");

        assert_eq!(form.handle_key(KeyCode::Enter), FormAction::Submit);
        assert_eq!(
            form.submission().unwrap(),
            Submission::CreateStudent(NewStudent::new("Ada Lovelace", "ada@example.com"))
        );
    }

    #[test]
    fn test_backspace_and_cancel() {
        let mut form = FormState::add_student();
        type_text(&mut form, "Bobb");
        form.handle_key(KeyCode::Backspace);
        assert_eq!(form.fields[0].value, "Bob");
        assert_eq!(form.handle_key(KeyCode::Esc), FormAction::Cancel);
    }

    #[test]
    fn test_invalid_email_rejected() {
        let mut form = FormState::add_student();
        type_text(&mut form, "Bob");
        form.handle_key(KeyCode::Down);
        type_text(&mut form, "not-an-email");
        assert!(matches!(
            form.submission(),
            Err(Error::Validation { field: "email", .. })
        ));
    }

    #[test]
    fn test_course_credits_must_be_numeric() {
        let mut form = FormState::add_course();
        type_text(&mut form, "Algebra");
        form.handle_key(KeyCode::Tab);
        type_text(&mut form, "MATH101");
        form.handle_key(KeyCode::Tab);
        form.handle_key(KeyCode::Backspace);
        type_text(&mut form, "three");
        assert!(matches!(
            form.submission(),
            Err(Error::Validation { field: "credits", .. })
        ));
    }

    #[test]
    fn test_assign_grade_prefilled() {
        let mut form = FormState::assign_grade(Some(StudentId(4)), Some(CourseId(2)));
        assert_eq!(form.focused, 2);
        type_text(&mut form, "88.5");
        assert_eq!(
            form.submission().unwrap(),
            Submission::CreateGrade(NewGrade::new(StudentId(4), CourseId(2), 88.5))
        );
    }

    #[test]
    fn test_score_out_of_range() {
        let mut form = FormState::assign_grade(Some(StudentId(1)), Some(CourseId(1)));
        type_text(&mut form, "101");
        assert!(matches!(
            form.submission(),
            Err(Error::Validation { field: "score", .. })
        ));
    }

    #[test]
    fn test_edit_grade_locks_names() {
        let mut form = FormState {
            kind: FormKind::EditGrade(GradeId(9)),
            fields: vec![
                FormField::new("Student", "Ann"),
                FormField::new("Course", "MATH101"),
                FormField::new("Score", "70"),
            ],
            focused: 2,
            error: None,
        };
        form.handle_key(KeyCode::Tab);
        assert_eq!(form.focused, 2);
        form.handle_key(KeyCode::Backspace);
        form.handle_key(KeyCode::Backspace);
        type_text(&mut form, "95");
        assert_eq!(
            form.submission().unwrap(),
            Submission::UpdateGrade(GradeId(9), GradeUpdate { score: 95.0 })
        );
    }
}
