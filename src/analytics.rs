//! Grade analytics: GPA, course statistics and cohort summaries.
//!
//! Every figure is recomputed from committed rows on each call, in one pass
//! over the effective (latest) grade per student and course.

use std::collections::HashMap;

use serde::Serialize;

use crate::data::{
    Course, CourseId, GradeFilter, GradeRecord, GradeSort, Letter, Storage, Student,
    StudentFilter, StudentId, PASSING_SCORE,
};
use crate::error::Result;

/// Number of top students reported per course
pub const TOP_STUDENTS: usize = 3;
/// Minimum GPA for good standing
pub const PASSING_GPA: f64 = 2.0;
/// Minimum GPA for the honor roll
pub const HONOR_GPA: f64 = 3.5;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Credit-weighted GPA for one student
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentGpa {
    pub student_id: StudentId,
    /// 4.0 scale, rounded to two decimals
    pub gpa: f64,
    /// Credit-weighted mean of raw scores (0-100)
    pub weighted_score: f64,
    pub credits: u64,
    pub courses: usize,
}

#[derive(Debug, Default)]
struct GpaAccumulator {
    points: f64,
    score: f64,
    credits: u64,
    courses: usize,
    any_failing: bool,
}

impl GpaAccumulator {
    fn add(&mut self, score: f64, credits: u32) {
        let weight = f64::from(credits);
        self.points += Letter::from_score(score).points() * weight;
        self.score += score * weight;
        self.credits = self.credits.saturating_add(u64::from(credits));
        self.courses += 1;
        self.any_failing |= score < PASSING_SCORE;
    }

    /// `None` when nothing was added, so no division by zero can happen
    fn finish(&self, student_id: StudentId) -> Option<StudentGpa> {
        if self.credits == 0 {
            return None;
        }
        let total = self.credits as f64;
        Some(StudentGpa {
            student_id,
            gpa: round2(self.points / total),
            weighted_score: round2(self.score / total),
            credits: self.credits,
            courses: self.courses,
        })
    }
}

/// Count of scores per letter band, in `Letter::ALL` order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GradeDistribution(pub [usize; 5]);

impl GradeDistribution {
    pub fn get(&self, letter: Letter) -> usize {
        self.0[letter.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Letter, usize)> + '_ {
        Letter::ALL.iter().map(move |&l| (l, self.get(l)))
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

#[derive(Debug, Default)]
struct ScoreAccumulator {
    count: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    distribution: GradeDistribution,
}

impl ScoreAccumulator {
    fn add(&mut self, score: f64) {
        self.count += 1;
        self.sum += score;
        self.min = Some(self.min.map_or(score, |m| m.min(score)));
        self.max = Some(self.max.map_or(score, |m| m.max(score)));
        self.distribution.0[Letter::from_score(score).index()] += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// A student's effective grade in a course, for rankings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStudent {
    pub student_id: StudentId,
    pub name: String,
    pub score: f64,
    pub letter: Letter,
}

/// Aggregates over one course's effective grades
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseStatistics {
    pub course: Course,
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub distribution: GradeDistribution,
    pub top_students: Vec<RankedStudent>,
}

impl CourseStatistics {
    /// Letter equivalent of the mean score
    pub fn mean_letter(&self) -> Option<Letter> {
        self.mean.map(Letter::from_score)
    }
}

/// Totals across the whole database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallSummary {
    pub student_count: usize,
    pub course_count: usize,
    /// Effective grades (one per graded student and course)
    pub grade_count: usize,
    /// All grade rows including superseded history
    pub recorded_grade_count: usize,
    pub overall_mean: Option<f64>,
}

/// Academic standing bands by GPA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Standing {
    AtRisk,
    Average,
    Good,
    Excellent,
}

impl Standing {
    pub const ALL: [Standing; 4] = [
        Standing::AtRisk,
        Standing::Average,
        Standing::Good,
        Standing::Excellent,
    ];

    pub fn from_gpa(gpa: f64) -> Self {
        if gpa < PASSING_GPA {
            Standing::AtRisk
        } else if gpa < 3.0 {
            Standing::Average
        } else if gpa < HONOR_GPA {
            Standing::Good
        } else {
            Standing::Excellent
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Standing::AtRisk => "At Risk (< 2.0)",
            Standing::Average => "Average (2.0-3.0)",
            Standing::Good => "Good (3.0-3.5)",
            Standing::Excellent => "Excellent (3.5-4.0)",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Standing::AtRisk => "At Risk",
            Standing::Average => "Average",
            Standing::Good => "Good",
            Standing::Excellent => "Excellent",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One student's row in the cohort report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStanding {
    pub student: Student,
    /// `None` when the student has no grades yet
    pub gpa: Option<StudentGpa>,
    pub standing: Option<Standing>,
    /// Any effective score below passing, or GPA below good standing
    pub failing: bool,
}

impl StudentStanding {
    fn new(student: Student, acc: Option<&GpaAccumulator>) -> Self {
        let gpa = acc.and_then(|a| a.finish(student.id));
        let standing = gpa.as_ref().map(|g| Standing::from_gpa(g.gpa));
        let failing = acc.is_some_and(|a| a.any_failing)
            || gpa.as_ref().is_some_and(|g| g.gpa < PASSING_GPA);
        StudentStanding {
            student,
            gpa,
            standing,
            failing,
        }
    }

    pub fn gpa_value(&self) -> Option<f64> {
        self.gpa.as_ref().map(|g| g.gpa)
    }
}

/// Aggregate rates over students that have at least one grade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortMetrics {
    pub graded_students: usize,
    pub average_gpa: Option<f64>,
    /// Percentage with GPA at or above 2.0
    pub pass_rate: f64,
    /// Percentage with GPA at or above 3.5
    pub honor_rate: f64,
    pub at_risk: usize,
    /// Students per band, in `Standing::ALL` order
    pub standings: [usize; 4],
}

impl CohortMetrics {
    pub fn from_standings(rows: &[StudentStanding]) -> Self {
        let mut graded = 0usize;
        let mut gpa_sum = 0.0;
        let mut passing = 0usize;
        let mut honors = 0usize;
        let mut standings = [0usize; 4];

        for gpa in rows.iter().filter_map(StudentStanding::gpa_value) {
            graded += 1;
            gpa_sum += gpa;
            if gpa >= PASSING_GPA {
                passing += 1;
            }
            if gpa >= HONOR_GPA {
                honors += 1;
            }
            standings[Standing::from_gpa(gpa).index()] += 1;
        }

        let percent = |n: usize| {
            if graded == 0 {
                0.0
            } else {
                round2(n as f64 * 100.0 / graded as f64)
            }
        };

        CohortMetrics {
            graded_students: graded,
            average_gpa: (graded > 0).then(|| round2(gpa_sum / graded as f64)),
            pass_rate: percent(passing),
            honor_rate: percent(honors),
            at_risk: graded - passing,
            standings,
        }
    }

    pub fn count(&self, standing: Standing) -> usize {
        self.standings[standing.index()]
    }
}

/// Which side of a GPA threshold to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDirection {
    /// Strictly below the threshold, lowest first
    Below,
    /// At or above the threshold, highest first
    AtOrAbove,
}

/// Students with a GPA on one side of `threshold`; ungraded students are skipped
pub fn filter_by_gpa(
    rows: &[StudentStanding],
    threshold: f64,
    direction: ThresholdDirection,
) -> Vec<&StudentStanding> {
    let mut kept: Vec<&StudentStanding> = rows
        .iter()
        .filter(|row| match (row.gpa_value(), direction) {
            (Some(gpa), ThresholdDirection::Below) => gpa < threshold,
            (Some(gpa), ThresholdDirection::AtOrAbove) => gpa >= threshold,
            (None, _) => false,
        })
        .collect();
    kept.sort_by(|a, b| {
        let (a, b) = (a.gpa_value().unwrap_or(0.0), b.gpa_value().unwrap_or(0.0));
        match direction {
            ThresholdDirection::Below => a.total_cmp(&b),
            ThresholdDirection::AtOrAbove => b.total_cmp(&a),
        }
    });
    kept
}

/// Analytics over an explicitly passed storage handle
pub struct Analytics<'a> {
    storage: &'a Storage,
}

impl<'a> Analytics<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Analytics { storage }
    }

    /// GPA for one student, `None` when they have no grades.
    ///
    /// Fails with `NotFound` when the student does not exist.
    pub fn student_gpa(&self, student_id: StudentId) -> Result<Option<StudentGpa>> {
        self.storage.get_student(student_id)?;
        let records = self.storage.list_grades(&GradeFilter {
            student_id: Some(student_id),
            latest_only: true,
            ..Default::default()
        })?;

        let mut acc = GpaAccumulator::default();
        for record in &records {
            acc.add(record.grade.score, record.credits);
        }
        Ok(acc.finish(student_id))
    }

    /// Count, mean, range, letter distribution and top students for a course.
    ///
    /// Fails with `NotFound` when the course does not exist.
    pub fn course_statistics(&self, course_id: CourseId) -> Result<CourseStatistics> {
        let course = self.storage.get_course(course_id)?;
        let records = self.storage.list_grades(&GradeFilter {
            course_id: Some(course_id),
            latest_only: true,
            sort: GradeSort::ScoreDesc,
            ..Default::default()
        })?;

        let mut acc = ScoreAccumulator::default();
        let mut top_students = Vec::with_capacity(TOP_STUDENTS);
        for record in &records {
            acc.add(record.grade.score);
            if top_students.len() < TOP_STUDENTS {
                top_students.push(ranked(record));
            }
        }

        Ok(CourseStatistics {
            course,
            count: acc.count,
            mean: acc.mean(),
            min: acc.min,
            max: acc.max,
            distribution: acc.distribution,
            top_students,
        })
    }

    /// Global counts and mean; all zeros on an empty database
    pub fn overall_summary(&self) -> Result<OverallSummary> {
        let records = self.storage.list_grades(&GradeFilter::latest())?;
        let mut acc = ScoreAccumulator::default();
        for record in &records {
            acc.add(record.grade.score);
        }

        Ok(OverallSummary {
            student_count: self.storage.count("students")?,
            course_count: self.storage.count("courses")?,
            grade_count: acc.count,
            recorded_grade_count: self.storage.count("grades")?,
            overall_mean: acc.mean().map(round2),
        })
    }

    /// Every student with GPA, standing and failing flag, ordered by id
    pub fn student_report(&self) -> Result<Vec<StudentStanding>> {
        let students = self.storage.list_students(&StudentFilter::default())?;
        let records = self.storage.list_grades(&GradeFilter::latest())?;

        let mut per_student: HashMap<StudentId, GpaAccumulator> = HashMap::new();
        for record in &records {
            per_student
                .entry(record.grade.student_id)
                .or_default()
                .add(record.grade.score, record.credits);
        }

        Ok(students
            .into_iter()
            .map(|student| {
                let acc = per_student.get(&student.id);
                StudentStanding::new(student, acc)
            })
            .collect())
    }

    /// Statistics for every course, ordered by course id
    pub fn all_course_statistics(&self) -> Result<Vec<CourseStatistics>> {
        self.storage
            .list_courses(&Default::default())?
            .into_iter()
            .map(|course| self.course_statistics(course.id))
            .collect()
    }
}

fn ranked(record: &GradeRecord) -> RankedStudent {
    RankedStudent {
        student_id: record.grade.student_id,
        name: record.student_name.clone(),
        score: record.grade.score,
        letter: record.grade.letter(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DeletePolicy, NewCourse, NewGrade, NewStudent};
    use crate::error::Error;

    fn storage() -> Storage {
        let storage = Storage::open_in_memory(DeletePolicy::Cascade).unwrap();
        storage.ensure_schema().unwrap();
        storage
    }

    fn student(storage: &Storage, name: &str) -> StudentId {
        let email = format!("{}@example.com", name.to_lowercase());
        storage.create_student(&NewStudent::new(name, email)).unwrap()
    }

    fn course(storage: &Storage, code: &str, credits: u32) -> CourseId {
        storage
            .create_course(&NewCourse::new(code, code, credits))
            .unwrap()
    }

    fn grade(storage: &Storage, s: StudentId, c: CourseId, score: f64) {
        storage.create_grade(&NewGrade::new(s, c, score)).unwrap();
    }

    #[test]
    fn test_gpa_without_grades_is_no_data() {
        let storage = storage();
        let alice = student(&storage, "Alice");
        let analytics = Analytics::new(&storage);
        assert_eq!(analytics.student_gpa(alice).unwrap(), None);
    }

    #[test]
    fn test_gpa_for_missing_student() {
        let storage = storage();
        let analytics = Analytics::new(&storage);
        assert!(matches!(
            analytics.student_gpa(StudentId(5)),
            Err(Error::NotFound { entity: "Student", id: 5 })
        ));
    }

    #[test]
    fn test_gpa_is_credit_weighted() {
        let storage = storage();
        let alice = student(&storage, "Alice");
        let math = course(&storage, "MATH101", 3);
        let physics = course(&storage, "PHYS101", 1);
        grade(&storage, alice, math, 95.0); // A, 4.0 x 3
        grade(&storage, alice, physics, 65.0); // D, 1.0 x 1

        let gpa = Analytics::new(&storage).student_gpa(alice).unwrap().unwrap();
        assert_eq!(gpa.gpa, 3.25);
        assert_eq!(gpa.weighted_score, 87.5);
        assert_eq!(gpa.credits, 4);
        assert_eq!(gpa.courses, 2);
    }

    #[test]
    fn test_gpa_total_credits_do_not_overflow() {
        let mut acc = GpaAccumulator::default();
        acc.add(95.0, u32::MAX);
        acc.add(95.0, u32::MAX);

        let gpa = acc.finish(StudentId(1)).unwrap();
        assert_eq!(gpa.gpa, 4.0);
        assert_eq!(gpa.weighted_score, 95.0);
        assert_eq!(gpa.credits, 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_gpa_with_maximum_credit_courses() {
        let storage = storage();
        let alice = student(&storage, "Alice");
        let thesis = course(&storage, "THESIS", crate::data::MAX_CREDITS);
        let project = course(&storage, "PROJECT", crate::data::MAX_CREDITS);
        grade(&storage, alice, thesis, 95.0);
        grade(&storage, alice, project, 95.0);

        let gpa = Analytics::new(&storage).student_gpa(alice).unwrap().unwrap();
        assert_eq!(gpa.gpa, 4.0);
        assert_eq!(gpa.credits, 60);
    }

    #[test]
    fn test_gpa_uses_latest_grade_only() {
        let storage = storage();
        let alice = student(&storage, "Alice");
        let math = course(&storage, "MATH101", 3);
        grade(&storage, alice, math, 40.0);
        grade(&storage, alice, math, 92.0);

        let gpa = Analytics::new(&storage).student_gpa(alice).unwrap().unwrap();
        assert_eq!(gpa.gpa, 4.0);
        assert_eq!(gpa.courses, 1);
    }

    #[test]
    fn test_course_statistics_basic() {
        let storage = storage();
        let math = course(&storage, "MATH101", 3);
        for (name, score) in [("Ann", 70.0), ("Ben", 80.0), ("Cat", 90.0)] {
            let s = student(&storage, name);
            grade(&storage, s, math, score);
        }

        let stats = Analytics::new(&storage).course_statistics(math).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, Some(80.0));
        assert_eq!(stats.min, Some(70.0));
        assert_eq!(stats.max, Some(90.0));
        assert_eq!(stats.mean_letter(), Some(Letter::B));
        assert_eq!(stats.distribution.get(Letter::A), 1);
        assert_eq!(stats.distribution.get(Letter::B), 1);
        assert_eq!(stats.distribution.get(Letter::C), 1);
        assert_eq!(stats.distribution.total(), 3);

        let top: Vec<&str> = stats.top_students.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(top, vec!["Cat", "Ben", "Ann"]);
    }

    #[test]
    fn test_course_statistics_empty_and_missing() {
        let storage = storage();
        let math = course(&storage, "MATH101", 3);
        let analytics = Analytics::new(&storage);

        let stats = analytics.course_statistics(math).unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean, None);
        assert_eq!(stats.min, None);
        assert!(stats.top_students.is_empty());

        assert!(matches!(
            analytics.course_statistics(CourseId(9)),
            Err(Error::NotFound { entity: "Course", .. })
        ));
    }

    #[test]
    fn test_top_students_capped() {
        let storage = storage();
        let math = course(&storage, "MATH101", 3);
        for (i, name) in ["Ann", "Ben", "Cat", "Dan", "Eve"].iter().enumerate() {
            let s = student(&storage, name);
            grade(&storage, s, math, 60.0 + i as f64 * 5.0);
        }
        let stats = Analytics::new(&storage).course_statistics(math).unwrap();
        assert_eq!(stats.top_students.len(), TOP_STUDENTS);
        assert_eq!(stats.top_students[0].name, "Eve");
    }

    #[test]
    fn test_overall_summary_on_empty_database() {
        let storage = storage();
        let summary = Analytics::new(&storage).overall_summary().unwrap();
        assert_eq!(
            summary,
            OverallSummary {
                student_count: 0,
                course_count: 0,
                grade_count: 0,
                recorded_grade_count: 0,
                overall_mean: None,
            }
        );
    }

    #[test]
    fn test_overall_summary_counts_history_separately() {
        let storage = storage();
        let alice = student(&storage, "Alice");
        let bob = student(&storage, "Bob");
        let math = course(&storage, "MATH101", 3);
        grade(&storage, alice, math, 50.0);
        grade(&storage, alice, math, 70.0);
        grade(&storage, bob, math, 90.0);

        let summary = Analytics::new(&storage).overall_summary().unwrap();
        assert_eq!(summary.student_count, 2);
        assert_eq!(summary.course_count, 1);
        assert_eq!(summary.grade_count, 2);
        assert_eq!(summary.recorded_grade_count, 3);
        assert_eq!(summary.overall_mean, Some(80.0));
    }

    #[test]
    fn test_student_report_flags_failing() {
        let storage = storage();
        let alice = student(&storage, "Alice");
        let bob = student(&storage, "Bob");
        let cara = student(&storage, "Cara");
        let math = course(&storage, "MATH101", 3);
        let history = course(&storage, "HIST101", 3);
        grade(&storage, alice, math, 95.0);
        grade(&storage, alice, history, 91.0);
        // High GPA overall but one failing course still flags
        grade(&storage, bob, math, 100.0);
        grade(&storage, bob, history, 55.0);

        let report = Analytics::new(&storage).student_report().unwrap();
        assert_eq!(report.len(), 3);

        let by_id = |id: StudentId| report.iter().find(|r| r.student.id == id).unwrap();
        assert!(!by_id(alice).failing);
        assert_eq!(by_id(alice).standing, Some(Standing::Excellent));
        assert!(by_id(bob).failing);
        assert_eq!(by_id(bob).gpa_value(), Some(2.0));
        assert_eq!(by_id(cara).gpa, None);
        assert!(!by_id(cara).failing);
    }

    #[test]
    fn test_cohort_metrics() {
        let storage = storage();
        let math = course(&storage, "MATH101", 3);
        for (name, score) in [("Ann", 95.0), ("Ben", 85.0), ("Cat", 72.0), ("Dan", 40.0)] {
            let s = student(&storage, name);
            grade(&storage, s, math, score);
        }
        student(&storage, "Eve"); // ungraded, excluded

        let report = Analytics::new(&storage).student_report().unwrap();
        let metrics = CohortMetrics::from_standings(&report);
        assert_eq!(metrics.graded_students, 4);
        assert_eq!(metrics.average_gpa, Some(2.25));
        assert_eq!(metrics.pass_rate, 75.0);
        assert_eq!(metrics.honor_rate, 25.0);
        assert_eq!(metrics.at_risk, 1);
        assert_eq!(metrics.count(Standing::Excellent), 1);
        assert_eq!(metrics.count(Standing::Good), 1);
        assert_eq!(metrics.count(Standing::Average), 1);
        assert_eq!(metrics.count(Standing::AtRisk), 1);
    }

    #[test]
    fn test_cohort_metrics_empty() {
        let metrics = CohortMetrics::from_standings(&[]);
        assert_eq!(metrics.graded_students, 0);
        assert_eq!(metrics.average_gpa, None);
        assert_eq!(metrics.pass_rate, 0.0);
        assert_eq!(metrics.at_risk, 0);
    }

    #[test]
    fn test_filter_by_gpa() {
        let storage = storage();
        let math = course(&storage, "MATH101", 3);
        for (name, score) in [("Ann", 95.0), ("Ben", 65.0), ("Cat", 82.0)] {
            let s = student(&storage, name);
            grade(&storage, s, math, score);
        }
        student(&storage, "Dan");
        let report = Analytics::new(&storage).student_report().unwrap();

        let below = filter_by_gpa(&report, 3.5, ThresholdDirection::Below);
        let names: Vec<&str> = below.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, vec!["Ben", "Cat"]);

        let above = filter_by_gpa(&report, 3.0, ThresholdDirection::AtOrAbove);
        let names: Vec<&str> = above.iter().map(|r| r.student.name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Cat"]);
    }

    #[test]
    fn test_standing_bands() {
        assert_eq!(Standing::from_gpa(0.0), Standing::AtRisk);
        assert_eq!(Standing::from_gpa(1.99), Standing::AtRisk);
        assert_eq!(Standing::from_gpa(2.0), Standing::Average);
        assert_eq!(Standing::from_gpa(3.0), Standing::Good);
        assert_eq!(Standing::from_gpa(3.5), Standing::Excellent);
        assert_eq!(Standing::from_gpa(4.0), Standing::Excellent);
    }

    #[test]
    fn test_all_course_statistics_on_seeded_data() {
        let storage = storage();
        storage.seed_sample_data().unwrap();
        let all = Analytics::new(&storage).all_course_statistics().unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|s| s.count == 22));
    }
}
