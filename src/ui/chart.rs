//! Bar charts for grade distributions and academic standings.

use ratatui::{
    layout::Rect,
    style::Style,
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use super::theme::Theme;
use crate::analytics::{CohortMetrics, GradeDistribution, Standing};

fn chart_block<'a>(title: String, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .title_style(theme.title_style())
        .borders(Borders::ALL)
        .border_style(theme.border_style())
}

fn render_empty(frame: &mut Frame, area: Rect, title: String, theme: &Theme) {
    let paragraph = Paragraph::new("No grades recorded")
        .block(chart_block(title, theme))
        .style(theme.dimmed_style());
    frame.render_widget(paragraph, area);
}

/// Letter-grade distribution for one course
pub struct DistributionChart<'a> {
    distribution: &'a GradeDistribution,
    title: &'a str,
    theme: &'a Theme,
}

impl<'a> DistributionChart<'a> {
    pub fn new(distribution: &'a GradeDistribution, title: &'a str, theme: &'a Theme) -> Self {
        DistributionChart {
            distribution,
            title,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = format!(" {} ", self.title);
        if self.distribution.total() == 0 {
            render_empty(frame, area, title, self.theme);
            return;
        }

        let bars: Vec<Bar> = self
            .distribution
            .iter()
            .map(|(letter, count)| {
                let color = self.theme.letter_color(letter);
                Bar::default()
                    .value(count as u64)
                    .label(Line::from(letter.as_str()))
                    .style(Style::default().fg(color))
                    .value_style(Style::default().fg(self.theme.bg).bg(color))
            })
            .collect();

        let chart = BarChart::default()
            .block(chart_block(title, self.theme))
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width(area.width, bars.len()))
            .bar_gap(1);

        frame.render_widget(chart, area);
    }
}

/// Students per standing band
pub struct StandingChart<'a> {
    cohort: &'a CohortMetrics,
    theme: &'a Theme,
}

impl<'a> StandingChart<'a> {
    pub fn new(cohort: &'a CohortMetrics, theme: &'a Theme) -> Self {
        StandingChart { cohort, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let title = " GPA Standing ".to_string();
        if self.cohort.graded_students == 0 {
            render_empty(frame, area, title, self.theme);
            return;
        }

        let bars: Vec<Bar> = Standing::ALL
            .iter()
            .map(|&standing| {
                let style = self.theme.standing_style(standing);
                Bar::default()
                    .value(self.cohort.count(standing) as u64)
                    .label(Line::from(standing.short_label()))
                    .style(style)
            })
            .collect();

        let chart = BarChart::default()
            .block(chart_block(title, self.theme))
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width(area.width, bars.len()))
            .bar_gap(1);

        frame.render_widget(chart, area);
    }
}

/// Widest bar that still fits `count` bars with one-cell gaps inside borders
fn bar_width(area_width: u16, count: usize) -> u16 {
    let count = count.max(1) as u16;
    let inner = area_width.saturating_sub(2);
    let width = inner.saturating_sub(count - 1) / count;
    width.clamp(1, 12)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_width_fits_area() {
        assert_eq!(bar_width(60, 5), 10);
        assert_eq!(bar_width(200, 5), 12);
        assert_eq!(bar_width(4, 5), 1);
        assert_eq!(bar_width(0, 0), 1);
    }
}
