//! Theme configuration for the TUI.

use ratatui::style::{Color, Modifier, Style};

use crate::analytics::Standing;
use crate::data::Letter;

/// Color theme for the application
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub highlight_bg: Color,
    pub highlight_fg: Color,
    pub border: Color,
    pub title: Color,
    pub error: Color,
    pub info: Color,
    pub standing_excellent: Color,
    pub standing_good: Color,
    pub standing_average: Color,
    pub standing_at_risk: Color,
    /// One color per letter band, A through F
    pub band_colors: Vec<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Reset,
            fg: Color::White,
            highlight_bg: Color::Rgb(60, 60, 80),
            highlight_fg: Color::White,
            border: Color::Rgb(100, 100, 120),
            title: Color::Cyan,
            error: Color::Red,
            info: Color::Green,
            standing_excellent: Color::Green,
            standing_good: Color::Cyan,
            standing_average: Color::Yellow,
            standing_at_risk: Color::Red,
            // Using named colors instead of RGB for better terminal compatibility
            band_colors: vec![
                Color::Green,
                Color::Cyan,
                Color::Yellow,
                Color::Magenta,
                Color::Red,
            ],
        }
    }
}

impl Theme {
    /// Base surface style used to paint widget backgrounds
    pub fn surface_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Get style for normal text
    pub fn normal_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Get style for highlighted/selected items
    pub fn highlight_style(&self) -> Style {
        Style::default()
            .fg(self.highlight_fg)
            .bg(self.highlight_bg)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for borders
    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }

    /// Get style for focused panel borders (distinct from normal borders)
    pub fn focused_border_style(&self) -> Style {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }

    /// Border style for a panel depending on focus
    pub fn panel_border(&self, focused: bool) -> Style {
        if focused {
            self.focused_border_style()
        } else {
            self.border_style()
        }
    }

    /// Get style for titles
    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.title)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for table headers
    pub fn header_style(&self) -> Style {
        Style::default()
            .fg(self.title)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }

    /// Get style for unfocused/dimmed text
    pub fn dimmed_style(&self) -> Style {
        Style::default()
            .fg(self.border)
            .add_modifier(Modifier::DIM)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error).add_modifier(Modifier::BOLD)
    }

    pub fn info_style(&self) -> Style {
        Style::default().fg(self.info)
    }

    /// Get style for an academic standing band
    pub fn standing_style(&self, standing: Standing) -> Style {
        let color = match standing {
            Standing::Excellent => self.standing_excellent,
            Standing::Good => self.standing_good,
            Standing::Average => self.standing_average,
            Standing::AtRisk => self.standing_at_risk,
        };
        Style::default().fg(color)
    }

    /// Color for a letter band
    pub fn letter_color(&self, letter: Letter) -> Color {
        self.band_colors[letter.index() % self.band_colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_colors_are_distinct() {
        let theme = Theme::default();
        for (i, a) in Letter::ALL.iter().enumerate() {
            for b in &Letter::ALL[i + 1..] {
                assert_ne!(
                    theme.letter_color(*a),
                    theme.letter_color(*b),
                    "{a} and {b} share a color"
                );
            }
        }
    }

    #[test]
    fn test_band_colors_are_not_gray() {
        let theme = Theme::default();
        for (i, color) in theme.band_colors.iter().enumerate() {
            let gray_colors = [Color::Gray, Color::DarkGray, Color::White, Color::Black];
            assert!(
                !gray_colors.contains(color),
                "Band color {i} should not be a gray shade: {:?}",
                color
            );
        }
    }

    #[test]
    fn test_at_risk_matches_error_color() {
        let theme = Theme::default();
        assert_eq!(theme.standing_style(Standing::AtRisk).fg, Some(theme.error));
        assert_eq!(theme.letter_color(Letter::F), theme.error);
    }
}
