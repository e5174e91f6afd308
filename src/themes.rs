use crate::tree::Stage;
use crossterm::style::Color;

/// How one theme draws the tree. Purely presentational; the engine never sees it.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    /// Indexed by `Stage::index()`.
    pub glyphs: [char; 5],
    pub stage_colors: [Color; 5],
    pub branch: Color,
    pub accent: Color,
}

impl Theme {
    pub fn glyph(&self, stage: Stage) -> char {
        self.glyphs[stage.index()]
    }

    pub fn color(&self, stage: Stage) -> Color {
        self.stage_colors[stage.index()]
    }
}

pub const THEMES: [Theme; 6] = [
    Theme {
        id: "cherry-blossom",
        name: "Cherry Blossom",
        glyphs: ['o', 'v', 'Y', '*', '@'],
        stage_colors: [Color::DarkYellow, Color::Green, Color::DarkMagenta, Color::Magenta, Color::Red],
        branch: Color::DarkMagenta,
        accent: Color::Magenta,
    },
    Theme {
        id: "enchanted-forest",
        name: "Enchanted Forest",
        glyphs: ['o', '^', 'Y', '%', '&'],
        stage_colors: [Color::DarkYellow, Color::Green, Color::DarkGreen, Color::Cyan, Color::Yellow],
        branch: Color::DarkGreen,
        accent: Color::Green,
    },
    Theme {
        id: "neon-cyber",
        name: "Neon Cyber",
        glyphs: ['.', '+', '#', '*', '$'],
        stage_colors: [Color::DarkCyan, Color::Cyan, Color::Blue, Color::Magenta, Color::Green],
        branch: Color::Cyan,
        accent: Color::Magenta,
    },
    Theme {
        id: "autumn-gold",
        name: "Autumn Gold",
        glyphs: ['o', 'v', 'Y', '*', '@'],
        stage_colors: [Color::DarkYellow, Color::Yellow, Color::DarkRed, Color::Red, Color::DarkYellow],
        branch: Color::DarkYellow,
        accent: Color::Yellow,
    },
    Theme {
        id: "crystal-winter",
        name: "Crystal Winter",
        glyphs: ['.', '^', 'Y', '*', '<'],
        stage_colors: [Color::Grey, Color::Cyan, Color::Blue, Color::White, Color::DarkCyan],
        branch: Color::Grey,
        accent: Color::Cyan,
    },
    Theme {
        id: "inferno",
        name: "Inferno",
        glyphs: ['.', '^', 'Y', '*', '@'],
        stage_colors: [Color::DarkRed, Color::Red, Color::DarkYellow, Color::Yellow, Color::White],
        branch: Color::DarkRed,
        accent: Color::Red,
    },
];

pub fn theme_index(id: &str) -> Option<usize> {
    THEMES.iter().position(|t| t.id.eq_ignore_ascii_case(id))
}

/// The theme currently picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeState {
    pub index: usize,
}

impl ThemeState {
    pub fn new(index: usize) -> Self {
        Self { index: index % THEMES.len() }
    }

    pub fn current(&self) -> &'static Theme {
        &THEMES[self.index]
    }

    pub fn cycle(&mut self) {
        self.index = (self.index + 1) % THEMES.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        assert_eq!(theme_index("cherry-blossom"), Some(0));
        assert_eq!(theme_index("INFERNO"), Some(5));
        assert_eq!(theme_index("sepia"), None);
    }

    #[test]
    fn cycling_wraps_around() {
        let mut state = ThemeState::new(THEMES.len() - 1);
        state.cycle();
        assert_eq!(state.current().id, "cherry-blossom");
    }

    #[test]
    fn every_stage_has_a_glyph() {
        for theme in &THEMES {
            for stage in Stage::ALL {
                assert!(!theme.glyph(stage).is_whitespace(), "{} {}", theme.id, stage);
            }
        }
    }
}
