use crate::indicator::Visualizer;

/// Braille dots, the default phase set.
pub const DOTS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
pub const BLOCKS: &[&str] = &[
    "███▒▒▒▒▒▒▒",
    "▒███▒▒▒▒▒▒",
    "▒▒███▒▒▒▒▒",
    "▒▒▒███▒▒▒▒",
    "▒▒▒▒███▒▒▒",
    "▒▒▒▒▒███▒▒",
    "▒▒▒▒▒▒███▒",
    "▒▒▒▒▒▒▒███",
    "█▒▒▒▒▒▒▒██",
    "██▒▒▒▒▒▒▒█",
];
pub const DIAMONDS: &[&str] = &["◇", "◈", "◆"];

/// Cycles through a phase set, advancing one phase per update.
#[derive(Debug, Clone)]
pub struct Spinner {
    phases: Vec<String>,
    index: usize,
    message: String,
}

impl Default for Spinner {
    fn default() -> Self {
        Self::new(DOTS)
    }
}

impl Spinner {
    /// An empty phase set falls back to `DOTS`.
    pub fn new(phases: &[&str]) -> Self {
        let phases = if phases.is_empty() { DOTS } else { phases };
        Self {
            phases: phases.iter().map(|p| (*p).to_string()).collect(),
            index: 0,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn phase(&self) -> &str {
        &self.phases[self.index]
    }
}

impl Visualizer for Spinner {
    fn update(&mut self) -> bool {
        self.index = (self.index + 1) % self.phases.len();
        true
    }

    fn visualize(&self) -> String {
        if self.message.is_empty() {
            self.phase().to_string()
        } else {
            format!("{} {}", self.phase(), self.message)
        }
    }
}
