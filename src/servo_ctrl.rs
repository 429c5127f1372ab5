/// Commands of the servo board line protocol
#[derive(Debug, Clone, PartialEq)]
pub enum ServoCtrl {
    /// Both servos to 50%
    Center,
    /// Absolute position, percent
    Move { pan: f64, tilt: f64 },
    Raw(String),
}

impl std::fmt::Display for ServoCtrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServoCtrl::Center => writeln!(f, "C"),
            ServoCtrl::Move { pan, tilt } => writeln!(f, "M P{:.2} T{:.2}", pan, tilt),
            ServoCtrl::Raw(cmd) => writeln!(f, "{}", cmd.trim_end()),
        }
    }
}
