//! Check definitions and the registry.

mod bool_literals;
mod gnew;
mod round;

use std::fmt;

pub use bool_literals::UseBoolLiteralsCheck;
pub use gnew::UseGnewCheck;
pub use round::RoundCheck;

use crate::diagnostics::Diagnostic;
use crate::tree::TranslationUnit;

/// Check codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckCode {
    /// CTD001: manual alignment/rounding arithmetic.
    CTD001,
    /// CTD002: integer literal implicitly converted to bool.
    CTD002,
    /// CTD003: raw allocation call sized with sizeof.
    CTD003,
}

impl CheckCode {
    /// Parse a check code from string (e.g., "CTD001").
    pub fn parse_code(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CTD001" => Some(CheckCode::CTD001),
            "CTD002" => Some(CheckCode::CTD002),
            "CTD003" => Some(CheckCode::CTD003),
            _ => None,
        }
    }

    /// All available check codes.
    pub fn all() -> &'static [CheckCode] {
        &[CheckCode::CTD001, CheckCode::CTD002, CheckCode::CTD003]
    }

    /// Short name for the check.
    pub fn name(&self) -> &'static str {
        match self {
            CheckCode::CTD001 => "round",
            CheckCode::CTD002 => "use-bool-literals",
            CheckCode::CTD003 => "use-gnew",
        }
    }

    /// Detailed description of what the check detects.
    pub fn description(&self) -> &'static str {
        match self {
            CheckCode::CTD001 => {
                "Detects hand-written alignment and rounding arithmetic: \
                 `(a + (b-1)) / b * b` becomes ROUND_UP or QEMU_ALIGN_UP, \
                 `(a + (b-1)) / b` becomes DIV_ROUND_UP, and `a / b * b` \
                 becomes QEMU_ALIGN_DOWN. Constants are folded to verify the \
                 added value, divisor, and multiplier actually agree; matches \
                 with unresolvable constants are dropped."
            }
            CheckCode::CTD002 => {
                "Detects integer literals used where the surrounding context \
                 converts them to bool, either directly or as a branch of a \
                 bool-converted ternary. Suggests writing true/false instead; \
                 the fix is withheld when the literal comes out of a macro \
                 expansion."
            }
            CheckCode::CTD003 => {
                "Detects malloc/calloc/realloc/alloca and their GLib \
                 wrappers called with a sizeof-based size, and rewrites them \
                 to the typed g_new/g_new0/g_renew/g_newa forms, preserving \
                 the element count and any reallocated pointer. A redundant \
                 pointer cast around the call is removed by a second edit."
            }
        }
    }

    /// Whether this check can produce automatic fixes.
    pub fn is_fixable(&self) -> bool {
        // All three checks propose textual rewrites.
        true
    }

    /// Return the string representation (e.g., `"CTD001"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCode::CTD001 => "CTD001",
            CheckCode::CTD002 => "CTD002",
            CheckCode::CTD003 => "CTD003",
        }
    }
}

impl fmt::Display for CheckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Boolean options read once at check construction.
///
/// Both default to off; they come from `[checks.config.<CODE>]` tables in
/// `.ctidy.toml` or the corresponding CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// CTD001: only detect the full align-up form, skipping the standalone
    /// round-up and align-down patterns.
    pub only_align_up: bool,
    /// CTD003: only accept `sizeof(type)` size arguments; matches whose
    /// sizeof operand is an expression are dropped entirely.
    pub only_type_sizeof: bool,
}

/// A single check: a code plus a pure analysis function over one
/// translation unit. Checks never mutate the tree; configuration is read
/// once at construction.
pub trait Check: Send + Sync {
    fn code(&self) -> CheckCode;

    /// Analyze one translation unit, returning diagnostics in the order
    /// matches were visited (source order).
    fn check(&self, unit: &TranslationUnit) -> Vec<Diagnostic>;
}

/// Construct every built-in check, in registration order.
pub fn builtin_checks(options: CheckOptions) -> Vec<Box<dyn Check>> {
    vec![
        Box::new(RoundCheck::new(options)),
        Box::new(UseBoolLiteralsCheck::new()),
        Box::new(UseGnewCheck::new(options)),
    ]
}

/// Print all available checks in a formatted table.
pub fn print_checks() {
    println!("Available ctidy checks:\n");
    println!("{:<8} {:<20} {:<8} Description", "Code", "Name", "Fixable");
    println!("{}", "-".repeat(80));

    for code in CheckCode::all() {
        let fixable = if code.is_fixable() { "Yes" } else { "No" };
        let desc = code.description();
        let short_desc = desc.split('.').next().unwrap_or(desc);
        println!("{:<8} {:<20} {:<8} {}", code, code.name(), fixable, short_desc);
    }

    println!("\nUse --select to enable specific checks (e.g., --select CTD001,CTD003)");
    println!("Use --exclude to disable specific checks (e.g., --exclude CTD002)");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_code_round_trips() {
        for code in CheckCode::all() {
            assert_eq!(CheckCode::parse_code(code.as_str()), Some(*code));
        }
        assert_eq!(CheckCode::parse_code("ctd002"), Some(CheckCode::CTD002));
        assert_eq!(CheckCode::parse_code("CTD999"), None);
    }

    #[test]
    fn builtin_checks_cover_all_codes() {
        let checks = builtin_checks(CheckOptions::default());
        let codes: Vec<_> = checks.iter().map(|c| c.code()).collect();
        assert_eq!(codes, CheckCode::all());
    }
}
