//! Bucket classification for fan-out
//!
//! A record lands in at most one GBA (from the organization name) and, on
//! the team side, at most one department. Anything unmatched is skipped by
//! that fan-out.

use serde::Serialize;

use crate::store::{CellValue, format_number};

/// Global business area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gba {
    Mobility,
    Places,
    Resilience,
    EnablingFunction,
    SharedServices,
}

impl Gba {
    #[cfg(test)]
    pub const ALL: [Gba; 5] = [
        Gba::Mobility,
        Gba::Places,
        Gba::Resilience,
        Gba::EnablingFunction,
        Gba::SharedServices,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Gba::Mobility => "Mobility",
            Gba::Places => "Places",
            Gba::Resilience => "Resilience",
            Gba::EnablingFunction => "Enabling Function",
            Gba::SharedServices => "Shared Services",
        }
    }
}

impl std::fmt::Display for Gba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Organization-name prefix tokens, checked in order
pub const GBA_RULES: &[(&[&str], Gba)] = &[
    (&["MOB:", "Mobility:"], Gba::Mobility),
    (&["PLA:", "Places:"], Gba::Places),
    (&["RES:", "Resilience:"], Gba::Resilience),
    (&["EF:"], Gba::EnablingFunction),
    (&["SSC:"], Gba::SharedServices),
];

fn rule_for(token: &str) -> Option<Gba> {
    GBA_RULES
        .iter()
        .find(|(tokens, _)| tokens.contains(&token))
        .map(|(_, gba)| *gba)
}

/// First whitespace-separated token that equals a rule token decides the GBA
pub fn classify_gba(organization_name: &str) -> Option<Gba> {
    organization_name.split_whitespace().find_map(rule_for)
}

/// Team bucket: the trimmed department name, if any
pub fn classify_team(department_name: &CellValue) -> Option<String> {
    let name = department_name.to_string();
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Render a project number the way the workbooks expect it.
///
/// Integral values (numbers, or text such as `"1234.0"`) lose their
/// fractional part; everything else is kept as displayed.
pub fn format_project_number(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => format_integral(*n),
        CellValue::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 => format_integral(n),
            _ => s.clone(),
        },
        other => other.to_string(),
    }
}

fn format_integral(n: f64) -> String {
    if n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        format_number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_gba_examples() {
        assert_eq!(classify_gba("MOB: Rail Design UK"), Some(Gba::Mobility));
        assert_eq!(classify_gba("Corporate HQ"), None);
        assert_eq!(classify_gba("SSC: Finance"), Some(Gba::SharedServices));
    }

    #[test]
    fn test_classify_gba_first_matching_token_wins() {
        assert_eq!(classify_gba("UK  Places: Water RES: Coastal"), Some(Gba::Places));
        assert_eq!(classify_gba("Resilience: Flood"), Some(Gba::Resilience));
        assert_eq!(classify_gba("EF: HR"), Some(Gba::EnablingFunction));
    }

    #[test]
    fn test_classify_gba_requires_exact_token() {
        assert_eq!(classify_gba("MOB:Rail"), None);
        assert_eq!(classify_gba("mob: rail"), None);
        assert_eq!(classify_gba("MOBILITY"), None);
        assert_eq!(classify_gba(""), None);
    }

    #[test]
    fn test_rules_cover_every_gba_once() {
        for gba in Gba::ALL {
            assert_eq!(GBA_RULES.iter().filter(|(_, g)| *g == gba).count(), 1);
        }
    }

    #[test]
    fn test_classify_team() {
        assert_eq!(
            classify_team(&CellValue::text("  Rail Systems ")),
            Some("Rail Systems".to_string())
        );
        assert_eq!(classify_team(&CellValue::text("   ")), None);
        assert_eq!(classify_team(&CellValue::Empty), None);
    }

    #[test]
    fn test_format_project_number() {
        assert_eq!(format_project_number(&CellValue::Number(1234.0)), "1234");
        assert_eq!(format_project_number(&CellValue::text("ABC-12")), "ABC-12");
        assert_eq!(format_project_number(&CellValue::Number(1234.5)), "1234.5");
        assert_eq!(format_project_number(&CellValue::text("1234.0")), "1234");
        assert_eq!(format_project_number(&CellValue::text("12.5")), "12.5");
        assert_eq!(format_project_number(&CellValue::Empty), "");
    }
}
