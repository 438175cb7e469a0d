//! Role categories and alert policy.
//!
//! The reference database groups people into a fixed set of access tiers.
//! Each tier carries its policy (display label, access level, whether a
//! match raises an alert and at which severity) as associated data, so a
//! missing arm is a compile error rather than a missing dictionary key.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Access tier of a registered person. The directory names under the
/// reference database (`empleados/`, `vip/`, `visitantes/`) map onto these
/// variants; anything else is ignored at roster load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleCategory {
    Employees,
    Vip,
    Visitors,
}

impl RoleCategory {
    pub const ALL: [RoleCategory; 3] = [
        RoleCategory::Employees,
        RoleCategory::Vip,
        RoleCategory::Visitors,
    ];

    /// Directory key under the reference database.
    pub fn dir_name(&self) -> &'static str {
        match self {
            RoleCategory::Employees => "empleados",
            RoleCategory::Vip => "vip",
            RoleCategory::Visitors => "visitantes",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "empleados" => Some(RoleCategory::Employees),
            "vip" => Some(RoleCategory::Vip),
            "visitantes" => Some(RoleCategory::Visitors),
            _ => None,
        }
    }

    /// Human-facing role label, as it appears in logs and alert records.
    pub fn label(&self) -> &'static str {
        match self {
            RoleCategory::Employees => "Empleado",
            RoleCategory::Vip => "VIP",
            RoleCategory::Visitors => "Visitante",
        }
    }

    /// Numeric access level. Higher means more trusted.
    pub fn access_level(&self) -> i32 {
        match self {
            RoleCategory::Employees => 2,
            RoleCategory::Vip => 3,
            RoleCategory::Visitors => 1,
        }
    }

    /// Alert policy for a confident match in this category. `None` means
    /// matches in this tier never raise an alert.
    pub fn alert_policy(&self) -> Option<AlertSeverity> {
        match self {
            RoleCategory::Employees => None,
            RoleCategory::Vip => Some(AlertSeverity::Low),
            RoleCategory::Visitors => Some(AlertSeverity::Medium),
        }
    }
}

/// Alert severity. Serialized with the wire names the log consumers expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    #[serde(rename = "bajo")]
    Low,
    #[serde(rename = "medio")]
    Medium,
    #[serde(rename = "alto")]
    High,
    #[serde(rename = "critico")]
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "bajo",
            AlertSeverity::Medium => "medio",
            AlertSeverity::High => "alto",
            AlertSeverity::Critical => "critico",
        }
    }

    /// Numeric priority, 1 (low) to 4 (critical).
    pub fn priority(&self) -> u8 {
        match self {
            AlertSeverity::Low => 1,
            AlertSeverity::Medium => 2,
            AlertSeverity::High => 3,
            AlertSeverity::Critical => 4,
        }
    }
}

/// Minimum-severity gate for the alert log. Applies uniformly to every
/// alert, critical/unknown included; there is no bypass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertFilter {
    #[default]
    All,
    Medium,
    High,
    Critical,
}

impl AlertFilter {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "all" => Ok(AlertFilter::All),
            "medio" => Ok(AlertFilter::Medium),
            "alto" => Ok(AlertFilter::High),
            "critico" => Ok(AlertFilter::Critical),
            other => Err(anyhow!(
                "invalid alert filter '{}' (expected all|medio|alto|critico)",
                other
            )),
        }
    }

    pub fn allows(&self, severity: AlertSeverity) -> bool {
        let floor = match self {
            AlertFilter::All => 1,
            AlertFilter::Medium => 2,
            AlertFilter::High => 3,
            AlertFilter::Critical => 4,
        };
        severity.priority() >= floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_policy_is_fixed() {
        assert_eq!(RoleCategory::Employees.access_level(), 2);
        assert_eq!(RoleCategory::Employees.alert_policy(), None);

        assert_eq!(RoleCategory::Vip.label(), "VIP");
        assert_eq!(RoleCategory::Vip.access_level(), 3);
        assert_eq!(RoleCategory::Vip.alert_policy(), Some(AlertSeverity::Low));

        assert_eq!(
            RoleCategory::Visitors.alert_policy(),
            Some(AlertSeverity::Medium)
        );
        assert_eq!(RoleCategory::Visitors.access_level(), 1);
    }

    #[test]
    fn category_round_trips_through_dir_name() {
        for category in RoleCategory::ALL {
            assert_eq!(
                RoleCategory::from_dir_name(category.dir_name()),
                Some(category)
            );
        }
        assert_eq!(RoleCategory::from_dir_name("contractors"), None);
    }

    #[test]
    fn severity_serializes_with_wire_names() {
        let json = serde_json::to_string(&AlertSeverity::Critical).unwrap();
        assert_eq!(json, "\"critico\"");
        let back: AlertSeverity = serde_json::from_str("\"medio\"").unwrap();
        assert_eq!(back, AlertSeverity::Medium);
    }

    #[test]
    fn filter_gates_by_priority_floor() {
        assert!(AlertFilter::All.allows(AlertSeverity::Low));

        assert!(!AlertFilter::High.allows(AlertSeverity::Medium));
        assert!(AlertFilter::High.allows(AlertSeverity::High));
        assert!(AlertFilter::High.allows(AlertSeverity::Critical));

        // Critical-only admits nothing below critical, critical included --
        // the filter has no unknown-person bypass.
        assert!(!AlertFilter::Critical.allows(AlertSeverity::High));
        assert!(AlertFilter::Critical.allows(AlertSeverity::Critical));
    }

    #[test]
    fn filter_parse_rejects_unknown_levels() {
        assert_eq!(AlertFilter::parse("ALL").unwrap(), AlertFilter::All);
        assert_eq!(AlertFilter::parse("alto").unwrap(), AlertFilter::High);
        assert!(AlertFilter::parse("urgent").is_err());
    }
}
