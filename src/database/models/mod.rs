pub mod app_system;
pub mod customer_manual;

pub use app_system::{AppSystem, AppSystemFields, AppSystemPatch, NewAppSystem};
pub use customer_manual::{CustomerManual, CustomerManualFields, CustomerManualPatch, NewCustomerManual};

/// Trimmed value, or None when absent or blank. Blank strings in an update
/// body mean "leave unchanged".
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Fail with the list of required fields that are blank
pub(crate) fn require(fields: &[(&str, &str)]) -> Result<(), String> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required fields: {}", missing.join(", ")))
    }
}
