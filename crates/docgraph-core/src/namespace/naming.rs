//! Graph labels and relationship types derived from qualified names.
//!
//! All three functions are pure character substitutions: the output has the
//! same number of characters as the input, in the same order.

use regex::Regex;
use std::sync::LazyLock;

use super::local_name;

static NON_LABEL_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid label pattern"));

/// Label used when a target class cannot be determined.
pub const FALLBACK_LABEL: &str = "Unknown";

/// Graph label for a qualified name (`nc:Person` → `nc_Person`).
pub fn label(qname: &str) -> String {
    NON_LABEL_CHAR.replace_all(qname, "_").into_owned()
}

/// Relationship type for a qualified name (`j:PersonCharge` → `J_PERSONCHARGE`).
pub fn rel_type(qname: &str) -> String {
    label(qname).to_uppercase()
}

/// Relationship type of a containment edge, from the child's local name.
pub fn containment_type(qname: &str) -> String {
    label(local_name(qname)).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_substitutes_per_character() {
        assert_eq!(label("nc:Person"), "nc_Person");
        assert_eq!(label("my-ns:Item.Type"), "my_ns_Item_Type");
        assert_eq!(label("Person"), "Person");
        assert_eq!(label("a:b").chars().count(), 3);
    }

    #[test]
    fn test_rel_type() {
        assert_eq!(rel_type("j:PersonVehicleAssociation"), "J_PERSONVEHICLEASSOCIATION");
    }

    #[test]
    fn test_containment_type_uses_local_name() {
        assert_eq!(containment_type("nc:PersonName"), "PERSONNAME");
        assert_eq!(containment_type("Vehicle-Part"), "VEHICLE_PART");
    }
}
