//! What an element turns into.

use super::ConversionMode;
use crate::config::DYNAMIC_ASSOCIATION_SUFFIX;
use crate::mapping::DescriptorIndex;
use crate::namespace::local_name;

/// Fate of one element during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Becomes a node.
    Promote,
    /// Its leaves become properties of the enclosing node.
    Flatten,
    /// Becomes one edge between its first two roles.
    Associate,
    /// Becomes an edge from the enclosing node to the referenced identity.
    Reference,
}

/// The facts about an element that [`decide`] looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementShape {
    pub is_root: bool,
    pub has_children: bool,
    pub has_id: bool,
    pub has_ref: bool,
    /// Number of child elements carrying a reference attribute.
    pub ref_children: usize,
}

/// Decide an element's fate. The first matching rule wins:
///
/// 1. reference attribute and no child elements: `Reference`
/// 2. association rule, or in dynamic mode an `…Association` element with at
///    least two referencing children: `Associate`
/// 3. augmentation rule: `Flatten`
/// 4. object rule: `Promote`
/// 5. document root: `Promote`
/// 6. dynamic mode and an identifier attribute: `Promote`
/// 7. otherwise `Flatten`
pub fn decide(qname: &str, shape: &ElementShape, index: &DescriptorIndex, mode: ConversionMode) -> Decision {
    let dynamic = mode == ConversionMode::Dynamic;

    if shape.has_ref && !shape.has_children {
        return Decision::Reference;
    }
    if index.association(qname).is_some() {
        return Decision::Associate;
    }
    if dynamic && local_name(qname).ends_with(DYNAMIC_ASSOCIATION_SUFFIX) && shape.ref_children >= 2 {
        return Decision::Associate;
    }
    if index.augmentation(qname).is_some() {
        return Decision::Flatten;
    }
    if index.object(qname).is_some() || shape.is_root {
        return Decision::Promote;
    }
    if dynamic && shape.has_id {
        return Decision::Promote;
    }
    Decision::Flatten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{AssociationRule, AugmentationRule, MappingDescriptor, ObjectRule};

    fn index() -> DescriptorIndex {
        DescriptorIndex::new(MappingDescriptor {
            objects: vec![ObjectRule::new("nc:PersonType").with_elements(["nc:Person".to_string()])],
            associations: vec![AssociationRule::new("j:PersonVehicleAssociation")],
            augmentations: vec![AugmentationRule {
                qname: "j:PersonAugmentationType".into(),
                elements: vec!["j:PersonAugmentation".into(), "nc:Person2".into()],
            }],
            ..Default::default()
        })
    }

    fn shape() -> ElementShape {
        ElementShape {
            has_children: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_wins_only_without_children() {
        let idx = index();
        let ref_only = ElementShape {
            has_ref: true,
            ..Default::default()
        };
        assert_eq!(decide("nc:Person", &ref_only, &idx, ConversionMode::Descriptor), Decision::Reference);

        let ref_with_children = ElementShape { has_ref: true, ..shape() };
        assert_eq!(
            decide("nc:Person", &ref_with_children, &idx, ConversionMode::Descriptor),
            Decision::Promote
        );
    }

    #[test]
    fn test_descriptor_rules() {
        let idx = index();
        let mode = ConversionMode::Descriptor;
        assert_eq!(decide("j:PersonVehicleAssociation", &shape(), &idx, mode), Decision::Associate);
        assert_eq!(decide("j:PersonAugmentation", &shape(), &idx, mode), Decision::Flatten);
        assert_eq!(decide("nc:Person", &shape(), &idx, mode), Decision::Promote);
        assert_eq!(decide("nc:PersonName", &shape(), &idx, mode), Decision::Flatten);
    }

    #[test]
    fn test_augmentation_beats_object() {
        let mut d = index().descriptor().clone();
        d.objects[0].elements.push("nc:Person2".into());
        let idx = DescriptorIndex::new(d);
        assert_eq!(decide("nc:Person2", &shape(), &idx, ConversionMode::Descriptor), Decision::Flatten);
    }

    #[test]
    fn test_root_is_promoted() {
        let idx = DescriptorIndex::default();
        let root = ElementShape { is_root: true, ..shape() };
        assert_eq!(decide("Message", &root, &idx, ConversionMode::Descriptor), Decision::Promote);
    }

    #[test]
    fn test_dynamic_mode() {
        let idx = DescriptorIndex::default();
        let mode = ConversionMode::Dynamic;

        let with_id = ElementShape { has_id: true, ..shape() };
        assert_eq!(decide("Person", &with_id, &idx, mode), Decision::Promote);
        assert_eq!(decide("Person", &with_id, &idx, ConversionMode::Descriptor), Decision::Flatten);
        assert_eq!(decide("Name", &shape(), &idx, mode), Decision::Flatten);

        let linked = ElementShape { ref_children: 2, ..shape() };
        assert_eq!(decide("PersonVehicleAssociation", &linked, &idx, mode), Decision::Associate);
        let half = ElementShape { ref_children: 1, ..shape() };
        assert_eq!(decide("PersonVehicleAssociation", &half, &idx, mode), Decision::Flatten);
    }
}
