//! Mapping-descriptor generation from a class model.
//!
//! Every resolvable class lands in exactly one bucket:
//!
//! - augmentation classes (local name ends with the augmentation suffix)
//!   become [`AugmentationRule`]s and are always flattened;
//! - classes whose parent chain reaches an association base become
//!   [`AssociationRule`]s with one endpoint per object-valued child;
//! - everything else becomes an [`ObjectRule`], and each of its object-valued
//!   children bound to a non-association class becomes a [`ReferenceRule`].

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::{ClassDef, ClassModel, ModelIndex, PropertyDef, PropertyKind};
use crate::mapping::{
    AssociationRule, AugmentationRule, Cardinality, Endpoint, MappingDescriptor, ObjectRule, PolymorphismPolicy,
    ReferenceRule, ScalarProp, ValueKind,
};
use crate::namespace::{local_name, naming, prefix_of};

/// Knobs of descriptor generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    /// Classes whose descendants are associations.
    pub association_bases: Vec<String>,
    /// Local-name suffix of augmentation classes.
    pub augmentation_suffix: String,
    pub polymorphism: PolymorphismPolicy,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            association_bases: crate::config::DEFAULT_ASSOCIATION_BASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            augmentation_suffix: crate::config::DEFAULT_AUGMENTATION_SUFFIX.to_string(),
            polymorphism: PolymorphismPolicy::default(),
        }
    }
}

/// A generated descriptor and the oddities found along the way.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub descriptor: MappingDescriptor,
    pub warnings: Vec<String>,
}

/// Generate a mapping descriptor.
pub fn generate(model: &ClassModel, options: &GeneratorOptions) -> Generation {
    Generator::new(model, options).run()
}

struct Generator<'a> {
    model: &'a ClassModel,
    options: &'a GeneratorOptions,
    index: ModelIndex<'a>,
    skipped: HashSet<&'a str>,
    warnings: Vec<String>,
}

impl<'a> Generator<'a> {
    fn new(model: &'a ClassModel, options: &'a GeneratorOptions) -> Self {
        Self {
            model,
            options,
            index: model.index(),
            skipped: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    fn run(mut self) -> Generation {
        let mut descriptor = MappingDescriptor {
            polymorphism: self.options.polymorphism,
            ..Default::default()
        };

        let model = self.model;
        let mut classes = Vec::new();
        for class in &model.classes {
            if self.is_resolvable(&class.qname) {
                classes.push(class);
            } else {
                self.skipped.insert(class.qname.as_str());
                self.warn(format!(
                    "class '{}' has no resolvable qualified name, skipped",
                    class.qname
                ));
            }
        }

        for class in classes {
            if local_name(&class.qname).ends_with(&self.options.augmentation_suffix) {
                descriptor.augmentations.push(AugmentationRule {
                    qname: class.qname.clone(),
                    elements: self.elements_of(class),
                });
            } else if self.is_association(class) {
                let rule = self.association_rule(class);
                descriptor.associations.push(rule);
            } else {
                let (rule, references) = self.object_rule(class);
                descriptor.objects.push(rule);
                descriptor.references.extend(references);
            }
        }

        let used = used_prefixes(&descriptor);
        descriptor.namespaces = model.namespaces.clone();
        descriptor.namespaces.retain_prefixes(&used);

        tracing::info!(
            objects = descriptor.objects.len(),
            associations = descriptor.associations.len(),
            references = descriptor.references.len(),
            augmentations = descriptor.augmentations.len(),
            "generated mapping descriptor"
        );

        Generation {
            descriptor,
            warnings: self.warnings,
        }
    }

    fn is_resolvable(&self, qname: &str) -> bool {
        !local_name(qname).is_empty() && self.model.namespaces.is_resolvable(qname)
    }

    /// Whether the class or any ancestor is an association base.
    fn is_association(&self, class: &ClassDef) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(class.qname.as_str());
        while let Some(qname) = current {
            if !seen.insert(qname) {
                break;
            }
            if self.options.association_bases.iter().any(|b| b == qname) {
                return true;
            }
            current = self.index.class(qname).and_then(|c| c.parent.as_deref());
        }
        false
    }

    fn is_association_qname(&self, qname: &str) -> bool {
        self.index.class(qname).is_some_and(|c| self.is_association(c))
    }

    /// Child properties including inherited ones, ancestors first.
    fn all_children(&self, class: &'a ClassDef) -> Vec<(&'a super::ChildProperty, Option<&'a PropertyDef>)> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(class);
        while let Some(c) = current {
            if !seen.insert(c.qname.as_str()) {
                break;
            }
            chain.push(c);
            current = c.parent.as_deref().and_then(|p| self.index.class(p));
        }

        let mut listed = HashSet::new();
        let mut children = Vec::new();
        for c in chain.into_iter().rev() {
            for child in &c.children {
                if listed.insert(child.property.as_str()) {
                    children.push((child, self.index.property(&child.property)));
                }
            }
        }
        children
    }

    /// The class qname plus every object property bound to the class.
    fn elements_of(&self, class: &ClassDef) -> Vec<String> {
        let mut elements = vec![class.qname.clone()];
        for property in &self.model.properties {
            if property.class() == Some(class.qname.as_str()) && !elements.contains(&property.qname) {
                elements.push(property.qname.clone());
            }
        }
        elements
    }

    /// Label of the class bound to an object property, or of the property itself.
    fn target_label(&self, property: &PropertyDef) -> String {
        match property.class() {
            Some(class) if !self.skipped.contains(class) && self.is_resolvable(class) => naming::label(class),
            _ => naming::label(&property.qname),
        }
    }

    fn object_rule(&mut self, class: &'a ClassDef) -> (ObjectRule, Vec<ReferenceRule>) {
        let mut rule = ObjectRule::new(class.qname.clone()).with_elements(self.elements_of(class));
        let mut references = Vec::new();

        for (child, property) in self.all_children(class) {
            let Some(property) = property else {
                self.warn(format!(
                    "class '{}' lists undefined property '{}'",
                    class.qname, child.property
                ));
                continue;
            };

            match &property.kind {
                PropertyKind::Data { datatype } => {
                    let path = if property.attribute {
                        format!("@{}", property.qname)
                    } else {
                        property.qname.clone()
                    };
                    rule = rule.with_scalar_prop(ScalarProp {
                        key: path.clone(),
                        path,
                        kind: datatype.as_deref().map(ValueKind::from_datatype).unwrap_or_default(),
                    });
                }
                PropertyKind::Object { class: target } => {
                    if target.as_deref().is_some_and(|t| self.is_association_qname(t)) {
                        continue;
                    }
                    references.push(ReferenceRule {
                        owner: class.qname.clone(),
                        field_qname: property.qname.clone(),
                        target_label: self.target_label(property),
                        rel_type: naming::rel_type(&property.qname),
                        cardinality: Cardinality::from_bounds(child.min.as_deref(), child.max.as_deref()),
                    });
                }
            }
        }

        (rule, references)
    }

    fn association_rule(&mut self, class: &'a ClassDef) -> AssociationRule {
        let mut rule = AssociationRule::new(class.qname.clone()).with_elements(self.elements_of(class));

        for (child, property) in self.all_children(class) {
            let Some(property) = property.filter(|p| p.is_object()) else {
                continue;
            };
            rule = rule.with_endpoint(Endpoint {
                role_qname: property.qname.clone(),
                target_label: self.target_label(property),
                cardinality: Cardinality::from_bounds(child.min.as_deref(), child.max.as_deref()),
            });
        }

        let is_base = self.options.association_bases.contains(&class.qname);
        if rule.endpoints.len() < 2 && !is_base {
            self.warn(format!(
                "association '{}' has {} role(s), edges need two",
                class.qname,
                rule.endpoints.len()
            ));
        }
        rule
    }
}

/// Prefixes of every qname the descriptor mentions.
fn used_prefixes(descriptor: &MappingDescriptor) -> BTreeSet<String> {
    let mut qnames: Vec<&str> = Vec::new();
    for rule in &descriptor.objects {
        qnames.push(&rule.qname);
        qnames.extend(rule.elements.iter().map(String::as_str));
        qnames.extend(rule.scalar_props.iter().map(|p| p.path.trim_start_matches('@')));
    }
    for rule in &descriptor.associations {
        qnames.push(&rule.qname);
        qnames.extend(rule.elements.iter().map(String::as_str));
        qnames.extend(rule.endpoints.iter().map(|e| e.role_qname.as_str()));
    }
    for rule in &descriptor.references {
        qnames.push(&rule.owner);
        qnames.push(&rule.field_qname);
    }
    for rule in &descriptor.augmentations {
        qnames.extend(rule.elements.iter().map(String::as_str));
    }

    qnames
        .into_iter()
        .filter_map(prefix_of)
        .map(str::to_string)
        .collect()
}
