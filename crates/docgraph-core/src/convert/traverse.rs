//! Depth-first traversal of one document.

use crate::config::TEXT_PROPERTY_KEY;
use crate::document::{Document, Element, XName, STRUCTURES_NAMESPACE};
use crate::graph::identity::{IdentityTag, Synthesizer, ROOT_PARENT};
use crate::graph::{append_property, ConflictPolicy, EdgeEnd, EdgeKind, GraphEdge, GraphNode, PropertyGraph, PropertyMap};
use crate::mapping::{DescriptorIndex, ObjectRule, PolymorphismPolicy};
use crate::namespace::naming::{self, FALLBACK_LABEL};
use crate::namespace::{split_qname, QNameResolver};

use super::context::{ConversionContext, OrdinalScope};
use super::decision::{decide, Decision, ElementShape};
use super::{ConversionMode, ConversionOutcome, ConversionReport, Converter};

/// Configured attribute names such as `structures:id` or `id`.
///
/// An unprefixed name matches only attributes in no namespace. A prefixed
/// name matches the same prefix as written, and `structures:` also matches
/// any prefix bound to a structures namespace.
#[derive(Debug)]
struct AttributeNames {
    names: Vec<(Option<String>, String)>,
}

impl AttributeNames {
    fn new(configured: &[String]) -> Self {
        let names = configured
            .iter()
            .map(|qname| {
                let (prefix, local) = split_qname(qname);
                (prefix.map(str::to_string), local.to_string())
            })
            .collect();
        Self { names }
    }

    fn matches(&self, name: &XName) -> bool {
        self.names.iter().any(|(prefix, local)| {
            if *local != name.local {
                return false;
            }
            match prefix.as_deref() {
                None => name.prefix.is_none() && name.namespace.is_none(),
                Some(p) => {
                    name.prefix.as_deref() == Some(p)
                        || (p == "structures" && name.namespace.as_deref().is_some_and(is_structures_namespace))
                }
            }
        })
    }

    /// Trimmed, non-empty value of the first matching attribute.
    fn find<'e>(&self, element: &'e Element) -> Option<&'e str> {
        element
            .find_attribute(|name| self.matches(name))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

fn is_structures_namespace(uri: &str) -> bool {
    uri == STRUCTURES_NAMESPACE || uri.contains("/structures/")
}

/// The node whose subtree is being walked.
struct Owner<'c> {
    end: EdgeEnd,
    rule: Option<&'c ObjectRule>,
}

/// Where flattened leaves go: a node's properties or an association edge's.
struct Sink<'c> {
    properties: PropertyMap,
    rule: Option<&'c ObjectRule>,
}

pub(super) struct Walker<'c> {
    index: &'c DescriptorIndex,
    document: &'c Document,
    mode: ConversionMode,
    policy: ConflictPolicy,
    ids: AttributeNames,
    refs: AttributeNames,
    resolver: QNameResolver<'c>,
    synthesizer: Synthesizer,
    graph: PropertyGraph,
    report: ConversionReport,
}

impl<'c> Walker<'c> {
    pub(super) fn new(converter: &'c Converter, document: &'c Document) -> Self {
        let options = converter.options();
        let index = converter.index();
        let tag = IdentityTag::for_document(options.batch_tag.as_deref(), &document.digest);

        Self {
            index,
            document,
            mode: options.mode,
            policy: options.conflict_policy,
            ids: AttributeNames::new(&options.id_attributes),
            refs: AttributeNames::new(&options.ref_attributes),
            resolver: QNameResolver::new(&document.namespaces, index.namespaces()),
            synthesizer: Synthesizer::new(tag),
            graph: PropertyGraph::new(),
            report: ConversionReport::default(),
        }
    }

    pub(super) fn run(mut self) -> ConversionOutcome {
        let document = self.document;
        let root = &document.root;
        let qname = self.resolver.qualify(&root.name);

        let mut ctx = ConversionContext::new();
        ctx.push(&qname, 0);

        // an association root has no enclosing node; anything else becomes the top node
        match decide(&qname, &self.shape(root, true), self.index, self.mode) {
            Decision::Associate => self.associate(root, &qname, None, &mut ctx),
            decision => {
                if decision != Decision::Promote {
                    tracing::debug!(key = %document.key, %qname, ?decision, "document root promoted");
                }
                self.promote(root, &qname, None, ctx.ordinal_path());
            }
        }

        self.finish()
    }

    fn finish(mut self) -> ConversionOutcome {
        self.graph.resolve_fallback_labels();

        for edge in self.graph.dangling_edges() {
            tracing::debug!(
                key = %self.document.key,
                source = %edge.source.identity,
                target = %edge.target.identity,
                rel_type = %edge.rel_type,
                "dangling {} edge", edge.kind
            );
        }

        let stats = self.graph.stats();
        self.report.documents = 1;
        self.report.nodes = stats.nodes;
        self.report.containment_edges = stats.containment;
        self.report.association_edges = stats.association;
        self.report.reference_edges = stats.reference;
        self.report.dangling_references = self
            .graph
            .dangling_edges()
            .filter(|e| e.kind == EdgeKind::Reference)
            .count();
        self.report.synthetic_namespaces = self.resolver.synthetic_bindings();

        ConversionOutcome {
            graph: self.graph,
            report: self.report,
        }
    }

    fn shape(&self, element: &Element, is_root: bool) -> ElementShape {
        ElementShape {
            is_root,
            has_children: element.has_children(),
            has_id: self.ids.find(element).is_some(),
            has_ref: self.refs.find(element).is_some(),
            ref_children: element
                .children
                .iter()
                .filter(|c| self.refs.find(c).is_some())
                .count(),
        }
    }

    fn seen_label(&self, identity: &str) -> String {
        self.graph
            .node(identity)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| FALLBACK_LABEL.to_string())
    }

    /// Register `element` as a node and walk its subtree.
    fn promote(&mut self, element: &Element, qname: &str, parent: Option<&Owner<'c>>, ordinal_path: String) {
        let index = self.index;
        let rule = index.object(qname);

        let carries_id = self.mode == ConversionMode::Dynamic || rule.map_or(true, |r| r.carries_id);
        let carried = if carries_id { self.ids.find(element) } else { None };
        let identity = match carried {
            Some(id) => id.to_string(),
            None => {
                let parent_identity = parent.map_or(ROOT_PARENT, |p| p.end.identity.as_str());
                self.synthesizer.synthesize(parent_identity, qname, &ordinal_path)
            }
        };
        let label = rule.map_or_else(|| naming::label(qname), |r| r.label.clone());

        self.graph
            .upsert_node(GraphNode::new(identity.as_str(), label.as_str(), qname), self.policy);

        if let Some(parent) = parent {
            self.graph.push_edge(GraphEdge::new(
                EdgeKind::Containment,
                naming::containment_type(qname),
                parent.end.clone(),
                EdgeEnd::new(identity.as_str(), label.as_str()),
            ));
        }

        let owner = Owner {
            end: EdgeEnd::new(identity, label),
            rule,
        };
        let mut sink = Sink {
            properties: PropertyMap::new(),
            rule,
        };
        let mut ctx = ConversionContext::new();

        self.collect_leaves(element, &mut sink, &ctx);
        self.visit_children(element, Some(&owner), &mut sink, &mut ctx, &[], &[]);

        let node = GraphNode::new(owner.end.identity, owner.end.label, qname).with_properties(sink.properties);
        let conflicts = self.graph.upsert_node(node, self.policy);
        for conflict in &conflicts {
            tracing::debug!(
                identity = %conflict.identity,
                key = %conflict.key,
                "conflicting value for merged node"
            );
        }
        self.report.conflicts.extend(conflicts);
    }

    fn visit_children(
        &mut self,
        element: &Element,
        owner: Option<&Owner<'c>>,
        sink: &mut Sink<'c>,
        ctx: &mut ConversionContext,
        skip: &[usize],
        roles: &[usize],
    ) {
        let mut ordinals = OrdinalScope::default();

        for (position, child) in element.children.iter().enumerate() {
            let qname = self.resolver.qualify(&child.name);
            let ordinal = ordinals.next(&qname);
            if skip.contains(&position) {
                continue;
            }

            ctx.push(&qname, ordinal);
            let shape = self.shape(child, false);
            let decision = decide(&qname, &shape, self.index, self.mode);

            // a referencing element with content still points at its target
            let is_role = roles.contains(&position);
            if shape.has_ref && !is_role && matches!(decision, Decision::Promote | Decision::Flatten) {
                if let Some(owner) = owner {
                    self.reference(child, &qname, owner, ctx.depth() == 1);
                }
            }

            match decision {
                Decision::Promote => self.promote(child, &qname, owner, ctx.ordinal_path()),
                Decision::Associate => self.associate(child, &qname, owner, ctx),
                Decision::Reference => match owner {
                    Some(owner) => self.reference(child, &qname, owner, ctx.depth() == 1),
                    None => tracing::debug!(%qname, "reference without an owning node skipped"),
                },
                Decision::Flatten => {
                    self.collect_leaves(child, sink, ctx);
                    self.visit_children(child, owner, sink, ctx, &[], &[]);
                }
            }
            ctx.pop();
        }
    }

    /// Attributes and text of one element into the sink.
    fn collect_leaves(&mut self, element: &Element, sink: &mut Sink<'c>, ctx: &ConversionContext) {
        for attr in &element.attributes {
            if self.ids.matches(&attr.name) || self.refs.matches(&attr.name) {
                continue;
            }
            if attr.name.is_xsi_type() && self.index.polymorphism() == PolymorphismPolicy::DeclaredOnly {
                continue;
            }
            let attr_qname = self.resolver.qualify(&attr.name);
            self.leaf(sink, ctx, Some(&attr_qname), &attr.value);
        }

        if let Some(text) = element.text() {
            self.leaf(sink, ctx, None, text);
        }
    }

    fn leaf(&self, sink: &mut Sink<'c>, ctx: &ConversionContext, attribute: Option<&str>, value: &str) {
        let index = self.index;
        let path = ctx.relative_path(attribute);
        let typed = sink.rule.and_then(|rule| index.scalar_prop(rule, &path));

        match typed {
            Some(prop) => append_property(&mut sink.properties, prop.key.clone(), prop.kind.coerce(value)),
            None => {
                let key = ctx.property_key(attribute);
                let key = if key.is_empty() { TEXT_PROPERTY_KEY.to_string() } else { key };
                append_property(&mut sink.properties, key, value.into());
            }
        }
    }

    /// Turn an association element into one edge between its first two endpoints.
    fn associate(
        &mut self,
        element: &Element,
        qname: &str,
        owner: Option<&Owner<'c>>,
        ctx: &mut ConversionContext,
    ) {
        let index = self.index;
        let rule = index.association(qname);

        let mut endpoints = Vec::new();
        // roles already bound to an endpoint
        let mut matched = Vec::new();
        // ref-only roles, not walked afterwards
        let mut consumed = Vec::new();

        match rule {
            Some(rule) => {
                for endpoint in &rule.endpoints {
                    let role = element.children.iter().enumerate().find(|(position, child)| {
                        !matched.contains(position) && self.resolver.qualify(&child.name) == endpoint.role_qname
                    });
                    let Some((position, child)) = role else { continue };
                    matched.push(position);
                    if !child.has_children() {
                        consumed.push(position);
                    }
                    if let Some(id) = self.refs.find(child).or_else(|| self.ids.find(child)) {
                        endpoints.push(EdgeEnd::new(id, endpoint.target_label.as_str()));
                    }
                }
            }
            None => {
                for (position, child) in element.children.iter().enumerate() {
                    if let Some(id) = self.refs.find(child) {
                        endpoints.push(EdgeEnd::new(id, self.seen_label(id)));
                        matched.push(position);
                        if !child.has_children() {
                            consumed.push(position);
                        }
                    }
                }
            }
        }

        let saved = ctx.rebase();
        let mut edge_sink = Sink {
            properties: PropertyMap::new(),
            rule: None,
        };
        self.collect_leaves(element, &mut edge_sink, ctx);
        self.visit_children(element, owner, &mut edge_sink, ctx, &consumed, &matched);
        ctx.restore(saved);

        let mut ends = endpoints.into_iter();
        let (Some(source), Some(target)) = (ends.next(), ends.next()) else {
            tracing::debug!(
                key = %self.document.key,
                %qname,
                "association with fewer than two resolvable endpoints skipped"
            );
            self.report.skipped_associations += 1;
            return;
        };

        let rel_type = rule.map_or_else(|| naming::rel_type(qname), |r| r.rel_type.clone());
        self.graph.push_edge(
            GraphEdge::new(EdgeKind::Association, rel_type, source, target).with_properties(edge_sink.properties),
        );
    }

    /// Edge from the owning node to the referenced identity.
    fn reference(&mut self, element: &Element, qname: &str, owner: &Owner<'c>, direct: bool) {
        let Some(target) = self.refs.find(element) else {
            return;
        };

        let index = self.index;
        let rule = if direct {
            owner.rule.and_then(|r| index.reference(&r.qname, qname))
        } else {
            None
        };

        let (rel_type, label) = match rule {
            Some(r) => (r.rel_type.clone(), r.target_label.clone()),
            None => (naming::containment_type(qname), self.seen_label(target)),
        };

        self.graph.push_edge(GraphEdge::new(
            EdgeKind::Reference,
            rel_type,
            owner.end.clone(),
            EdgeEnd::new(target, label),
        ));
    }
}
