//! Two-phase construction of (possibly recursive) types.
//!
//! Pending types are declared first and wired together by handle, which is
//! what allows a type to mention itself or a type declared after it.
//! [`TypeBuilder::build`] then validates every pending type at once and
//! interns the survivors into the shared arena.

use std::collections::{HashMap, HashSet};

use crate::error::{BuildErrors, TypeError};
use crate::vtype::{ARENA, Field, Kind, Type, TypeData};

/// Handle to a type declared in a [`TypeBuilder`] but not yet built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingType(usize);

/// A reference to either an already built type or a pending one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeOrPending {
    Type(Type),
    Pending(PendingType),
}

impl From<Type> for TypeOrPending {
    fn from(t: Type) -> Self {
        TypeOrPending::Type(t)
    }
}

impl From<PendingType> for TypeOrPending {
    fn from(p: PendingType) -> Self {
        TypeOrPending::Pending(p)
    }
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    kind: Option<Kind>,
    base: Option<TypeOrPending>,
    labels: Vec<String>,
    len: usize,
    elem: Option<TypeOrPending>,
    key: Option<TypeOrPending>,
    fields: Vec<(String, TypeOrPending)>,
}

/// The resolved description of one pending node: named nodes take the shape
/// of their base under their own name.
#[derive(Debug, Clone)]
struct Shape {
    name: String,
    kind: Kind,
    labels: Vec<String>,
    len: usize,
    elem: Option<TypeOrPending>,
    key: Option<TypeOrPending>,
    fields: Vec<(String, TypeOrPending)>,
}

impl Shape {
    fn of_type(t: Type, name: String) -> Shape {
        let data = t.data();
        Shape {
            name,
            kind: data.kind,
            labels: data.labels.clone(),
            len: data.len,
            elem: data.elem.map(TypeOrPending::Type),
            key: data.key.map(TypeOrPending::Type),
            fields: data
                .fields
                .iter()
                .map(|f| (f.name.clone(), TypeOrPending::Type(f.ty)))
                .collect(),
        }
    }

    fn refs(&self) -> impl Iterator<Item = TypeOrPending> + '_ {
        self.elem
            .iter()
            .chain(self.key.iter())
            .chain(self.fields.iter().map(|(_, r)| r))
            .copied()
    }
}

#[derive(Debug, Default)]
pub struct TypeBuilder {
    nodes: Vec<Node>,
    results: Option<Vec<Result<Type, TypeError>>>,
}

impl TypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: String, kind: Option<Kind>) -> PendingType {
        self.results = None;
        self.nodes.push(Node { name, kind, ..Node::default() });
        PendingType(self.nodes.len() - 1)
    }

    fn node(&mut self, p: PendingType) -> Option<&mut Node> {
        self.results = None;
        self.nodes.get_mut(p.0)
    }

    /// Declares a named type whose structure comes from a base assigned
    /// later with [`assign_base`](Self::assign_base).
    pub fn named(&mut self, name: impl Into<String>) -> PendingType {
        self.add(name.into(), None)
    }

    pub fn enum_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Enum))
    }

    pub fn array_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Array))
    }

    pub fn list_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::List))
    }

    pub fn set_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Set))
    }

    pub fn map_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Map))
    }

    pub fn struct_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Struct))
    }

    pub fn union_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Union))
    }

    pub fn optional_type(&mut self) -> PendingType {
        self.add(String::new(), Some(Kind::Optional))
    }

    /// Names a structural pending type in place.
    pub fn set_name(&mut self, p: PendingType, name: impl Into<String>) {
        if let Some(node) = self.node(p) {
            node.name = name.into();
        }
    }

    pub fn assign_base(&mut self, p: PendingType, base: impl Into<TypeOrPending>) {
        if let Some(node) = self.node(p) {
            node.base = Some(base.into());
        }
    }

    pub fn assign_elem(&mut self, p: PendingType, elem: impl Into<TypeOrPending>) {
        if let Some(node) = self.node(p) {
            node.elem = Some(elem.into());
        }
    }

    pub fn assign_key(&mut self, p: PendingType, key: impl Into<TypeOrPending>) {
        if let Some(node) = self.node(p) {
            node.key = Some(key.into());
        }
    }

    pub fn assign_len(&mut self, p: PendingType, len: usize) {
        if let Some(node) = self.node(p) {
            node.len = len;
        }
    }

    pub fn append_label(&mut self, p: PendingType, label: impl Into<String>) {
        if let Some(node) = self.node(p) {
            node.labels.push(label.into());
        }
    }

    pub fn append_field(&mut self, p: PendingType, name: impl Into<String>, ty: impl Into<TypeOrPending>) {
        if let Some(node) = self.node(p) {
            node.fields.push((name.into(), ty.into()));
        }
    }

    /// Returns the built type for `p`, or the error that prevented it.
    pub fn built(&self, p: PendingType) -> Result<Type, TypeError> {
        let results = self.results.as_ref().ok_or(TypeError::NotBuilt)?;
        results.get(p.0).cloned().unwrap_or(Err(TypeError::UnknownPending(p.0)))
    }

    /// Validates and interns every pending type. All structural errors found
    /// are reported; types depending on a failed type fail with
    /// [`TypeError::Dependency`].
    pub fn build(&mut self) -> Result<(), BuildErrors> {
        let n = self.nodes.len();
        let mut errors: Vec<Option<TypeError>> = vec![None; n];
        let mut shapes: Vec<Option<Shape>> = Vec::with_capacity(n);
        for i in 0..n {
            match self.resolve(i, &mut Vec::new()) {
                Ok(shape) => shapes.push(Some(shape)),
                Err(err) => {
                    errors[i] = Some(err);
                    shapes.push(None);
                }
            }
        }
        for i in 0..n {
            if let Some(shape) = &shapes[i] {
                if let Err(err) = validate(shape, &shapes) {
                    errors[i] = Some(err);
                }
            }
        }
        propagate(&shapes, &mut errors);
        self.check_cycles(&shapes, &mut errors);
        propagate(&shapes, &mut errors);

        let mut uniques: Vec<Option<String>> = vec![None; n];
        for i in 0..n {
            if errors[i].is_none() {
                let mut out = String::new();
                write_unique(TypeOrPending::Pending(PendingType(i)), &shapes, &mut HashSet::new(), &mut out);
                uniques[i] = Some(out);
            }
        }
        let assigned = intern(&shapes, &uniques);

        let mut results = Vec::with_capacity(n);
        let mut reported = Vec::new();
        for i in 0..n {
            match (&errors[i], assigned[i]) {
                (Some(err), _) => {
                    if !matches!(err, TypeError::Dependency { .. }) {
                        reported.push(err.clone());
                    }
                    results.push(Err(err.clone()));
                }
                (None, Some(t)) => results.push(Ok(t)),
                (None, None) => {
                    let name = self.nodes[i].name.clone();
                    let err = TypeError::Unresolved(name);
                    reported.push(err.clone());
                    results.push(Err(err));
                }
            }
        }
        self.results = Some(results);
        if reported.is_empty() {
            Ok(())
        } else {
            Err(BuildErrors(reported))
        }
    }

    fn resolve(&self, i: usize, visiting: &mut Vec<usize>) -> Result<Shape, TypeError> {
        let node = &self.nodes[i];
        if let Some(kind) = node.kind {
            return Ok(Shape {
                name: node.name.clone(),
                kind,
                labels: node.labels.clone(),
                len: node.len,
                elem: node.elem,
                key: node.key,
                fields: node.fields.clone(),
            });
        }
        match node.base {
            None => Err(TypeError::Unresolved(node.name.clone())),
            Some(TypeOrPending::Type(t)) => Ok(Shape::of_type(t, node.name.clone())),
            Some(TypeOrPending::Pending(p)) => {
                if p.0 >= self.nodes.len() {
                    return Err(TypeError::UnknownPending(p.0));
                }
                if visiting.contains(&i) {
                    return Err(TypeError::NamedBaseCycle(node.name.clone()));
                }
                visiting.push(i);
                let mut shape = self.resolve(p.0, visiting)?;
                shape.name = node.name.clone();
                Ok(shape)
            }
        }
    }

    fn check_cycles(&self, shapes: &[Option<Shape>], errors: &mut [Option<TypeError>]) {
        let n = shapes.len();
        let mut unnamed = vec![Vec::new(); n];
        let mut strict = vec![Vec::new(); n];
        for (i, shape) in shapes.iter().enumerate() {
            let Some(shape) = shape else { continue };
            for r in shape.refs() {
                let TypeOrPending::Pending(p) = r else { continue };
                let Some(Some(target)) = shapes.get(p.0) else { continue };
                if shape.name.is_empty() && target.name.is_empty() {
                    unnamed[i].push(p.0);
                }
                if !shape.kind.breaks_cycles() {
                    strict[i].push(p.0);
                }
            }
        }
        for (i, cyclic) in cyclic_nodes(&unnamed).into_iter().enumerate() {
            if cyclic && errors[i].is_none() {
                errors[i] = Some(TypeError::UnnamedCycle(describe(shapes[i].as_ref())));
            }
        }
        for (i, cyclic) in cyclic_nodes(&strict).into_iter().enumerate() {
            if cyclic && errors[i].is_none() {
                errors[i] = Some(TypeError::InfiniteCycle(describe(shapes[i].as_ref())));
            }
        }
    }
}

fn describe(shape: Option<&Shape>) -> String {
    match shape {
        Some(s) if !s.name.is_empty() => s.name.clone(),
        Some(s) => s.kind.to_string(),
        None => String::new(),
    }
}

fn ref_kind(r: TypeOrPending, shapes: &[Option<Shape>]) -> Option<Kind> {
    match r {
        TypeOrPending::Type(t) => Some(t.kind()),
        TypeOrPending::Pending(p) => shapes.get(p.0).and_then(|s| s.as_ref()).map(|s| s.kind),
    }
}

fn validate(shape: &Shape, shapes: &[Option<Shape>]) -> Result<(), TypeError> {
    let name = &shape.name;
    if !name.is_empty() && matches!(shape.kind, Kind::Any | Kind::TypeObject) {
        return Err(TypeError::Unnameable(shape.kind.as_str()));
    }
    let missing = |part| TypeError::MissingPart { name: name.clone(), kind: shape.kind.as_str(), part };
    if shape.kind.has_elem() && shape.elem.is_none() {
        return Err(missing("elem"));
    }
    if shape.kind.has_key() && shape.key.is_none() {
        return Err(missing("key"));
    }
    for r in shape.refs() {
        if let TypeOrPending::Pending(p) = r {
            if p.0 >= shapes.len() {
                return Err(TypeError::UnknownPending(p.0));
            }
        }
    }
    match shape.kind {
        Kind::Enum => {
            if shape.labels.is_empty() {
                return Err(TypeError::EmptyEnum(name.clone()));
            }
            let mut seen = HashSet::new();
            for label in &shape.labels {
                if label.is_empty() {
                    return Err(TypeError::EmptyLabel { name: name.clone() });
                }
                if !seen.insert(label) {
                    return Err(TypeError::DuplicateLabel { name: name.clone(), label: label.clone() });
                }
            }
        }
        Kind::Struct | Kind::Union => {
            if shape.kind == Kind::Union && shape.fields.is_empty() {
                return Err(TypeError::EmptyUnion(name.clone()));
            }
            let mut seen = HashSet::new();
            for (field, _) in &shape.fields {
                if field.is_empty() {
                    return Err(TypeError::EmptyFieldName { name: name.clone() });
                }
                if !seen.insert(field) {
                    return Err(TypeError::DuplicateField { name: name.clone(), field: field.clone() });
                }
            }
        }
        Kind::Optional => {
            if let Some(elem) = shape.elem {
                match ref_kind(elem, shapes) {
                    Some(Kind::Struct) | None => {}
                    Some(kind) => return Err(TypeError::OptionalElem(kind.to_string())),
                }
            }
        }
        Kind::Set | Kind::Map => {
            if let Some(key) = shape.key {
                if let Some(kind) = ref_kind(key, shapes) {
                    if matches!(
                        kind,
                        Kind::Any | Kind::Optional | Kind::TypeObject | Kind::List | Kind::Set | Kind::Map
                    ) {
                        return Err(TypeError::InvalidKey(kind.to_string()));
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Marks every node that depends on a failed node as failed, to a fixpoint.
fn propagate(shapes: &[Option<Shape>], errors: &mut [Option<TypeError>]) {
    loop {
        let mut changed = false;
        for i in 0..shapes.len() {
            if errors[i].is_some() {
                continue;
            }
            let Some(shape) = &shapes[i] else { continue };
            let cause = shape.refs().find_map(|r| match r {
                TypeOrPending::Pending(p) => errors.get(p.0).cloned().flatten(),
                TypeOrPending::Type(_) => None,
            });
            if let Some(cause) = cause {
                let cause = match cause {
                    TypeError::Dependency { cause, .. } => cause,
                    other => Box::new(other),
                };
                errors[i] = Some(TypeError::Dependency { name: describe(Some(shape)), cause });
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
}

/// Returns, per node, whether it lies on a cycle of `edges` (Tarjan SCC).
fn cyclic_nodes(edges: &[Vec<usize>]) -> Vec<bool> {
    struct State<'a> {
        edges: &'a [Vec<usize>],
        index: Vec<Option<usize>>,
        low: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        next: usize,
        cyclic: Vec<bool>,
    }

    fn visit(s: &mut State<'_>, v: usize) {
        s.index[v] = Some(s.next);
        s.low[v] = s.next;
        s.next += 1;
        s.stack.push(v);
        s.on_stack[v] = true;
        let edges = s.edges;
        for &w in &edges[v] {
            match s.index[w] {
                None => {
                    visit(s, w);
                    s.low[v] = s.low[v].min(s.low[w]);
                }
                Some(iw) if s.on_stack[w] => s.low[v] = s.low[v].min(iw),
                Some(_) => {}
            }
        }
        if Some(s.low[v]) == s.index[v] {
            let mut component = Vec::new();
            while let Some(w) = s.stack.pop() {
                s.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            let looped = component.len() > 1 || edges[v].contains(&v);
            if looped {
                for w in component {
                    s.cyclic[w] = true;
                }
            }
        }
    }

    let n = edges.len();
    let mut s = State {
        edges,
        index: vec![None; n],
        low: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next: 0,
        cyclic: vec![false; n],
    };
    for v in 0..n {
        if s.index[v].is_none() {
            visit(&mut s, v);
        }
    }
    s.cyclic
}

/// Writes the canonical description of `r`. A named type is spelled out the
/// first time it appears and by name afterwards, which keeps descriptions of
/// recursive types finite.
fn write_unique(r: TypeOrPending, shapes: &[Option<Shape>], seen: &mut HashSet<String>, out: &mut String) {
    let shape = match r {
        TypeOrPending::Type(t) => Shape::of_type(t, t.name().to_string()),
        TypeOrPending::Pending(p) => match shapes.get(p.0) {
            Some(Some(s)) => s.clone(),
            _ => return,
        },
    };
    if !shape.name.is_empty() {
        out.push_str(&shape.name);
        if !seen.insert(shape.name.clone()) {
            return;
        }
        out.push(' ');
    }
    let mut sub = |r: Option<TypeOrPending>, out: &mut String| {
        if let Some(r) = r {
            write_unique(r, shapes, seen, out);
        }
    };
    match shape.kind {
        Kind::Enum => {
            out.push_str("enum{");
            out.push_str(&shape.labels.join(";"));
            out.push('}');
        }
        Kind::Array => {
            out.push_str(&format!("[{}]", shape.len));
            sub(shape.elem, out);
        }
        Kind::List => {
            out.push_str("[]");
            sub(shape.elem, out);
        }
        Kind::Set => {
            out.push_str("set[");
            sub(shape.key, out);
            out.push(']');
        }
        Kind::Map => {
            out.push_str("map[");
            sub(shape.key, out);
            out.push(']');
            sub(shape.elem, out);
        }
        Kind::Optional => {
            out.push('?');
            sub(shape.elem, out);
        }
        Kind::Struct | Kind::Union => {
            out.push_str(shape.kind.as_str());
            out.push('{');
            for (i, (name, ty)) in shape.fields.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                out.push_str(name);
                out.push(' ');
                sub(Some(*ty), out);
            }
            out.push('}');
        }
        kind => out.push_str(kind.as_str()),
    }
}

/// Maps every valid node to an arena handle, reusing structurally identical
/// types and allocating the rest in one step under the arena lock.
fn intern(shapes: &[Option<Shape>], uniques: &[Option<String>]) -> Vec<Option<Type>> {
    let n = shapes.len();
    let mut assigned: Vec<Option<Type>> = vec![None; n];
    let mut arena = ARENA.write();
    let mut local: HashMap<&str, Type> = HashMap::new();
    let mut fresh = Vec::new();
    let mut next = arena.next_index();
    for i in 0..n {
        let Some(unique) = uniques[i].as_deref() else { continue };
        if let Some(t) = arena.lookup(unique).or_else(|| local.get(unique).copied()) {
            assigned[i] = Some(t);
        } else {
            let t = Type(next);
            next += 1;
            local.insert(unique, t);
            assigned[i] = Some(t);
            fresh.push(i);
        }
    }
    let resolve = |r: TypeOrPending| match r {
        TypeOrPending::Type(t) => Some(t),
        TypeOrPending::Pending(p) => assigned.get(p.0).copied().flatten(),
    };
    let mut datas = Vec::with_capacity(fresh.len());
    for &i in &fresh {
        let (Some(shape), Some(unique)) = (&shapes[i], &uniques[i]) else { continue };
        let mut fields = Vec::with_capacity(shape.fields.len());
        for (name, r) in &shape.fields {
            match resolve(*r) {
                Some(ty) => fields.push(Field { name: name.clone(), ty }),
                None => return vec![None; n],
            }
        }
        let (elem, key) = (shape.elem.and_then(resolve), shape.key.and_then(resolve));
        if shape.elem.is_some() != elem.is_some() || shape.key.is_some() != key.is_some() {
            return vec![None; n];
        }
        datas.push(TypeData {
            kind: shape.kind,
            name: shape.name.clone(),
            labels: shape.labels.clone(),
            len: shape.len,
            elem,
            key,
            fields,
            unique: unique.clone(),
        });
    }
    for data in datas {
        arena.push(data);
    }
    assigned
}

fn build_one(f: impl FnOnce(&mut TypeBuilder) -> PendingType) -> Result<Type, TypeError> {
    let mut b = TypeBuilder::new();
    let p = f(&mut b);
    // Errors for `p` itself are returned by `built` below.
    b.build().ok();
    b.built(p)
}

impl Type {
    pub fn list_of(elem: Type) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.list_type();
            b.assign_elem(p, elem);
            p
        })
    }

    pub fn array_of(len: usize, elem: Type) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.array_type();
            b.assign_len(p, len);
            b.assign_elem(p, elem);
            p
        })
    }

    pub fn set_of(key: Type) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.set_type();
            b.assign_key(p, key);
            p
        })
    }

    pub fn map_of(key: Type, elem: Type) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.map_type();
            b.assign_key(p, key);
            b.assign_elem(p, elem);
            p
        })
    }

    pub fn optional_of(elem: Type) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.optional_type();
            b.assign_elem(p, elem);
            p
        })
    }

    /// A named type with the structure of `base`.
    pub fn named(name: &str, base: Type) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.named(name);
            b.assign_base(p, base);
            p
        })
    }

    /// A struct type; `name` may be empty for an anonymous struct.
    pub fn struct_of(name: &str, fields: &[(&str, Type)]) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.struct_type();
            b.set_name(p, name);
            for (field, ty) in fields {
                b.append_field(p, *field, *ty);
            }
            p
        })
    }

    pub fn union_of(name: &str, fields: &[(&str, Type)]) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.union_type();
            b.set_name(p, name);
            for (field, ty) in fields {
                b.append_field(p, *field, *ty);
            }
            p
        })
    }

    pub fn enum_of(name: &str, labels: &[&str]) -> Result<Type, TypeError> {
        build_one(|b| {
            let p = b.enum_type();
            b.set_name(p, name);
            for label in labels {
                b.append_label(p, *label);
            }
            p
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_types_are_interned() {
        let a = Type::list_of(Type::INT64).unwrap();
        let b = Type::list_of(Type::INT64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "[]int64");
        let c = Type::list_of(Type::INT32).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_named_types_are_distinct_per_name() {
        let a = Type::named("builder.A", Type::INT64).unwrap();
        let b = Type::named("builder.B", Type::INT64).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, Type::INT64);
        assert_eq!(a.kind(), Kind::Int64);
        assert_eq!(a.to_string(), "builder.A int64");
        assert_eq!(a, Type::named("builder.A", Type::INT64).unwrap());
    }

    #[test]
    fn test_recursive_struct_through_list() {
        let mut b = TypeBuilder::new();
        let node = b.struct_type();
        b.set_name(node, "builder.Node");
        let children = b.list_type();
        b.assign_elem(children, node);
        b.append_field(node, "Value", Type::STRING);
        b.append_field(node, "Children", children);
        b.build().unwrap();
        let t = b.built(node).unwrap();
        assert_eq!(t.kind(), Kind::Struct);
        let children_t = t.field(1).unwrap().ty;
        assert_eq!(children_t.kind(), Kind::List);
        assert_eq!(children_t.elem(), t);
        assert_eq!(t.to_string(), "builder.Node struct{Value string;Children []builder.Node}");
    }

    #[test]
    fn test_recursive_struct_through_optional() {
        let mut b = TypeBuilder::new();
        let link = b.struct_type();
        b.set_name(link, "builder.Link");
        let next = b.optional_type();
        b.assign_elem(next, link);
        b.append_field(link, "Next", next);
        b.build().unwrap();
        let t = b.built(link).unwrap();
        assert_eq!(t.field(0).unwrap().ty.elem(), t);
    }

    #[test]
    fn test_mutual_recursion_through_map() {
        let mut b = TypeBuilder::new();
        let a = b.struct_type();
        b.set_name(a, "builder.MA");
        let bb = b.struct_type();
        b.set_name(bb, "builder.MB");
        let m = b.map_type();
        b.assign_key(m, Type::STRING);
        b.assign_elem(m, bb);
        b.append_field(a, "Kids", m);
        b.append_field(bb, "Parent", a);
        b.build().unwrap();
        let ta = b.built(a).unwrap();
        let tb = b.built(bb).unwrap();
        assert_eq!(ta.field(0).unwrap().ty.elem(), tb);
        assert_eq!(tb.field(0).unwrap().ty, ta);
    }

    #[test]
    fn test_struct_value_cycle_is_rejected() {
        let mut b = TypeBuilder::new();
        let a = b.struct_type();
        b.set_name(a, "builder.Inf");
        b.append_field(a, "Me", a);
        let errs = b.build().unwrap_err();
        assert!(matches!(errs.0[0], TypeError::InfiniteCycle(_)));
        assert!(matches!(b.built(a), Err(TypeError::InfiniteCycle(_))));
    }

    #[test]
    fn test_unnamed_cycle_is_rejected() {
        let mut b = TypeBuilder::new();
        let l = b.list_type();
        b.assign_elem(l, l);
        let errs = b.build().unwrap_err();
        assert!(matches!(errs.0[0], TypeError::UnnamedCycle(_)));
    }

    #[test]
    fn test_dependent_types_report_cause() {
        let mut b = TypeBuilder::new();
        let bad = b.enum_type();
        b.set_name(bad, "builder.Empty");
        let list = b.list_type();
        b.assign_elem(list, bad);
        let errs = b.build().unwrap_err();
        assert_eq!(errs.0, vec![TypeError::EmptyEnum("builder.Empty".into())]);
        match b.built(list) {
            Err(TypeError::Dependency { cause, .. }) => {
                assert_eq!(*cause, TypeError::EmptyEnum("builder.Empty".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reports_all_errors() {
        let mut b = TypeBuilder::new();
        let e = b.enum_type();
        b.append_label(e, "A");
        b.append_label(e, "A");
        let s = b.struct_type();
        b.append_field(s, "X", Type::BOOL);
        b.append_field(s, "X", Type::BOOL);
        let u = b.union_type();
        let errs = b.build().unwrap_err();
        assert_eq!(errs.0.len(), 3);
        assert!(b.built(u).is_err());
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(Type::optional_of(Type::INT64), Err(TypeError::OptionalElem(_))));
        assert!(matches!(Type::set_of(Type::ANY), Err(TypeError::InvalidKey(_))));
        assert!(matches!(Type::named("builder.X", Type::ANY), Err(TypeError::Unnameable(_))));
        let mut b = TypeBuilder::new();
        let n = b.named("builder.Loose");
        assert!(b.build().is_err());
        assert_eq!(b.built(n), Err(TypeError::Unresolved("builder.Loose".into())));
    }

    #[test]
    fn test_named_base_cycle() {
        let mut b = TypeBuilder::new();
        let x = b.named("builder.X1");
        let y = b.named("builder.Y1");
        b.assign_base(x, y);
        b.assign_base(y, x);
        assert!(b.build().is_err());
        assert!(matches!(b.built(x), Err(TypeError::NamedBaseCycle(_))));
    }

    #[test]
    fn test_base_from_another_builder() {
        let mut other = TypeBuilder::new();
        other.list_type();
        let foreign = other.list_type();
        let mut b = TypeBuilder::new();
        let n = b.named("builder.Foreign");
        b.assign_base(n, foreign);
        assert!(b.build().is_err());
        assert_eq!(b.built(n), Err(TypeError::UnknownPending(1)));
    }

    #[test]
    fn test_built_before_build() {
        let mut b = TypeBuilder::new();
        let p = b.list_type();
        assert_eq!(b.built(p), Err(TypeError::NotBuilt));
    }

    #[test]
    fn test_rebuild_reuses_existing_recursive_type() {
        let make = || {
            let mut b = TypeBuilder::new();
            let tree = b.struct_type();
            b.set_name(tree, "builder.Tree");
            let kids = b.list_type();
            b.assign_elem(kids, tree);
            b.append_field(tree, "Kids", kids);
            b.build().unwrap();
            b.built(tree).unwrap()
        };
        assert_eq!(make(), make());
    }
}
