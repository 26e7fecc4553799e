//! Runtime schema: entity shapes, variant types, and relation descriptors.
//!
//! A [`Schema`] is built once with a [`SchemaBuilder`] and shared by `Arc`
//! between every snapshot, builder and detached handle that uses it. It
//! drives field validation, symbolic-key derivation and the soft-link walk.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_foundation::{
    EntityTypeId, Error, FieldType, Result, SymbolicKey, Value, VariantTypeId,
};

use crate::registry::{DescriptorId, DescriptorTable, RelationDescriptor, TypeRegistry};

/// Schema definition for an entity field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldSchema {
    /// Field name.
    pub name: Arc<str>,
    /// Declared type.
    pub ty: FieldType,
    /// Value the field starts with.
    pub default: Option<Value>,
    /// Whether the field must be set before commit.
    pub required: bool,
}

impl FieldSchema {
    /// Creates a required field with no default.
    #[must_use]
    pub fn required(name: &str, ty: FieldType) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            default: None,
            required: true,
        }
    }

    /// Creates an optional field with a default value.
    #[must_use]
    pub fn optional(name: &str, ty: FieldType, default: Value) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            default: Some(default),
            required: false,
        }
    }

    /// Creates an optional field with no default (will be nil).
    #[must_use]
    pub fn optional_nil(name: &str, ty: FieldType) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            default: None,
            required: false,
        }
    }

    fn initial(&self) -> Value {
        self.default.clone().unwrap_or(Value::Nil)
    }
}

/// One alternative of a variant type.
#[derive(Clone, Debug, PartialEq)]
pub struct Alternative {
    /// Tag naming the alternative.
    pub tag: Arc<str>,
    /// Positional field types.
    pub fields: Vec<FieldType>,
}

impl Alternative {
    /// Creates an alternative.
    #[must_use]
    pub fn new(tag: &str, fields: Vec<FieldType>) -> Self {
        Self {
            tag: Arc::from(tag),
            fields,
        }
    }
}

/// A declared tagged-union type.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantSchema {
    /// Variant type name.
    pub name: Arc<str>,
    /// The alternatives, in declaration order.
    pub alternatives: Vec<Alternative>,
}

impl VariantSchema {
    /// Returns the alternative with the given tag.
    #[must_use]
    pub fn alternative(&self, tag: &str) -> Option<&Alternative> {
        self.alternatives.iter().find(|alt| &*alt.tag == tag)
    }
}

/// Field list and key declaration for one concrete entity type.
#[derive(Clone, Debug, Default)]
pub struct ShapeDef {
    fields: Vec<FieldSchema>,
    key: Vec<String>,
}

impl ShapeDef {
    /// Creates an empty shape definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Declares the fields that form the symbolic key, in order.
    #[must_use]
    pub fn with_key(mut self, fields: &[&str]) -> Self {
        self.key = fields.iter().map(ToString::to_string).collect();
        self
    }
}

/// Resolved shape of a concrete entity type.
#[derive(Clone, Debug)]
pub struct EntityShape {
    ty: EntityTypeId,
    name: Arc<str>,
    fields: Vec<FieldSchema>,
    by_name: HashMap<Arc<str>, usize>,
    key_fields: Vec<usize>,
    carries_links: bool,
}

impl EntityShape {
    /// Returns the entity type.
    #[must_use]
    pub fn entity_type(&self) -> EntityTypeId {
        self.ty
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Returns the position of a field.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Returns the position of a field or an `UnknownField` error.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is not declared on this type.
    pub fn require_field(&self, name: &str) -> Result<usize> {
        self.field_index(name)
            .ok_or_else(|| Error::unknown_field(&*self.name, name))
    }

    /// Returns the positions of the key fields.
    #[must_use]
    pub fn key_fields(&self) -> &[usize] {
        &self.key_fields
    }

    /// Returns true if entities of this type have a symbolic key.
    #[must_use]
    pub fn has_key(&self) -> bool {
        !self.key_fields.is_empty()
    }

    /// Returns true if any field can hold a soft link.
    #[must_use]
    pub fn carries_links(&self) -> bool {
        self.carries_links
    }

    /// Field values a fresh entity starts with.
    #[must_use]
    pub fn initial_fields(&self) -> Vec<Value> {
        self.fields.iter().map(FieldSchema::initial).collect()
    }

    /// Derives the symbolic key from field values.
    ///
    /// Returns `None` if the type has no key or a key field is still unset.
    #[must_use]
    pub fn symbolic_key<'a>(&self, fields: impl Fn(usize) -> Option<&'a Value>) -> Option<SymbolicKey> {
        if self.key_fields.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(self.key_fields.len());
        for &index in &self.key_fields {
            match fields(index) {
                Some(value) if !value.is_nil() => parts.push(value.clone()),
                _ => return None,
            }
        }
        Some(SymbolicKey::new(self.ty, parts))
    }

    /// Returns the first required field that is unset.
    #[must_use]
    pub fn first_missing<'a>(&'a self, fields: impl Fn(usize) -> Option<&'a Value>) -> Option<&'a str> {
        self.fields.iter().enumerate().find_map(|(i, field)| {
            let unset = fields(i).is_none_or(Value::is_nil);
            (field.required && unset).then_some(&*field.name)
        })
    }
}

/// Immutable runtime schema.
#[derive(Debug)]
pub struct Schema {
    types: TypeRegistry,
    descriptors: DescriptorTable,
    variants: Vec<VariantSchema>,
    variant_links: Vec<bool>,
    shapes: Vec<Option<EntityShape>>,
    as_parent: Vec<Vec<DescriptorId>>,
    as_child: Vec<Vec<DescriptorId>>,
    kinds: Vec<Vec<EntityTypeId>>,
}

impl Schema {
    /// Starts a new schema definition.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Looks up an entity type by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no such type is declared.
    pub fn type_id(&self, name: &str) -> Result<EntityTypeId> {
        self.types
            .lookup(name)
            .ok_or_else(|| Error::unknown_type(name))
    }

    /// Returns the name of an entity type.
    #[must_use]
    pub fn type_name(&self, ty: EntityTypeId) -> &str {
        self.types.name(ty).unwrap_or("<unknown>")
    }

    /// Returns true if `ty` is `ancestor` or one of its subtypes.
    #[must_use]
    pub fn is_a(&self, ty: EntityTypeId, ancestor: EntityTypeId) -> bool {
        self.types.is_a(ty, ancestor)
    }

    /// Returns true if the type cannot be instantiated.
    #[must_use]
    pub fn is_abstract(&self, ty: EntityTypeId) -> bool {
        self.types.is_abstract(ty)
    }

    /// Returns every concrete type that is-a `ty`, in declaration order.
    #[must_use]
    pub fn concrete_kinds(&self, ty: EntityTypeId) -> &[EntityTypeId] {
        self.kinds.get(ty.index() as usize).map_or(&[], Vec::as_slice)
    }

    /// Returns the shape of a concrete type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or abstract.
    pub fn shape(&self, ty: EntityTypeId) -> Result<&EntityShape> {
        match self.shapes.get(ty.index() as usize) {
            Some(Some(shape)) => Ok(shape),
            Some(None) => Err(Error::schema_conflict(format!(
                "{} is abstract and has no shape",
                self.type_name(ty)
            ))),
            None => Err(Error::unknown_type(ty.to_string())),
        }
    }

    /// Returns a registered descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the id does not belong to this schema.
    pub fn descriptor(&self, id: DescriptorId) -> Result<&RelationDescriptor> {
        self.descriptors
            .get(id)
            .ok_or_else(|| Error::unknown_relation(format!("{id:?}")))
    }

    /// Returns the id of a registered descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor was never registered.
    pub fn descriptor_id(&self, descriptor: &RelationDescriptor) -> Result<DescriptorId> {
        self.descriptors.id_of(descriptor).ok_or_else(|| {
            Error::unknown_relation(format!(
                "{} -> {} ({})",
                self.type_name(descriptor.parent),
                self.type_name(descriptor.child),
                descriptor.kind_label()
            ))
        })
    }

    /// Iterates over all registered descriptors.
    pub fn descriptors(&self) -> impl Iterator<Item = (DescriptorId, &RelationDescriptor)> {
        self.descriptors.iter()
    }

    /// Descriptors in which a concrete type can be the parent.
    #[must_use]
    pub fn parent_relations(&self, ty: EntityTypeId) -> &[DescriptorId] {
        self.as_parent.get(ty.index() as usize).map_or(&[], Vec::as_slice)
    }

    /// Descriptors in which a concrete type can be the child.
    #[must_use]
    pub fn child_relations(&self, ty: EntityTypeId) -> &[DescriptorId] {
        self.as_child.get(ty.index() as usize).map_or(&[], Vec::as_slice)
    }

    /// Returns true if a concrete type may sit at the parent end.
    #[must_use]
    pub fn accepts_parent(&self, descriptor: &RelationDescriptor, ty: EntityTypeId) -> bool {
        self.endpoint_matches(descriptor, descriptor.parent, ty)
    }

    /// Returns true if a concrete type may sit at the child end.
    #[must_use]
    pub fn accepts_child(&self, descriptor: &RelationDescriptor, ty: EntityTypeId) -> bool {
        self.endpoint_matches(descriptor, descriptor.child, ty)
    }

    fn endpoint_matches(
        &self,
        descriptor: &RelationDescriptor,
        declared: EntityTypeId,
        ty: EntityTypeId,
    ) -> bool {
        if descriptor.kind.is_abstract() {
            self.is_a(ty, declared)
        } else {
            ty == declared
        }
    }

    /// Human-readable description of a descriptor, for errors and logs.
    #[must_use]
    pub fn describe(&self, id: DescriptorId) -> String {
        let Some(d) = self.descriptors.get(id) else {
            return format!("{id:?}");
        };
        let mut out = format!(
            "{} -> {} ({}",
            self.type_name(d.parent),
            self.type_name(d.child),
            d.kind_label()
        );
        if d.optional {
            out.push_str(", optional");
        }
        out.push(')');
        out
    }

    /// Returns a declared variant type.
    #[must_use]
    pub fn variant(&self, id: VariantTypeId) -> Option<&VariantSchema> {
        self.variants.get(id.index() as usize)
    }

    /// Returns true if values of this declared type can contain a soft link.
    #[must_use]
    pub fn carries_links(&self, ty: &FieldType) -> bool {
        carries_links(ty, &self.variant_links)
    }

    /// Checks a field value against the shape.
    ///
    /// Nil is accepted at the top level; it marks an unset field.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not conform to the declared type.
    pub fn check_field(&self, shape: &EntityShape, index: usize, value: &Value) -> Result<()> {
        let field = shape
            .fields
            .get(index)
            .ok_or_else(|| Error::internal(format!("field index {index} out of range")))?;
        if value.is_nil() {
            return Ok(());
        }
        self.check_value(&field.name, &field.ty, value)
    }

    /// Checks a value against a declared type.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not conform to the declared type.
    pub fn check_value(&self, path: &str, ty: &FieldType, value: &Value) -> Result<()> {
        let mismatch = || Error::type_mismatch(path, ty.clone(), value.type_name());
        match (ty, value) {
            (FieldType::Any, _)
            | (FieldType::Option(_), Value::Nil)
            | (FieldType::Bool, Value::Bool(_))
            | (FieldType::Int, Value::Int(_))
            | (FieldType::Float, Value::Float(_))
            | (FieldType::String, Value::String(_)) => Ok(()),
            (FieldType::Option(inner), v) => self.check_value(path, inner, v),
            (FieldType::Link(target), Value::Link(key)) => {
                if self.is_a(key.entity_type(), *target) {
                    Ok(())
                } else {
                    Err(mismatch())
                }
            }
            (FieldType::List(inner), Value::List(items)) => items
                .iter()
                .try_for_each(|item| self.check_value(path, inner, item)),
            (FieldType::Set(inner), Value::Set(items)) => items
                .iter()
                .try_for_each(|item| self.check_value(path, inner, item)),
            (FieldType::Map(kt, vt), Value::Map(entries)) => {
                entries.iter().try_for_each(|(k, v)| {
                    self.check_value(path, kt, k)?;
                    self.check_value(path, vt, v)
                })
            }
            (FieldType::Variant(id), Value::Variant(variant)) => {
                let alt = self
                    .variant(*id)
                    .and_then(|schema| schema.alternative(&variant.tag))
                    .ok_or_else(mismatch)?;
                if alt.fields.len() != variant.fields.len() {
                    return Err(mismatch());
                }
                alt.fields
                    .iter()
                    .zip(variant.fields.iter())
                    .try_for_each(|(fty, v)| self.check_value(path, fty, v))
            }
            _ => Err(mismatch()),
        }
    }
}

fn carries_links(ty: &FieldType, variant_links: &[bool]) -> bool {
    match ty {
        FieldType::Link(_) | FieldType::Any => true,
        FieldType::List(inner) | FieldType::Set(inner) | FieldType::Option(inner) => {
            carries_links(inner, variant_links)
        }
        FieldType::Map(k, v) => carries_links(k, variant_links) || carries_links(v, variant_links),
        FieldType::Variant(id) => variant_links
            .get(id.index() as usize)
            .copied()
            .unwrap_or(false),
        FieldType::Bool | FieldType::Int | FieldType::Float | FieldType::String => false,
    }
}

/// Builder for a [`Schema`].
///
/// Declaration order matters only for supertypes, which must exist before
/// their subtypes. Variant types may be declared first and defined later so
/// that they can refer to themselves.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: TypeRegistry,
    descriptors: DescriptorTable,
    variants: Vec<(Arc<str>, Option<Vec<Alternative>>)>,
    shapes: HashMap<EntityTypeId, ShapeDef>,
}

impl SchemaBuilder {
    /// Creates an empty schema builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a concrete entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a supertype is unknown.
    pub fn entity_type(&mut self, name: &str, supertypes: &[EntityTypeId]) -> Result<EntityTypeId> {
        self.types.declare(name, supertypes, false)
    }

    /// Declares an abstract entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a supertype is unknown.
    pub fn abstract_type(&mut self, name: &str, supertypes: &[EntityTypeId]) -> Result<EntityTypeId> {
        self.types.declare(name, supertypes, true)
    }

    /// Declares a concrete entity type together with its shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a supertype is unknown.
    pub fn entity(
        &mut self,
        name: &str,
        supertypes: &[EntityTypeId],
        shape: ShapeDef,
    ) -> Result<EntityTypeId> {
        let ty = self.entity_type(name, supertypes)?;
        self.shapes.insert(ty, shape);
        Ok(ty)
    }

    /// Sets the shape of a concrete entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or abstract.
    pub fn define(&mut self, ty: EntityTypeId, shape: ShapeDef) -> Result<()> {
        if !self.types.contains(ty) {
            return Err(Error::unknown_type(ty.to_string()));
        }
        if self.types.is_abstract(ty) {
            return Err(Error::schema_conflict(format!(
                "abstract type {} cannot have a shape",
                self.types.name(ty).unwrap_or_default()
            )));
        }
        self.shapes.insert(ty, shape);
        Ok(())
    }

    /// Declares a variant type whose alternatives are defined later.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken.
    pub fn declare_variant(&mut self, name: &str) -> Result<VariantTypeId> {
        if self.variants.iter().any(|(n, _)| &**n == name) {
            return Err(Error::schema_conflict(format!(
                "variant type declared twice: {name}"
            )));
        }
        let id = u32::try_from(self.variants.len())
            .map_err(|_| Error::schema_conflict("too many variant types".to_string()))?;
        self.variants.push((Arc::from(name), None));
        Ok(VariantTypeId::new(id))
    }

    /// Defines the alternatives of a declared variant type.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is unknown, already defined, or two
    /// alternatives share a tag.
    pub fn define_variant(&mut self, id: VariantTypeId, alternatives: Vec<Alternative>) -> Result<()> {
        let slot = self
            .variants
            .get_mut(id.index() as usize)
            .ok_or_else(|| Error::schema_conflict(format!("unknown variant type {id:?}")))?;
        if slot.1.is_some() {
            return Err(Error::schema_conflict(format!(
                "variant type defined twice: {}",
                slot.0
            )));
        }
        for (i, alt) in alternatives.iter().enumerate() {
            if alternatives[..i].iter().any(|other| other.tag == alt.tag) {
                return Err(Error::schema_conflict(format!(
                    "duplicate alternative {} in {}",
                    alt.tag, slot.0
                )));
            }
        }
        slot.1 = Some(alternatives);
        Ok(())
    }

    /// Declares and defines a variant type in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or two alternatives share a tag.
    pub fn variant(&mut self, name: &str, alternatives: Vec<Alternative>) -> Result<VariantTypeId> {
        let id = self.declare_variant(name)?;
        self.define_variant(id, alternatives)?;
        Ok(id)
    }

    /// Registers a relation descriptor.
    ///
    /// Registering an equal descriptor twice returns the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is unknown, or a non-abstract kind
    /// names an abstract endpoint.
    pub fn relation(&mut self, descriptor: RelationDescriptor) -> Result<DescriptorId> {
        for ty in [descriptor.parent, descriptor.child] {
            if !self.types.contains(ty) {
                return Err(Error::unknown_type(ty.to_string()));
            }
            if !descriptor.kind.is_abstract() && self.types.is_abstract(ty) {
                return Err(Error::schema_conflict(format!(
                    "{} relation cannot use abstract type {}",
                    descriptor.kind_label(),
                    self.types.name(ty).unwrap_or_default()
                )));
            }
        }
        Ok(self.descriptors.intern(descriptor))
    }

    /// Validates the definitions and produces the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if a variant is undefined, a type reference is
    /// unknown, or a key field is missing, optional, or not a scalar.
    pub fn build(self) -> Result<Arc<Schema>> {
        let SchemaBuilder {
            types,
            descriptors,
            variants,
            mut shapes,
        } = self;

        let variants = variants
            .into_iter()
            .map(|(name, alternatives)| {
                let alternatives = alternatives.ok_or_else(|| {
                    Error::schema_conflict(format!("variant type {name} declared but not defined"))
                })?;
                Ok(VariantSchema { name, alternatives })
            })
            .collect::<Result<Vec<_>>>()?;

        let check_refs = |ty: &FieldType| check_type_refs(ty, &types, variants.len());
        for variant in &variants {
            for alt in &variant.alternatives {
                alt.fields.iter().try_for_each(check_refs)?;
            }
        }

        let variant_links = variant_link_fixpoint(&variants);

        let mut resolved = Vec::with_capacity(types.len());
        for ty in types.ids() {
            if types.is_abstract(ty) {
                resolved.push(None);
                continue;
            }
            let def = shapes.remove(&ty).unwrap_or_default();
            let name: Arc<str> = Arc::from(types.name(ty).unwrap_or_default());
            resolved.push(Some(resolve_shape(ty, name, def, &variant_links, &check_refs)?));
        }

        let mut schema = Schema {
            types,
            descriptors,
            variants,
            variant_links,
            shapes: resolved,
            as_parent: Vec::new(),
            as_child: Vec::new(),
            kinds: Vec::new(),
        };

        let ids: Vec<EntityTypeId> = schema.types.ids().collect();
        for &ty in &ids {
            let concrete = !schema.types.is_abstract(ty);
            let mut as_parent = Vec::new();
            let mut as_child = Vec::new();
            if concrete {
                for (id, d) in schema.descriptors.iter() {
                    if schema.accepts_parent(d, ty) {
                        as_parent.push(id);
                    }
                    if schema.accepts_child(d, ty) {
                        as_child.push(id);
                    }
                }
            }
            schema.as_parent.push(as_parent);
            schema.as_child.push(as_child);
            schema.kinds.push(
                ids.iter()
                    .copied()
                    .filter(|&sub| !schema.types.is_abstract(sub) && schema.types.is_a(sub, ty))
                    .collect(),
            );
        }

        for shape in schema.shapes.iter().flatten() {
            for field in &shape.fields {
                if let Some(default) = &field.default {
                    schema.check_value(&field.name, &field.ty, default)?;
                }
            }
        }

        Ok(Arc::new(schema))
    }
}

fn resolve_shape(
    ty: EntityTypeId,
    name: Arc<str>,
    def: ShapeDef,
    variant_links: &[bool],
    check_refs: &impl Fn(&FieldType) -> Result<()>,
) -> Result<EntityShape> {
    let mut by_name = HashMap::new();
    for (i, field) in def.fields.iter().enumerate() {
        check_refs(&field.ty)?;
        if by_name.insert(Arc::clone(&field.name), i).is_some() {
            return Err(Error::schema_conflict(format!(
                "field {} declared twice on {name}",
                field.name
            )));
        }
    }

    let mut key_fields = Vec::with_capacity(def.key.len());
    for key in &def.key {
        let index = *by_name
            .get(key.as_str())
            .ok_or_else(|| Error::unknown_field(&*name, key.as_str()))?;
        let field = &def.fields[index];
        if !field.required || !field.ty.is_key_scalar() {
            return Err(Error::schema_conflict(format!(
                "key field {key} on {name} must be a required scalar"
            )));
        }
        key_fields.push(index);
    }

    let carries = def
        .fields
        .iter()
        .any(|field| carries_links(&field.ty, variant_links));

    Ok(EntityShape {
        ty,
        name,
        fields: def.fields,
        by_name,
        key_fields,
        carries_links: carries,
    })
}

fn check_type_refs(ty: &FieldType, types: &TypeRegistry, variant_count: usize) -> Result<()> {
    match ty {
        FieldType::Link(target) if !types.contains(*target) => {
            Err(Error::unknown_type(format!("link target {target}")))
        }
        FieldType::Variant(id) if id.index() as usize >= variant_count => {
            Err(Error::schema_conflict(format!("unknown variant type {id:?}")))
        }
        FieldType::List(inner) | FieldType::Set(inner) | FieldType::Option(inner) => {
            check_type_refs(inner, types, variant_count)
        }
        FieldType::Map(k, v) => {
            check_type_refs(k, types, variant_count)?;
            check_type_refs(v, types, variant_count)
        }
        _ => Ok(()),
    }
}

/// Computes which variant types can reach a link, allowing recursive variants.
fn variant_link_fixpoint(variants: &[VariantSchema]) -> Vec<bool> {
    let mut flags = vec![false; variants.len()];
    loop {
        let mut changed = false;
        for (i, variant) in variants.iter().enumerate() {
            if flags[i] {
                continue;
            }
            let reaches = variant
                .alternatives
                .iter()
                .flat_map(|alt| alt.fields.iter())
                .any(|ty| carries_links(ty, &flags));
            if reaches {
                flags[i] = true;
                changed = true;
            }
        }
        if !changed {
            return flags;
        }
    }
}
