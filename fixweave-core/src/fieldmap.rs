/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Ordered field containers and repeating groups.
//!
//! A [`FieldMap`] stores fields in insertion order in one of two shapes:
//!
//! - *Dict form*: tag-indexed entries with O(1) top-level lookup and nested
//!   [`Group`] values. Requires that every repeating group was built against
//!   a [`GroupTemplate`].
//! - *List form*: a flat ordered sequence with O(n) lookup, used when no
//!   template is available and group members stay flat.
//!
//! Callers see one interface; the representation is chosen at construction.

use crate::error::DecodeError;
use crate::field::{Field, NULL_SENTINEL};
use crate::tags;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// Template describing one repeating group: the count tag that introduces
/// it, the delimiter tag that starts each instance, and the member tags an
/// instance may contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTemplate {
    count_tag: u32,
    delimiter: u32,
    members: HashSet<u32>,
}

impl GroupTemplate {
    /// Creates a template. The delimiter is always a member.
    #[must_use]
    pub fn new(count_tag: u32, delimiter: u32, members: impl IntoIterator<Item = u32>) -> Self {
        let mut members: HashSet<u32> = members.into_iter().collect();
        members.insert(delimiter);
        Self {
            count_tag,
            delimiter,
            members,
        }
    }

    /// The count tag that introduces the group.
    #[inline]
    #[must_use]
    pub const fn count_tag(&self) -> u32 {
        self.count_tag
    }

    /// The tag that marks the start of each instance.
    #[inline]
    #[must_use]
    pub const fn delimiter(&self) -> u32 {
        self.delimiter
    }

    /// Returns true if `tag` may appear inside an instance.
    #[inline]
    #[must_use]
    pub fn is_member(&self, tag: u32) -> bool {
        self.members.contains(&tag)
    }
}

/// A repeating group: a template plus ordered instances.
///
/// `size()` always equals the number of instances, which is what the count
/// field encodes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    template: GroupTemplate,
    instances: Vec<FieldMap>,
}

impl Group {
    /// Creates an empty group from a template.
    #[must_use]
    pub fn new(template: GroupTemplate) -> Self {
        Self {
            template,
            instances: Vec::new(),
        }
    }

    /// Returns the group template.
    #[inline]
    #[must_use]
    pub fn template(&self) -> &GroupTemplate {
        &self.template
    }

    /// The count tag that introduces the group.
    #[inline]
    #[must_use]
    pub const fn count_tag(&self) -> u32 {
        self.template.count_tag
    }

    /// Number of instances.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.instances.len()
    }

    /// Returns the ordered instances.
    #[inline]
    #[must_use]
    pub fn instances(&self) -> &[FieldMap] {
        &self.instances
    }

    /// Returns instance `i`, if present.
    #[must_use]
    pub fn instance(&self, i: usize) -> Option<&FieldMap> {
        self.instances.get(i)
    }

    /// Appends an instance.
    ///
    /// # Errors
    /// Returns `DecodeError::GroupParseError` if the instance does not start
    /// with the delimiter tag or contains a non-member tag.
    pub fn push_instance(&mut self, instance: FieldMap) -> Result<(), DecodeError> {
        let valid = instance
            .flat_fields()
            .first()
            .is_some_and(|f| f.tag() == self.template.delimiter)
            && instance
                .flat_fields()
                .iter()
                .all(|f| self.template.is_member(f.tag()));
        if !valid {
            return Err(DecodeError::GroupParseError {
                count_tag: self.template.count_tag,
                expected: self.instances.len() + 1,
                actual: self.instances.len(),
            });
        }
        self.instances.push(instance);
        Ok(())
    }

    /// Flattens the group into wire-order fields: the synthesized count
    /// field followed by each instance's fields.
    #[must_use]
    pub fn flat_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::uint(self.template.count_tag, self.instances.len() as u64)];
        for instance in &self.instances {
            fields.extend(instance.flat_fields());
        }
        fields
    }
}

/// One entry at the top level of a dict-form map.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A plain field.
    Field(Field),
    /// A nested repeating group, stored under its count tag.
    Group(Group),
}

impl Entry {
    fn tag(&self) -> u32 {
        match self {
            Self::Field(f) => f.tag(),
            Self::Group(g) => g.count_tag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    Dict {
        entries: Vec<Entry>,
        index: HashMap<u32, usize>,
    },
    List(Vec<Field>),
}

/// An ordered multi-field container; see the module docs for the two forms.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    repr: Repr,
}

impl FieldMap {
    /// Creates an empty dict-form map.
    #[must_use]
    pub fn dict() -> Self {
        Self {
            repr: Repr::Dict {
                entries: Vec::new(),
                index: HashMap::new(),
            },
        }
    }

    /// Creates an empty list-form map.
    #[must_use]
    pub fn list() -> Self {
        Self {
            repr: Repr::List(Vec::new()),
        }
    }

    /// Returns true if this map is in dict form.
    #[must_use]
    pub const fn is_dict(&self) -> bool {
        matches!(self.repr, Repr::Dict { .. })
    }

    /// Inserts a field without tag-range validation.
    ///
    /// Used by the codec, which must carry whatever the wire delivered. In
    /// dict form a duplicate tag is handed back so the caller can fall back
    /// to list form.
    pub fn insert_raw(&mut self, field: Field) -> Result<(), Field> {
        match &mut self.repr {
            Repr::Dict { entries, index } => {
                if index.contains_key(&field.tag()) {
                    return Err(field);
                }
                index.insert(field.tag(), entries.len());
                entries.push(Entry::Field(field));
                Ok(())
            }
            Repr::List(fields) => {
                fields.push(field);
                Ok(())
            }
        }
    }

    /// Adds or replaces a field by tag number.
    ///
    /// The value replaces an existing field in place (insertion order is
    /// kept) or is appended. Assigning the FIX null sentinel removes the
    /// field instead.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidTag` for tags outside the standard
    /// [1, 955] and user-defined [5000, 9999] ranges.
    pub fn set(&mut self, tag: u32, value: impl Into<Bytes>) -> Result<(), DecodeError> {
        if !tags::is_assignable(tag) {
            return Err(DecodeError::InvalidTag { tag });
        }
        let field = Field::new(tag, value);
        if field.value() == NULL_SENTINEL {
            self.remove(tag);
            return Ok(());
        }
        match &mut self.repr {
            Repr::Dict { entries, index } => {
                if let Some(&i) = index.get(&tag) {
                    entries[i] = Entry::Field(field);
                } else {
                    index.insert(tag, entries.len());
                    entries.push(Entry::Field(field));
                }
            }
            Repr::List(fields) => {
                if let Some(existing) = fields.iter_mut().find(|f| f.tag() == tag) {
                    *existing = field;
                } else {
                    fields.push(field);
                }
            }
        }
        Ok(())
    }

    /// Adds or replaces a field by its dictionary name.
    ///
    /// # Errors
    /// Returns `DecodeError::UnknownTagName` if `name` is not in the
    /// dictionary, or `DecodeError::InvalidTag` if the tag is not assignable.
    pub fn set_by_name(&mut self, name: &str, value: impl Into<Bytes>) -> Result<(), DecodeError> {
        let tag = tags::tag_for_name(name)
            .ok_or_else(|| DecodeError::UnknownTagName(name.to_string()))?;
        self.set(tag, value)
    }

    /// Stores a repeating group under its count tag (dict form), or flattens
    /// it into the field sequence (list form).
    pub fn set_group(&mut self, group: Group) {
        match &mut self.repr {
            Repr::Dict { entries, index } => {
                let tag = group.count_tag();
                if let Some(&i) = index.get(&tag) {
                    entries[i] = Entry::Group(group);
                } else {
                    index.insert(tag, entries.len());
                    entries.push(Entry::Group(group));
                }
            }
            Repr::List(fields) => fields.extend(group.flat_fields()),
        }
    }

    /// Gets a plain field by tag. Group entries are reached via [`group`].
    ///
    /// [`group`]: FieldMap::group
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<&Field> {
        match &self.repr {
            Repr::Dict { entries, index } => match index.get(&tag).map(|&i| &entries[i]) {
                Some(Entry::Field(f)) => Some(f),
                _ => None,
            },
            Repr::List(fields) => fields.iter().find(|f| f.tag() == tag),
        }
    }

    /// Gets a field value as text.
    #[must_use]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.get(tag).and_then(|f| f.as_str().ok())
    }

    /// Gets a plain field by its dictionary name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Field> {
        tags::tag_for_name(name).and_then(|tag| self.get(tag))
    }

    /// Gets a repeating group by its count tag (dict form only).
    #[must_use]
    pub fn group(&self, count_tag: u32) -> Option<&Group> {
        match &self.repr {
            Repr::Dict { entries, index } => match index.get(&count_tag).map(|&i| &entries[i]) {
                Some(Entry::Group(g)) => Some(g),
                _ => None,
            },
            Repr::List(_) => None,
        }
    }

    /// Removes an entry by tag.
    ///
    /// In dict form, removing a count tag removes the whole group
    /// atomically. In list form, the first field with the tag is removed.
    pub fn remove(&mut self, tag: u32) -> Option<Entry> {
        match &mut self.repr {
            Repr::Dict { entries, index } => {
                let i = index.remove(&tag)?;
                let entry = entries.remove(i);
                for idx in index.values_mut() {
                    if *idx > i {
                        *idx -= 1;
                    }
                }
                Some(entry)
            }
            Repr::List(fields) => {
                let i = fields.iter().position(|f| f.tag() == tag)?;
                Some(Entry::Field(fields.remove(i)))
            }
        }
    }

    /// Returns true if a field or group with this tag is present.
    #[must_use]
    pub fn contains(&self, tag: u32) -> bool {
        match &self.repr {
            Repr::Dict { index, .. } => index.contains_key(&tag),
            Repr::List(fields) => fields.iter().any(|f| f.tag() == tag),
        }
    }

    /// Number of top-level entries (a group counts as one).
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Dict { entries, .. } => entries.len(),
            Repr::List(fields) => fields.len(),
        }
    }

    /// Returns true if the map holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the map into wire-order fields, synthesizing group count
    /// fields from instance counts.
    #[must_use]
    pub fn flat_fields(&self) -> Vec<Field> {
        match &self.repr {
            Repr::Dict { entries, .. } => {
                let mut fields = Vec::with_capacity(entries.len());
                for entry in entries {
                    match entry {
                        Entry::Field(f) => fields.push(f.clone()),
                        Entry::Group(g) => fields.extend(g.flat_fields()),
                    }
                }
                fields
            }
            Repr::List(fields) => fields.clone(),
        }
    }

    /// Converts this map to list form, flattening any groups.
    #[must_use]
    pub fn into_list(self) -> Self {
        match self.repr {
            Repr::List(_) => self,
            Repr::Dict { .. } => Self {
                repr: Repr::List(self.flat_fields()),
            },
        }
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self::dict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn misc_fees_template() -> GroupTemplate {
        GroupTemplate::new(136, 137, [137, 138, 139])
    }

    #[test]
    fn dict_set_get_preserves_order() {
        let mut map = FieldMap::dict();
        map.set(55, &b"EURUSD"[..]).unwrap();
        map.set(54, &b"1"[..]).unwrap();
        map.set(38, &b"100"[..]).unwrap();

        assert_eq!(map.get_str(55), Some("EURUSD"));
        assert_eq!(map.get(54).unwrap().as_u64().unwrap(), 1);

        let order: Vec<u32> = map.flat_fields().iter().map(Field::tag).collect();
        assert_eq!(order, vec![55, 54, 38]);
    }

    #[test]
    fn dict_replace_keeps_position() {
        let mut map = FieldMap::dict();
        map.set(55, &b"EURUSD"[..]).unwrap();
        map.set(54, &b"1"[..]).unwrap();
        map.set(55, &b"GBPUSD"[..]).unwrap();

        let order: Vec<u32> = map.flat_fields().iter().map(Field::tag).collect();
        assert_eq!(order, vec![55, 54]);
        assert_eq!(map.get_str(55), Some("GBPUSD"));
    }

    #[test]
    fn invalid_tag_rejected() {
        let mut map = FieldMap::dict();
        assert!(matches!(
            map.set(960, &b"x"[..]),
            Err(DecodeError::InvalidTag { tag: 960 })
        ));
        assert!(matches!(
            map.set(10500, &b"x"[..]),
            Err(DecodeError::InvalidTag { tag: 10500 })
        ));
        // User-defined range is allowed.
        map.set(5001, &b"custom"[..]).unwrap();
        assert_eq!(map.get_str(5001), Some("custom"));
    }

    #[test]
    fn null_sentinel_removes() {
        let mut map = FieldMap::dict();
        map.set(55, &b"EURUSD"[..]).unwrap();
        map.set(55, &b"-2147483648"[..]).unwrap();
        assert!(!map.contains(55));
    }

    #[test]
    fn name_based_access() {
        let mut map = FieldMap::dict();
        map.set_by_name("TestReqID", &b"abc"[..]).unwrap();
        assert_eq!(map.get_by_name("TestReqID").unwrap().as_str().unwrap(), "abc");
        assert!(map.set_by_name("NotATag", &b"x"[..]).is_err());
    }

    #[test]
    fn group_roundtrip() {
        let mut group = Group::new(misc_fees_template());

        let mut fee = FieldMap::dict();
        fee.set(137, &b"1.5"[..]).unwrap();
        fee.set(139, &b"4"[..]).unwrap();
        group.push_instance(fee).unwrap();

        let mut fee = FieldMap::dict();
        fee.set(137, &b"0.25"[..]).unwrap();
        fee.set(138, &b"USD"[..]).unwrap();
        group.push_instance(fee).unwrap();

        assert_eq!(group.size(), 2);

        let mut map = FieldMap::dict();
        map.set(55, &b"EURUSD"[..]).unwrap();
        map.set_group(group);

        let g = map.group(136).unwrap();
        assert_eq!(g.size(), 2);
        assert_eq!(g.instance(0).unwrap().get_str(137), Some("1.5"));
        assert_eq!(g.instance(1).unwrap().get_str(138), Some("USD"));

        // Flattened wire order: 55, then 136=2, then instances in order.
        let order: Vec<u32> = map.flat_fields().iter().map(Field::tag).collect();
        assert_eq!(order, vec![55, 136, 137, 139, 137, 138]);
        assert_eq!(map.flat_fields()[1].as_u64().unwrap(), 2);
    }

    #[test]
    fn group_instance_must_start_with_delimiter() {
        let mut group = Group::new(misc_fees_template());
        let mut bad = FieldMap::dict();
        bad.set(138, &b"USD"[..]).unwrap();
        assert!(group.push_instance(bad).is_err());
    }

    #[test]
    fn removing_count_tag_removes_group() {
        let mut group = Group::new(misc_fees_template());
        let mut fee = FieldMap::dict();
        fee.set(137, &b"1"[..]).unwrap();
        group.push_instance(fee).unwrap();

        let mut map = FieldMap::dict();
        map.set(55, &b"EURUSD"[..]).unwrap();
        map.set_group(group);
        map.set(58, &b"note"[..]).unwrap();

        let removed = map.remove(136);
        assert!(matches!(removed, Some(Entry::Group(_))));
        assert!(!map.contains(136));
        assert!(!map.contains(137));
        // Later entries are still reachable after the index shifts.
        assert_eq!(map.get_str(58), Some("note"));
    }

    #[test]
    fn list_form_lookup_and_duplicates() {
        let mut map = FieldMap::list();
        map.insert_raw(Field::new(269, &b"0"[..])).unwrap();
        map.insert_raw(Field::new(270, &b"1.1"[..])).unwrap();
        map.insert_raw(Field::new(269, &b"1"[..])).unwrap();
        map.insert_raw(Field::new(270, &b"1.2"[..])).unwrap();

        // First match wins on lookup; duplicates stay in order.
        assert_eq!(map.get_str(269), Some("0"));
        assert_eq!(map.len(), 4);
        assert!(!map.is_dict());
    }

    #[test]
    fn dict_duplicate_hands_field_back() {
        let mut map = FieldMap::dict();
        map.insert_raw(Field::new(269, &b"0"[..])).unwrap();
        let dup = map.insert_raw(Field::new(269, &b"1"[..]));
        assert!(dup.is_err());
    }

    #[test]
    fn into_list_flattens() {
        let mut group = Group::new(misc_fees_template());
        let mut fee = FieldMap::dict();
        fee.set(137, &b"1"[..]).unwrap();
        group.push_instance(fee).unwrap();

        let mut map = FieldMap::dict();
        map.set_group(group);

        let list = map.into_list();
        assert!(!list.is_dict());
        assert_eq!(list.len(), 2); // count field + one member
        assert_eq!(list.get(136).unwrap().as_u64().unwrap(), 1);
    }
}
